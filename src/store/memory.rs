//! In-process store backed by `DashMap`.
//!
//! Uniqueness is enforced with the map entry API: a vacant entry is claimed
//! under its shard lock, so two racing inserts cannot both succeed.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::relationships::{Edge, EdgeKey, EdgeKind, TargetKind};
use crate::store::{
    AccountUpdate, EdgeStore, Identity, IdentityStore, ProfileImage, TargetDirectory,
};

#[derive(Default)]
pub struct InMemoryStore {
    identities: DashMap<Uuid, Identity>,
    usernames: DashMap<String, Uuid>,
    emails: DashMap<String, Uuid>,
    edges: DashMap<EdgeKey, Edge>,
    /// (kind, id) -> published
    targets: DashMap<(TargetKind, Uuid), bool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a video, comment or tweet so it can be the target of a like.
    pub fn add_target(&self, kind: TargetKind, published: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.targets.insert((kind, id), published);
        id
    }

    fn missing_identity() -> AppError {
        AppError::not_found("user")
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn insert(&self, identity: Identity) -> Result<Identity, AppError> {
        match self.usernames.entry(identity.username.clone()) {
            Entry::Occupied(_) => return Err(AppError::conflict("username")),
            Entry::Vacant(slot) => {
                slot.insert(identity.id);
            }
        }

        match self.emails.entry(identity.email.clone()) {
            Entry::Occupied(_) => {
                self.usernames.remove(&identity.username);
                return Err(AppError::conflict("email"));
            }
            Entry::Vacant(slot) => {
                slot.insert(identity.id);
            }
        }

        self.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        Ok(self.identities.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Identity>, AppError> {
        let id = username
            .and_then(|name| self.usernames.get(name).map(|entry| *entry.value()))
            .or_else(|| email.and_then(|address| self.emails.get(address).map(|entry| *entry.value())));

        match id {
            Some(id) => self.find_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn update_account(&self, id: Uuid, update: AccountUpdate) -> Result<Identity, AppError> {
        // The identity's write lock is held for the whole swap, so updates to
        // one account are serialised and the email index always follows the
        // stored address.
        let mut entry = self
            .identities
            .get_mut(&id)
            .ok_or_else(Self::missing_identity)?;

        if entry.email != update.email {
            match self.emails.entry(update.email.clone()) {
                Entry::Occupied(owner) if *owner.get() != id => {
                    return Err(AppError::conflict("email"))
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
            self.emails.remove_if(&entry.email, |_, owner| *owner == id);
        }

        entry.full_name = update.full_name;
        entry.email = update.email;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn update_image(
        &self,
        id: Uuid,
        image: ProfileImage,
        url: &str,
    ) -> Result<Identity, AppError> {
        let mut entry = self
            .identities
            .get_mut(&id)
            .ok_or_else(Self::missing_identity)?;
        match image {
            ProfileImage::Avatar => entry.avatar = Some(url.to_string()),
            ProfileImage::CoverImage => entry.cover_image = Some(url.to_string()),
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let mut entry = self
            .identities
            .get_mut(&id)
            .ok_or_else(Self::missing_identity)?;
        entry.password_hash = password_hash.to_string();
        entry.refresh_token_hash = None;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn set_refresh_token(&self, id: Uuid, token_hash: Option<&str>) -> Result<(), AppError> {
        let mut entry = self
            .identities
            .get_mut(&id)
            .ok_or_else(Self::missing_identity)?;
        entry.refresh_token_hash = token_hash.map(str::to_string);
        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new_hash: &str,
    ) -> Result<bool, AppError> {
        // get_mut holds the shard write lock across compare and swap
        let Some(mut entry) = self.identities.get_mut(&id) else {
            return Ok(false);
        };
        if entry.refresh_token_hash.as_deref() != Some(expected) {
            return Ok(false);
        }
        entry.refresh_token_hash = Some(new_hash.to_string());
        Ok(true)
    }
}

#[async_trait]
impl EdgeStore for InMemoryStore {
    async fn insert_edge(&self, edge: &Edge) -> Result<bool, AppError> {
        match self.edges.entry(edge.key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(edge.clone());
                Ok(true)
            }
        }
    }

    async fn delete_edge(&self, key: &EdgeKey) -> Result<bool, AppError> {
        Ok(self.edges.remove(key).is_some())
    }

    async fn list_targets(&self, actor_id: Uuid, kind: EdgeKind) -> Result<Vec<Uuid>, AppError> {
        let mut found: Vec<Edge> = self
            .edges
            .iter()
            .filter(|entry| entry.key.actor_id == actor_id && entry.key.kind == kind)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found.into_iter().map(|edge| edge.key.target_id).collect())
    }

    async fn list_actors(&self, target_id: Uuid, kind: EdgeKind) -> Result<Vec<Uuid>, AppError> {
        let mut found: Vec<Edge> = self
            .edges
            .iter()
            .filter(|entry| entry.key.target_id == target_id && entry.key.kind == kind)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found.into_iter().map(|edge| edge.key.actor_id).collect())
    }
}

#[async_trait]
impl TargetDirectory for InMemoryStore {
    async fn exists(&self, kind: TargetKind, id: Uuid) -> Result<bool, AppError> {
        Ok(match kind {
            TargetKind::Channel => self.identities.contains_key(&id),
            _ => self
                .targets
                .get(&(kind, id))
                .map(|published| *published.value())
                .unwrap_or(false),
        })
    }
}
