/// Storage contracts
///
/// The core only talks to storage through these traits. Every method that
/// guards an invariant (unique username/email, single refresh value, single
/// edge per tuple) is a single atomic operation in each backend.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::relationships::{Edge, EdgeKey, EdgeKind, TargetKind};

/// A registered account
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub password_hash: String,
    /// SHA-256 digest of the one refresh token currently accepted
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Builds a new record; `username` and `email` must already be normalised.
    pub fn new(username: String, email: String, full_name: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            full_name,
            avatar: None,
            cover_image: None,
            password_hash,
            refresh_token_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_public(&self) -> PublicIdentity {
        PublicIdentity::from(self)
    }
}

/// Identity without its credential or session fields
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicIdentity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Identity> for PublicIdentity {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            username: identity.username.clone(),
            email: identity.email.clone(),
            full_name: identity.full_name.clone(),
            avatar: identity.avatar.clone(),
            cover_image: identity.cover_image.clone(),
            created_at: identity.created_at,
            updated_at: identity.updated_at,
        }
    }
}

/// Profile fields an owner may change
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    pub full_name: String,
    pub email: String,
}

/// Which profile image a URL replaces. The media itself lives elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileImage {
    Avatar,
    CoverImage,
}

impl ProfileImage {
    pub fn field(&self) -> &'static str {
        match self {
            ProfileImage::Avatar => "avatar",
            ProfileImage::CoverImage => "coverImage",
        }
    }
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Inserts a new identity. A taken username or email fails with
    /// `DatabaseError::UniqueConstraintViolation` naming the field.
    async fn insert(&self, identity: Identity) -> Result<Identity, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError>;

    /// Looks up by normalised username or email, whichever is given.
    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Identity>, AppError>;

    /// Updates display name and email; a taken email is a conflict.
    async fn update_account(&self, id: Uuid, update: AccountUpdate) -> Result<Identity, AppError>;

    /// Points the avatar or cover image at a new URL.
    async fn update_image(
        &self,
        id: Uuid,
        image: ProfileImage,
        url: &str,
    ) -> Result<Identity, AppError>;

    /// Replaces the password hash and clears the stored refresh value.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError>;

    /// Unconditionally sets (or clears) the stored refresh value.
    async fn set_refresh_token(&self, id: Uuid, token_hash: Option<&str>) -> Result<(), AppError>;

    /// Replaces the stored refresh value only if it still equals `expected`.
    /// Returns whether the swap happened.
    async fn replace_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new_hash: &str,
    ) -> Result<bool, AppError>;
}

#[async_trait]
pub trait EdgeStore: Send + Sync {
    /// Inserts the edge unless one already exists for its key.
    /// Returns `true` if this call created it.
    async fn insert_edge(&self, edge: &Edge) -> Result<bool, AppError>;

    /// Deletes the edge for `key` if present. Returns `true` if a row went away.
    async fn delete_edge(&self, key: &EdgeKey) -> Result<bool, AppError>;

    /// Targets `actor` currently has an edge of `kind` to, newest first.
    async fn list_targets(&self, actor_id: Uuid, kind: EdgeKind) -> Result<Vec<Uuid>, AppError>;

    /// Actors that currently have an edge of `kind` to `target`, newest first.
    async fn list_actors(&self, target_id: Uuid, kind: EdgeKind) -> Result<Vec<Uuid>, AppError>;
}

/// Existence checks against content owned by other parts of the system
#[async_trait]
pub trait TargetDirectory: Send + Sync {
    async fn exists(&self, kind: TargetKind, id: Uuid) -> Result<bool, AppError>;
}
