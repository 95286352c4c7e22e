use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::relationships::{Edge, EdgeKey, EdgeKind};
use crate::store::{EdgeStore, TargetDirectory};

/// Delete/insert rounds before giving up on a contended key
const MAX_TOGGLE_ATTEMPTS: usize = 16;

/// Result of one toggle: the membership state after this call
#[derive(Debug, Clone, Serialize)]
pub struct ToggleOutcome {
    pub active: bool,
    pub edge: Option<Edge>,
}

/// Flips presence of an (actor, target, kind) edge.
///
/// Each round is "delete if exists", then "insert unless exists"; both are
/// atomic in the store, so a call flips the state exactly once and the store
/// never holds two edges for one key. An insert that finds an edge means a
/// concurrent toggle created it after our delete missed, so we go again.
#[derive(Clone)]
pub struct RelationshipToggle {
    edges: Arc<dyn EdgeStore>,
    targets: Arc<dyn TargetDirectory>,
}

impl RelationshipToggle {
    pub fn new(edges: Arc<dyn EdgeStore>, targets: Arc<dyn TargetDirectory>) -> Self {
        Self { edges, targets }
    }

    #[tracing::instrument(name = "toggle_relationship", skip(self))]
    pub async fn toggle(
        &self,
        actor_id: Uuid,
        target_id: Uuid,
        kind: EdgeKind,
    ) -> Result<ToggleOutcome, AppError> {
        let target_kind = kind.target_kind();
        if !self.targets.exists(target_kind, target_id).await? {
            return Err(AppError::not_found(target_kind.as_str()));
        }

        let key = EdgeKey {
            actor_id,
            target_id,
            kind,
        };

        for attempt in 1..=MAX_TOGGLE_ATTEMPTS {
            if self.edges.delete_edge(&key).await? {
                tracing::info!(actor_id = %actor_id, target_id = %target_id, "Edge removed");
                return Ok(ToggleOutcome {
                    active: false,
                    edge: None,
                });
            }

            let edge = Edge::new(key);
            if self.edges.insert_edge(&edge).await? {
                tracing::info!(actor_id = %actor_id, target_id = %target_id, "Edge created");
                return Ok(ToggleOutcome {
                    active: true,
                    edge: Some(edge),
                });
            }

            tracing::debug!(attempt, "Edge changed under concurrent toggle, retrying");
        }

        Err(AppError::Internal(format!(
            "toggle on {} did not settle after {} attempts",
            kind.as_str(),
            MAX_TOGGLE_ATTEMPTS
        )))
    }

    /// Target ids the actor has an active edge of `kind` to
    pub async fn targets_of(&self, actor_id: Uuid, kind: EdgeKind) -> Result<Vec<Uuid>, AppError> {
        self.edges.list_targets(actor_id, kind).await
    }

    /// Actor ids with an active edge of `kind` to the target. The target must exist.
    pub async fn actors_of(&self, target_id: Uuid, kind: EdgeKind) -> Result<Vec<Uuid>, AppError> {
        let target_kind = kind.target_kind();
        if !self.targets.exists(target_kind, target_id).await? {
            return Err(AppError::not_found(target_kind.as_str()));
        }
        self.edges.list_actors(target_id, kind).await
    }
}
