//! PostgreSQL store. Schema lives in `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::AppError;
use crate::relationships::{Edge, EdgeKey, EdgeKind, TargetKind};
use crate::store::{
    AccountUpdate, EdgeStore, Identity, IdentityStore, ProfileImage, TargetDirectory,
};

const IDENTITY_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, \
     password_hash, refresh_token_hash, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn identity_from_row(row: &PgRow) -> Result<Identity, sqlx::Error> {
    Ok(Identity {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        avatar: row.try_get("avatar")?,
        cover_image: row.try_get("cover_image")?,
        password_hash: row.try_get("password_hash")?,
        refresh_token_hash: row.try_get("refresh_token_hash")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn insert(&self, identity: Identity) -> Result<Identity, AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, full_name, avatar, cover_image,
                               password_hash, refresh_token_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(identity.id)
        .bind(&identity.username)
        .bind(&identity.email)
        .bind(&identity.full_name)
        .bind(&identity.avatar)
        .bind(&identity.cover_image)
        .bind(&identity.password_hash)
        .bind(&identity.refresh_token_hash)
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(identity)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", IDENTITY_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(identity_from_row).transpose()?)
    }

    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Identity>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE username = $1 OR email = $2 \
             ORDER BY (username = $1) IS TRUE DESC LIMIT 1",
            IDENTITY_COLUMNS
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(identity_from_row).transpose()?)
    }

    async fn update_account(&self, id: Uuid, update: AccountUpdate) -> Result<Identity, AppError> {
        let row = sqlx::query(&format!(
            "UPDATE users SET full_name = $2, email = $3, updated_at = $4 \
             WHERE id = $1 RETURNING {}",
            IDENTITY_COLUMNS
        ))
        .bind(id)
        .bind(&update.full_name)
        .bind(&update.email)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;

        Ok(identity_from_row(&row)?)
    }

    async fn update_image(
        &self,
        id: Uuid,
        image: ProfileImage,
        url: &str,
    ) -> Result<Identity, AppError> {
        let column = match image {
            ProfileImage::Avatar => "avatar",
            ProfileImage::CoverImage => "cover_image",
        };

        let row = sqlx::query(&format!(
            "UPDATE users SET {} = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            column, IDENTITY_COLUMNS
        ))
        .bind(id)
        .bind(url)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;

        Ok(identity_from_row(&row)?)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, refresh_token_hash = NULL, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("user"));
        }
        Ok(())
    }

    async fn set_refresh_token(&self, id: Uuid, token_hash: Option<&str>) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET refresh_token_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new_hash: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $3
            WHERE id = $1 AND refresh_token_hash = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl EdgeStore for PgStore {
    async fn insert_edge(&self, edge: &Edge) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO relationship_edges (actor_id, target_id, kind, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (actor_id, target_id, kind) DO NOTHING
            "#,
        )
        .bind(edge.key.actor_id)
        .bind(edge.key.target_id)
        .bind(edge.key.kind.as_str())
        .bind(edge.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_edge(&self, key: &EdgeKey) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM relationship_edges WHERE actor_id = $1 AND target_id = $2 AND kind = $3",
        )
        .bind(key.actor_id)
        .bind(key.target_id)
        .bind(key.kind.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_targets(&self, actor_id: Uuid, kind: EdgeKind) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT target_id FROM relationship_edges \
             WHERE actor_id = $1 AND kind = $2 ORDER BY created_at DESC",
        )
        .bind(actor_id)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn list_actors(&self, target_id: Uuid, kind: EdgeKind) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT actor_id FROM relationship_edges \
             WHERE target_id = $1 AND kind = $2 ORDER BY created_at DESC",
        )
        .bind(target_id)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[async_trait]
impl TargetDirectory for PgStore {
    async fn exists(&self, kind: TargetKind, id: Uuid) -> Result<bool, AppError> {
        let sql = match kind {
            TargetKind::Video => "SELECT EXISTS(SELECT 1 FROM videos WHERE id = $1 AND is_published)",
            TargetKind::Comment => "SELECT EXISTS(SELECT 1 FROM comments WHERE id = $1)",
            TargetKind::Tweet => "SELECT EXISTS(SELECT 1 FROM tweets WHERE id = $1)",
            TargetKind::Channel => "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)",
        };

        let found = sqlx::query_scalar::<_, bool>(sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }
}
