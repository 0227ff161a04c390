use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use crate::core::database::is_unique_violation;
use crate::core::error::{AppError, Result};
use crate::features::users::models::{CreateDriveUser, DriveUser};

/// Persistence of file owners
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Record an owner. Returns `false` when the email was already known.
    async fn insert(&self, user: &CreateDriveUser) -> Result<bool>;

    async fn list_all(&self) -> Result<Vec<DriveUser>>;
}

/// Postgres-backed user store
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserService {
    async fn insert(&self, user: &CreateDriveUser) -> Result<bool> {
        let result = sqlx::query("INSERT INTO drive_users (email, name) VALUES ($1, $2)")
            .bind(&user.email)
            .bind(&user.name)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                debug!("User recorded: {}", user.email);
                Ok(true)
            }
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => {
                tracing::error!("Failed to add user record {}: {:?}", user.email, e);
                Err(AppError::Database(e))
            }
        }
    }

    async fn list_all(&self) -> Result<Vec<DriveUser>> {
        sqlx::query_as::<_, DriveUser>(
            "SELECT email, name, created_at FROM drive_users ORDER BY email",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list users: {:?}", e);
            AppError::Database(e)
        })
    }
}
