use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::core::database::is_unique_violation;
use crate::core::error::{AppError, Result};
use crate::features::files::models::{CreateDriveFile, DriveFile, Severity};

/// Persistence of scanned files and their severity
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Record a discovered file. Returns `false` when it was already known.
    async fn insert(&self, file: &CreateDriveFile) -> Result<bool>;

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<DriveFile>>;

    async fn set_severity(&self, file_id: &str, severity: Severity) -> Result<()>;

    async fn list_public_by_severity(&self, severity: Severity) -> Result<Vec<DriveFile>>;

    async fn mark_private(&self, file_id: &str) -> Result<()>;
}

const FILE_COLUMNS: &str =
    "id, name, extension, owner, is_public, url, severity, created_at, updated_at";

/// Postgres-backed file store
pub struct FileService {
    pool: PgPool,
}

impl FileService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileStore for FileService {
    async fn insert(&self, file: &CreateDriveFile) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO drive_files (id, name, extension, owner, is_public, url)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&file.id)
        .bind(&file.name)
        .bind(&file.extension)
        .bind(&file.owner)
        .bind(file.is_public)
        .bind(&file.url)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!("File recorded: id={}, owner={}", file.id, file.owner);
                Ok(true)
            }
            Err(e) if is_unique_violation(&e) => {
                debug!("File {} already recorded", file.id);
                Ok(false)
            }
            Err(e) => {
                tracing::error!("Failed to add file record {}: {:?}", file.id, e);
                Err(AppError::Database(e))
            }
        }
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<DriveFile>> {
        let query = format!(
            "SELECT {} FROM drive_files WHERE owner = $1 ORDER BY name",
            FILE_COLUMNS
        );

        sqlx::query_as::<_, DriveFile>(&query)
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list files for {}: {:?}", owner, e);
                AppError::Database(e)
            })
    }

    async fn set_severity(&self, file_id: &str, severity: Severity) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE drive_files
            SET severity = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(file_id)
        .bind(severity)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to set file severity for {}: {:?}", file_id, e);
            AppError::Database(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("File {} not found", file_id)));
        }

        info!("File {} classified as {}", file_id, severity);
        Ok(())
    }

    async fn list_public_by_severity(&self, severity: Severity) -> Result<Vec<DriveFile>> {
        let query = format!(
            "SELECT {} FROM drive_files WHERE severity = $1 AND is_public = TRUE ORDER BY owner, name",
            FILE_COLUMNS
        );

        sqlx::query_as::<_, DriveFile>(&query)
            .bind(severity)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to get public files by severity {}: {:?}", severity, e);
                AppError::Database(e)
            })
    }

    async fn mark_private(&self, file_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE drive_files
            SET is_public = FALSE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(file_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to mark file {} private: {:?}", file_id, e);
            AppError::Database(e)
        })?;

        Ok(())
    }
}
