use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::core::database::is_unique_violation;
use crate::core::error::{AppError, Result};
use crate::features::forms::models::{CreateForm, Form, FormFile};

/// Persistence of surveys and of the file each survey item refers to
#[async_trait]
pub trait FormStore: Send + Sync {
    async fn insert_form(&self, form: &CreateForm) -> Result<bool>;

    async fn list_sent_by(&self, user_from: &str) -> Result<Vec<Form>>;

    /// Whether the file is already linked to an item of any survey.
    ///
    /// This check is advisory: the unique constraint on `form_files.file_id` is what
    /// actually keeps a file from being surveyed twice.
    async fn is_file_linked(&self, file_id: &str) -> Result<bool>;

    /// Link a file to a survey item. Returns `false` when the file was already linked.
    async fn link_file(&self, link: &FormFile) -> Result<bool>;

    async fn list_form_files(&self, form_id: &str) -> Result<Vec<FormFile>>;
}

/// Postgres-backed form store
pub struct FormService {
    pool: PgPool,
}

impl FormService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FormStore for FormService {
    async fn insert_form(&self, form: &CreateForm) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO forms (id, user_to, user_from, response_url)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&form.id)
        .bind(&form.user_to)
        .bind(&form.user_from)
        .bind(&form.response_url)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!("Form {} recorded for {}", form.id, form.user_to);
                Ok(true)
            }
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => {
                tracing::error!("Failed to add form record {}: {:?}", form.id, e);
                Err(AppError::Database(e))
            }
        }
    }

    async fn list_sent_by(&self, user_from: &str) -> Result<Vec<Form>> {
        sqlx::query_as::<_, Form>(
            r#"
            SELECT id, user_to, user_from, response_url, created_at
            FROM forms
            WHERE user_from = $1
            ORDER BY created_at
            "#,
        )
        .bind(user_from)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list forms sent by {}: {:?}", user_from, e);
            AppError::Database(e)
        })
    }

    async fn is_file_linked(&self, file_id: &str) -> Result<bool> {
        let linked: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM form_files WHERE file_id = $1)",
        )
        .bind(file_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to check if file {} is linked: {:?}", file_id, e);
            AppError::Database(e)
        })?;

        Ok(linked)
    }

    async fn link_file(&self, link: &FormFile) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO form_files (form_id, file_id, question_id) VALUES ($1, $2, $3)",
        )
        .bind(&link.form_id)
        .bind(&link.file_id)
        .bind(&link.question_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => {
                debug!("File {} is already linked to a form", link.file_id);
                Ok(false)
            }
            Err(e) => {
                tracing::error!(
                    "Failed to add file {} to form {}: {:?}",
                    link.file_id,
                    link.form_id,
                    e
                );
                Err(AppError::Database(e))
            }
        }
    }

    async fn list_form_files(&self, form_id: &str) -> Result<Vec<FormFile>> {
        sqlx::query_as::<_, FormFile>(
            "SELECT form_id, file_id, question_id FROM form_files WHERE form_id = $1",
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list questions of form {}: {:?}", form_id, e);
            AppError::Database(e)
        })
    }
}
