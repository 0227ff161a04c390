//! Google Workspace integrations
//!
//! Thin REST clients for Drive (file listing and permissions), Forms (survey creation and
//! responses) and Gmail (sending mail), plus the installed-app OAuth flow that provides
//! their bearer token. Each client sits behind a trait so jobs can be exercised without
//! network access.

mod drive_client;
mod forms_client;
mod gmail_client;
pub mod oauth;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::core::error::{AppError, Result};

pub use drive_client::{DriveClient, RemoteFile, RemoteOwner, RemotePermission};
pub use forms_client::{CreatedSurvey, FormsClient, SurveyQuestion};
pub use gmail_client::GmailClient;

/// Options ticked per question id in a survey response
pub type SurveyAnswers = HashMap<String, Vec<String>>;

/// File storage provider
#[async_trait]
pub trait StorageApi: Send + Sync {
    /// List every file visible to the operator, draining all pages
    async fn list_files(&self) -> Result<Vec<RemoteFile>>;

    async fn file_permissions(&self, file_id: &str) -> Result<Vec<RemotePermission>>;

    async fn delete_permission(&self, file_id: &str, permission_id: &str) -> Result<()>;
}

/// Survey/form service
#[async_trait]
pub trait SurveyApi: Send + Sync {
    async fn create_survey(&self, title: &str) -> Result<CreatedSurvey>;

    /// Append questions in order and return the new question ids in the same order
    async fn add_items(&self, survey_id: &str, items: &[SurveyQuestion]) -> Result<Vec<String>>;

    /// Answers of the first response, or `None` when nobody answered yet
    async fn first_response(&self, survey_id: &str) -> Result<Option<SurveyAnswers>>;
}

/// Outgoing mail
#[async_trait]
pub trait MailApi: Send + Sync {
    /// Email address of the authorized account
    async fn profile_email(&self) -> Result<String>;

    async fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Turn a non-2xx response into an external service error carrying the body
async fn ensure_success(response: reqwest::Response, service: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::error!("{} API error: HTTP {} - {}", service, status, body);
    Err(AppError::ExternalServiceError(format!(
        "{} API error: HTTP {} - {}",
        service, status, body
    )))
}

fn request_error(service: &str, e: reqwest::Error) -> AppError {
    tracing::error!("{} request failed: {:?}", service, e);
    AppError::ExternalServiceError(format!("{} request failed: {}", service, e))
}

fn parse_error(service: &str, e: reqwest::Error) -> AppError {
    tracing::error!("Failed to parse {} response: {}", service, e);
    AppError::ExternalServiceError(format!("Failed to parse {} response: {}", service, e))
}
