use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for a survey sent to one user
#[allow(dead_code)]
#[derive(Debug, Clone, FromRow)]
pub struct Form {
    pub id: String,
    pub user_to: String,
    pub user_from: String,
    pub response_url: String,
    pub created_at: DateTime<Utc>,
}

/// Data for recording a newly created survey
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateForm {
    pub id: String,
    pub user_to: String,
    pub user_from: String,
    pub response_url: String,
}

/// Link between a survey item and the file it asks about
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct FormFile {
    pub form_id: String,
    pub file_id: String,
    pub question_id: String,
}
