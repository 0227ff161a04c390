use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::Severity;

/// Database model for a scanned Drive file
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub extension: Option<String>,
    pub owner: String,
    pub is_public: bool,
    pub url: String,
    pub severity: Option<Severity>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for recording a newly discovered file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDriveFile {
    pub id: String,
    pub name: String,
    pub extension: Option<String>,
    pub owner: String,
    pub is_public: bool,
    pub url: String,
}
