use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for a file owner
#[allow(dead_code)]
#[derive(Debug, Clone, FromRow)]
pub struct DriveUser {
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Data for recording a newly observed owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDriveUser {
    pub email: String,
    pub name: String,
}
