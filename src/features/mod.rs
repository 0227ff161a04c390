pub mod files;
pub mod forms;
pub mod jobs;
pub mod notifications;
pub mod users;
