mod file;
mod severity;

pub use file::{CreateDriveFile, DriveFile};
pub use severity::{Severity, FLAGGED_SEVERITIES, SEVERITY_OPTIONS};
