//! Batch jobs selected from the command line.
//!
//! Each job is a short pipeline over the Google APIs and the stores. Per-item work runs
//! through a bounded task group; a failed item is logged and dropped without affecting
//! its siblings.

mod collect_job;
mod distribute_job;
mod scan_job;

pub use collect_job::CollectJob;
pub use distribute_job::DistributeJob;
pub use scan_job::ScanJob;

/// Account on whose behalf surveys are sent and results collected
#[derive(Debug, Clone)]
pub struct Operator {
    pub email: String,
    /// Users that receive surveys. Empty means everyone.
    pub survey_recipients: Vec<String>,
}

impl Operator {
    pub fn new(email: String, survey_recipients: Vec<String>) -> Self {
        Self {
            email,
            survey_recipients,
        }
    }

    pub fn surveys_user(&self, email: &str) -> bool {
        self.survey_recipients.is_empty()
            || self
                .survey_recipients
                .iter()
                .any(|recipient| recipient.eq_ignore_ascii_case(email))
    }
}
