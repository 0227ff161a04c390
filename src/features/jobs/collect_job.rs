use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::Operator;
use crate::core::error::Result;
use crate::features::files::models::{DriveFile, Severity, FLAGGED_SEVERITIES};
use crate::features::files::FileStore;
use crate::features::forms::models::{Form, FormFile};
use crate::features::forms::FormStore;
use crate::features::notifications::NotificationService;
use crate::modules::google::{StorageApi, SurveyAnswers, SurveyApi};
use crate::shared::concurrency::{run_bounded, ItemOutcome, JobSummary};

/// Outcome of a collect run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectReport {
    /// One entry per answered survey item
    pub severities: JobSummary,
    /// One entry per owner with flagged public files
    pub notifications: JobSummary,
    /// One entry per flagged file, only when revoking
    pub revocations: JobSummary,
}

/// Applies survey answers as file severities and asks owners to fix risky public files
pub struct CollectJob {
    forms: Arc<dyn FormStore>,
    files: Arc<dyn FileStore>,
    surveys: Arc<dyn SurveyApi>,
    storage: Arc<dyn StorageApi>,
    notifier: Arc<NotificationService>,
    operator: Operator,
    revoke_public: bool,
    max_concurrency: usize,
}

impl CollectJob {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        forms: Arc<dyn FormStore>,
        files: Arc<dyn FileStore>,
        surveys: Arc<dyn SurveyApi>,
        storage: Arc<dyn StorageApi>,
        notifier: Arc<NotificationService>,
        operator: Operator,
        revoke_public: bool,
        max_concurrency: usize,
    ) -> Self {
        Self {
            forms,
            files,
            surveys,
            storage,
            notifier,
            operator,
            revoke_public,
            max_concurrency,
        }
    }

    pub async fn run(&self) -> CollectReport {
        let mut report = CollectReport::default();

        match self.forms.list_sent_by(&self.operator.email).await {
            Ok(forms) => {
                info!("Collecting responses for {} forms", forms.len());
                for summary in run_bounded(forms, self.max_concurrency, |form| {
                    self.apply_form_results(form)
                })
                .await
                {
                    report.severities.merge(summary);
                }
            }
            Err(e) => error!("Failed to load forms sent by {}: {}", self.operator.email, e),
        }
        info!("Severities applied: {}", report.severities);

        let flagged = self.flagged_files_by_owner().await;
        info!("{} owners have flagged public files", flagged.len());

        report.notifications = run_bounded(&flagged, self.max_concurrency, |(owner, files)| {
            self.notify_owner(owner, files)
        })
        .await
        .into_iter()
        .collect();
        info!("Remediation emails: {}", report.notifications);

        if self.revoke_public {
            report.revocations = run_bounded(
                flagged.values().flatten(),
                self.max_concurrency,
                |file| self.revoke_public_access(file),
            )
            .await
            .into_iter()
            .collect();
            info!("Public access revoked: {}", report.revocations);
        }

        report
    }

    /// Classify every answered item of the form's first response and store the result
    async fn apply_form_results(&self, form: Form) -> JobSummary {
        let answers = match self.surveys.first_response(&form.id).await {
            Ok(Some(answers)) => answers,
            Ok(None) => {
                debug!("Form {} has no responses yet", form.id);
                return JobSummary::default();
            }
            Err(e) => {
                error!("Failed to fetch responses of form {}: {}", form.id, e);
                return JobSummary {
                    failed: 1,
                    ..Default::default()
                };
            }
        };

        let links = match self.forms.list_form_files(&form.id).await {
            Ok(links) => links,
            Err(e) => {
                error!("Failed to load questions of form {}: {}", form.id, e);
                return JobSummary {
                    failed: 1,
                    ..Default::default()
                };
            }
        };

        let updates = classify_answers(links, &answers);

        run_bounded(updates, self.max_concurrency, |(file_id, severity)| async move {
            match self.files.set_severity(&file_id, severity).await {
                Ok(()) => ItemOutcome::Done,
                Err(e) => {
                    error!("Failed to set severity of file {}: {}", file_id, e);
                    ItemOutcome::Failed
                }
            }
        })
        .await
        .into_iter()
        .collect()
    }

    /// Public files at a flagged severity, grouped by owner
    async fn flagged_files_by_owner(&self) -> BTreeMap<String, Vec<DriveFile>> {
        let mut flagged = Vec::new();

        for severity in FLAGGED_SEVERITIES {
            match self.files.list_public_by_severity(severity).await {
                Ok(files) => flagged.extend(files),
                Err(e) => error!("Failed to load public {} files: {}", severity, e),
            }
        }

        group_by_owner(flagged)
    }

    async fn notify_owner(&self, owner: &str, files: &[DriveFile]) -> ItemOutcome {
        match self.notifier.send_permission_change(owner, files).await {
            Ok(()) => ItemOutcome::Done,
            Err(e) => {
                error!("Failed to send permission change email to {}: {}", owner, e);
                ItemOutcome::Failed
            }
        }
    }

    async fn revoke_public_access(&self, file: &DriveFile) -> ItemOutcome {
        match self.remove_anyone_permissions(&file.id).await {
            Ok(removed) => {
                if let Err(e) = self.files.mark_private(&file.id).await {
                    error!("Failed to mark file {} private: {}", file.id, e);
                    return ItemOutcome::Failed;
                }
                if removed == 0 {
                    ItemOutcome::Skipped
                } else {
                    ItemOutcome::Done
                }
            }
            Err(e) => {
                error!("Failed to revoke public access to {}: {}", file.id, e);
                ItemOutcome::Failed
            }
        }
    }

    async fn remove_anyone_permissions(&self, file_id: &str) -> Result<usize> {
        let permissions = self.storage.file_permissions(file_id).await?;
        let mut removed = 0;

        for permission in permissions.iter().filter(|p| p.is_anyone()) {
            self.storage.delete_permission(file_id, &permission.id).await?;
            removed += 1;
        }

        Ok(removed)
    }
}

/// Severity per linked file for every item present in the answers
fn classify_answers(links: Vec<FormFile>, answers: &SurveyAnswers) -> Vec<(String, Severity)> {
    links
        .into_iter()
        .filter_map(|link| {
            answers.get(&link.question_id).map(|values| {
                let severity = Severity::classify(values.iter().map(String::as_str));
                (link.file_id, severity)
            })
        })
        .collect()
}

fn group_by_owner(files: Vec<DriveFile>) -> BTreeMap<String, Vec<DriveFile>> {
    let mut by_owner: BTreeMap<String, Vec<DriveFile>> = BTreeMap::new();
    for file in files {
        by_owner.entry(file.owner.clone()).or_default().push(file);
    }
    by_owner
}
