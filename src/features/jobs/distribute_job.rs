use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::Operator;
use crate::core::error::Result;
use crate::features::files::models::DriveFile;
use crate::features::files::FileStore;
use crate::features::forms::models::{CreateForm, FormFile};
use crate::features::forms::questions::{question_for_file, SURVEY_TITLE};
use crate::features::forms::FormStore;
use crate::features::notifications::NotificationService;
use crate::features::users::models::DriveUser;
use crate::features::users::UserStore;
use crate::modules::google::{SurveyApi, SurveyQuestion};
use crate::shared::concurrency::{run_bounded, ItemOutcome, JobSummary};

/// Sends every user one severity survey covering their files not surveyed yet
pub struct DistributeJob {
    users: Arc<dyn UserStore>,
    files: Arc<dyn FileStore>,
    forms: Arc<dyn FormStore>,
    surveys: Arc<dyn SurveyApi>,
    notifier: Arc<NotificationService>,
    operator: Operator,
    max_concurrency: usize,
}

impl DistributeJob {
    pub fn new(
        users: Arc<dyn UserStore>,
        files: Arc<dyn FileStore>,
        forms: Arc<dyn FormStore>,
        surveys: Arc<dyn SurveyApi>,
        notifier: Arc<NotificationService>,
        operator: Operator,
        max_concurrency: usize,
    ) -> Self {
        Self {
            users,
            files,
            forms,
            surveys,
            notifier,
            operator,
            max_concurrency,
        }
    }

    /// Run the distribution; one summary entry per targeted user
    pub async fn run(&self) -> JobSummary {
        let users = match self.users.list_all().await {
            Ok(users) => users,
            Err(e) => {
                error!("Failed to load users: {}", e);
                return JobSummary::default();
            }
        };

        let targets: Vec<DriveUser> = users
            .into_iter()
            .filter(|user| self.operator.surveys_user(&user.email))
            .collect();

        info!("Distributing surveys to {} users", targets.len());

        let results = run_bounded(targets, self.max_concurrency, |user| async move {
            match self.create_form_for_user(&user.email).await {
                Ok(Some(form)) => (ItemOutcome::Done, Some(form)),
                Ok(None) => (ItemOutcome::Skipped, None),
                Err(e) => {
                    error!("Failed to create form for {}: {}", user.email, e);
                    (ItemOutcome::Failed, None)
                }
            }
        })
        .await;

        let mut summary = JobSummary::default();
        let mut created = Vec::new();
        for (outcome, form) in results {
            summary.record(outcome);
            created.extend(form);
        }

        let invitations: JobSummary = run_bounded(created, self.max_concurrency, |form| {
            self.send_invitation(form)
        })
        .await
        .into_iter()
        .collect();

        info!(
            "Distribution finished: {}; invitations: {}",
            summary, invitations
        );
        summary
    }

    /// Create and record one survey for the user's unlinked files.
    ///
    /// Returns `Ok(None)` when every file of the user is already surveyed.
    pub async fn create_form_for_user(&self, email: &str) -> Result<Option<CreateForm>> {
        let candidates = self.unlinked_files(email).await?;
        if candidates.is_empty() {
            warn!("No files to survey for user {}", email);
            return Ok(None);
        }

        let questions: Vec<SurveyQuestion> = candidates.iter().map(question_for_file).collect();

        let survey = self.surveys.create_survey(SURVEY_TITLE).await?;
        let question_ids = self.surveys.add_items(&survey.id, &questions).await?;

        if question_ids.len() != candidates.len() {
            warn!(
                "Form {} returned {} question ids for {} files",
                survey.id,
                question_ids.len(),
                candidates.len()
            );
        }

        let form = CreateForm {
            id: survey.id,
            user_to: email.to_string(),
            user_from: self.operator.email.clone(),
            response_url: survey.responder_url,
        };
        self.forms.insert_form(&form).await?;

        let links: Vec<FormFile> = candidates
            .into_iter()
            .zip(question_ids)
            .map(|(file, question_id)| FormFile {
                form_id: form.id.clone(),
                file_id: file.id,
                question_id,
            })
            .collect();

        let linked: JobSummary = run_bounded(links, self.max_concurrency, |link| {
            self.link_file(link)
        })
        .await
        .into_iter()
        .collect();

        info!("Form {} created for {}: links {}", form.id, email, linked);
        Ok(Some(form))
    }

    /// Files owned by the user that no survey item refers to yet
    async fn unlinked_files(&self, email: &str) -> Result<Vec<DriveFile>> {
        let owned = self.files.list_by_owner(email).await?;

        let mut candidates: Vec<DriveFile> =
            run_bounded(owned, self.max_concurrency, |file| async move {
                match self.forms.is_file_linked(&file.id).await {
                    Ok(false) => Some(file),
                    Ok(true) => {
                        debug!("File {} already surveyed", file.id);
                        None
                    }
                    Err(e) => {
                        warn!("Skipping file {}: could not check survey links: {}", file.id, e);
                        None
                    }
                }
            })
            .await
            .into_iter()
            .flatten()
            .collect();

        // Stable item order regardless of completion order
        candidates.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(candidates)
    }

    async fn link_file(&self, link: FormFile) -> ItemOutcome {
        match self.forms.link_file(&link).await {
            Ok(true) => ItemOutcome::Done,
            Ok(false) => ItemOutcome::Skipped,
            Err(e) => {
                error!("Failed to add file {} to form {}: {}", link.file_id, link.form_id, e);
                ItemOutcome::Failed
            }
        }
    }

    async fn send_invitation(&self, form: CreateForm) -> ItemOutcome {
        match self
            .notifier
            .send_survey_invitation(&form.user_to, &form.response_url)
            .await
        {
            Ok(()) => ItemOutcome::Done,
            Err(e) => {
                error!("Failed to send form {} to {}: {}", form.id, form.user_to, e);
                ItemOutcome::Failed
            }
        }
    }
}
