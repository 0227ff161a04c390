use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::features::files::models::CreateDriveFile;
use crate::features::files::FileStore;
use crate::features::users::models::CreateDriveUser;
use crate::features::users::UserStore;
use crate::modules::google::{RemoteFile, StorageApi};
use crate::shared::concurrency::{run_bounded, ItemOutcome, JobSummary};

/// Records every Drive file visible to the operator, along with its owner
pub struct ScanJob {
    storage: Arc<dyn StorageApi>,
    users: Arc<dyn UserStore>,
    files: Arc<dyn FileStore>,
    max_concurrency: usize,
}

impl ScanJob {
    pub fn new(
        storage: Arc<dyn StorageApi>,
        users: Arc<dyn UserStore>,
        files: Arc<dyn FileStore>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            storage,
            users,
            files,
            max_concurrency,
        }
    }

    /// Run the scan and return the outcome of the file inserts
    pub async fn run(&self) -> JobSummary {
        let remote_files = match self.storage.list_files().await {
            Ok(files) => files,
            Err(e) => {
                error!("Failed to list Drive files: {}", e);
                return JobSummary::default();
            }
        };

        // Owners first: files reference them
        let owners = collect_owners(&remote_files);
        let users: JobSummary = run_bounded(owners, self.max_concurrency, |user| {
            self.record_user(user)
        })
        .await
        .into_iter()
        .collect();
        info!("Owners recorded: {}", users);

        let new_files: Vec<CreateDriveFile> =
            remote_files.iter().filter_map(to_create_file).collect();

        let summary: JobSummary = run_bounded(new_files, self.max_concurrency, |file| {
            self.record_file(file)
        })
        .await
        .into_iter()
        .collect();

        info!(
            "Scan finished over {} Drive files: {}",
            remote_files.len(),
            summary
        );
        summary
    }

    async fn record_user(&self, user: CreateDriveUser) -> ItemOutcome {
        match self.users.insert(&user).await {
            Ok(true) => ItemOutcome::Done,
            Ok(false) => ItemOutcome::Skipped,
            Err(e) => {
                error!("Failed to add user {}: {}", user.email, e);
                ItemOutcome::Failed
            }
        }
    }

    async fn record_file(&self, file: CreateDriveFile) -> ItemOutcome {
        match self.files.insert(&file).await {
            Ok(true) => ItemOutcome::Done,
            Ok(false) => ItemOutcome::Skipped,
            Err(e) => {
                error!("Failed to add file {}: {}", file.id, e);
                ItemOutcome::Failed
            }
        }
    }
}

/// Distinct owners across all files, first display name wins
fn collect_owners(files: &[RemoteFile]) -> Vec<CreateDriveUser> {
    let mut seen = HashSet::new();

    files
        .iter()
        .flat_map(|file| file.owners.iter())
        .filter(|owner| seen.insert(owner.email_address.clone()))
        .map(|owner| CreateDriveUser {
            email: owner.email_address.clone(),
            name: owner.display_name.clone(),
        })
        .collect()
}

fn to_create_file(file: &RemoteFile) -> Option<CreateDriveFile> {
    let Some(owner) = file.primary_owner() else {
        warn!("Skipping file {} ({}): no owner listed", file.id, file.name);
        return None;
    };

    Some(CreateDriveFile {
        id: file.id.clone(),
        name: file.name.clone(),
        extension: file.full_file_extension.clone(),
        owner: owner.email_address.clone(),
        is_public: file.is_public(),
        url: file.web_view_link.clone(),
    })
}
