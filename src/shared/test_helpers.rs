//! In-memory stores and fake Google APIs for job tests

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::core::error::{AppError, Result};
use crate::features::files::models::{CreateDriveFile, DriveFile, Severity};
use crate::features::files::FileStore;
use crate::features::forms::models::{CreateForm, Form, FormFile};
use crate::features::forms::FormStore;
use crate::features::users::models::{CreateDriveUser, DriveUser};
use crate::features::users::UserStore;
use crate::modules::google::{
    CreatedSurvey, MailApi, RemoteFile, RemoteOwner, RemotePermission, StorageApi, SurveyAnswers,
    SurveyApi, SurveyQuestion,
};

/// Drive listing entry owned by `owner_email` with one permission per kind
pub fn remote_file(id: &str, owner_email: &str, permission_kinds: &[&str]) -> RemoteFile {
    RemoteFile {
        id: id.to_string(),
        name: format!("{}.txt", id),
        full_file_extension: Some("txt".to_string()),
        owners: vec![RemoteOwner {
            email_address: owner_email.to_string(),
            display_name: owner_email.split('@').next().unwrap_or_default().to_string(),
        }],
        permissions: permission_kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| RemotePermission {
                id: format!("perm-{}", i),
                kind: kind.to_string(),
            })
            .collect(),
        web_view_link: format!("https://drive.example/file/d/{}/view", id),
    }
}

/// Stored file without a severity
pub fn new_file(id: &str, owner: &str, is_public: bool) -> DriveFile {
    let now = Utc::now();
    DriveFile {
        id: id.to_string(),
        name: format!("{}.txt", id),
        extension: Some("txt".to_string()),
        owner: owner.to_string(),
        is_public,
        url: format!("https://drive.example/file/d/{}/view", id),
        severity: None,
        created_at: now,
        updated_at: now,
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<BTreeMap<String, DriveUser>>,
}

impl InMemoryUserStore {
    pub fn add(&self, email: &str) {
        self.users.lock().unwrap().insert(
            email.to_string(),
            DriveUser {
                email: email.to_string(),
                name: String::new(),
                created_at: Utc::now(),
            },
        );
    }

    /// Recorded emails, sorted
    pub fn emails(&self) -> Vec<String> {
        self.users.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: &CreateDriveUser) -> Result<bool> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user.email) {
            return Ok(false);
        }
        users.insert(
            user.email.clone(),
            DriveUser {
                email: user.email.clone(),
                name: user.name.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn list_all(&self) -> Result<Vec<DriveUser>> {
        Ok(self.users.lock().unwrap().values().cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryFileStore {
    files: Mutex<BTreeMap<String, DriveFile>>,
}

impl InMemoryFileStore {
    pub fn add(&self, file: DriveFile) {
        self.files.lock().unwrap().insert(file.id.clone(), file);
    }

    pub fn get(&self, id: &str) -> Option<DriveFile> {
        self.files.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn insert(&self, file: &CreateDriveFile) -> Result<bool> {
        let mut files = self.files.lock().unwrap();
        if files.contains_key(&file.id) {
            return Ok(false);
        }
        let now = Utc::now();
        files.insert(
            file.id.clone(),
            DriveFile {
                id: file.id.clone(),
                name: file.name.clone(),
                extension: file.extension.clone(),
                owner: file.owner.clone(),
                is_public: file.is_public,
                url: file.url.clone(),
                severity: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(true)
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<DriveFile>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .values()
            .filter(|f| f.owner == owner)
            .cloned()
            .collect())
    }

    async fn set_severity(&self, file_id: &str, severity: Severity) -> Result<()> {
        match self.files.lock().unwrap().get_mut(file_id) {
            Some(file) => {
                file.severity = Some(severity);
                Ok(())
            }
            None => Err(AppError::NotFound(format!("File {} not found", file_id))),
        }
    }

    async fn list_public_by_severity(&self, severity: Severity) -> Result<Vec<DriveFile>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .values()
            .filter(|f| f.is_public && f.severity == Some(severity))
            .cloned()
            .collect())
    }

    async fn mark_private(&self, file_id: &str) -> Result<()> {
        if let Some(file) = self.files.lock().unwrap().get_mut(file_id) {
            file.is_public = false;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryFormStore {
    forms: Mutex<Vec<Form>>,
    links: Mutex<Vec<FormFile>>,
}

impl InMemoryFormStore {
    pub fn add_form(&self, id: &str, user_to: &str, user_from: &str) {
        self.forms.lock().unwrap().push(Form {
            id: id.to_string(),
            user_to: user_to.to_string(),
            user_from: user_from.to_string(),
            response_url: format!("https://forms.example/{}/viewform", id),
            created_at: Utc::now(),
        });
    }

    pub fn link(&self, form_id: &str, file_id: &str, question_id: &str) {
        self.links.lock().unwrap().push(FormFile {
            form_id: form_id.to_string(),
            file_id: file_id.to_string(),
            question_id: question_id.to_string(),
        });
    }

    pub fn forms(&self) -> Vec<Form> {
        self.forms.lock().unwrap().clone()
    }

    pub fn links(&self) -> Vec<FormFile> {
        self.links.lock().unwrap().clone()
    }
}

#[async_trait]
impl FormStore for InMemoryFormStore {
    async fn insert_form(&self, form: &CreateForm) -> Result<bool> {
        let mut forms = self.forms.lock().unwrap();
        if forms.iter().any(|f| f.id == form.id) {
            return Ok(false);
        }
        forms.push(Form {
            id: form.id.clone(),
            user_to: form.user_to.clone(),
            user_from: form.user_from.clone(),
            response_url: form.response_url.clone(),
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn list_sent_by(&self, user_from: &str) -> Result<Vec<Form>> {
        Ok(self
            .forms
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.user_from == user_from)
            .cloned()
            .collect())
    }

    async fn is_file_linked(&self, file_id: &str) -> Result<bool> {
        Ok(self.links.lock().unwrap().iter().any(|l| l.file_id == file_id))
    }

    /// Same uniqueness on `file_id` as the `form_files` table
    async fn link_file(&self, link: &FormFile) -> Result<bool> {
        let mut links = self.links.lock().unwrap();
        if links.iter().any(|l| l.file_id == link.file_id) {
            return Ok(false);
        }
        links.push(link.clone());
        Ok(true)
    }

    async fn list_form_files(&self, form_id: &str) -> Result<Vec<FormFile>> {
        Ok(self
            .links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.form_id == form_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Google APIs
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStorage {
    files: Vec<RemoteFile>,
    fail_listing: bool,
    permissions: Mutex<HashMap<String, Vec<RemotePermission>>>,
    deleted: Mutex<Vec<(String, String)>>,
}

impl FakeStorage {
    pub fn with_files(files: Vec<RemoteFile>) -> Self {
        Self {
            files,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_listing: true,
            ..Default::default()
        }
    }

    /// Replace the permissions of a file with `(id, type)` pairs
    pub fn set_permissions(&self, file_id: &str, permissions: &[(&str, &str)]) {
        let permissions = permissions
            .iter()
            .map(|(id, kind)| RemotePermission {
                id: id.to_string(),
                kind: kind.to_string(),
            })
            .collect();
        self.permissions
            .lock()
            .unwrap()
            .insert(file_id.to_string(), permissions);
    }

    /// `(file_id, permission_id)` pairs deleted so far
    pub fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageApi for FakeStorage {
    async fn list_files(&self) -> Result<Vec<RemoteFile>> {
        if self.fail_listing {
            return Err(AppError::ExternalServiceError(
                "Drive API error: HTTP 500".to_string(),
            ));
        }
        Ok(self.files.clone())
    }

    async fn file_permissions(&self, file_id: &str) -> Result<Vec<RemotePermission>> {
        Ok(self
            .permissions
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_permission(&self, file_id: &str, permission_id: &str) -> Result<()> {
        let mut permissions = self.permissions.lock().unwrap();
        if let Some(list) = permissions.get_mut(file_id) {
            list.retain(|p| p.id != permission_id);
        }
        self.deleted
            .lock()
            .unwrap()
            .push((file_id.to_string(), permission_id.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct SurveyState {
    created: usize,
    fail_after: Option<usize>,
    items: HashMap<String, Vec<SurveyQuestion>>,
    responses: HashMap<String, SurveyAnswers>,
}

#[derive(Default)]
pub struct FakeSurveys {
    state: Mutex<SurveyState>,
}

impl FakeSurveys {
    pub fn created_count(&self) -> usize {
        self.state.lock().unwrap().created
    }

    pub fn items_of(&self, survey_id: &str) -> Vec<SurveyQuestion> {
        self.state
            .lock()
            .unwrap()
            .items
            .get(survey_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Let `n` surveys be created, then fail every further creation
    pub fn fail_creation_after(&self, n: usize) {
        self.state.lock().unwrap().fail_after = Some(n);
    }

    pub fn set_response(&self, survey_id: &str, answers: SurveyAnswers) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(survey_id.to_string(), answers);
    }
}

#[async_trait]
impl SurveyApi for FakeSurveys {
    async fn create_survey(&self, _title: &str) -> Result<CreatedSurvey> {
        let mut state = self.state.lock().unwrap();
        if state.fail_after.is_some_and(|n| state.created >= n) {
            return Err(AppError::ExternalServiceError(
                "Forms API error: HTTP 429".to_string(),
            ));
        }
        state.created += 1;
        let id = format!("survey-{}", state.created);
        state.items.insert(id.clone(), Vec::new());

        Ok(CreatedSurvey {
            responder_url: format!("https://forms.example/{}/viewform", id),
            id,
        })
    }

    async fn add_items(&self, survey_id: &str, items: &[SurveyQuestion]) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        let existing = state.items.entry(survey_id.to_string()).or_default();
        let offset = existing.len();
        existing.extend(items.iter().cloned());

        Ok((0..items.len())
            .map(|i| format!("{}-q{}", survey_id, offset + i))
            .collect())
    }

    async fn first_response(&self, survey_id: &str) -> Result<Option<SurveyAnswers>> {
        Ok(self.state.lock().unwrap().responses.get(survey_id).cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct FakeMail {
    sent: Mutex<Vec<SentMail>>,
}

impl FakeMail {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailApi for FakeMail {
    async fn profile_email(&self) -> Result<String> {
        Ok("ops@example.com".to_string())
    }

    async fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> Result<()> {
        self.sent.lock().unwrap().push(SentMail {
            from: from.to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
