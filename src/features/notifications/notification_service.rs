use minijinja::context;
use std::sync::Arc;

use super::templates::{render_template, PERMISSION_CHANGE, SURVEY_INVITATION};
use crate::core::error::{AppError, Result};
use crate::features::files::models::DriveFile;
use crate::modules::google::MailApi;

pub const SURVEY_INVITATION_SUBJECT: &str =
    "Encuesta para Determinar la Importancia de Archivos: Por favor, Participa";
pub const PERMISSION_CHANGE_SUBJECT: &str = "Actualizar configuración de privacidad de archivos";

/// Sends the survey invitation and remediation emails
pub struct NotificationService {
    mail: Arc<dyn MailApi>,
    from: String,
}

impl NotificationService {
    pub fn new(mail: Arc<dyn MailApi>, from: String) -> Self {
        Self { mail, from }
    }

    pub async fn send_survey_invitation(&self, to: &str, form_link: &str) -> Result<()> {
        let body = render_template(SURVEY_INVITATION, context! { form_link => form_link })
            .map_err(|e| AppError::Internal(e.to_string()))?;

        self.mail
            .send(&self.from, to, SURVEY_INVITATION_SUBJECT, &body)
            .await
    }

    /// Ask an owner to make the listed public files private
    pub async fn send_permission_change(&self, to: &str, files: &[DriveFile]) -> Result<()> {
        let body = render_template(PERMISSION_CHANGE, context! { files => files })
            .map_err(|e| AppError::Internal(e.to_string()))?;

        self.mail
            .send(&self.from, to, PERMISSION_CHANGE_SUBJECT, &body)
            .await
    }
}
