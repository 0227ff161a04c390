//! Outgoing email: survey invitations and permission remediation requests.

mod notification_service;
pub mod templates;

pub use notification_service::{
    NotificationService, PERMISSION_CHANGE_SUBJECT, SURVEY_INVITATION_SUBJECT,
};
