//! Severity surveys: one form per user with one checkbox item per unreviewed file.
//!
//! `form_files` links every survey item to the file it asks about. A file is linked to at
//! most one item across all forms.

pub mod models;
pub mod questions;
pub mod services;

pub use services::{FormService, FormStore};
