//! Drive files recorded by the scan, with the severity assigned from survey answers.

pub mod models;
pub mod services;

pub use services::{FileService, FileStore};
