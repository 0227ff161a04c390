//! File owners discovered while scanning Drive.
//!
//! Users are created lazily the first time they show up as the owner of a file
//! and are the recipients of severity surveys.

pub mod models;
pub mod services;

pub use services::{UserService, UserStore};
