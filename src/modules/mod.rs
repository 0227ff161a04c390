//! Modules layer - clients for external services
//!
//! Contains the Google Workspace API clients and their OAuth flow.

pub mod google;
