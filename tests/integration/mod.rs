//! Integration tests for the directory service.

pub mod authentication;
pub mod organization;
pub mod reconciliation;
pub mod user_info;
