//! # Regen Shared Library
//!
//! This crate contains the shared types, access rules, and persistence layer
//! used by the Regen API server, the seed worker, and the client SDK.
//!
//! ## Module Organization
//!
//! - `access`: Role vocabulary, role predicates, plan gate, and route guard table
//! - `auth`: Authentication (JWT, passwords) and authorization checks
//! - `billing`: Billing webhook signature verification and event payloads
//! - `db`: Connection pool and migrations
//! - `models`: Database models and data structures
//! - `onboarding`: Onboarding flows and idempotent step tracking
//! - `quota`: Plan-based AI token quota
//! - `workspace`: Workspace (enterprise tenant) resolution

pub mod access;
pub mod auth;
pub mod billing;
pub mod db;
pub mod models;
pub mod onboarding;
pub mod quota;
pub mod workspace;

/// Current version of the Regen shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
