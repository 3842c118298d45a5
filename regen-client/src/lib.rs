//! # Regen Client SDK
//!
//! Async client for the Regen API with the session-side services the UI
//! builds on:
//!
//! - `http`: reqwest-based [`http::RegenClient`] implementing [`backend::Backend`]
//! - `cache`: query cache with request coalescing and scoped invalidation
//! - `guard`: route guard state machine (`Loading → Authorized | Unauthorized`)
//! - `workspace`: current CRM workspace, persisted and switchable
//! - `onboarding`: two-tier onboarding progress (server + local store)
//! - `poll`: polling until a terminal status (seed jobs)
//! - `store`: local key-value stores

pub mod backend;
pub mod cache;
pub mod error;
pub mod guard;
pub mod http;
pub mod onboarding;
pub mod poll;
pub mod store;
pub mod workspace;

#[cfg(test)]
mod fake;

pub use backend::Backend;
pub use cache::{QueryCache, QueryKey, Scope};
pub use error::{ClientError, Result};
pub use http::RegenClient;
