/// API route handlers, organized by resource
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login, token refresh, logout
/// - `session`: Current session user and route guard decisions
/// - `enterprises`: Public directory and the claim (activation) flow
/// - `workspaces`: Workspace resolution, CRM reads, team roles
/// - `subscription`: Plan status and copilot token metering
/// - `billing`: Billing provider webhook
/// - `onboarding`: Onboarding progress
/// - `admin`: Admin console

pub mod admin;
pub mod auth;
pub mod billing;
pub mod enterprises;
pub mod health;
pub mod onboarding;
pub mod session;
pub mod subscription;
pub mod workspaces;
