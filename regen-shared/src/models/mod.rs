/// Database models
///
/// # Models
///
/// - `user`: accounts, global role, soft-delete status
/// - `enterprise`: directory listings / CRM tenants
/// - `enterprise_member`: enterprise-scoped team roles
/// - `crm`: people, opportunities, tasks and the dashboard summary
/// - `subscription`: billing state, one live row per user
/// - `ai_usage`: copilot token metering
/// - `onboarding_progress`: server copy of onboarding progress
/// - `seed_job`: admin bulk-seeding jobs
/// - `admin_table`: whitelisted table browsing for the admin console
///
/// # Example
///
/// ```no_run
/// use regen_shared::models::user::{User, CreateUser};
/// use regen_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "grower@example.org".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: None,
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod admin_table;
pub mod ai_usage;
pub mod crm;
pub mod enterprise;
pub mod enterprise_member;
pub mod onboarding_progress;
pub mod seed_job;
pub mod subscription;
pub mod user;
