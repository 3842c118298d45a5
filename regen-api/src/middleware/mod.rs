/// Middleware modules for the API server
///
/// Authentication middleware lives in `regen_shared::auth::middleware` and
/// is wired up in `app.rs`.

pub mod security;
