/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use regen_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer, routes};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use regen_shared::auth::middleware::{jwt_auth_middleware, optional_jwt_middleware, AuthError};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET /health
/// └── /v1/
///     ├── /auth/{register,login,refresh,logout}          public
///     ├── GET  /enterprises, /enterprises/:id             public
///     ├── POST /billing/webhook                           signed
///     ├── GET  /session, /guard                           optional auth
///     ├── POST /enterprises/:id/claim                     auth
///     ├── /workspaces/...                                 auth + team role
///     ├── GET  /subscription, POST /copilot/usage         auth
///     ├── /onboarding/:flow[/steps/:step]                 auth
///     └── /admin/...                                      auth + admin role
/// ```
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let public_routes = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/enterprises", get(routes::enterprises::list_enterprises))
        .route("/enterprises/:id", get(routes::enterprises::get_enterprise))
        .route("/billing/webhook", post(routes::billing::webhook));

    let optional_routes = Router::new()
        .route("/session", get(routes::session::get_session))
        .route("/guard", get(routes::session::check_guard))
        .layer(from_fn_with_state(state.clone(), optional_auth_layer));

    let protected_routes = Router::new()
        .route("/enterprises/:id/claim", post(routes::enterprises::claim_enterprise))
        .route("/workspaces", get(routes::workspaces::list_workspaces))
        .route("/workspaces/current", get(routes::workspaces::current_workspace))
        .route("/workspaces/:id/dashboard", get(routes::workspaces::dashboard))
        .route("/workspaces/:id/people", get(routes::workspaces::list_people))
        .route("/workspaces/:id/opportunities", get(routes::workspaces::list_opportunities))
        .route("/workspaces/:id/tasks", get(routes::workspaces::list_tasks))
        .route("/workspaces/:id/members", get(routes::workspaces::list_members))
        .route(
            "/workspaces/:id/members/:user_id",
            put(routes::workspaces::update_member_role),
        )
        .route("/subscription", get(routes::subscription::get_subscription))
        .route("/copilot/usage", post(routes::subscription::record_copilot_usage))
        .route(
            "/onboarding/:flow",
            get(routes::onboarding::get_progress).put(routes::onboarding::sync_progress),
        )
        .route(
            "/onboarding/:flow/steps/:step",
            post(routes::onboarding::complete_step),
        )
        .route("/admin/tables/:table", get(routes::admin::browse_table))
        .route("/admin/users/:id/role", put(routes::admin::set_user_role))
        .route("/admin/seed-jobs", post(routes::admin::create_seed_job))
        .route("/admin/seed-jobs/:id", get(routes::admin::get_seed_job))
        .route("/admin/seed-jobs/:id/cancel", post(routes::admin::cancel_seed_job))
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = Router::new()
        .merge(public_routes)
        .merge(optional_routes)
        .merge(protected_routes);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Requires a valid access token (bearer header or session cookie)
async fn jwt_auth_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    jwt_auth_middleware(state.config.jwt.secret.clone(), req, next).await
}

/// Authenticates when credentials are present
async fn optional_auth_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    optional_jwt_middleware(state.config.jwt.secret.clone(), req, next).await
}
