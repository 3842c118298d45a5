/// HTTP implementation of [`Backend`]
///
/// # Example
///
/// ```no_run
/// use regen_client::http::RegenClient;
/// use regen_client::Backend;
///
/// # async fn example() -> regen_client::error::Result<()> {
/// let client = RegenClient::builder()
///     .base_url("https://regen.example.org")
///     .access_token("eyJ...")
///     .build()?;
///
/// let listing = client.claim_enterprise(uuid::Uuid::new_v4()).await?;
/// println!("Go to {}", listing.redirect_to);
/// # Ok(())
/// # }
/// ```

use crate::backend::{Backend, ClaimResult};
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use regen_shared::access::plan::SubscriptionStatus;
use regen_shared::access::SessionUser;
use regen_shared::models::crm::DashboardSummary;
use regen_shared::models::onboarding_progress::{StepResult, SyncOutcome};
use regen_shared::models::seed_job::{CreateSeedJob, SeedJob};
use regen_shared::onboarding::{OnboardingFlow, OnboardingProgress};
use regen_shared::workspace::WorkspaceMembership;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for [`RegenClient`]
#[derive(Debug, Default)]
pub struct RegenClientBuilder {
    base_url: Option<String>,
    access_token: Option<String>,
    request_timeout: Option<Duration>,
}

impl RegenClientBuilder {
    /// Server root, e.g. `https://regen.example.org`
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Bearer token; omit for anonymous (visitor) use
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<RegenClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Config("base_url is required".to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ClientError::Config(format!("Invalid base_url: {}", base_url)));
        }

        let http = reqwest::Client::builder()
            .timeout(self.request_timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        tracing::debug!(base_url = %base_url, "Regen client initialized");

        Ok(RegenClient {
            base_url,
            access_token: self.access_token,
            http,
        })
    }
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

/// Regen API client
#[derive(Debug, Clone)]
pub struct RegenClient {
    base_url: String,
    access_token: Option<String>,
    http: reqwest::Client,
}

impl RegenClient {
    pub fn builder() -> RegenClientBuilder {
        RegenClientBuilder::default()
    }

    /// Same client with a different token (after sign-in or refresh)
    pub fn with_access_token(&self, token: impl Into<String>) -> Self {
        RegenClient {
            access_token: Some(token.into()),
            ..self.clone()
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.http.request(method, self.url(path));
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.request(Method::GET, path).send().await?;
        decode(response).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.request(method, path).json(body).send().await?;
        decode(response).await
    }

    /// `POST /v1/admin/seed-jobs`
    pub async fn create_seed_job(&self, request: &CreateSeedJob) -> Result<SeedJob> {
        self.send_json(Method::POST, "/admin/seed-jobs", request).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthenticated);
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(api_error(status, &body));
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn api_error(status: StatusCode, body: &str) -> ClientError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => ClientError::Api {
            status: status.as_u16(),
            error: parsed.error,
            message: parsed.message,
        },
        Err(_) => ClientError::Api {
            status: status.as_u16(),
            error: "unknown".to_string(),
            message: body.to_string(),
        },
    }
}

#[async_trait]
impl Backend for RegenClient {
    async fn session(&self) -> Result<Option<SessionUser>> {
        self.get("/session").await
    }

    async fn subscription(&self) -> Result<SubscriptionStatus> {
        self.get("/subscription").await
    }

    async fn workspaces(&self) -> Result<Vec<WorkspaceMembership>> {
        self.get("/workspaces").await
    }

    async fn claim_enterprise(&self, enterprise_id: Uuid) -> Result<ClaimResult> {
        self.send_json(
            Method::POST,
            &format!("/enterprises/{}/claim", enterprise_id),
            &serde_json::json!({}),
        )
        .await
    }

    async fn dashboard(&self, enterprise_id: Uuid) -> Result<DashboardSummary> {
        self.get(&format!("/workspaces/{}/dashboard", enterprise_id)).await
    }

    async fn onboarding(&self, flow: OnboardingFlow) -> Result<Option<OnboardingProgress>> {
        self.get(&format!("/onboarding/{}", flow)).await
    }

    async fn complete_onboarding_step(&self, flow: OnboardingFlow, step: &str) -> Result<StepResult> {
        self.send_json(
            Method::POST,
            &format!("/onboarding/{}/steps/{}", flow, step),
            &serde_json::json!({}),
        )
        .await
    }

    async fn sync_onboarding(&self, progress: &OnboardingProgress) -> Result<SyncOutcome> {
        self.send_json(Method::PUT, &format!("/onboarding/{}", progress.flow), progress)
            .await
    }

    async fn seed_job(&self, id: Uuid) -> Result<SeedJob> {
        self.get(&format!("/admin/seed-jobs/{}", id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_base_url() {
        assert!(matches!(RegenClient::builder().build(), Err(ClientError::Config(_))));
        assert!(matches!(
            RegenClient::builder().base_url("regen.example.org").build(),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn test_url_joins_under_v1() {
        let client = RegenClient::builder()
            .base_url("https://regen.example.org/")
            .build()
            .unwrap();
        assert_eq!(client.url("/session"), "https://regen.example.org/v1/session");
    }

    #[test]
    fn test_api_error_parses_body() {
        let err = api_error(
            StatusCode::FORBIDDEN,
            r#"{"error":"forbidden","message":"Requires team role admin"}"#,
        );
        assert_eq!(
            err,
            ClientError::Api {
                status: 403,
                error: "forbidden".to_string(),
                message: "Requires team role admin".to_string(),
            }
        );

        let err = api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.status(), Some(502));
    }
}
