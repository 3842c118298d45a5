/// End-to-end API tests against a live database
///
/// These need `DATABASE_URL` pointing at a disposable Postgres database:
///
/// ```bash
/// DATABASE_URL=postgres://localhost/regen_test cargo test -p regen-api -- --ignored
/// ```

mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::*;
use regen_shared::access::roles::UserRole;
use regen_shared::billing::{sign_payload, SIGNATURE_HEADER};
use regen_shared::models::enterprise::{CreateEnterprise, Enterprise, EnterpriseCategory};
use regen_shared::models::user::User;
use serde_json::json;

async fn listed_enterprise(ctx: &TestContext) -> Enterprise {
    Enterprise::create(
        &ctx.db,
        CreateEnterprise {
            name: format!("Living Soil Co-op {}", uuid::Uuid::new_v4()),
            description: Some("Compost and soil regeneration".to_string()),
            category: EnterpriseCategory::Agriculture,
            location: Some("Ghent".to_string()),
            website: None,
            verified: false,
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_register_then_login() {
    let ctx = TestContext::new().await.unwrap();
    let email = format!("new-{}@example.org", uuid::Uuid::new_v4());

    let body = ctx
        .expect_status(
            json_request(
                "POST",
                "/v1/auth/register",
                None,
                json!({ "email": email, "password": TEST_PASSWORD }),
            ),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(body["user"]["role"], "visitor");

    ctx.expect_status(
        json_request(
            "POST",
            "/v1/auth/register",
            None,
            json!({ "email": email, "password": TEST_PASSWORD }),
        ),
        StatusCode::CONFLICT,
    )
    .await;

    let body = ctx
        .expect_status(
            json_request(
                "POST",
                "/v1/auth/login",
                None,
                json!({ "email": email, "password": TEST_PASSWORD }),
            ),
            StatusCode::OK,
        )
        .await;
    assert!(body["access_token"].is_string());

    ctx.expect_status(
        json_request(
            "POST",
            "/v1/auth/login",
            None,
            json!({ "email": email, "password": "Wrong-password-1" }),
        ),
        StatusCode::UNAUTHORIZED,
    )
    .await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_visitor_without_workspace_needs_activation() {
    let ctx = TestContext::new().await.unwrap();

    let body = ctx
        .expect_status(get_as("/v1/workspaces/current", &ctx.token), StatusCode::OK)
        .await;
    assert_eq!(body["state"], "needs_activation");
    assert_eq!(body["landing_path"], "/onboarding/claim");

    let body = ctx
        .expect_status(get_as("/v1/guard?path=/crm", &ctx.token), StatusCode::OK)
        .await;
    assert_eq!(body["state"], "unauthorized");
    assert_eq!(body["redirect_to"], "/");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_claim_activates_workspace() {
    let ctx = TestContext::new().await.unwrap();
    let enterprise = listed_enterprise(&ctx).await;

    let body = ctx
        .expect_status(
            json_request(
                "POST",
                &format!("/v1/enterprises/{}/claim", enterprise.id),
                Some(&ctx.token),
                json!({}),
            ),
            StatusCode::OK,
        )
        .await;
    assert_eq!(body["redirect_to"], format!("/crm/{}/dashboard", enterprise.id));

    let user = User::find_by_id(&ctx.db, ctx.user.id).await.unwrap().unwrap();
    assert_eq!(user.role, UserRole::EnterpriseOwner);

    let body = ctx
        .expect_status(get_as("/v1/workspaces/current", &ctx.token), StatusCode::OK)
        .await;
    assert_eq!(body["state"], "active");
    assert_eq!(body["membership"]["team_role"], "owner");

    ctx.expect_status(
        get_as(&format!("/v1/workspaces/{}/dashboard", enterprise.id), &ctx.token),
        StatusCode::OK,
    )
    .await;

    // Second claim by someone else
    let other = TestContext::create_user(&ctx.db).await.unwrap();
    ctx.expect_status(
        json_request(
            "POST",
            &format!("/v1/enterprises/{}/claim", enterprise.id),
            Some(&access_token(other.id)),
            json!({}),
        ),
        StatusCode::CONFLICT,
    )
    .await;

    // Outsiders can't read the workspace
    ctx.expect_status(
        get_as(
            &format!("/v1/workspaces/{}/people", enterprise.id),
            &access_token(other.id),
        ),
        StatusCode::FORBIDDEN,
    )
    .await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_global_admin_has_no_team_role_in_foreign_workspace() {
    let ctx = TestContext::new().await.unwrap();
    let enterprise = listed_enterprise(&ctx).await;
    ctx.expect_status(
        json_request(
            "POST",
            &format!("/v1/enterprises/{}/claim", enterprise.id),
            Some(&ctx.token),
            json!({}),
        ),
        StatusCode::OK,
    )
    .await;

    let admin = TestContext::create_user(&ctx.db).await.unwrap();
    User::set_role(&ctx.db, admin.id, UserRole::Admin).await.unwrap();
    let admin_token = access_token(admin.id);

    for resource in ["dashboard", "people", "members"] {
        ctx.expect_status(
            get_as(
                &format!("/v1/workspaces/{}/{}", enterprise.id, resource),
                &admin_token,
            ),
            StatusCode::FORBIDDEN,
        )
        .await;
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_last_owner_cannot_be_demoted() {
    let ctx = TestContext::new().await.unwrap();
    let enterprise = listed_enterprise(&ctx).await;

    ctx.expect_status(
        json_request(
            "POST",
            &format!("/v1/enterprises/{}/claim", enterprise.id),
            Some(&ctx.token),
            json!({}),
        ),
        StatusCode::OK,
    )
    .await;

    ctx.expect_status(
        json_request(
            "PUT",
            &format!("/v1/workspaces/{}/members/{}", enterprise.id, ctx.user.id),
            Some(&ctx.token),
            json!({ "role": "admin" }),
        ),
        StatusCode::CONFLICT,
    )
    .await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_webhook_promotes_visitor_and_grants_plan() {
    let ctx = TestContext::new().await.unwrap();
    let body = json!({
        "id": "evt_integration",
        "type": "subscription.created",
        "data": {
            "user_id": ctx.user.id,
            "plan": "crm_pro",
            "status": "active",
            "customer_id": "cus_test",
            "subscription_id": format!("sub_{}", uuid::Uuid::new_v4()),
            "current_period_start": Utc::now().timestamp() - 60,
            "current_period_end": Utc::now().timestamp() + 30 * 86_400
        }
    })
    .to_string();

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/billing/webhook")
        .header(
            SIGNATURE_HEADER,
            sign_payload(WEBHOOK_SECRET, Utc::now().timestamp(), body.as_bytes()),
        )
        .body(axum::body::Body::from(body))
        .unwrap();
    ctx.expect_status(request, StatusCode::OK).await;

    let user = User::find_by_id(&ctx.db, ctx.user.id).await.unwrap().unwrap();
    assert_eq!(user.role, UserRole::Member);

    let body = ctx
        .expect_status(get_as("/v1/subscription", &ctx.token), StatusCode::OK)
        .await;
    assert_eq!(body["effective_plan"], "crm_pro");
    assert_eq!(body["token_quota"], 500_000);

    let body = ctx
        .expect_status(get_as("/v1/guard?path=/crm/copilot", &ctx.token), StatusCode::OK)
        .await;
    assert_eq!(body["state"], "authorized");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_onboarding_step_completion_is_idempotent() {
    let ctx = TestContext::new().await.unwrap();
    let uri = "/v1/onboarding/directory/steps/browse_directory";

    let first = ctx
        .expect_status(json_request("POST", uri, Some(&ctx.token), json!({})), StatusCode::OK)
        .await;
    assert_eq!(first["changed"], true);

    let second = ctx
        .expect_status(json_request("POST", uri, Some(&ctx.token), json!({})), StatusCode::OK)
        .await;
    assert_eq!(second["changed"], false);
    assert_eq!(second["progress"]["updated_at"], first["progress"]["updated_at"]);

    ctx.expect_status(
        json_request(
            "POST",
            "/v1/onboarding/directory/steps/claim_enterprise",
            Some(&ctx.token),
            json!({}),
        ),
        StatusCode::NOT_FOUND,
    )
    .await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_admin_routes_require_admin_role() {
    let ctx = TestContext::new().await.unwrap();

    ctx.expect_status(get_as("/v1/admin/tables/users", &ctx.token), StatusCode::FORBIDDEN)
        .await;

    User::set_role(&ctx.db, ctx.user.id, UserRole::Admin).await.unwrap();

    let body = ctx
        .expect_status(get_as("/v1/admin/tables/users?limit=5", &ctx.token), StatusCode::OK)
        .await;
    assert!(body["rows"][0].get("password_hash").is_none());

    ctx.expect_status(get_as("/v1/admin/tables/pg_authid", &ctx.token), StatusCode::NOT_FOUND)
        .await;

    ctx.expect_status(
        json_request(
            "PUT",
            &format!("/v1/admin/users/{}/role", ctx.user.id),
            Some(&ctx.token),
            json!({ "role": "member" }),
        ),
        StatusCode::FORBIDDEN,
    )
    .await;

    let job = ctx
        .expect_status(
            json_request(
                "POST",
                "/v1/admin/seed-jobs",
                Some(&ctx.token),
                json!({ "category": "energy", "count": 3 }),
            ),
            StatusCode::ACCEPTED,
        )
        .await;
    assert_eq!(job["status"], "pending");
}
