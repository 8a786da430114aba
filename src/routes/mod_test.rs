use std::sync::atomic::Ordering;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use tower::ServiceExt;

use super::*;
use crate::services::identity::PublicMetadata;
use crate::state::test_helpers::test_app_state;

// =============================================================================
// HELPERS
// =============================================================================

fn onboarded() -> PublicMetadata {
    PublicMetadata { onboarding_complete: Some(true), ..PublicMetadata::default() }
}

fn get_req(path: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(t) = token {
        builder = builder.header(header::COOKIE, format!("session_token={t}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn form_req(method: &str, path: &str, body: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(t) = token {
        builder = builder.header(header::COOKIE, format!("session_token={t}"));
    }
    builder.body(Body::from(body.to_owned())).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

fn location(resp: &Response) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn session_token_from(resp: &Response) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix("session_token="))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_owned())
}

async fn json_body(resp: Response) -> serde_json::Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// GATE THROUGH THE ROUTER
// =============================================================================

#[tokio::test]
async fn root_signed_out_redirects_to_sign_up() {
    let (state, _identity, _profiles) = test_app_state();
    let resp = send(&app(state), get_req("/", None)).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), "/sign-up");
}

#[tokio::test]
async fn onboarding_signed_out_redirects_to_sign_in_with_return_url() {
    let (state, _identity, _profiles) = test_app_state();
    let resp = send(&app(state), get_req("/onboarding", None)).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), "/sign-in?returnBackUrl=http%3A%2F%2Flocalhost%3A3000%2Fonboarding");
}

#[tokio::test]
async fn onboarding_signed_in_not_onboarded_is_served() {
    let (state, identity, _profiles) = test_app_state();
    let (_id, token) = identity.seed_user("a@example.com", PublicMetadata::default());

    let resp = send(&app(state), get_req("/onboarding", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["page"], "onboarding");
    assert_eq!(body["onboardingComplete"], false);
}

#[tokio::test]
async fn protected_signed_in_not_onboarded_redirects_to_onboarding() {
    let (state, identity, _profiles) = test_app_state();
    let (_id, token) = identity.seed_user("a@example.com", PublicMetadata::default());
    let app = app(state);

    for path in ["/dashboard", "/about", "/profile", "/api/profile"] {
        let resp = send(&app, get_req(path, Some(&token))).await;
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT, "path {path}");
        assert_eq!(location(&resp), "/onboarding", "path {path}");
    }
}

#[tokio::test]
async fn about_onboarded_is_served() {
    let (state, identity, _profiles) = test_app_state();
    let (_id, token) = identity.seed_user("a@example.com", onboarded());

    let resp = send(&app(state), get_req("/about", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["page"], "about");
}

#[tokio::test]
async fn public_pages_signed_out_are_served() {
    let (state, _identity, _profiles) = test_app_state();
    let app = app(state);
    for path in ["/about", "/sign-in", "/sign-up"] {
        let resp = send(&app, get_req(path, None)).await;
        assert_eq!(resp.status(), StatusCode::OK, "path {path}");
    }
}

#[tokio::test]
async fn unknown_path_signed_out_redirects_to_sign_up() {
    let (state, _identity, _profiles) = test_app_state();
    let resp = send(&app(state), get_req("/random-unknown-path", None)).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), "/sign-up");
}

#[tokio::test]
async fn unknown_path_onboarded_is_not_found() {
    let (state, identity, _profiles) = test_app_state();
    let (_id, token) = identity.seed_user("a@example.com", onboarded());

    let resp = send(&app(state), get_req("/random-unknown-path", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn identity_outage_treated_as_signed_out() {
    let (state, identity, _profiles) = test_app_state();
    let (_id, token) = identity.seed_user("a@example.com", onboarded());
    identity.unavailable.store(true, Ordering::SeqCst);
    let app = app(state);

    let resp = send(&app, get_req("/about", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, get_req("/profile", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), "/sign-up");
}

#[tokio::test]
async fn healthz_and_assets_bypass_the_gate() {
    let (state, _identity, _profiles) = test_app_state();
    let app = app(state);

    let resp = send(&app, get_req("/healthz", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, get_req("/assets/missing.css", None)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// SIGN-UP / SIGN-IN / SIGN-OUT
// =============================================================================

#[tokio::test]
async fn sign_up_sets_cookie_and_redirects_home() {
    let (state, _identity, _profiles) = test_app_state();
    let resp = send(
        &app(state),
        form_req("POST", "/sign-up", "email=new%40example.com&password=long-enough", None),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
    assert!(session_token_from(&resp).is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn sign_up_duplicate_email_conflicts() {
    let (state, identity, _profiles) = test_app_state();
    identity.seed_user("taken@example.com", PublicMetadata::default());

    let resp = send(
        &app(state),
        form_req("POST", "/sign-up", "email=taken%40example.com&password=long-enough", None),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(resp).await["error"], "An account with this email already exists");
}

#[tokio::test]
async fn sign_up_weak_password_is_rejected() {
    let (state, _identity, _profiles) = test_app_state();
    let resp = send(&app(state), form_req("POST", "/sign-up", "email=a%40example.com&password=short", None)).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn sign_in_honors_same_origin_return_url() {
    let (state, identity, _profiles) = test_app_state();
    identity.seed_user("a@example.com", PublicMetadata::default());

    let resp = send(
        &app(state),
        form_req(
            "POST",
            "/sign-in?returnBackUrl=http%3A%2F%2Flocalhost%3A3000%2Fonboarding",
            "email=a%40example.com&password=password123",
            None,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/onboarding");
    assert!(session_token_from(&resp).is_some());
}

#[tokio::test]
async fn sign_in_ignores_foreign_return_url() {
    let (state, identity, _profiles) = test_app_state();
    identity.seed_user("a@example.com", PublicMetadata::default());

    let resp = send(
        &app(state),
        form_req(
            "POST",
            "/sign-in?returnBackUrl=https%3A%2F%2Fevil.example%2Fonboarding",
            "email=a%40example.com&password=password123",
            None,
        ),
    )
    .await;
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn sign_in_ignores_same_origin_double_slash_return_url() {
    let (state, identity, _profiles) = test_app_state();
    identity.seed_user("a@example.com", PublicMetadata::default());

    let resp = send(
        &app(state),
        form_req(
            "POST",
            "/sign-in?returnBackUrl=http%3A%2F%2Flocalhost%3A3000%2F%2Fevil.example%2Fx",
            "email=a%40example.com&password=password123",
            None,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn sign_in_bad_password_is_unauthorized() {
    let (state, identity, _profiles) = test_app_state();
    identity.seed_user("a@example.com", PublicMetadata::default());

    let resp = send(&app(state), form_req("POST", "/sign-in", "email=a%40example.com&password=nope", None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["error"], "Invalid email or password");
}

#[tokio::test]
async fn sign_out_drops_session() {
    let (state, identity, _profiles) = test_app_state();
    let (_id, token) = identity.seed_user("a@example.com", onboarded());
    assert_eq!(identity.session_count(), 1);

    let resp = send(&app(state), form_req("POST", "/sign-out", "", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/sign-up");
    assert_eq!(session_token_from(&resp).as_deref(), Some(""));
    assert_eq!(identity.session_count(), 0);
}

#[tokio::test]
async fn sign_out_works_before_onboarding() {
    let (state, identity, _profiles) = test_app_state();
    let (_id, token) = identity.seed_user("a@example.com", PublicMetadata::default());

    let resp = send(&app(state), form_req("POST", "/sign-out", "", Some(&token))).await;
    assert_eq!(location(&resp), "/sign-up");
    assert_eq!(identity.session_count(), 0);
}

#[tokio::test]
async fn me_returns_identity_and_metadata() {
    let (state, identity, _profiles) = test_app_state();
    let (user_id, token) = identity.seed_user("a@example.com", onboarded());

    let resp = send(&app(state), get_req("/api/me", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["id"], user_id.to_string());
    assert_eq!(body["email"], "a@example.com");
    assert_eq!(body["public_metadata"]["onboardingComplete"], true);
}

// =============================================================================
// ONBOARDING FLOW
// =============================================================================

#[tokio::test]
async fn sign_up_then_onboard_then_reach_profile() {
    let (state, _identity, _profiles) = test_app_state();
    let app = app(state);

    let resp = send(&app, form_req("POST", "/sign-up", "email=flow%40example.com&password=long-enough", None)).await;
    let token = session_token_from(&resp).unwrap();

    let resp = send(&app, get_req("/", Some(&token))).await;
    assert_eq!(location(&resp), "/onboarding");

    let resp = send(
        &app,
        form_req("POST", "/onboarding", "applicationName=Acme&applicationType=B2B", Some(&token)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["message"], "Onboarding Complete");

    let resp = send(&app, get_req("/profile", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["page"], "profile");
    assert!(body["profile"].is_null());

    let resp = send(&app, get_req("/", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn onboarding_records_form_in_metadata() {
    let (state, identity, _profiles) = test_app_state();
    let (user_id, token) = identity.seed_user("a@example.com", PublicMetadata::default());

    send(
        &app(state),
        form_req("POST", "/onboarding", "applicationName=Acme&applicationType=B2C", Some(&token)),
    )
    .await;

    let meta = identity.metadata(user_id).unwrap();
    assert_eq!(meta.onboarding_complete, Some(true));
    assert_eq!(meta.application_name.as_deref(), Some("Acme"));
    assert_eq!(meta.application_type.as_deref(), Some("B2C"));
}

// =============================================================================
// PROFILE
// =============================================================================

#[tokio::test]
async fn profile_save_twice_keeps_one_row() {
    let (state, identity, profiles) = test_app_state();
    let (user_id, token) = identity.seed_user("a@example.com", onboarded());
    let app = app(state);

    let resp = send(&app, form_req("POST", "/api/profile", "full_name=Ada&bio=&phone=555", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, serde_json::json!({ "success": true, "error": null }));

    send(&app, form_req("POST", "/api/profile", "full_name=Ada+Lovelace&bio=Math", Some(&token))).await;
    assert_eq!(profiles.row_count(user_id), 1);

    let body = json_body(send(&app, get_req("/api/profile", Some(&token))).await).await;
    assert_eq!(body["data"]["full_name"], "Ada Lovelace");
    assert_eq!(body["data"]["bio"], "Math");
    assert!(body["data"]["phone"].is_null());
    assert!(body["error"].is_null());
}

#[tokio::test]
async fn profile_blank_fields_stored_as_null() {
    let (state, identity, _profiles) = test_app_state();
    let (_id, token) = identity.seed_user("a@example.com", onboarded());
    let app = app(state);

    send(&app, form_req("POST", "/api/profile", "full_name=&address=", Some(&token))).await;
    let body = json_body(send(&app, get_req("/api/profile", Some(&token))).await).await;
    assert!(body["data"]["full_name"].is_null());
    assert!(body["data"]["address"].is_null());
}

#[tokio::test]
async fn profile_get_without_row_is_null_data() {
    let (state, identity, _profiles) = test_app_state();
    let (_id, token) = identity.seed_user("a@example.com", onboarded());

    let resp = send(&app(state), get_req("/api/profile", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, serde_json::json!({ "data": null, "error": null }));
}

#[tokio::test]
async fn profile_delete_removes_row() {
    let (state, identity, profiles) = test_app_state();
    let (user_id, token) = identity.seed_user("a@example.com", onboarded());
    let app = app(state);

    send(&app, form_req("POST", "/api/profile", "full_name=Ada", Some(&token))).await;
    let resp = send(&app, form_req("DELETE", "/api/profile", "", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["success"], true);
    assert_eq!(profiles.row_count(user_id), 0);
}

#[tokio::test]
async fn profile_signed_out_is_redirected_before_handler() {
    let (state, _identity, _profiles) = test_app_state();
    let resp = send(&app(state), get_req("/api/profile", None)).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), "/sign-up");
}

#[tokio::test]
async fn profile_store_failure_reports_error_string() {
    let (state, identity, profiles) = test_app_state();
    let (_id, token) = identity.seed_user("a@example.com", onboarded());
    profiles.failing.store(true, Ordering::SeqCst);

    let resp = send(&app(state), form_req("POST", "/api/profile", "full_name=Ada", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(resp).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().starts_with("database error"));
}
