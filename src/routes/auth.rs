//! Auth routes: sign-up, sign-in, sign-out, session cookie handling, and
//! the `Caller` extractor.

use std::convert::Infallible;

use axum::extract::{FromRef, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::Form;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;
use url::Url;

use crate::gate::SIGN_UP_PATH;
use crate::services::identity::{AuthContext, IdentityError, IdentityProvider, NewUser};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

fn cleared_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO)
        .build()
}

/// Resolve the caller for a session token. Identity failures degrade to an
/// anonymous context so nothing downstream sees an error.
pub(crate) async fn resolve_auth(identity: &dyn IdentityProvider, token: Option<&str>) -> AuthContext {
    match identity.authenticate(token).await {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::warn!(error = %e, "authentication failed, treating caller as signed out");
            AuthContext::anonymous()
        }
    }
}

// =============================================================================
// CALLER EXTRACTOR
// =============================================================================

/// The caller's auth context. Reuses the context the gate attached to the
/// request when present, otherwise authenticates from the session cookie.
pub struct Caller(pub AuthContext);

impl<S> axum::extract::FromRequestParts<S> for Caller
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<AuthContext>() {
            return Ok(Self(ctx.clone()));
        }

        let app_state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value);
        Ok(Self(resolve_auth(app_state.identity.as_ref(), token).await))
    }
}

// =============================================================================
// ERRORS
// =============================================================================

pub(crate) fn identity_error_to_status(err: &IdentityError) -> StatusCode {
    match err {
        IdentityError::Unauthenticated | IdentityError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        IdentityError::InvalidEmail | IdentityError::WeakPassword => StatusCode::UNPROCESSABLE_ENTITY,
        IdentityError::EmailTaken => StatusCode::CONFLICT,
        IdentityError::Password(_) | IdentityError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn identity_error_response(err: &IdentityError) -> Response {
    let status = identity_error_to_status(err);
    let message = if status.is_server_error() {
        tracing::error!(error = %err, "identity operation failed");
        "Something went wrong. Please try again.".to_owned()
    } else {
        capitalize(&err.to_string())
    };
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

// =============================================================================
// RETURN TARGETS
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ReturnBackQuery {
    #[serde(rename = "returnBackUrl")]
    pub return_back_url: Option<String>,
}

/// Where to send the caller after sign-in. Only same-origin targets are
/// honored; anything else lands on `/`.
pub(crate) fn safe_return_target(base: &Url, raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return "/".to_owned();
    };

    let parsed = if raw.starts_with('/') && !raw.starts_with("//") { base.join(raw) } else { Url::parse(raw) };
    match parsed {
        // A leading `//` would be read by the browser as another host.
        Ok(url) if url.origin() == base.origin() && !url.path().starts_with("//") => match url.query() {
            Some(q) => format!("{}?{q}", url.path()),
            None => url.path().to_owned(),
        },
        _ => "/".to_owned(),
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct SignUpForm {
    email: String,
    password: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
pub struct SignInForm {
    email: String,
    password: String,
}

/// `GET /sign-up`: sign-up page descriptor.
pub async fn sign_up_page() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "page": "sign-up",
        "title": "Create your account",
        "fields": ["email", "password", "name"],
        "action": SIGN_UP_PATH,
    }))
}

/// `POST /sign-up`: create the account, set the session cookie, redirect to `/`.
pub async fn sign_up(State(state): State<AppState>, jar: CookieJar, Form(form): Form<SignUpForm>) -> Response {
    let new_user = NewUser { email: form.email, password: form.password, name: form.name };
    match state.identity.sign_up(&new_user).await {
        Ok(grant) => {
            let jar = jar.add(session_cookie(grant.token, state.config.cookie_secure));
            (jar, Redirect::to("/")).into_response()
        }
        Err(e) => identity_error_response(&e),
    }
}

/// `GET /sign-in`: sign-in page descriptor, echoing any return target.
pub async fn sign_in_page(Query(query): Query<ReturnBackQuery>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "page": "sign-in",
        "title": "Sign in",
        "fields": ["email", "password"],
        "returnBackUrl": query.return_back_url,
    }))
}

/// `POST /sign-in`: verify credentials, set the session cookie, redirect to
/// the return target.
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<ReturnBackQuery>,
    Form(form): Form<SignInForm>,
) -> Response {
    match state.identity.sign_in(&form.email, &form.password).await {
        Ok(grant) => {
            let target = safe_return_target(&state.config.base_url, query.return_back_url.as_deref());
            let jar = jar.add(session_cookie(grant.token, state.config.cookie_secure));
            (jar, Redirect::to(&target)).into_response()
        }
        Err(e) => identity_error_response(&e),
    }
}

/// `POST /sign-out`: drop the session, clear the cookie, redirect to `/sign-up`.
pub async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(token) = jar.get(COOKIE_NAME).map(Cookie::value) {
        if let Err(e) = state.identity.sign_out(token).await {
            tracing::warn!(error = %e, "session delete failed");
        }
    }
    let jar = jar.add(cleared_session_cookie(state.config.cookie_secure));
    (jar, Redirect::to(SIGN_UP_PATH)).into_response()
}

/// `GET /api/me`: the caller's identity and public metadata.
pub async fn me(State(state): State<AppState>, Caller(auth): Caller) -> Response {
    let Some(user_id) = auth.user_id else {
        return identity_error_response(&IdentityError::Unauthenticated);
    };
    match state.identity.user(user_id).await {
        Ok(Some(user)) => Json(user).into_response(),
        Ok(None) => identity_error_response(&IdentityError::Unauthenticated),
        Err(e) => identity_error_response(&e),
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
