//! Gate middleware: runs the request gate in front of every route.
//!
//! Resolves the caller once per request, asks the gate for a decision, and
//! either redirects or forwards the request with the resolved `AuthContext`
//! attached as an extension for the `Caller` extractor.

use axum::extract::{Request, State};
use axum::http::Uri;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use url::Url;

use super::auth::{COOKIE_NAME, resolve_auth};
use crate::gate::matcher::should_intercept;
use crate::gate::{Decision, GateRequest};
use crate::state::AppState;

/// Absolute URL of the request, rebuilt on the configured public origin.
pub(crate) fn request_url(base: &Url, uri: &Uri) -> String {
    let path_and_query = uri.path_and_query().map_or_else(|| uri.path(), |pq| pq.as_str());
    base.join(path_and_query)
        .map_or_else(|_| format!("{}{path_and_query}", base.origin().ascii_serialization()), String::from)
}

pub async fn gate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    if !should_intercept(&path) {
        return next.run(req).await;
    }

    let jar = CookieJar::from_headers(req.headers());
    let token = jar.get(COOKIE_NAME).map(Cookie::value);
    let auth = resolve_auth(state.identity.as_ref(), token).await;

    let url = request_url(&state.config.base_url, req.uri());
    match state.gate.decide(&GateRequest { path: &path, url: &url }, &auth) {
        Decision::Continue => {
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Decision::Redirect(destination) => Redirect::temporary(&destination.location()).into_response(),
    }
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
