//! Request gate: the per-request route-protection and onboarding policy.
//!
//! DESIGN
//! ======
//! The policy is an ordered table of guard rules. Each rule inspects a small
//! set of precomputed facts about the request and either claims it (returns
//! a decision) or passes. The first rule that claims the request wins; if
//! none do, the request continues. Rule order is part of the contract, so it
//! lives in one auditable array rather than in nested conditionals.
//!
//! The gate never performs I/O. It trusts the `AuthContext` it is handed, and
//! the middleware in `routes::gate` is responsible for producing one (an
//! identity failure arrives here as an anonymous context).

pub mod matcher;

use url::form_urlencoded;

use crate::services::identity::AuthContext;
use matcher::{ONBOARDING_ROUTES, PUBLIC_ROUTES, RouteMatcher};

pub const SIGN_UP_PATH: &str = "/sign-up";
pub const SIGN_IN_PATH: &str = "/sign-in";
pub const ONBOARDING_PATH: &str = "/onboarding";
pub const RETURN_BACK_PARAM: &str = "returnBackUrl";

// =============================================================================
// TYPES
// =============================================================================

/// What the gate needs to know about an incoming request.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    /// Request path, without query string.
    pub path: &'a str,
    /// Absolute request URL, used as the sign-in return target.
    pub url: &'a str,
}

/// Where a redirect sends the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    SignUp,
    SignIn { return_back_url: String },
    Onboarding,
}

impl Destination {
    /// The `Location` value for this destination.
    #[must_use]
    pub fn location(&self) -> String {
        match self {
            Self::SignUp => SIGN_UP_PATH.to_owned(),
            Self::Onboarding => ONBOARDING_PATH.to_owned(),
            Self::SignIn { return_back_url } => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair(RETURN_BACK_PARAM, return_back_url)
                    .finish();
                format!("{SIGN_IN_PATH}?{query}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Redirect(Destination),
}

/// A decision together with the name of the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub rule: &'static str,
    pub decision: Decision,
}

// =============================================================================
// RULES
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Facts {
    is_root: bool,
    is_public: bool,
    is_onboarding: bool,
    authenticated: bool,
    onboarding_complete: bool,
}

type Rule = fn(&Facts, &GateRequest<'_>) -> Option<Decision>;

const FALLBACK_RULE: &str = "fallback";

/// Evaluated top to bottom; first `Some` wins.
const RULES: &[(&str, Rule)] = &[
    ("root_requires_sign_up", root_requires_sign_up),
    ("onboarding_open_to_signed_in", onboarding_open_to_signed_in),
    ("onboarding_requires_sign_in", onboarding_requires_sign_in),
    ("force_onboarding", force_onboarding),
    ("public_for_signed_in", public_for_signed_in),
    ("protected_requires_sign_up", protected_requires_sign_up),
];

fn root_requires_sign_up(f: &Facts, _: &GateRequest<'_>) -> Option<Decision> {
    (f.is_root && !f.authenticated).then_some(Decision::Redirect(Destination::SignUp))
}

fn onboarding_open_to_signed_in(f: &Facts, _: &GateRequest<'_>) -> Option<Decision> {
    (f.is_onboarding && f.authenticated).then_some(Decision::Continue)
}

fn onboarding_requires_sign_in(f: &Facts, req: &GateRequest<'_>) -> Option<Decision> {
    (f.is_onboarding && !f.authenticated)
        .then(|| Decision::Redirect(Destination::SignIn { return_back_url: req.url.to_owned() }))
}

// Fires ahead of the public-route allowance, so /about is also gated.
fn force_onboarding(f: &Facts, _: &GateRequest<'_>) -> Option<Decision> {
    (f.authenticated && !f.onboarding_complete).then_some(Decision::Redirect(Destination::Onboarding))
}

fn public_for_signed_in(f: &Facts, _: &GateRequest<'_>) -> Option<Decision> {
    (f.is_public && f.authenticated).then_some(Decision::Continue)
}

fn protected_requires_sign_up(f: &Facts, _: &GateRequest<'_>) -> Option<Decision> {
    (!f.is_public && !f.is_onboarding && !f.authenticated).then_some(Decision::Redirect(Destination::SignUp))
}

// =============================================================================
// GATE
// =============================================================================

/// Classifies requests against the public and onboarding route sets and
/// applies the ordered rules.
#[derive(Debug, Clone)]
pub struct Gate {
    public: RouteMatcher,
    onboarding: RouteMatcher,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    #[must_use]
    pub fn new() -> Self {
        Self { public: RouteMatcher::new(PUBLIC_ROUTES), onboarding: RouteMatcher::new(ONBOARDING_ROUTES) }
    }

    fn facts(&self, req: &GateRequest<'_>, auth: &AuthContext) -> Facts {
        Facts {
            is_root: req.path == "/",
            is_public: self.public.matches(req.path),
            is_onboarding: self.onboarding.matches(req.path),
            authenticated: auth.is_authenticated(),
            onboarding_complete: auth.onboarding_complete(),
        }
    }

    /// Run the rules and report which one fired.
    #[must_use]
    pub fn evaluate(&self, req: &GateRequest<'_>, auth: &AuthContext) -> Verdict {
        let facts = self.facts(req, auth);
        RULES
            .iter()
            .find_map(|&(name, rule)| rule(&facts, req).map(|decision| Verdict { rule: name, decision }))
            .unwrap_or(Verdict { rule: FALLBACK_RULE, decision: Decision::Continue })
    }

    /// Decide whether the request continues or is redirected.
    #[must_use]
    pub fn decide(&self, req: &GateRequest<'_>, auth: &AuthContext) -> Decision {
        let verdict = self.evaluate(req, auth);
        tracing::debug!(path = req.path, rule = verdict.rule, decision = ?verdict.decision, "gate decision");
        verdict.decision
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
