//! Path pattern matching for route classification and the interception filter.
//!
//! Patterns are either exact paths (`/about`) or prefixes written with a
//! trailing `(.*)` (`/sign-in(.*)`), which match the prefix followed by
//! anything, including nothing. Exact patterns tolerate one trailing slash.

/// Public pages reachable without a session.
pub const PUBLIC_ROUTES: &[&str] = &["/", "/about", "/sign-in(.*)", "/sign-up(.*)"];

/// The single onboarding page.
pub const ONBOARDING_ROUTES: &[&str] = &["/onboarding"];

const PREFIX_WILDCARD: &str = "(.*)";

/// Identity-provider and infrastructure endpoints served outside the gate.
const PASSTHROUGH_PATHS: &[&str] = &["/healthz", "/sign-out"];

/// Extensions that mark a request as a static asset the gate does not inspect.
const STATIC_EXTENSIONS: &[&str] = &[
    "htm", "html", "css", "js", "jpg", "jpeg", "webp", "png", "gif", "svg", "ttf", "woff", "woff2", "ico", "csv",
    "doc", "docx", "xls", "xlsx", "zip", "webmanifest",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern<'a> {
    Exact(&'a str),
    Prefix(&'a str),
}

impl<'a> Pattern<'a> {
    fn parse(raw: &'a str) -> Self {
        match raw.strip_suffix(PREFIX_WILDCARD) {
            Some(prefix) => Self::Prefix(prefix),
            None => Self::Exact(raw),
        }
    }

    fn matches(self, path: &str) -> bool {
        match self {
            Self::Prefix(prefix) => path.starts_with(prefix),
            Self::Exact(exact) => {
                path == exact || (exact != "/" && path.strip_suffix('/') == Some(exact))
            }
        }
    }
}

/// A fixed set of path patterns.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    patterns: Vec<Pattern<'static>>,
}

impl RouteMatcher {
    #[must_use]
    pub fn new(patterns: &[&'static str]) -> Self {
        Self { patterns: patterns.iter().map(|p| Pattern::parse(p)).collect() }
    }

    /// True if any pattern matches `path`.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}

/// Whether the gate should run for this path at all.
///
/// API routes are always inspected. Otherwise static assets and the
/// passthrough endpoints skip the gate.
#[must_use]
pub fn should_intercept(path: &str) -> bool {
    if path == "/api" || path.starts_with("/api/") {
        return true;
    }
    if PASSTHROUGH_PATHS.contains(&path) {
        return false;
    }
    !is_static_asset(path)
}

fn is_static_asset(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or_default();
    let Some((_, ext)) = last.rsplit_once('.') else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    STATIC_EXTENSIONS.contains(&ext.as_str())
}

#[cfg(test)]
#[path = "matcher_test.rs"]
mod tests;
