//! Application configuration parsed from environment variables.

use url::Url;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 168;
pub const DEFAULT_STATIC_DIR: &str = "public";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {var}")]
    Missing { var: String },
    #[error("invalid value for {var}: {value}")]
    Invalid { var: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Public origin the app is reachable at. Used to rebuild absolute request
    /// URLs for `returnBackUrl` and to vet sign-in return targets.
    pub base_url: Url,
    pub cookie_secure: bool,
    pub session_ttl_hours: i64,
    pub static_dir: String,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL`
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `APP_BASE_URL`: default `http://localhost:{PORT}`
    /// - `COOKIE_SECURE`: defaults to whether `APP_BASE_URL` is https
    /// - `SESSION_TTL_HOURS`: default 168, must be positive
    /// - `STATIC_DIR`: default `public`
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing { var: "DATABASE_URL".into() })?;
        let port = env_parse("PORT", DEFAULT_PORT)?;
        let db_max_connections = env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;
        let session_ttl_hours = positive_ttl(env_parse("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?)?;

        let raw_base = std::env::var("APP_BASE_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));
        let base_url = parse_base_url(&raw_base)?;

        let cookie_secure = match std::env::var("COOKIE_SECURE") {
            Ok(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { var: "COOKIE_SECURE".into(), value: raw })?,
            Err(_) => base_url.scheme() == "https",
        };

        let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| DEFAULT_STATIC_DIR.to_owned());

        Ok(Self { database_url, port, db_max_connections, base_url, cookie_secure, session_ttl_hours, static_dir })
    }
}

pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::Invalid { var: "APP_BASE_URL".into(), value: raw.to_owned() };
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(url)
}

/// Sessions must outlive their creation.
pub(crate) fn positive_ttl(hours: i64) -> Result<i64, ConfigError> {
    if hours <= 0 {
        return Err(ConfigError::Invalid { var: "SESSION_TTL_HOURS".into(), value: hours.to_string() });
    }
    Ok(hours)
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var: key.to_owned(), value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
