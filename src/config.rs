//! Startup configuration.
//!
//! All knobs come from `RBADMIN_*` environment variables and land in an
//! explicit `AppConfig` struct. The token signing secret is a required field:
//! startup fails when it is absent, unless `RBADMIN_DEV=1` opts into a fixed
//! development secret (logged loudly).

use anyhow::{bail, Result};
use tracing::warn;

/// Fixed secret used only when RBADMIN_DEV=1; never valid for production.
const DEV_SECRET: &str = "rbadmin-dev-secret-do-not-deploy";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_port: u16,
    pub data_root: String,
    pub token_secret: String,
    pub token_ttl_hours: i64,
}

impl AppConfig {
    /// Build configuration from the process environment.
    ///
    /// Fails fast when `RBADMIN_TOKEN_SECRET` is unset or empty and
    /// `RBADMIN_DEV` is not set to `1`.
    pub fn from_env() -> Result<Self> {
        let http_port = std::env::var("RBADMIN_HTTP_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);
        let data_root = std::env::var("RBADMIN_DATA_ROOT").unwrap_or_else(|_| "data".to_string());
        let token_ttl_hours = std::env::var("RBADMIN_TOKEN_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(24);

        let secret = std::env::var("RBADMIN_TOKEN_SECRET").unwrap_or_default();
        let token_secret = if !secret.trim().is_empty() {
            secret
        } else if std::env::var("RBADMIN_DEV").map(|v| v == "1").unwrap_or(false) {
            warn!("RBADMIN_TOKEN_SECRET not set; using insecure development secret (RBADMIN_DEV=1)");
            DEV_SECRET.to_string()
        } else {
            bail!("RBADMIN_TOKEN_SECRET must be set (or run with RBADMIN_DEV=1 for local development)");
        };

        Ok(Self { http_port, data_root, token_secret, token_ttl_hours })
    }

    /// Configuration for tests and embedded use: explicit secret, tempdir root.
    pub fn for_root(data_root: impl Into<String>, token_secret: impl Into<String>) -> Self {
        Self {
            http_port: 0,
            data_root: data_root.into(),
            token_secret: token_secret.into(),
            token_ttl_hours: 24,
        }
    }
}
