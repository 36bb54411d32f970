//! Server configuration loaded once from the environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 3000;
pub const TURNSTILE_VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

/// Which persistence backend the server talks to.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreBackend {
    /// Hosted PostgREST endpoint (Supabase).
    Rest {
        url: String,
        #[serde(skip)]
        api_key: String,
    },
    /// Local SQLite file; `None` keeps everything in memory.
    Sqlite { path: Option<PathBuf> },
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rest { .. } => "rest",
            Self::Sqlite { .. } => "sqlite",
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP server port.
    pub port: u16,
    /// `APP_ENV=development` relaxes the summarize secret check.
    pub development: bool,
    pub store: StoreBackend,
    pub turnstile_secret: Option<String>,
    pub turnstile_verify_url: String,
    /// Shared secret guarding the summarize trigger.
    pub summary_secret: Option<String>,
    /// Period of the background summary job; `None` disables it.
    pub summary_interval: Option<Duration>,
}

impl AppConfig {
    /// Create configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match var("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("Invalid PORT value {raw:?}: {e}")))?,
            None => {
                info!("PORT not set, using default: {}", DEFAULT_PORT);
                DEFAULT_PORT
            }
        };

        let development = var("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("development"));

        let store = match var("STORE_BACKEND").as_deref().unwrap_or("rest") {
            "rest" | "supabase" => {
                let url = var("SUPABASE_URL").ok_or_else(|| {
                    Error::Config("Missing required environment variable: SUPABASE_URL".into())
                })?;
                let api_key = var("SUPABASE_PUBLISHABLE_KEY")
                    .or_else(|| var("SUPABASE_ANON_KEY"))
                    .ok_or_else(|| {
                        Error::Config(
                            "Missing SUPABASE_PUBLISHABLE_KEY or SUPABASE_ANON_KEY environment variable."
                                .into(),
                        )
                    })?;
                StoreBackend::Rest {
                    url: url.trim_end_matches('/').to_string(),
                    api_key,
                }
            }
            "sqlite" => StoreBackend::Sqlite {
                path: var("SQLITE_PATH").map(PathBuf::from),
            },
            other => {
                return Err(Error::Config(format!(
                    "Unknown STORE_BACKEND {other:?} (expected \"rest\" or \"sqlite\")"
                )))
            }
        };

        let turnstile_secret = var("TURNSTILE_SECRET_KEY");
        if turnstile_secret.is_none() {
            warn!("TURNSTILE_SECRET_KEY not set; clinical picture submissions will be rejected");
        }

        let summary_secret = var("CLINICAL_PICTURE_SUMMARY_SECRET");
        if summary_secret.is_none() && !development {
            warn!("CLINICAL_PICTURE_SUMMARY_SECRET not set; summarize endpoint will refuse access");
        }

        let summary_interval = match var("SUMMARY_INTERVAL_HOURS") {
            Some(raw) => parse_interval_hours(&raw)?,
            None => None,
        };

        Ok(Self {
            port,
            development,
            store,
            turnstile_secret,
            turnstile_verify_url: var("TURNSTILE_VERIFY_URL")
                .unwrap_or_else(|| TURNSTILE_VERIFY_URL.to_string()),
            summary_secret,
            summary_interval,
        })
    }
}

/// Longest accepted scheduler interval, one year.
const MAX_SUMMARY_INTERVAL_HOURS: u64 = 24 * 365;

/// `0` disables the scheduler; anything above a year is a configuration
/// error.
fn parse_interval_hours(raw: &str) -> Result<Option<Duration>> {
    let hours = match raw.trim().parse::<u64>() {
        Ok(hours) => hours,
        Err(e) => {
            warn!("Invalid SUMMARY_INTERVAL_HOURS value {:?}: {}", raw, e);
            return Ok(None);
        }
    };
    if hours == 0 {
        return Ok(None);
    }
    if hours > MAX_SUMMARY_INTERVAL_HOURS {
        return Err(Error::Config(format!(
            "SUMMARY_INTERVAL_HOURS must be at most {MAX_SUMMARY_INTERVAL_HOURS}, got {hours}"
        )));
    }
    Ok(Some(Duration::from_secs(hours * 3600)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_vars(|key| map.get(key).cloned())
    }

    #[test]
    fn test_rest_backend_requires_url_and_key() {
        let err = config(&[]).unwrap_err();
        assert!(err.to_string().contains("SUPABASE_URL"));

        let err = config(&[("SUPABASE_URL", "https://x.supabase.co")]).unwrap_err();
        assert!(err.to_string().contains("SUPABASE_PUBLISHABLE_KEY"));

        let cfg = config(&[
            ("SUPABASE_URL", "https://x.supabase.co/"),
            ("SUPABASE_ANON_KEY", "anon"),
        ])
        .unwrap();
        match cfg.store {
            StoreBackend::Rest { url, api_key } => {
                assert_eq!(url, "https://x.supabase.co");
                assert_eq!(api_key, "anon");
            }
            other => panic!("unexpected backend {other:?}"),
        }
    }

    #[test]
    fn test_publishable_key_preferred_over_anon() {
        let cfg = config(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_PUBLISHABLE_KEY", "pub"),
            ("SUPABASE_ANON_KEY", "anon"),
        ])
        .unwrap();
        assert!(matches!(cfg.store, StoreBackend::Rest { ref api_key, .. } if api_key == "pub"));
    }

    #[test]
    fn test_sqlite_defaults() {
        let cfg = config(&[("STORE_BACKEND", "sqlite"), ("APP_ENV", "development")]).unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert!(cfg.development);
        assert!(matches!(cfg.store, StoreBackend::Sqlite { path: None }));
        assert_eq!(cfg.turnstile_verify_url, TURNSTILE_VERIFY_URL);
        assert!(cfg.summary_interval.is_none());
    }

    #[test]
    fn test_summary_interval_and_port() {
        let cfg = config(&[
            ("STORE_BACKEND", "sqlite"),
            ("PORT", "8080"),
            ("SUMMARY_INTERVAL_HOURS", "24"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.summary_interval, Some(Duration::from_secs(86_400)));

        let cfg = config(&[("STORE_BACKEND", "sqlite"), ("SUMMARY_INTERVAL_HOURS", "0")]).unwrap();
        assert!(cfg.summary_interval.is_none());

        assert!(config(&[("STORE_BACKEND", "sqlite"), ("PORT", "http")]).is_err());
        assert!(config(&[("STORE_BACKEND", "mongo")]).is_err());
    }

    #[test]
    fn test_oversized_interval_is_rejected() {
        let err = config(&[
            ("STORE_BACKEND", "sqlite"),
            ("SUMMARY_INTERVAL_HOURS", "18446744073709551615"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let interval = |hours: &str| {
            config(&[("STORE_BACKEND", "sqlite"), ("SUMMARY_INTERVAL_HOURS", hours)])
        };

        let cfg = interval("8760").unwrap();
        assert_eq!(cfg.summary_interval, Some(Duration::from_secs(8760 * 3600)));
        assert!(interval("8761").is_err());

        let cfg = interval("soon").unwrap();
        assert!(cfg.summary_interval.is_none());
    }
}
