//! Configuration module for the Corbii server.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::auth::TrustedToken;
use crate::errors::AppError;
use crate::jobs::DEFAULT_PAGE_SIZE;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Path to the SQLite document store file
    pub db_path: PathBuf,
    /// Root directory holding one Tantivy index per logical index name
    pub index_path: PathBuf,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Credentials accepted by the identity verifier
    pub trusted_tokens: Vec<TrustedToken>,
    /// Collections mirrored into the search index on resync
    pub indexed_collections: Vec<String>,
    pub resync_staleness: chrono::Duration,
    pub purge_page_size: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let bind_addr = env::var("CORBII_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid CORBII_BIND_ADDR: {}", e)))?;

        let db_path = env::var("CORBII_DB_PATH")
            .unwrap_or_else(|_| "./data/store.sqlite".to_string())
            .into();

        let index_path = env::var("CORBII_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let log_level = env::var("CORBII_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("CORBII_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("text") | Err(_) => LogFormat::Text,
            Ok(other) => {
                return Err(AppError::Config(format!(
                    "Invalid CORBII_LOG_FORMAT: {} (expected text or json)",
                    other
                )))
            }
        };

        let trusted_tokens = match env::var("CORBII_TRUSTED_TOKENS") {
            Ok(raw) => parse_trusted_tokens(&raw)?,
            Err(_) => Vec::new(),
        };

        let indexed_collections = parse_list(
            &env::var("CORBII_INDEXED_COLLECTIONS").unwrap_or_else(|_| "users,decks".to_string()),
        );

        let staleness_hours: i64 = parse_number("CORBII_RESYNC_STALENESS_HOURS", 24)?;
        let resync_staleness = staleness_from_hours(staleness_hours)?;
        let purge_page_size: usize =
            parse_number("CORBII_PURGE_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;

        Ok(Self {
            bind_addr,
            db_path,
            index_path,
            log_level,
            log_format,
            trusted_tokens,
            indexed_collections,
            resync_staleness,
            purge_page_size,
        })
    }
}

fn parse_number<T>(var: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid {}: {}", var, e))),
        Err(_) => Ok(default),
    }
}

fn staleness_from_hours(hours: i64) -> Result<chrono::Duration, AppError> {
    if hours < 0 {
        return Err(AppError::Config(format!(
            "Invalid CORBII_RESYNC_STALENESS_HOURS: {} (must not be negative)",
            hours
        )));
    }
    chrono::Duration::try_hours(hours).ok_or_else(|| {
        AppError::Config(format!(
            "Invalid CORBII_RESYNC_STALENESS_HOURS: {} (out of range)",
            hours
        ))
    })
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `subject=token` pairs separated by commas.
fn parse_trusted_tokens(raw: &str) -> Result<Vec<TrustedToken>, AppError> {
    parse_list(raw)
        .into_iter()
        .map(|entry| match entry.split_once('=') {
            Some((subject, token)) if !subject.trim().is_empty() && !token.trim().is_empty() => {
                Ok(TrustedToken::new(subject.trim(), token.trim()))
            }
            _ => Err(AppError::Config(format!(
                "Invalid CORBII_TRUSTED_TOKENS entry {:?} (expected subject=token)",
                entry
            ))),
        })
        .collect()
}
