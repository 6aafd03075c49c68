use std::path::PathBuf;

use anyhow::Context;
use chrono::TimeDelta;

use itdiary_api::Settings;

/// Placeholder JWT secrets that must not reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub media_dir: PathBuf,
    pub session_ttl: TimeDelta,
    pub reset_token_ttl: TimeDelta,
    pub public_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            host: var("ITDIARY_HOST", "0.0.0.0"),
            port: var("ITDIARY_PORT", "8000")
                .parse()
                .context("ITDIARY_PORT must be a port number")?,
            db_path: var("ITDIARY_DB_PATH", "itdiary.db").into(),
            jwt_secret: var("ITDIARY_JWT_SECRET", "dev-secret-change-me"),
            media_dir: var("ITDIARY_MEDIA_DIR", "./media").into(),
            session_ttl: lifetime(
                "ITDIARY_SESSION_DAYS",
                &var("ITDIARY_SESSION_DAYS", "14"),
                "days",
                TimeDelta::try_days,
            )?,
            reset_token_ttl: lifetime(
                "ITDIARY_RESET_TOKEN_MINUTES",
                &var("ITDIARY_RESET_TOKEN_MINUTES", "60"),
                "minutes",
                TimeDelta::try_minutes,
            )?,
            public_url: var("ITDIARY_PUBLIC_URL", "http://localhost:8000"),
        })
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        self.jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }

    pub fn settings(&self) -> Settings {
        Settings {
            jwt_secret: self.jwt_secret.clone(),
            session_ttl: self.session_ttl,
            reset_token_ttl: self.reset_token_ttl,
            public_url: self.public_url.clone(),
        }
    }
}

/// Positive whole number of `unit`s that fits a [`TimeDelta`].
fn lifetime(key: &str, raw: &str, unit: &str, to_delta: fn(i64) -> Option<TimeDelta>) -> anyhow::Result<TimeDelta> {
    let amount = raw
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|n| *n > 0)
        .with_context(|| format!("{key} must be a positive whole number of {unit}"))?;
    to_delta(amount).with_context(|| format!("{key} is out of range: {amount} {unit}"))
}
