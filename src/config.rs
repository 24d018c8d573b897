use std::str::FromStr;

use anyhow::{Context, Result};

/// Upper bound on the rows loaded for the dashboard, charts and exports.
pub const DEFAULT_FETCH_LIMIT: i64 = 10_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Project URL of the hosted auth provider, e.g. `https://xyz.supabase.co`.
    pub supabase_url: String,
    /// Public (anon) API key sent with every auth request.
    pub supabase_anon_key: String,
    pub server_host: String,
    pub server_port: u16,
    /// Maximum number of readings fetched in one request.
    pub fetch_limit: i64,
    /// Apply `./migrations` on startup. Disable when the schema is owned by
    /// the hosted database.
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so parsing can be tested without
    /// touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .with_context(|| format!("missing required env var: {key}"))
        };
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        let fetch_limit: i64 = parse(&optional("FETCH_LIMIT", "10000"), "FETCH_LIMIT")?;
        if fetch_limit <= 0 {
            anyhow::bail!("FETCH_LIMIT must be a positive integer, got {fetch_limit}");
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            supabase_url: required("SUPABASE_URL")?,
            supabase_anon_key: required("SUPABASE_ANON_KEY")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: parse(&optional("SERVER_PORT", "8080"), "SERVER_PORT")?,
            fetch_limit,
            run_migrations: parse_bool(&optional("RUN_MIGRATIONS", "true"))
                .context("RUN_MIGRATIONS must be true or false")?,
        })
    }
}

fn parse<T>(raw: &str, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{key} has an invalid value: {raw:?}"))
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow::anyhow!("not a boolean: {other:?}")),
    }
}
