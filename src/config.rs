use std::str::FromStr;

use anyhow::{bail, Context};
use sqlx::postgres::PgConnectOptions;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    /// Emit permissive CORS headers and answer OPTIONS on every path.
    pub cors_enabled: bool,
}

/// Connection parameters for the items database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Full URL; wins over the individual parts when present.
    pub url: Option<String>,
    pub host: String,
    pub name: String,
    pub user: String,
    pub password: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't have to touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            host: var("HOST", "127.0.0.1"),
            port: var("PORT", "3000")
                .parse()
                .context("PORT must be a valid number")?,
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
                host: var("DB_HOST", "postgres"),
                name: var("DB_NAME", "shopping_db"),
                user: var("DB_USER", "shopping_user"),
                password: var("DB_PASS", "shopping_pass"),
                port: var("DB_PORT", "5432")
                    .parse()
                    .context("DB_PORT must be a valid number")?,
            },
            cors_enabled: parse_flag(&var("CORS_ENABLED", "true"))
                .context("CORS_ENABLED must be a boolean")?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url).context("DATABASE_URL is not a valid Postgres URL");
        }

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user)
            .password(&self.password))
    }
}

fn parse_flag(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("unrecognised flag value '{}'", other),
    }
}
