//! Configuration management for the API server
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present) into a type-safe struct.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
//! - `API_HOST`: host to bind to (default: 0.0.0.0)
//! - `API_PORT`: port to bind to (default: 8080)
//! - `CORS_ORIGINS`: comma-separated allowed origins, `*` for any (default: *)
//! - `REQUEST_TIMEOUT_SECONDS`: deadline for each request's store work (default: 30)
//! - `JWT_SECRET`: JWT signing key, at least 32 characters (required)
//! - `LOGIN_UTC_OFFSET`: offset `last_login_at` is recorded in (default: +07:00)
//! - `RUST_LOG`: log filter (default: debug for Memberbase crates)
//!
//! # Example
//!
//! ```no_run
//! use memberbase_api::config::Config;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Server will listen on {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use anyhow::Context;
use chrono::FixedOffset;
use std::env;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,

    pub database: DatabaseConfig,

    pub jwt: JwtConfig,

    pub members: MemberConfig,
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,

    pub port: u16,

    /// `["*"]` allows any origin
    pub cors_origins: Vec<String>,

    pub request_timeout_seconds: u64,
}

/// Database settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,

    pub max_connections: u32,
}

/// JWT settings
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HS256 signing key; generate with `openssl rand -hex 32`
    pub secret: String,
}

/// Member repository settings
#[derive(Debug, Clone)]
pub struct MemberConfig {
    /// Offset `last_login_at` is recorded and rendered in
    pub login_offset: FixedOffset,
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("API_PORT", "8080")
            .parse::<u16>()
            .context("API_PORT must be a port number")?;

        let request_timeout_seconds = var("REQUEST_TIMEOUT_SECONDS", "30")
            .parse::<u64>()
            .context("REQUEST_TIMEOUT_SECONDS must be a whole number of seconds")?;

        let cors_origins = var("CORS_ORIGINS", "*")
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let url = lookup("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let max_connections = var("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive number")?;

        let secret = lookup("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let offset = var("LOGIN_UTC_OFFSET", "+07:00");
        let login_offset = offset
            .parse::<FixedOffset>()
            .map_err(|e| anyhow::anyhow!("LOGIN_UTC_OFFSET {:?} is not an offset like +07:00: {}", offset, e))?;

        Ok(Self {
            api: ApiConfig {
                host: var("API_HOST", "0.0.0.0"),
                port,
                cors_origins,
                request_timeout_seconds,
            },
            database: DatabaseConfig {
                url,
                max_connections,
            },
            jwt: JwtConfig { secret },
            members: MemberConfig { login_offset },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgresql://localhost/memberbase"),
        ("JWT_SECRET", "test-secret-key-at-least-32-bytes-long"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(
            config.members.login_offset,
            FixedOffset::east_opt(7 * 3600).unwrap()
        );
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9000"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("LOGIN_UTC_OFFSET", "-03:30"),
            ("REQUEST_TIMEOUT_SECONDS", "5"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(
            config.api.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(
            config.members.login_offset,
            FixedOffset::west_opt(3 * 3600 + 1800).unwrap()
        );
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_required_and_invalid_values() {
        assert!(Config::from_lookup(lookup(&REQUIRED[..1])).is_err());

        let mut short_secret = REQUIRED.to_vec();
        short_secret[1] = ("JWT_SECRET", "too-short");
        assert!(Config::from_lookup(lookup(&short_secret)).is_err());

        let mut bad_offset = REQUIRED.to_vec();
        bad_offset.push(("LOGIN_UTC_OFFSET", "Asia/Jakarta"));
        assert!(Config::from_lookup(lookup(&bad_offset)).is_err());
    }
}
