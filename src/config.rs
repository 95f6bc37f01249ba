use std::net::SocketAddr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Argon2 cost parameters. Defaults match `argon2::Params::default()`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory user store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub host: String,
    pub port: u16,
}

const DEFAULT_TTL_MINUTES: i64 = 6 * 60;
const MAX_TTL_MINUTES: i64 = 30 * 24 * 60;

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let secret = lookup("JWT_SECRET")
            .or_else(|| lookup("JWT_SEED"))
            .filter(|v| !v.is_empty())
            .context("JWT_SECRET must be set")?;

        let jwt = JwtConfig {
            secret,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "authgate".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "authgate-users".into()),
            ttl_minutes: parse_or(&lookup, "JWT_TTL_MINUTES", DEFAULT_TTL_MINUTES),
        };
        if !(1..=MAX_TTL_MINUTES).contains(&jwt.ttl_minutes) {
            anyhow::bail!(
                "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {}",
                jwt.ttl_minutes
            );
        }

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: parse_or(&lookup, "ARGON2_MEMORY_KIB", defaults.memory_kib),
            iterations: parse_or(&lookup, "ARGON2_ITERATIONS", defaults.iterations),
            parallelism: parse_or(&lookup, "ARGON2_PARALLELISM", defaults.parallelism),
        };

        Ok(Self {
            database_url,
            jwt,
            password,
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "APP_PORT", 8080),
        })
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
