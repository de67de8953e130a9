use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chatgate_core::{CoreResult, RateLimitPolicy, SigningSecret};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_registry_ttl_minutes")]
    pub registry_ttl_minutes: u64,
    /// Key clients by `X-Forwarded-For` / `X-Real-IP` instead of the peer address.
    /// Only safe behind a proxy that overwrites these headers.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_token_ttl_hours() -> u64 { 5 }
fn default_window_seconds() -> u64 { 60 }
fn default_max_requests() -> u32 { 20 }
fn default_registry_ttl_minutes() -> u64 { 1440 }
fn default_max_body_bytes() -> usize { 1024 * 1024 }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
            max_requests: default_max_requests(),
            registry_ttl_minutes: default_registry_ttl_minutes(),
            trust_forwarded_headers: false,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { max_body_bytes: default_max_body_bytes() }
    }
}

impl AuthConfig {
    pub fn signing_secret(&self) -> CoreResult<SigningSecret> {
        SigningSecret::new(self.jwt_secret.as_bytes())
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours.saturating_mul(3600))
    }
}

impl RateLimitConfig {
    pub fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            window: Duration::from_secs(self.window_seconds),
            max_requests: self.max_requests,
            registry_ttl: Duration::from_secs(self.registry_ttl_minutes.saturating_mul(60)),
        }
    }
}

const MAX_TOKEN_TTL_HOURS: u64 = 365 * 24;
const MAX_WINDOW_SECONDS: u64 = 24 * 3600;
const MAX_REGISTRY_TTL_MINUTES: u64 = 365 * 24 * 60;

const WEAK_SECRETS: &[&str] = &[
    "change-me-to-a-random-secret",
    "secret",
    "password",
    "jwt-secret",
    "jwtKey",
];

impl ServerConfig {
    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Loads the TOML file named by `CHATGATE_CONFIG` (if set), applies
    /// `CHATGATE_*` environment overrides and validates the result.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("CHATGATE_CONFIG").map(PathBuf::from) {
            Ok(path) => {
                let contents = std::fs::read_to_string(&path)?;
                tracing::info!("Loaded configuration from {}", path.display());
                Self::from_toml_str(&contents)?
            }
            Err(_) => Self::from_toml_str("")?,
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(addr) = lookup("CHATGATE_BIND_ADDR") {
            self.bind_addr = addr.parse()?;
        }
        if let Some(secret) = lookup("CHATGATE_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(hours) = lookup("CHATGATE_TOKEN_TTL_HOURS") {
            self.auth.token_ttl_hours = hours.parse()?;
        }
        if let Some(secs) = lookup("CHATGATE_RATE_WINDOW_SECONDS") {
            self.rate_limit.window_seconds = secs.parse()?;
        }
        if let Some(max) = lookup("CHATGATE_RATE_MAX_REQUESTS") {
            self.rate_limit.max_requests = max.parse()?;
        }
        if let Some(flag) = lookup("CHATGATE_TRUST_FORWARDED") {
            self.rate_limit.trust_forwarded_headers = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// Refuses to start without a usable signing secret or with a degenerate rate limit.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth.jwt_secret.is_empty() {
            anyhow::bail!(
                "No JWT signing secret configured. \
                 Set CHATGATE_JWT_SECRET or auth.jwt_secret in the config file."
            );
        }
        if WEAK_SECRETS.iter().any(|&w| self.auth.jwt_secret == w) {
            anyhow::bail!(
                "JWT secret matches a known weak/placeholder value. \
                 Set a strong random secret via CHATGATE_JWT_SECRET."
            );
        }
        if self.auth.jwt_secret.len() < 32 {
            tracing::warn!(
                "JWT secret is shorter than 32 characters. \
                 Consider using a stronger secret via CHATGATE_JWT_SECRET."
            );
        }
        if self.auth.token_ttl_hours == 0 {
            anyhow::bail!("auth.token_ttl_hours must be greater than zero");
        }
        if self.auth.token_ttl_hours > MAX_TOKEN_TTL_HOURS {
            anyhow::bail!("auth.token_ttl_hours must be at most {MAX_TOKEN_TTL_HOURS}");
        }

        let rl = &self.rate_limit;
        if rl.window_seconds == 0 || rl.max_requests == 0 || rl.registry_ttl_minutes == 0 {
            anyhow::bail!(
                "rate_limit.window_seconds, max_requests and registry_ttl_minutes \
                 must all be non-zero"
            );
        }
        if rl.window_seconds > MAX_WINDOW_SECONDS {
            anyhow::bail!("rate_limit.window_seconds must be at most {MAX_WINDOW_SECONDS}");
        }
        if rl.registry_ttl_minutes > MAX_REGISTRY_TTL_MINUTES {
            anyhow::bail!(
                "rate_limit.registry_ttl_minutes must be at most {MAX_REGISTRY_TTL_MINUTES}"
            );
        }
        Ok(())
    }
}
