//! Application configuration management.
//!
//! Configuration is assembled from three layers, later layers overriding earlier ones:
//!
//! 1. **Built-in defaults** - a local PostgreSQL at `postgres@localhost:5432/datasync`
//! 2. **Environment variables** - `DSCTL_`-prefixed variables (nested with `__`), plus the
//!    legacy names the DataSync deployment scripts already export (see below)
//! 3. **JSON config file** - `config.json` by default, or the path given by `-f`/`DSCTL_CONFIG`.
//!    A missing file is not an error.
//!
//! ## Legacy environment variables
//!
//! | Variable | Config key |
//! |---|---|
//! | `NODE_ENV` | `environment` |
//! | `PORT` | `port` |
//! | `JWT_SECRET` | `secret_key` |
//! | `JWT_EXPIRES_IN` | `auth.jwt_expiry` (humantime, e.g. `24h`) |
//! | `DEFAULT_ADMIN_PASSWORD` | `admin_password` |
//! | `POSTGRES_HOST` / `POSTGRES_PORT` | `database.host` / `database.port` |
//! | `POSTGRES_DATABASE` / `POSTGRES_USER` / `POSTGRES_PASSWORD` | `database.database` / `database.user` / `database.password` |
//! | `DATABASE_URL` | `database.url` (takes precedence over the individual parts) |
//! | `ALLOWED_ORIGINS` | `cors.allowed_origins` (comma-separated) |
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use dsctl::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Json},
};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::{path::PathBuf, time::Duration};
use url::Url;

use crate::errors::Error;

/// Signing secret used outside production when none is configured.
const DEVELOPMENT_SECRET: &str = "datasync-development-secret";

/// Environment variables understood for compatibility with existing deployments.
const LEGACY_ENV_VARS: &[&str] = &[
    "NODE_ENV",
    "PORT",
    "JWT_SECRET",
    "JWT_EXPIRES_IN",
    "DEFAULT_ADMIN_PASSWORD",
    "POSTGRES_HOST",
    "POSTGRES_PORT",
    "POSTGRES_DATABASE",
    "POSTGRES_USER",
    "POSTGRES_PASSWORD",
    "DATABASE_URL",
    "ALLOWED_ORIGINS",
];

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "DSCTL_CONFIG", default_value = "config.json")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Deployment environment (`development`, `production`, `test`)
    pub environment: String,
    /// PostgreSQL connection settings
    pub database: DatabaseConfig,
    /// Password for the bootstrap `ADMIN` account (defaults to `ADMIN`)
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    /// Secret key for JWT signing (required in production)
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// Session and password settings
    pub auth: AuthConfig,
    /// CORS settings for the browser console
    pub cors: CorsConfig,
    /// Per-client request throttles
    pub rate_limits: RateLimitConfig,
    /// Where uploaded files are written
    pub storage: StorageConfig,
    /// Expose Prometheus metrics at `/internal/metrics`
    pub enable_metrics: bool,
    /// Log output format
    pub log_format: LogFormat,
}

/// Individual pool configuration with all SQLx parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

/// PostgreSQL connection settings.
///
/// Either a full `url`, or the individual parts. The url wins when both are set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    #[serde(deserialize_with = "lenient_required_string")]
    pub database: String,
    #[serde(deserialize_with = "lenient_required_string")]
    pub user: String,
    #[serde(deserialize_with = "lenient_string", skip_serializing)]
    pub password: Option<String>,
    pub pool: PoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            database: "datasync".to_string(),
            user: "postgres".to_string(),
            password: None,
            pool: PoolSettings::default(),
        }
    }
}

impl DatabaseConfig {
    /// Build sqlx connect options from either the url or the individual parts.
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        if let Some(url) = &self.url {
            return url.parse();
        }

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user);
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        Ok(options)
    }
}

/// Session token and password settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// JWT token expiry duration
    #[serde(with = "humantime_serde")]
    pub jwt_expiry: Duration,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
    /// Password validation rules
    pub password: PasswordConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_expiry: Duration::from_secs(24 * 60 * 60), // 24 hours
            bcrypt_cost: 10,
            password: PasswordConfig::default(),
        }
    }
}

/// Password validation rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    /// Minimum password length
    pub min_length: usize,
    /// Maximum password length (bcrypt only reads the first 72 bytes)
    pub max_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 64,
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins, as a list or a comma-separated string
    #[serde(deserialize_with = "origins_from_list_or_csv")]
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: ["http://localhost:5173", "http://localhost:3000"]
                .into_iter()
                .filter_map(|origin| Url::parse(origin).ok())
                .map(CorsOrigin::Url)
                .collect(),
            allow_credentials: true,
            max_age: Some(3600), // Cache preflight for 1 hour
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://console.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

impl std::str::FromStr for CorsOrigin {
    type Err = url::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" { Ok(Self::Wildcard) } else { Url::parse(s).map(Self::Url) }
    }
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

fn origins_from_list_or_csv<'de, D>(deserializer: D) -> Result<Vec<CorsOrigin>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Origins {
        List(Vec<CorsOrigin>),
        Csv(String),
    }

    match Origins::deserialize(deserializer)? {
        Origins::List(origins) => Ok(origins),
        Origins::Csv(csv) => csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse().map_err(serde::de::Error::custom))
            .collect(),
    }
}

/// Environment values that look numeric arrive as numbers; accept them as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Str(s) => s,
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

fn lenient_required_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(String::from)
}

/// Token bucket parameters for one class of traffic.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitRule {
    /// Requests allowed per window (also the burst size)
    pub max_requests: u32,
    /// Window over which `max_requests` refills
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for RateLimitRule {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
        }
    }
}

/// Request throttles: a strict one for login attempts and a loose one for everything else.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub login: RateLimitRule,
    pub api: RateLimitRule,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            login: RateLimitRule {
                max_requests: 5,
                window: Duration::from_secs(15 * 60),
            },
            api: RateLimitRule {
                max_requests: 1000,
                window: Duration::from_secs(15 * 60),
            },
        }
    }
}

/// File storage locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory that receives uploaded CSV files
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("storage/uploads/csv"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "development".to_string(),
            database: DatabaseConfig::default(),
            admin_password: None,
            secret_key: None,
            auth: AuthConfig::default(),
            cors: CorsConfig::default(),
            rate_limits: RateLimitConfig::default(),
            storage: StorageConfig::default(),
            enable_metrics: true,
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// The JWT signing secret. Outside production a fixed development secret stands in when
    /// none is configured; `validate` rejects a missing secret in production.
    pub fn jwt_secret(&self) -> &str {
        self.secret_key.as_deref().unwrap_or(DEVELOPMENT_SECRET)
    }

    /// Password used when seeding the bootstrap admin account.
    pub fn bootstrap_admin_password(&self) -> &str {
        self.admin_password.as_deref().filter(|p| !p.is_empty()).unwrap_or("ADMIN")
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.is_production() && self.secret_key.as_deref().is_none_or(str::is_empty) {
            return Err(Error::Internal {
                operation: "Config validation: secret_key is required in production. \
                     Set JWT_SECRET or DSCTL_SECRET_KEY, or add secret_key to the config file."
                    .to_string(),
            });
        }

        let expiry = self.auth.jwt_expiry;
        if expiry < Duration::from_secs(5 * 60) || expiry > Duration::from_secs(30 * 24 * 60 * 60) {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: auth.jwt_expiry ({expiry:?}) must be between 5 minutes and 30 days"
                ),
            });
        }

        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(Error::Internal {
                operation: format!("Config validation: auth.bcrypt_cost ({}) must be between 4 and 31", self.auth.bcrypt_cost),
            });
        }

        let password = &self.auth.password;
        if password.min_length == 0 || password.min_length > password.max_length {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: Invalid password configuration: min_length ({}) must be positive and not greater than max_length ({})",
                    password.min_length, password.max_length
                ),
            });
        }

        if self.cors.allow_credentials && self.cors.allowed_origins.contains(&CorsOrigin::Wildcard) {
            return Err(Error::Internal {
                operation: "Config validation: cors.allow_credentials cannot be combined with a wildcard origin".to_string(),
            });
        }

        for (name, rule) in [("login", &self.rate_limits.login), ("api", &self.rate_limits.api)] {
            if self.rate_limits.enabled && (rule.max_requests == 0 || rule.window.is_zero()) {
                return Err(Error::Internal {
                    operation: format!("Config validation: rate_limits.{name} needs a positive max_requests and window"),
                });
            }
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Env::prefixed("DSCTL_").ignore(&["CONFIG"]).split("__"))
            .merge(Env::raw().only(LEGACY_ENV_VARS).map(|key| {
                match key.as_str().to_ascii_uppercase().as_str() {
                    "NODE_ENV" => "environment".into(),
                    "PORT" => "port".into(),
                    "JWT_SECRET" => "secret_key".into(),
                    "JWT_EXPIRES_IN" => "auth.jwt_expiry".into(),
                    "DEFAULT_ADMIN_PASSWORD" => "admin_password".into(),
                    "POSTGRES_HOST" => "database.host".into(),
                    "POSTGRES_PORT" => "database.port".into(),
                    "POSTGRES_DATABASE" => "database.database".into(),
                    "POSTGRES_USER" => "database.user".into(),
                    "POSTGRES_PASSWORD" => "database.password".into(),
                    "DATABASE_URL" => "database.url".into(),
                    "ALLOWED_ORIGINS" => "cors.allowed_origins".into(),
                    other => other.to_string().into(),
                }
            }))
            // The config file, when present, has the final say
            .merge(Json::file(&args.config))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
