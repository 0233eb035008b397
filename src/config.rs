use chrono::Duration;
use std::env;
use std::fmt;

use crate::auth::password::DEFAULT_BCRYPT_COST;
use crate::auth::rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECS};
use crate::security::csrf::generate_token;
use crate::security::validators::validate_admin_code;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        *self == Environment::Development
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "{} has an invalid value: {}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Credentials for the admin account created at startup.
#[derive(Clone)]
pub struct AdminBootstrap {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct Config {
    pub environment: Environment,
    pub server_host: String,
    pub server_port: u16,
    pub database_url: Option<String>,
    pub allow_memory_store: bool,
    pub jwt_secret: String,
    /// True when `jwt_secret` was generated for this process.
    pub jwt_secret_generated: bool,
    pub jwt_ttl: Duration,
    pub bcrypt_cost: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_requests: u32,
    pub csrf_enabled: bool,
    pub cors_allowed_origin: Option<String>,
    pub admin_invite_code: Option<String>,
    pub phone_pattern: Option<String>,
    pub admin: Option<AdminBootstrap>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("allow_memory_store", &self.allow_memory_store)
            .field("jwt_ttl", &self.jwt_ttl)
            .field("rate_limit_window_secs", &self.rate_limit_window_secs)
            .field("rate_limit_max_requests", &self.rate_limit_max_requests)
            .field("csrf_enabled", &self.csrf_enabled)
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        },
    }
}

impl Config {
    /// Reads the process environment. Call `dotenv::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lookup = move |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match lookup("APP_ENV").as_deref().map(str::trim) {
            None | Some("production") | Some("prod") => Environment::Production,
            Some("development") | Some("dev") => Environment::Development,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "APP_ENV",
                    value: other.to_string(),
                })
            }
        };

        let (jwt_secret, jwt_secret_generated) = match lookup("JWT_SECRET") {
            Some(secret) => (secret, false),
            None if environment.is_development() => (generate_token(), true),
            None => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        let jwt_hours: i64 = parse(&lookup, "JWT_EXPIRES_IN_HOURS", 24)?;
        if jwt_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "JWT_EXPIRES_IN_HOURS",
                value: jwt_hours.to_string(),
            });
        }

        let bcrypt_cost: u32 = parse(&lookup, "BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        let rate_limit_window_secs: u64 =
            parse(&lookup, "RATE_LIMIT_WINDOW_SECS", DEFAULT_WINDOW_SECS)?;
        let rate_limit_max_requests: u32 =
            parse(&lookup, "RATE_LIMIT_MAX_REQUESTS", DEFAULT_MAX_REQUESTS)?;
        if rate_limit_window_secs == 0 || rate_limit_max_requests == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_MAX_REQUESTS",
                value: format!("{} per {}s", rate_limit_max_requests, rate_limit_window_secs),
            });
        }

        let admin_invite_code = lookup("ADMIN_INVITE_CODE").map(|c| c.trim().to_string());
        if let Some(code) = &admin_invite_code {
            if !validate_admin_code(code) {
                return Err(ConfigError::Invalid {
                    key: "ADMIN_INVITE_CODE",
                    value: "<redacted>".into(),
                });
            }
        }

        let admin = match (lookup("ADMIN_EMAIL"), lookup("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                name: lookup("ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
                email,
                password,
            }),
            (None, None) => None,
            (None, Some(_)) => return Err(ConfigError::Missing("ADMIN_EMAIL")),
            (Some(_), None) => return Err(ConfigError::Missing("ADMIN_PASSWORD")),
        };

        Ok(Self {
            environment,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            server_port: parse(&lookup, "SERVER_PORT", 8080)?,
            database_url: lookup("DATABASE_URL"),
            allow_memory_store: parse_bool(
                &lookup,
                "ALLOW_MEMORY_STORE",
                environment.is_development(),
            )?,
            jwt_secret,
            jwt_secret_generated,
            jwt_ttl: Duration::hours(jwt_hours),
            bcrypt_cost,
            rate_limit_window_secs,
            rate_limit_max_requests,
            csrf_enabled: parse_bool(&lookup, "CSRF_ENABLED", true)?,
            cors_allowed_origin: lookup("CORS_ALLOWED_ORIGIN"),
            admin_invite_code,
            phone_pattern: lookup("PHONE_PATTERN"),
            admin,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}
