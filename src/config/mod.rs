use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub port: u16,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub query: QueryConfig,
    pub payments: PaymentConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Fully resolved connection string. `None` runs against the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expires_in: Duration,
    pub jwt_cookie_expires_in_days: i64,
    pub password_reset_expires_minutes: i64,
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub default_limit: u32,
    pub max_limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub stripe_secret_key: Option<String>,
    pub stripe_public_key: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so tests never touch process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").or_else(|| lookup("NODE_ENV")).as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        let config = match environment {
            Environment::Production => Self::production(),
            Environment::Development => Self::development(),
        }
        .with_overrides(&lookup)?;

        if config.security.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        Ok(config)
    }

    fn with_overrides<F>(mut self, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PORT") {
            self.port = parse_value("PORT", &v)?;
        }

        // DATABASE carries a <PASSWORD> placeholder; DATABASE_URL is taken verbatim
        if let Some(template) = lookup("DATABASE") {
            let password = lookup("DATABASE_PASSWORD").unwrap_or_default();
            self.database.url = Some(substitute_password(&template, &password));
        } else if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_value("DATABASE_MAX_CONNECTIONS", &v)?;
        }

        if let Some(v) = lookup("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Some(v) = lookup("JWT_EXPIRES_IN") {
            self.security.jwt_expires_in = parse_duration(&v)
                .ok_or(ConfigError::Invalid { key: "JWT_EXPIRES_IN", value: v })?;
        }
        if let Some(v) = lookup("JWT_COOKIE_EXPIRES_IN") {
            self.security.jwt_cookie_expires_in_days = parse_value("JWT_COOKIE_EXPIRES_IN", &v)?;
        }
        if let Some(v) = lookup("PASSWORD_RESET_EXPIRES_MINUTES") {
            self.security.password_reset_expires_minutes =
                parse_value("PASSWORD_RESET_EXPIRES_MINUTES", &v)?;
        }

        if let Some(v) = lookup("QUERY_DEFAULT_LIMIT") {
            self.query.default_limit = parse_value("QUERY_DEFAULT_LIMIT", &v)?;
        }
        if let Some(v) = lookup("QUERY_MAX_LIMIT") {
            self.query.max_limit = Some(parse_value("QUERY_MAX_LIMIT", &v)?);
        }

        if let Some(v) = lookup("STRIPE_SECRET_KEY") {
            self.payments.stripe_secret_key = Some(v);
        }
        if let Some(v) = lookup("STRIPE_PUBLIC_KEY") {
            self.payments.stripe_public_key = Some(v);
        }

        Ok(self)
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            port: 3000,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expires_in: Duration::from_secs(90 * 24 * 60 * 60),
                jwt_cookie_expires_in_days: 90,
                password_reset_expires_minutes: 10,
                secure_cookies: false,
            },
            query: QueryConfig {
                default_limit: 100,
                max_limit: Some(1000),
            },
            payments: PaymentConfig {
                stripe_secret_key: None,
                stripe_public_key: None,
            },
        }
    }

    pub fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.database.max_connections = 50;
        config.security.secure_cookies = true;
        config.query.max_limit = Some(500);
        config
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

/// Replaces the `<PASSWORD>` placeholder of a connection string template.
pub fn substitute_password(template: &str, password: &str) -> String {
    template.replace("<PASSWORD>", password)
}

/// Parses token lifetimes such as `90d`, `12h`, `30m`, `45s` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: u64 = digits.parse().ok()?;
    let seconds = match unit.trim() {
        "" | "s" => amount,
        "m" => amount.checked_mul(60)?,
        "h" => amount.checked_mul(60 * 60)?,
        "d" => amount.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };
    Some(Duration::from_secs(seconds))
}
