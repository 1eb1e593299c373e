use std::time::Duration;

use crate::errors::AppError;
use crate::jwt::JwtConfig;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "prod" | "production" => Environment::Production,
            _ => Environment::Local,
        }
    }
}

/// Optional TLS material; both paths must be set to serve HTTPS.
#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert: String,
    pub key: String,
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub env: Environment,
    pub request_timeout: Duration,
    pub tls: Option<TlsPaths>,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| AppError::configuration("DATABASE_URL not set"))?;

        let env = std::env::var("APP_ENV")
            .map(|value| Environment::parse(&value))
            .unwrap_or(Environment::Local);

        Ok(Self {
            database_url,
            port: port_from_env()?,
            env,
            request_timeout: request_timeout_from_env()?,
            tls: tls_from_env()?,
            jwt: JwtConfig::from_env()?,
        })
    }
}

pub fn port_from_env() -> Result<u16, AppError> {
    match std::env::var("APP_PORT") {
        Ok(value) => value
            .parse::<u16>()
            .map_err(|_| AppError::configuration("APP_PORT must be a valid port number")),
        Err(_) => Ok(DEFAULT_PORT),
    }
}

pub fn request_timeout_from_env() -> Result<Duration, AppError> {
    match std::env::var("REQUEST_TIMEOUT_SECS") {
        Ok(value) => value
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| AppError::configuration("REQUEST_TIMEOUT_SECS must be a positive integer")),
        Err(_) => Ok(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
    }
}

fn tls_from_env() -> Result<Option<TlsPaths>, AppError> {
    match (std::env::var("TLS_CERT_PATH").ok(), std::env::var("TLS_KEY_PATH").ok()) {
        (Some(cert), Some(key)) => Ok(Some(TlsPaths { cert, key })),
        (None, None) => Ok(None),
        _ => Err(AppError::configuration("TLS_CERT_PATH and TLS_KEY_PATH must be set together")),
    }
}

pub fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_names() {
        assert_eq!(Environment::parse("prod"), Environment::Production);
        assert_eq!(Environment::parse("PRODUCTION"), Environment::Production);
        assert_eq!(Environment::parse("local"), Environment::Local);
        assert_eq!(Environment::parse("staging"), Environment::Local);
    }
}
