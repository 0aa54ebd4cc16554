use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

use studyhall_api::MAX_TOKEN_TTL_DAYS;
use thiserror::Error;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("STUDYHALL_JWT_SECRET is unset or still a placeholder")]
    InsecureSecret,
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub moderators: HashSet<String>,
    pub token_ttl_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = var("STUDYHALL_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::InsecureSecret);
        }

        let db_path = var("STUDYHALL_DB_PATH").unwrap_or_else(|| "studyhall.db".into());
        let host = var("STUDYHALL_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = var("STUDYHALL_PORT").unwrap_or_else(|| "3000".into());
        let addr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name: "STUDYHALL_HOST/STUDYHALL_PORT",
                value: format!("{host}:{port}"),
            })?;

        let token_ttl_days = match var("STUDYHALL_TOKEN_TTL_DAYS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|days| (1..=MAX_TOKEN_TTL_DAYS).contains(days))
                .ok_or(ConfigError::Invalid {
                    name: "STUDYHALL_TOKEN_TTL_DAYS",
                    value: raw,
                })?,
            None => 30,
        };

        let moderators = var("STUDYHALL_MODERATORS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect();

        Ok(Self {
            jwt_secret,
            db_path: db_path.into(),
            addr,
            moderators,
            token_ttl_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[("STUDYHALL_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("studyhall.db"));
        assert_eq!(config.addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.token_ttl_days, 30);
        assert!(config.moderators.is_empty());
    }

    #[test]
    fn rejects_missing_or_placeholder_secret() {
        assert!(matches!(load(&[]), Err(ConfigError::InsecureSecret)));
        assert!(matches!(
            load(&[("STUDYHALL_JWT_SECRET", "dev-secret-change-me")]),
            Err(ConfigError::InsecureSecret)
        ));
    }

    #[test]
    fn parses_moderators_and_overrides() {
        let config = load(&[
            ("STUDYHALL_JWT_SECRET", "s3cret"),
            ("STUDYHALL_MODERATORS", " preceptor, ta ,,"),
            ("STUDYHALL_HOST", "127.0.0.1"),
            ("STUDYHALL_PORT", "8080"),
            ("STUDYHALL_TOKEN_TTL_DAYS", "7"),
        ])
        .unwrap();
        assert_eq!(config.moderators.len(), 2);
        assert!(config.moderators.contains("ta"));
        assert_eq!(config.addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.token_ttl_days, 7);
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(load(&[("STUDYHALL_JWT_SECRET", "s"), ("STUDYHALL_PORT", "http")]).is_err());
        assert!(load(&[("STUDYHALL_JWT_SECRET", "s"), ("STUDYHALL_TOKEN_TTL_DAYS", "0")]).is_err());
    }

    #[test]
    fn token_ttl_is_capped() {
        let max = MAX_TOKEN_TTL_DAYS.to_string();
        let config = load(&[("STUDYHALL_JWT_SECRET", "s"), ("STUDYHALL_TOKEN_TTL_DAYS", &max)]).unwrap();
        assert_eq!(config.token_ttl_days, MAX_TOKEN_TTL_DAYS);

        let too_long = (MAX_TOKEN_TTL_DAYS + 1).to_string();
        assert!(load(&[("STUDYHALL_JWT_SECRET", "s"), ("STUDYHALL_TOKEN_TTL_DAYS", &too_long)]).is_err());
        assert!(load(&[
            ("STUDYHALL_JWT_SECRET", "s"),
            ("STUDYHALL_TOKEN_TTL_DAYS", "9223372036854775807"),
        ])
        .is_err());
    }
}
