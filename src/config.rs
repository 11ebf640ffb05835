use std::path::PathBuf;

use log::*;
use thiserror::Error;

const DEFAULT_BIND: &str = "0.0.0.0:5000";
const DEFAULT_STATIC_DIR: &str = "static";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),
}

/**
 * Process-wide configuration, populated once at startup and handed to the
 * components that need it.
 */
#[derive(Clone, Debug)]
pub struct Config {
    pub db_host: String,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub bind: String,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /**
     * Build the configuration from any lookup function
     *
     * The environment is the only production source, but tests can hand in
     * a plain map instead.
     */
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            db_host: require(&lookup, "DB_HOST")?,
            db_name: require(&lookup, "DB_NAME")?,
            db_user: require(&lookup, "DB_USER")?,
            db_password: require(&lookup, "DB_PASSWORD")?,
            bind: optional(&lookup, "HTTP_BIND", DEFAULT_BIND),
            static_dir: optional(&lookup, "STATIC_DIR", DEFAULT_STATIC_DIR).into(),
        })
    }
}

fn require<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or(ConfigError::Missing(key))
}

fn optional<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| {
        info!("{} not set, using default: {}", key, default);
        default.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn full_environment() {
        let vars = env(&[
            ("DB_HOST", "db.example.com"),
            ("DB_NAME", "votes"),
            ("DB_USER", "ballot"),
            ("DB_PASSWORD", "hunter2"),
            ("HTTP_BIND", "127.0.0.1:8080"),
            ("STATIC_DIR", "/srv/www"),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).cloned()).expect("should parse");

        assert_eq!(config.db_host, "db.example.com");
        assert_eq!(config.db_name, "votes");
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.static_dir, PathBuf::from("/srv/www"));
    }

    #[test]
    fn missing_required_variable() {
        let vars = env(&[("DB_HOST", "db"), ("DB_NAME", "votes"), ("DB_USER", "ballot")]);
        let err = Config::from_lookup(|key| vars.get(key).cloned()).unwrap_err();

        assert!(matches!(err, ConfigError::Missing("DB_PASSWORD")));
    }

    #[test]
    fn defaults_for_optional_variables() {
        let vars = env(&[
            ("DB_HOST", "db"),
            ("DB_NAME", "votes"),
            ("DB_USER", "ballot"),
            ("DB_PASSWORD", "hunter2"),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).cloned()).expect("should parse");

        assert_eq!(config.bind, "0.0.0.0:5000");
        assert_eq!(config.static_dir, PathBuf::from("static"));
    }
}
