//! API configuration module.
//!
//! Configuration is layered: built-in defaults, then an optional
//! `medtrack.toml` next to the binary, then `MEDTRACK_*` environment
//! variables (e.g. `MEDTRACK_PORT=9000`, `MEDTRACK_CORS_ORIGINS=a,b`).

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "medtrack.toml";
const DEV_SECRET: &str = "medtrack-dev-secret-change-in-production";

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Interface to bind
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// SQLite database file
    pub database_path: String,

    /// Pool size
    pub max_connections: u32,

    /// Secret key for signing session tokens
    pub jwt_secret: String,

    /// Upper bound on a session's lifetime in minutes. The pharmacy's own
    /// session timeout applies when it is shorter.
    pub session_max_minutes: i64,

    /// Mark the session cookie `Secure` (HTTPS only)
    pub cookie_secure: bool,

    /// Allowed browser origins; empty means same-origin only
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_path: "./medtrack.db".to_string(),
            max_connections: 5,
            jwt_secret: DEV_SECRET.to_string(),
            session_max_minutes: 12 * 60,
            cookie_secure: false,
            cors_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `medtrack.toml` (optional) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix("MEDTRACK")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_origins"),
            );

        let config: ApiConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < 16 {
            return Err(ConfigError::Message("jwt_secret must be at least 16 characters".to_string()));
        }
        if self.session_max_minutes <= 0 {
            return Err(ConfigError::Message("session_max_minutes must be positive".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Message("max_connections must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_SECRET
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_defaults_are_valid() {
        let config = ApiConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.uses_dev_secret());
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let toml = r#"
            port = 9000
            database_path = "/var/lib/medtrack/medtrack.db"
            cors_origins = ["https://app.medtrack.test"]
        "#;

        let config: ApiConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.database_path, "/var/lib/medtrack/medtrack.db");
        assert_eq!(config.cors_origins, vec!["https://app.medtrack.test"]);
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = ApiConfig {
            jwt_secret: "short".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
