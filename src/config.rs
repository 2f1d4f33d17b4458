use std::{collections::HashMap, time::Duration};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use redis::{
    Client as RedisClient, RedisResult,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::mid::{DEMO_HOST_URL, DEMO_RELYING_PARTY_NAME, DEMO_RELYING_PARTY_UUID, Language};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub mid: MidConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for request bodies, which caps uploaded documents.
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub expiry_minutes: i64,
    pub max_sessions: usize,
}

/// Mobile-ID relying party settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MidConfig {
    pub host_url: String,
    pub relying_party_uuid: SecretString,
    pub relying_party_name: String,
    pub auth_display_text: String,
    pub sign_display_text: String,
    pub language: Language,
    /// Long polling timeout sent with every session status query.
    pub poll_timeout_ms: u64,
    /// Pause between two session status queries.
    pub poll_interval_ms: u64,
    /// Overall deadline for a session to reach a final state.
    pub session_timeout_secs: u64,
    /// PEM files of the CA certificates that may issue user certificates.
    #[serde(default)]
    pub trusted_certificates: Vec<String>,
}

impl MidConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub uri: SecretString,
}

impl RedisConfig {
    /// Establishes a new Redis connection based on the provided URI.
    ///
    /// - To enable TLS, the URI must use the `rediss://` scheme.
    /// - To enable insecure TLS, the URI must use the `rediss://` scheme and end with `/#insecure`.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn start(&self) -> RedisResult<ConnectionManager> {
        let client = RedisClient::open(self.uri.expose_secret())?;
        let config = ConnectionManagerConfig::new().set_connection_timeout(Duration::from_secs(60));
        client.get_connection_manager_with_config(config).await
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("server.host", "localhost")?
            .set_default("server.port", 3000)?
            .set_default("server.max_upload_bytes", 10 * 1024 * 1024)?
            .set_default("session.expiry_minutes", 15)?
            .set_default("session.max_sessions", 100_000)?
            .set_default("mid.host_url", DEMO_HOST_URL)?
            .set_default("mid.relying_party_uuid", DEMO_RELYING_PARTY_UUID)?
            .set_default("mid.relying_party_name", DEMO_RELYING_PARTY_NAME)?
            .set_default("mid.auth_display_text", "Log in to MID demo?")?
            .set_default("mid.sign_display_text", "Sign document?")?
            .set_default("mid.language", "ENG")?
            .set_default("mid.poll_timeout_ms", 30_000)?
            .set_default("mid.poll_interval_ms", 500)?
            .set_default("mid.session_timeout_secs", 120)?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Should be in the format APP_SERVER__HOST or APP_MID__HOST_URL
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Config {
        let env_vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Config::load_with_sources(Some(env_vars)).expect("Failed to load config")
    }

    #[test]
    fn test_default_config() {
        let config = load(&[]);

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.session.expiry_minutes, 15);
        assert!(config.redis.is_none());

        assert_eq!(config.mid.host_url, DEMO_HOST_URL);
        assert_eq!(
            config.mid.relying_party_uuid.expose_secret(),
            DEMO_RELYING_PARTY_UUID
        );
        assert_eq!(config.mid.language, Language::Eng);
        assert_eq!(config.mid.poll_timeout(), Duration::from_secs(30));
        assert!(config.mid.trusted_certificates.is_empty());
    }

    #[test]
    fn test_env_config() {
        let config = load(&[
            ("server.host", "0.0.0.0"),
            ("server.port", "443"),
            ("redis.uri", "rediss://localhost:6379"),
            ("mid.host_url", "https://mid.sk.ee/mid-api"),
            ("mid.relying_party_name", "ACME"),
            ("mid.language", "EST"),
            ("mid.session_timeout_secs", "60"),
        ]);

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 443);
        assert_eq!(
            config.redis.unwrap().uri.expose_secret(),
            "rediss://localhost:6379"
        );
        assert_eq!(config.mid.host_url, "https://mid.sk.ee/mid-api");
        assert_eq!(config.mid.relying_party_name, "ACME");
        assert_eq!(config.mid.language, Language::Est);
        assert_eq!(config.mid.session_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_env_override() {
        // We just override the host
        let config = load(&[("server.host", "192.168.1.1")]);

        assert_eq!(config.server.host, "192.168.1.1");
        // The other values should use default
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.mid.relying_party_name, DEMO_RELYING_PARTY_NAME);
        assert!(config.redis.is_none());
    }
}
