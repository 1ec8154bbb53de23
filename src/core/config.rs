//! Runtime configuration
//!
//! Values come from an optional `denobot.toml` in the working directory and
//! from the environment (environment wins). Credentials are required: the bot
//! refuses to start without `BOT_TOKEN` and `OWNER_ID`, and never falls back
//! to builtin secrets.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use strum::{Display, EnumString};
use teloxide::types::UserId;
use thiserror::Error;
use url::Url;

/// Optional config file read before the environment.
pub const CONFIG_FILE: &str = "denobot.toml";

/// Upstream endpoint used when `EXTERNAL_SERVICE_URL` is not set.
pub const DEFAULT_EXTERNAL_SERVICE_URL: &str = "https://4-0-4-gcpbydeno-27.deno.dev";

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_WEBHOOK_PATH: &str = "/webhook";
pub const DEFAULT_DATABASE_PATH: &str = "sessions.sqlite";

/// Environment keys picked up by [`Config::load`] and parsed as typed values.
const ENV_KEYS: &[&str] = &[
    "OWNER_ID",
    "API_ID",
    "EXTERNAL_SERVICE_URL",
    "PORT",
    "WEBHOOK_URL",
    "WEBHOOK_PATH",
    "SESSION_STORE",
    "DATABASE_PATH",
    "UPSTREAM_TIMEOUT_SECS",
    "STORE_MAX_RETRIES",
];

/// Credentials taken from the environment verbatim. Figment would read
/// `WEBHOOK_SECRET=007` as the number 7.
const SECRET_ENV_KEYS: &[&str] = &["BOT_TOKEN", "API_HASH", "WEBHOOK_SECRET"];

/// Upstream call configuration
pub mod upstream {
    use super::Duration;

    /// Timeout for the generate call (in seconds).
    /// The per-user mailbox is blocked for the whole call, so keep this bounded.
    pub const TIMEOUT_SECS: u64 = 30;

    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}

/// Session store retry configuration
pub mod store {
    use super::Duration;

    /// Attempts after the first failure before a store error is surfaced
    pub const MAX_RETRIES: usize = 3;

    /// First backoff delay (in milliseconds)
    pub const MIN_DELAY_MS: u64 = 100;

    /// Upper bound for a single backoff delay (in seconds)
    pub const MAX_DELAY_SECS: u64 = 2;

    pub fn min_delay() -> Duration {
        Duration::from_millis(MIN_DELAY_MS)
    }

    pub fn max_delay() -> Duration {
        Duration::from_secs(MAX_DELAY_SECS)
    }
}

/// Per-user dispatcher configuration
pub mod dispatcher {
    use super::Duration;

    /// A mailbox with no queued work for this long is shut down (in seconds).
    /// The next update from that user starts a fresh one.
    pub const MAILBOX_IDLE_SECS: u64 = 300;

    pub fn mailbox_idle() -> Duration {
        Duration::from_secs(MAILBOX_IDLE_SECS)
    }
}

/// Long polling configuration
pub mod polling {
    use super::Duration;

    /// Long-poll timeout passed to getUpdates (in seconds)
    pub const LONG_POLL_TIMEOUT_SECS: u32 = 30;

    /// Maximum delay between getUpdates retries after an error (in seconds)
    pub const MAX_ERROR_BACKOFF_SECS: u64 = 60;

    /// Base for exponential backoff calculation
    pub const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

    pub fn max_error_backoff() -> Duration {
        Duration::from_secs(MAX_ERROR_BACKOFF_SECS)
    }
}

/// Network configuration for the Telegram client
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API calls (in seconds). Must exceed the long-poll timeout.
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Configuration errors. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to read configuration: {0}")]
    Source(#[from] Box<figment::Error>),
}

/// Backing medium for sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StoreKind {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug)]
pub struct WebhookConfig {
    /// Public URL registered with Telegram. Required only in webhook mode.
    pub url: Option<Url>,
    /// Local route the updates are POSTed to.
    pub path: String,
    pub secret: Option<SecretString>,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub database_path: PathBuf,
    pub max_retries: usize,
}

#[derive(Debug)]
pub struct Config {
    pub bot_token: SecretString,
    pub owner_id: UserId,
    /// MTProto app credentials. Carried for transports that need them, never defaulted.
    pub api_id: Option<i32>,
    pub api_hash: Option<SecretString>,
    pub external_service_url: Url,
    pub upstream_timeout: Duration,
    pub port: u16,
    pub webhook: WebhookConfig,
    pub store: StoreConfig,
}

/// Shape of the merged providers before validation.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default, deserialize_with = "string_or_number")]
    bot_token: Option<String>,
    owner_id: Option<u64>,
    api_id: Option<i32>,
    #[serde(default, deserialize_with = "string_or_number")]
    api_hash: Option<String>,
    external_service_url: Option<String>,
    upstream_timeout_secs: Option<u64>,
    port: Option<u16>,
    webhook_url: Option<String>,
    webhook_path: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    webhook_secret: Option<String>,
    session_store: Option<String>,
    database_path: Option<String>,
    store_max_retries: Option<usize>,
}

impl Config {
    /// Loads configuration from [`CONFIG_FILE`] and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Provider stack used by [`Config::load`]: file, typed env, then raw credentials.
    pub fn figment() -> Figment {
        let secrets: BTreeMap<String, String> = Env::raw()
            .only(SECRET_ENV_KEYS)
            .iter()
            .map(|(key, value)| (key.as_str().to_ascii_lowercase(), value))
            .collect();

        Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::raw().only(ENV_KEYS))
            .merge(Serialized::defaults(secrets))
    }

    /// Extracts and validates configuration from an arbitrary provider stack.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let raw: RawConfig = figment.extract().map_err(Box::new)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let bot_token = non_empty(raw.bot_token).ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        let owner_id = raw.owner_id.ok_or(ConfigError::Missing("OWNER_ID"))?;
        if owner_id == 0 {
            return Err(ConfigError::Invalid {
                key: "OWNER_ID",
                reason: "must be a non-zero Telegram user id".to_string(),
            });
        }

        let external_service_url = parse_url(
            "EXTERNAL_SERVICE_URL",
            non_empty(raw.external_service_url)
                .as_deref()
                .unwrap_or(DEFAULT_EXTERNAL_SERVICE_URL),
        )?;

        let webhook_url = non_empty(raw.webhook_url)
            .map(|u| parse_url("WEBHOOK_URL", &u))
            .transpose()?;

        let mut webhook_path = non_empty(raw.webhook_path).unwrap_or_else(|| DEFAULT_WEBHOOK_PATH.to_string());
        if !webhook_path.starts_with('/') {
            webhook_path.insert(0, '/');
        }
        if webhook_path == "/health" {
            return Err(ConfigError::Invalid {
                key: "WEBHOOK_PATH",
                reason: "collides with the health endpoint".to_string(),
            });
        }

        let kind = match non_empty(raw.session_store) {
            Some(value) => value.parse::<StoreKind>().map_err(|_| ConfigError::Invalid {
                key: "SESSION_STORE",
                reason: format!("unknown store '{}', expected sqlite or memory", value),
            })?,
            None => StoreKind::default(),
        };

        let upstream_timeout = match raw.upstream_timeout_secs {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    key: "UPSTREAM_TIMEOUT_SECS",
                    reason: "must be greater than zero".to_string(),
                })
            }
            Some(secs) => Duration::from_secs(secs),
            None => upstream::timeout(),
        };

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            owner_id: UserId(owner_id),
            api_id: raw.api_id,
            api_hash: non_empty(raw.api_hash).map(SecretString::from),
            external_service_url,
            upstream_timeout,
            port: raw.port.unwrap_or(DEFAULT_PORT),
            webhook: WebhookConfig {
                url: webhook_url,
                path: webhook_path,
                secret: non_empty(raw.webhook_secret).map(SecretString::from),
            },
            store: StoreConfig {
                kind,
                database_path: PathBuf::from(
                    non_empty(raw.database_path).unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
                ),
                max_retries: raw.store_max_retries.unwrap_or(store::MAX_RETRIES),
            },
        })
    }

    /// Webhook URL, required when running in webhook mode.
    pub fn require_webhook_url(&self) -> Result<&Url, ConfigError> {
        self.webhook.url.as_ref().ok_or(ConfigError::Missing("WEBHOOK_URL"))
    }
}

/// Accepts a scalar of any type as text, so `webhook_secret = 123456` in TOML
/// is the string "123456".
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
        Scalar::Text(text) => text,
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Signed(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn from_toml(toml: &str) -> Result<Config, ConfigError> {
        Config::from_figment(Figment::from(Toml::string(toml)))
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = from_toml(
            r#"
            bot_token = "123:abc"
            owner_id = 42
            "#,
        )
        .unwrap();

        assert_eq!(config.bot_token.expose_secret(), "123:abc");
        assert_eq!(config.owner_id, UserId(42));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.external_service_url.as_str(), "https://4-0-4-gcpbydeno-27.deno.dev/");
        assert_eq!(config.webhook.path, "/webhook");
        assert!(config.webhook.url.is_none());
        assert_eq!(config.store.kind, StoreKind::Sqlite);
        assert_eq!(config.store.max_retries, store::MAX_RETRIES);
        assert_eq!(config.upstream_timeout, upstream::timeout());
        assert!(config.api_id.is_none());
    }

    #[test]
    fn test_missing_bot_token_is_fatal() {
        let err = from_toml("owner_id = 42").unwrap_err();
        assert!(matches!(err, ConfigError::Missing("BOT_TOKEN")));
    }

    #[test]
    fn test_blank_bot_token_counts_as_missing() {
        let err = from_toml(
            r#"
            bot_token = "   "
            owner_id = 42
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("BOT_TOKEN")));
    }

    #[test]
    fn test_missing_owner_id_is_fatal() {
        let err = from_toml(r#"bot_token = "123:abc""#).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("OWNER_ID")));
    }

    #[test]
    fn test_invalid_external_url_rejected() {
        let err = from_toml(
            r#"
            bot_token = "123:abc"
            owner_id = 42
            external_service_url = "not a url"
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "EXTERNAL_SERVICE_URL",
                ..
            }
        ));
    }

    #[test]
    fn test_full_config() {
        let config = from_toml(
            r#"
            bot_token = "123:abc"
            owner_id = 1273
            api_id = 777
            api_hash = "hash"
            external_service_url = "http://localhost:9000/generate"
            port = 9090
            webhook_url = "https://bot.example.com/hook"
            webhook_path = "hook"
            webhook_secret = "s3cret"
            session_store = "Memory"
            database_path = "/tmp/s.sqlite"
            upstream_timeout_secs = 5
            store_max_retries = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.api_id, Some(777));
        assert_eq!(config.api_hash.as_ref().map(|h| h.expose_secret().to_string()), Some("hash".to_string()));
        assert_eq!(config.port, 9090);
        assert_eq!(config.webhook.path, "/hook");
        assert_eq!(
            config.require_webhook_url().unwrap().as_str(),
            "https://bot.example.com/hook"
        );
        assert_eq!(config.store.kind, StoreKind::Memory);
        assert_eq!(config.store.database_path, PathBuf::from("/tmp/s.sqlite"));
        assert_eq!(config.store.max_retries, 1);
        assert_eq!(config.upstream_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_unknown_store_kind_rejected() {
        let err = from_toml(
            r#"
            bot_token = "123:abc"
            owner_id = 42
            session_store = "redis"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SESSION_STORE", .. }));
    }

    #[test]
    fn test_webhook_url_required_only_on_demand() {
        let config = from_toml(
            r#"
            bot_token = "123:abc"
            owner_id = 42
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.require_webhook_url(),
            Err(ConfigError::Missing("WEBHOOK_URL"))
        ));
    }

    #[test]
    fn test_webhook_path_cannot_shadow_health() {
        let err = from_toml(
            r#"
            bot_token = "123:abc"
            owner_id = 42
            webhook_path = "/health"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "WEBHOOK_PATH", .. }));
    }

    #[test]
    fn test_numeric_secrets_in_toml_are_text() {
        let config = from_toml(
            r#"
            bot_token = "123:abc"
            owner_id = 42
            api_hash = 1234567890
            webhook_secret = 123456
            "#,
        )
        .unwrap();

        assert_eq!(
            config.webhook.secret.as_ref().map(|s| s.expose_secret().to_string()),
            Some("123456".to_string())
        );
        assert_eq!(
            config.api_hash.as_ref().map(|h| h.expose_secret().to_string()),
            Some("1234567890".to_string())
        );
    }

    #[test]
    fn test_load_reads_environment() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("BOT_TOKEN", "123:abc");
            jail.set_env("OWNER_ID", "1273841502");
            jail.set_env("PORT", "9001");
            jail.set_env("WEBHOOK_SECRET", "123456");
            jail.set_env("API_HASH", "0012345678");
            jail.set_env("SESSION_STORE", "memory");

            let config = Config::load().map_err(|e| e.to_string())?;

            assert_eq!(config.bot_token.expose_secret(), "123:abc");
            assert_eq!(config.owner_id, UserId(1273841502));
            assert_eq!(config.port, 9001);
            assert_eq!(config.store.kind, StoreKind::Memory);
            assert_eq!(
                config.webhook.secret.as_ref().map(|s| s.expose_secret().to_string()),
                Some("123456".to_string())
            );
            // Leading zeros survive because credentials bypass value parsing.
            assert_eq!(
                config.api_hash.as_ref().map(|h| h.expose_secret().to_string()),
                Some("0012345678".to_string())
            );
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_config_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                bot_token = "from-file"
                owner_id = 1
                port = 7000
                "#,
            )?;
            jail.set_env("BOT_TOKEN", "from-env");
            jail.set_env("OWNER_ID", "2");

            let config = Config::load().map_err(|e| e.to_string())?;

            assert_eq!(config.bot_token.expose_secret(), "from-env");
            assert_eq!(config.owner_id, UserId(2));
            assert_eq!(config.port, 7000);
            Ok(())
        });
    }

    #[test]
    fn test_load_without_token_fails() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("OWNER_ID", "42");

            match Config::load() {
                Err(ConfigError::Missing("BOT_TOKEN")) => Ok(()),
                other => Err(format!("unexpected result: {:?}", other.map(|_| ())).into()),
            }
        });
    }

    #[test]
    fn test_debug_output_redacts_token() {
        let config = from_toml(
            r#"
            bot_token = "123:very-secret"
            owner_id = 42
            "#,
        )
        .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("very-secret"));
    }
}
