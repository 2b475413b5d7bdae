//! Configuration types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::identity::AdminIdentity;

/// Value of `GATEKEEPER_DB_PATH` that selects the in-memory store.
pub const IN_MEMORY_DB: &str = ":memory:";

/// Where user records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

/// How updates reach the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateMode {
    /// Long-poll `getUpdates`.
    Polling,
    /// Telegram pushes to `url`; the receiver listens on `port`.
    Webhook {
        url: String,
        port: u16,
        secret: Option<String>,
    },
}

/// Gatekeeper process configuration, loaded once at startup.
#[derive(Clone)]
pub struct GatekeeperConfig {
    pub bot_token: SecretString,
    pub admin: AdminIdentity,
    pub mode: UpdateMode,
    pub store: StoreLocation,
    /// Upper bound on every store call.
    pub store_timeout: Duration,
    /// Upper bound on every outbound transport call.
    pub send_timeout: Duration,
}

impl GatekeeperConfig {
    /// Load from the process environment, after merging `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            return Err(ConfigError::InvalidValue {
                key: ".env".into(),
                message: e.to_string(),
            });
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = var("BOT_TOKEN")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("BOT_TOKEN".into()))?;

        let admin = AdminIdentity::new(var("TG_ADMIN_USER_ID").as_deref());

        let mode = match var("WEBHOOK_URL") {
            Some(url) => UpdateMode::Webhook {
                url,
                port: parse_or("PORT", var("PORT"), 8080)?,
                secret: var("WEBHOOK_SECRET"),
            },
            None => UpdateMode::Polling,
        };

        let store = match var("GATEKEEPER_DB_PATH") {
            Some(path) if path == IN_MEMORY_DB => StoreLocation::Memory,
            Some(path) => StoreLocation::File(PathBuf::from(path)),
            None => StoreLocation::File(PathBuf::from("./data/gatekeeper.db")),
        };

        let store_timeout = Duration::from_secs(parse_or(
            "GATEKEEPER_STORE_TIMEOUT_SECS",
            var("GATEKEEPER_STORE_TIMEOUT_SECS"),
            5,
        )?);
        let send_timeout = Duration::from_secs(parse_or(
            "GATEKEEPER_SEND_TIMEOUT_SECS",
            var("GATEKEEPER_SEND_TIMEOUT_SECS"),
            10,
        )?);

        Ok(Self {
            bot_token,
            admin,
            mode,
            store,
            store_timeout,
            send_timeout,
        })
    }
}

impl fmt::Debug for GatekeeperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatekeeperConfig")
            .field("bot_token", &"[REDACTED]")
            .field("admin", &self.admin)
            .field("mode", &self.mode)
            .field("store", &self.store)
            .field("store_timeout", &self.store_timeout)
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;
    use crate::identity::SenderId;

    fn load(pairs: &[(&str, &str)]) -> Result<GatekeeperConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatekeeperConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[("BOT_TOKEN", "123:ABC")]).unwrap();
        assert_eq!(config.bot_token.expose_secret(), "123:ABC");
        assert_eq!(config.admin.admin_id(), None);
        assert_eq!(config.mode, UpdateMode::Polling);
        assert_eq!(
            config.store,
            StoreLocation::File(PathBuf::from("./data/gatekeeper.db"))
        );
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.send_timeout, Duration::from_secs(10));
    }

    #[test]
    fn missing_token() {
        let err = load(&[("TG_ADMIN_USER_ID", "1")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "BOT_TOKEN"));
    }

    #[test]
    fn blank_token_counts_as_missing() {
        assert!(load(&[("BOT_TOKEN", "   ")]).is_err());
    }

    #[test]
    fn admin_and_webhook() {
        let config = load(&[
            ("BOT_TOKEN", "t"),
            ("TG_ADMIN_USER_ID", " 1001 "),
            ("WEBHOOK_URL", "https://bot.example.com/telegram/webhook"),
            ("WEBHOOK_SECRET", "s3cret"),
            ("PORT", "3000"),
        ])
        .unwrap();
        assert_eq!(config.admin.admin_id(), Some(&SenderId::from(1001)));
        assert_eq!(
            config.mode,
            UpdateMode::Webhook {
                url: "https://bot.example.com/telegram/webhook".into(),
                port: 3000,
                secret: Some("s3cret".into()),
            }
        );
    }

    #[test]
    fn memory_store() {
        let config = load(&[("BOT_TOKEN", "t"), ("GATEKEEPER_DB_PATH", ":memory:")]).unwrap();
        assert_eq!(config.store, StoreLocation::Memory);
    }

    #[test]
    fn invalid_number() {
        let err = load(&[("BOT_TOKEN", "t"), ("GATEKEEPER_SEND_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "GATEKEEPER_SEND_TIMEOUT_SECS")
        );
    }

    #[test]
    fn port_only_read_in_webhook_mode() {
        let config = load(&[("BOT_TOKEN", "t"), ("PORT", "not-a-port")]).unwrap();
        assert_eq!(config.mode, UpdateMode::Polling);
    }

    #[test]
    fn debug_redacts_token() {
        let config = load(&[("BOT_TOKEN", "123:SUPERSECRET")]).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("SUPERSECRET"));
        assert!(debug.contains("[REDACTED]"));
    }
}
