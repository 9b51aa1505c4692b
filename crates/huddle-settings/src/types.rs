//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may be partial and missing fields keep their compiled default.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Placeholder signing secret used when nothing is configured.
///
/// Only suitable for local development; `huddle serve` warns when it is active.
pub const DEV_JWT_SECRET: &str = "your-secret-key";

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000, "sendQueueCapacity": 64 },
///   "auth": { "jwtSecret": "...", "usersFile": "/etc/huddle/users.json" },
///   "logging": { "level": "debug", "json": true }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HuddleSettings {
    /// WebSocket server settings.
    pub server: ServerSettings,
    /// Credential validation settings.
    pub auth: AuthSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl HuddleSettings {
    /// Reject values that would make the relay unusable.
    pub fn validate(&self) -> Result<()> {
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be at least 1".into(),
            ));
        }
        if self.server.hub_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.hubQueueCapacity must be at least 1".into(),
            ));
        }
        if self.server.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalMs must be positive".into(),
            ));
        }
        // Quiet clients only produce traffic by answering pings.
        if self.server.idle_timeout_ms != 0
            && self.server.idle_timeout_ms <= self.server.heartbeat_interval_ms
        {
            return Err(SettingsError::InvalidValue(
                "server.idleTimeoutMs must exceed server.heartbeatIntervalMs".into(),
            ));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(SettingsError::InvalidValue(
                "auth.jwtSecret must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// WebSocket server network and per-connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// WebSocket server port.
    pub port: u16,
    /// Interval between server-initiated Ping frames, in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Close a connection after this long without any inbound frame.
    /// `0` disables the idle timeout.
    pub idle_timeout_ms: u64,
    /// Maximum inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound queue capacity per connection.
    pub send_queue_capacity: usize,
    /// Capacity of the hub's event intake.
    pub hub_queue_capacity: usize,
    /// How long shutdown waits for background tasks, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            heartbeat_interval_ms: 30_000,
            idle_timeout_ms: 90_000,
            max_message_size: 64 * 1024,
            send_queue_capacity: 256,
            hub_queue_capacity: 1024,
            shutdown_timeout_ms: 10_000,
        }
    }
}

/// Credential validation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HMAC secret for HS256 tokens.
    pub jwt_secret: String,
    /// JSON file listing known users (`[{"id", "name", "email"}]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users_file: Option<String>,
    /// Lifetime of tokens minted by `huddle token`, in seconds.
    pub token_ttl_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            users_file: None,
            token_ttl_secs: 86_400,
        }
    }
}

impl AuthSettings {
    /// Whether the compiled placeholder secret is still in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults() {
        let s = HuddleSettings::default();
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.server.port, 8081);
        assert_eq!(s.server.heartbeat_interval_ms, 30_000);
        assert_eq!(s.server.idle_timeout_ms, 90_000);
        assert_eq!(s.server.send_queue_capacity, 256);
        assert_eq!(s.auth.token_ttl_secs, 86_400);
        assert!(s.auth.users_file.is_none());
        assert!(s.auth.uses_dev_secret());
        assert_eq!(s.logging.level, "info");
        assert!(!s.logging.json);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn camel_case_field_names() {
        let json = serde_json::to_value(HuddleSettings::default()).unwrap();
        assert!(json["server"]["sendQueueCapacity"].is_number());
        assert!(json["server"]["idleTimeoutMs"].is_number());
        assert!(json["auth"]["jwtSecret"].is_string());
        assert!(json["auth"].get("usersFile").is_none());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let s: HuddleSettings =
            serde_json::from_str(r#"{"server": {"port": 9000}, "auth": {"jwtSecret": "s3cret"}}"#)
                .unwrap();
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.server.host, "0.0.0.0");
        assert!(!s.auth.uses_dev_secret());
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn validate_rejects_zero_send_queue() {
        let mut s = HuddleSettings::default();
        s.server.send_queue_capacity = 0;
        assert_matches!(
            s.validate(),
            Err(SettingsError::InvalidValue(msg)) if msg.contains("sendQueueCapacity")
        );
    }

    #[test]
    fn validate_rejects_empty_secret() {
        let mut s = HuddleSettings::default();
        s.auth.jwt_secret.clear();
        assert_matches!(s.validate(), Err(SettingsError::InvalidValue(_)));
    }

    #[test]
    fn validate_rejects_zero_heartbeat() {
        let mut s = HuddleSettings::default();
        s.server.heartbeat_interval_ms = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_idle_timeout_within_heartbeat() {
        let mut s = HuddleSettings::default();
        s.server.idle_timeout_ms = 10_000;
        assert_matches!(
            s.validate(),
            Err(SettingsError::InvalidValue(msg)) if msg.contains("idleTimeoutMs")
        );

        s.server.idle_timeout_ms = s.server.heartbeat_interval_ms;
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_allows_disabled_idle_timeout() {
        let mut s = HuddleSettings::default();
        s.server.idle_timeout_ms = 0;
        assert!(s.validate().is_ok());
    }
}
