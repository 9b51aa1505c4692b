//! Server configuration.

use std::time::Duration;

use huddle_settings::ServerSettings;

/// Runtime configuration for [`HuddleServer`](crate::HuddleServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Interval between server-initiated Ping frames.
    pub heartbeat_interval: Duration,
    /// Close a connection after this long without an inbound frame.
    pub idle_timeout: Option<Duration>,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound queue capacity per connection.
    pub send_queue_capacity: usize,
    /// Capacity of the hub's event intake.
    pub hub_queue_capacity: usize,
    /// How long shutdown waits for the listener and hub to finish.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            heartbeat_interval: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(90)),
            max_message_size: 64 * 1024,
            send_queue_capacity: 256,
            hub_queue_capacity: 1024,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            heartbeat_interval: Duration::from_millis(s.heartbeat_interval_ms),
            idle_timeout: (s.idle_timeout_ms > 0).then(|| Duration::from_millis(s.idle_timeout_ms)),
            max_message_size: s.max_message_size,
            send_queue_capacity: s.send_queue_capacity,
            hub_queue_capacity: s.hub_queue_capacity,
            shutdown_timeout: Duration::from_millis(s.shutdown_timeout_ms),
        }
    }
}

impl ServerConfig {
    /// `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
