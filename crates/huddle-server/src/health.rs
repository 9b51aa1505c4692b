//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

use crate::hub::HubSnapshot;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered WebSocket connections.
    pub connections: usize,
    /// Non-empty rooms.
    pub rooms: usize,
}

/// Build a health response from a hub snapshot.
pub fn health_check(start_time: Instant, snapshot: &HubSnapshot) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections: snapshot.connections,
        rooms: snapshot.rooms.len(),
    }
}
