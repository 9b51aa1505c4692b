//! # huddle-server
//!
//! WebSocket room relay built on Axum.
//!
//! - [`hub`]: the single control loop that owns room membership and fans
//!   messages out
//! - [`connection`]: per-client state and the outbound queue
//! - [`session`]: the `/ws` upgrade handler and the reader/writer pumps
//! - [`server`]: router, listener and lifecycle

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod health;
pub mod hub;
pub mod metrics;
pub mod server;
pub mod session;
pub mod shutdown;

pub use config::ServerConfig;
pub use connection::{Connection, Delivery};
pub use error::{HubClosed, SessionError};
pub use hub::{Hub, HubEvent, HubSnapshot, RoomMessage};
pub use server::{AppState, HuddleServer, ServerHandle};
pub use shutdown::ShutdownCoordinator;
