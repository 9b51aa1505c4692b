//! # huddle-core
//!
//! Foundation types shared by every huddle crate.
//!
//! - **Branded IDs**: `ConnectionId`, `RoomId` as string newtypes, `UserId` as
//!   a numeric newtype
//! - **Logging**: `tracing` subscriber setup and in-memory log capture for tests

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;

pub use ids::{ConnectionId, RoomId, UserId};
