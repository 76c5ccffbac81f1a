//! Transport layer for the authoritative world server.
//!
//! One axum listener serves the persistent WebSocket stream (`/ws`),
//! the openclaw side channel (`/openclaw/*`), and the debug state
//! endpoints (`/debug/*`). All hub state plus the connection registry
//! live behind a single lock inside [`Gateway`]; handlers compute the
//! envelopes to send while holding it and push them into per-connection
//! outboxes, so the lock is never held across a socket write.

pub mod gateway;
pub mod http;
pub mod tick;
pub mod ws;

pub use gateway::{Gateway, SharedGateway};
pub use http::app;
pub use tick::run_tick_loop;

/// Snapshot interest radius in world units.
pub const SNAPSHOT_REPLICATION_RADIUS: f64 = 160.0;

/// Combat result / combat-originated event interest radius.
pub const COMBAT_REPLICATION_RADIUS: f64 = 48.0;

/// Block delta fan-out reaches players within this many chunks.
pub const BLOCK_DELTA_CHUNK_RADIUS: i64 = 2;
