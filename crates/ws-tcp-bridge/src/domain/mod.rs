//! Domain layer for ws-tcp-bridge.
//!
//! The domain layer contains pure business-logic types that have no
//! dependencies on I/O, networking, or external frameworks.  This makes them
//! easy to test in isolation.
//!
//! # What belongs in the domain layer?
//!
//! - The target specification ([`TargetSpec`]) and the resolution logic that
//!   maps a request path to a backend `(host, port)` pair
//! - The routing table ([`RoutingTable`])
//! - Configuration structures ([`BridgeConfig`])
//! - Error types that describe business-logic failures ([`BridgeError`])
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - File I/O or environment variable reading
//! - Anything that could block or fail due to external state

pub mod config;
pub mod error;
pub mod target;

// Re-export the most commonly needed types at the domain module boundary
// so callers can write `domain::BridgeConfig` instead of the longer path.
pub use config::{BridgeConfig, TlsFiles};
pub use error::BridgeError;
pub use target::{RoutingTable, TargetArg, TargetSpec};
