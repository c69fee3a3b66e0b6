//! Infrastructure layer for ws-tcp-bridge.
//!
//! Everything that touches a socket or the filesystem lives here:
//!
//! - Binding the listener and dispatching connections ([`ws_server`])
//! - The duplex forwarding loop and coupled teardown ([`relay`])
//! - Loading the routing-table file ([`routing`])
//! - Building the TLS acceptor ([`tls`])
//!
//! # What does NOT belong here?
//!
//! - Target-resolution rules (that is the domain layer)
//! - Configuration types (domain layer)
//! - CLI parsing (that is done in `main.rs`)

pub mod relay;
pub mod routing;
pub mod tls;
pub mod ws_server;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use ws_server::Server;
