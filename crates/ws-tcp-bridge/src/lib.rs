//! ws-tcp-bridge library crate.
//!
//! This crate provides a transparent bidirectional relay between WebSocket
//! clients and plain TCP backends.  A browser (or any WebSocket-only client)
//! connects to the bridge; the bridge opens a TCP connection to the configured
//! backend and shuttles opaque byte payloads in both directions until either
//! side closes.
//!
//! # Architecture
//!
//! ```text
//! Browser (WebSocket frames)
//!         ↕
//! [ws-tcp-bridge]
//!   ├── domain/           Pure types: TargetSpec + resolver, RoutingTable,
//!   │                     BridgeConfig, BridgeError
//!   └── infrastructure/
//!         ├── ws_server/  Accept loop, handshake, per-connection tasks
//!         ├── relay/      Duplex byte-forwarding loop + coupled teardown
//!         ├── routing/    Routing-table file loading
//!         └── tls/        Optional wss:// termination (rustls)
//!         ↕
//! Backend TCP service (raw byte stream)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no external dependencies beyond `serde` derives (no I/O, no
//!   async, no sockets).  Target resolution is a pure lookup, so it can be
//!   unit tested without a network and called concurrently without locking.
//! - `infrastructure` depends on `domain` plus `tokio`, `tungstenite`, and
//!   `rustls`.  Everything that touches a socket lives here.
//!
//! The bridge is protocol-agnostic by design: it never inspects, frames, or
//! transforms the bytes it forwards.

/// Domain layer: pure business-logic types (no I/O).
pub mod domain;

/// Infrastructure layer: WebSocket server, relay loop, TLS, routing file I/O.
pub mod infrastructure;
