//! Error types for the bridge.
//!
//! The taxonomy mirrors how failures are contained at runtime:
//!
//! - [`BridgeError::Configuration`] is fatal and can only occur at startup.
//!   It propagates out of `main` and exits the process non-zero.
//! - All other variants are per-connection.  They are logged inside the
//!   connection's own task (identified by the connection label) and never
//!   reach the accept loop or any other connection.

use thiserror::Error;

/// Errors that can occur while configuring or running a bridged connection.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Startup-time configuration problem: invalid target specification,
    /// malformed routing-table file, or unusable TLS material.
    ///
    /// Fatal — the process exits rather than run with a broken config.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Routing-table mode is active and the request path's ID segment is
    /// missing, empty, or not present in the table.
    ///
    /// The connection is rejected with close code 4000 ("Invalid ID") and no
    /// TCP connect is ever attempted.
    #[error("no route for ID {id:?}")]
    TargetNotFound {
        /// The ID segment extracted from the request path (may be empty).
        id: String,
    },

    /// The TCP leg could not be established.  The WebSocket leg is closed
    /// with a generic close; no retry is attempted.
    #[error("failed to connect to backend: {0}")]
    Connect(#[source] std::io::Error),

    /// A failure on either leg outside the relay loop (e.g., the WebSocket
    /// handshake itself failed).  Failures *inside* the relay loop are
    /// reported through `relay::RelayEnd` instead, because there they are an
    /// expected way for a session to end.
    #[error("transport error: {0}")]
    Transport(String),
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = BridgeError::Configuration("bad routing file".to_string());
        assert_eq!(err.to_string(), "configuration error: bad routing file");
    }

    #[test]
    fn test_target_not_found_display_includes_id() {
        let err = BridgeError::TargetNotFound {
            id: "vm7".to_string(),
        };
        assert_eq!(err.to_string(), "no route for ID \"vm7\"");
    }

    #[test]
    fn test_target_not_found_display_with_empty_id() {
        // An empty path segment must still produce a readable diagnostic.
        let err = BridgeError::TargetNotFound { id: String::new() };
        assert_eq!(err.to_string(), "no route for ID \"\"");
    }

    #[test]
    fn test_connect_error_preserves_io_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = BridgeError::Connect(io);

        // The io::Error must remain reachable through source() so callers can
        // inspect the kind if they need to.
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("failed to connect to backend"));
    }
}
