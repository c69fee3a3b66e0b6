//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is constructed once at startup (from CLI arguments in `main.rs`) and
//! then wrapped in an `Arc` so it can be shared cheaply and read-only across
//! all connection tasks.
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! variable reads inside the domain) makes the bridge easy to drive from
//! integration tests: the tests build a `BridgeConfig` directly and never go
//! through the CLI.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::domain::target::TargetSpec;

/// Paths to the PEM-encoded TLS certificate and private key files.
///
/// When present on [`BridgeConfig`], the WebSocket listener terminates TLS
/// (`wss://`).  The files are read once at startup; unreadable or invalid
/// material is a fatal configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    /// Path to the certificate chain file (PEM).
    pub cert: PathBuf,
    /// Path to the private key file (PEM).
    pub key: PathBuf,
}

/// All runtime configuration for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// The address and port the WebSocket listener binds to.
    ///
    /// `0.0.0.0` accepts connections from any interface; `127.0.0.1`
    /// restricts the listener to local clients.  Port 0 asks the OS for an
    /// ephemeral port (used by the integration tests).
    pub bind_addr: SocketAddr,

    /// Which backend(s) connections bridge to — fixed target or routing
    /// table, decided once at startup.
    pub target: TargetSpec,

    /// TLS material for `wss://` termination, or `None` for plain `ws://`.
    pub tls: Option<TlsFiles>,

    /// Enables per-chunk and per-lifecycle-transition debug traces.
    ///
    /// Purely diagnostic: protocol behavior is identical with or without it.
    pub debug: bool,
}

impl BridgeConfig {
    /// Creates a plain-WS config with no TLS and tracing off.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ws_tcp_bridge::domain::{BridgeConfig, TargetSpec};
    ///
    /// let cfg = BridgeConfig::new(
    ///     "127.0.0.1:8080".parse().unwrap(),
    ///     TargetSpec::Fixed { host: "127.0.0.1".into(), port: 9000 },
    /// );
    /// assert!(cfg.tls.is_none());
    /// ```
    pub fn new(bind_addr: SocketAddr, target: TargetSpec) -> Self {
        Self {
            bind_addr,
            target,
            tls: None,
            debug: false,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_target() -> TargetSpec {
        TargetSpec::Fixed {
            host: "127.0.0.1".to_string(),
            port: 9000,
        }
    }

    #[test]
    fn test_new_defaults_to_plain_ws() {
        let cfg = BridgeConfig::new("0.0.0.0:8080".parse().unwrap(), fixed_target());
        assert!(cfg.tls.is_none());
        assert!(!cfg.debug);
    }

    #[test]
    fn test_new_stores_bind_addr_and_target() {
        let cfg = BridgeConfig::new("127.0.0.1:8765".parse().unwrap(), fixed_target());
        assert_eq!(cfg.bind_addr.port(), 8765);
        assert_eq!(cfg.target, fixed_target());
    }

    #[test]
    fn test_config_can_be_cloned() {
        // Cloneability is required so an Arc<BridgeConfig> can be built from
        // a config the caller still owns.
        let mut cfg = BridgeConfig::new("0.0.0.0:8080".parse().unwrap(), fixed_target());
        cfg.tls = Some(TlsFiles {
            cert: "cert.pem".into(),
            key: "key.pem".into(),
        });

        let cloned = cfg.clone();
        assert_eq!(cloned.bind_addr, cfg.bind_addr);
        assert_eq!(cloned.tls, cfg.tls);
    }
}
