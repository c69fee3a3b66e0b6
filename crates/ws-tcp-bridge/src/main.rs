//! ws-tcp-bridge — entry point.
//!
//! A transparent bidirectional relay between WebSocket clients and plain TCP
//! backends.  Browsers can only open HTTP/WebSocket connections; this bridge
//! lets them reach TCP services (VNC, serial consoles, custom daemons) that
//! cannot speak WebSocket natively.
//!
//! # Usage
//!
//! ```text
//! ws-tcp-bridge <port> <target> [OPTIONS]
//!
//! Arguments:
//!   <port>    WebSocket listener port
//!   <target>  TCP port, host:port pair, or JSON routing-table file
//!
//! Options:
//!   --bind <ADDR>   Listener bind address           [default: 0.0.0.0]
//!   --host <HOST>   Backend host for port/table targets [default: 127.0.0.1]
//!   --cert <FILE>   PEM certificate for wss:// (requires --key)
//!   --key <FILE>    PEM private key for wss:// (requires --cert)
//!   -d, --debug     Trace every forwarded chunk and lifecycle transition
//! ```
//!
//! # Target shapes
//!
//! The `<target>` argument is classified once at startup:
//!
//! | Shape             | Mode                                              |
//! |-------------------|---------------------------------------------------|
//! | `9000`            | fixed target `--host:9000`                        |
//! | `10.0.0.5:9000`   | fixed target `10.0.0.5:9000`                      |
//! | `routes.json`     | routing table: path `/a` → port mapped to `"a"`   |
//!
//! In routing-table mode a connection whose path ID is missing from the
//! table is closed with code 4000 ("Invalid ID") and no backend connection
//! is attempted.
//!
//! # Environment variable overrides
//!
//! | Variable          | Option    |
//! |-------------------|-----------|
//! | `WSB_BIND`        | `--bind`  |
//! | `WSB_TARGET_HOST` | `--host`  |
//! | `WSB_CERT`        | `--cert`  |
//! | `WSB_KEY`         | `--key`   |
//! | `WSB_DEBUG`       | `--debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ws_tcp_bridge::domain::{BridgeConfig, TargetSpec, TlsFiles};
use ws_tcp_bridge::infrastructure::{routing, Server};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// WebSocket-to-TCP bridge.
///
/// Accepts WebSocket connections and relays each one, byte for byte, to a
/// backing TCP service.
#[derive(Debug, Parser)]
#[command(
    name = "ws-tcp-bridge",
    about = "Transparent WebSocket-to-TCP relay",
    version
)]
struct Cli {
    /// TCP port for the WebSocket listener.
    port: u16,

    /// Backend target: a TCP port, a host:port pair, or a path to a JSON
    /// routing-table file (`{"id": port, ...}`).
    target: String,

    /// IP address to bind the WebSocket listener to.
    ///
    /// Use `0.0.0.0` to accept connections from any interface, or
    /// `127.0.0.1` to accept only local connections.
    #[arg(long, default_value = "0.0.0.0", env = "WSB_BIND")]
    bind: String,

    /// Backend host used when the target is a bare port or a routing table.
    #[arg(long, default_value = "127.0.0.1", env = "WSB_TARGET_HOST")]
    host: String,

    /// Path to a PEM certificate chain; together with --key, switches the
    /// listener to secured WebSocket (wss://).
    #[arg(long, env = "WSB_CERT", requires = "key")]
    cert: Option<PathBuf>,

    /// Path to a PEM private key; together with --cert, switches the
    /// listener to secured WebSocket (wss://).
    #[arg(long, env = "WSB_KEY", requires = "cert")]
    key: Option<PathBuf>,

    /// Enable per-chunk and per-lifecycle debug traces.
    #[arg(long, short = 'd', env = "WSB_DEBUG")]
    debug: bool,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`BridgeConfig`], loading
    /// the routing-table file when the target names one.
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is invalid, the target string is
    /// malformed, or the routing-table file cannot be read or parsed.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let bind_addr: SocketAddr = format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid bind address: '{}:{}'", self.bind, self.port))?;

        let target = routing::load_target(&self.target, &self.host)?;

        let tls = match (self.cert, self.key) {
            (Some(cert), Some(key)) => Some(TlsFiles { cert, key }),
            (None, None) => None,
            // clap's `requires` already rejects these, but the conversion
            // must not silently half-configure TLS if called directly.
            _ => anyhow::bail!("--cert and --key must be provided together"),
        };

        Ok(BridgeConfig {
            bind_addr,
            target,
            tls,
            debug: self.debug,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // `RUST_LOG` wins when set; otherwise --debug raises the default level
    // so the per-chunk traces become visible.
    let default_filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let debug_enabled = cli.debug;
    let config = cli.into_bridge_config()?;

    match &config.target {
        TargetSpec::Fixed { host, port } => {
            info!("proxying {} to fixed target {host}:{port}", config.bind_addr);
        }
        TargetSpec::RoutingTable { host, table } => {
            info!(
                "proxying {} via routing table ({} entries, host {host})",
                config.bind_addr,
                table.len()
            );
        }
    }
    if config.tls.is_some() {
        info!("running in secured WebSocket (wss://) mode");
    } else {
        info!("running in unsecured WebSocket (ws://) mode");
    }
    if debug_enabled {
        info!("debug tracing is enabled");
    }

    // Fatal startup conditions (bad TLS material, bind failure) surface here.
    let server = Server::bind(config).await?;

    // Graceful shutdown: Ctrl+C clears the flag; the accept loop polls it
    // every 200 ms and exits cleanly.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C — initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    server.run(running).await?;

    info!("ws-tcp-bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
