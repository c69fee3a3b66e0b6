//! WebSocket listener and per-connection dispatch.
//!
//! This module is responsible for:
//!
//! 1. Binding the TCP listener (and building the TLS acceptor when
//!    configured) — both fatal on failure.
//! 2. Accepting inbound connections and assigning each a strictly increasing
//!    connection ID, combined with the peer address into a diagnostic label
//!    (`WS#3 192.0.2.1:52114`).
//! 3. Completing the WebSocket upgrade, capturing the request path for
//!    target resolution.
//! 4. Resolving the backend target and rejecting unroutable connections
//!    with close code 4000 / "Invalid ID" before any TCP connect.
//! 5. Opening the TCP leg and handing both legs to the relay loop.
//!
//! Each connection runs in its own Tokio task; the accept loop never touches
//! socket bytes and never fails because of a single connection.  The only
//! shared state is the read-only `Arc<BridgeConfig>` and the ID counter.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, OnceLock,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::{coding::CloseCode, CloseFrame};
use tracing::{debug, error, info, warn};

use crate::domain::config::BridgeConfig;
use crate::domain::error::BridgeError;
use crate::infrastructure::relay::{self, RelayEnd};
use crate::infrastructure::tls;

/// Application-defined close code sent when target resolution fails.
///
/// 4000 is in the private-use range of RFC 6455, so it cannot collide with a
/// protocol-reserved code.
const INVALID_ID_CLOSE_CODE: u16 = 4000;

/// Close reason accompanying [`INVALID_ID_CLOSE_CODE`].
const INVALID_ID_REASON: &str = "Invalid ID";

// ── Server ────────────────────────────────────────────────────────────────────

/// The bound WebSocket listener plus everything shared across connections.
///
/// Binding is separated from running so callers (tests in particular) can
/// bind port 0 and read the actual address back before starting the accept
/// loop.
pub struct Server {
    listener: TcpListener,
    config: Arc<BridgeConfig>,
    tls: Option<TlsAcceptor>,
    /// Dispatcher-owned connection ID counter, starting at 1.  Connection
    /// tasks never touch it; they receive their ID by value at spawn time.
    next_conn_id: AtomicU64,
}

impl Server {
    /// Binds the listener and, when TLS files are configured, builds the
    /// TLS acceptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS material is unusable or the listener
    /// cannot be bound — both fatal startup conditions.
    pub async fn bind(config: BridgeConfig) -> anyhow::Result<Self> {
        let tls = match &config.tls {
            Some(files) => Some(tls::load_acceptor(files)?),
            None => None,
        };

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;

        Ok(Self {
            listener,
            config: Arc::new(config),
            tls,
            next_conn_id: AtomicU64::new(1),
        })
    }

    /// The address the listener is actually bound to.
    ///
    /// Differs from `config.bind_addr` when the configured port was 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until `running` is set to `false`.
    ///
    /// Uses a short timeout on `accept()` so the loop can poll the shutdown
    /// flag even when no clients are connecting.  Accept errors are logged
    /// and the loop continues; a per-connection problem is never fatal to
    /// the process.
    pub async fn run(self, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        info!("WebSocket bridge listening on {}", self.local_addr()?);

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            match timeout(Duration::from_millis(200), self.listener.accept()).await {
                Ok(Ok((stream, peer_addr))) => {
                    let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
                    let label = format!("WS#{conn_id} {peer_addr}");
                    info!("{label}: new connection");

                    let cfg = Arc::clone(&self.config);
                    match self.tls.clone() {
                        Some(acceptor) => {
                            tokio::spawn(async move {
                                match acceptor.accept(stream).await {
                                    Ok(tls_stream) => {
                                        handle_connection(tls_stream, label, cfg).await
                                    }
                                    Err(e) => warn!("{label}: TLS handshake failed: {e}"),
                                }
                            });
                        }
                        None => {
                            tokio::spawn(async move {
                                handle_connection(stream, label, cfg).await;
                            });
                        }
                    }
                }
                Ok(Err(e)) => {
                    // Transient accept failure (e.g., out of file descriptors).
                    error!("accept error: {e}");
                }
                Err(_) => {
                    // Timeout — no new connection; loop back to check the flag.
                }
            }
        }

        Ok(())
    }
}

// ── Per-connection handling ───────────────────────────────────────────────────

/// Top-level handler for one connection: runs the session and logs how it
/// ended.  The outer/inner split keeps `?`-style propagation inside
/// [`run_session`] while containing every per-connection error here.
async fn handle_connection<S>(stream: S, label: String, config: Arc<BridgeConfig>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match run_session(stream, &label, config).await {
        Ok(end) if end.is_clean() => info!("{label}: session closed ({end})"),
        Ok(end) => warn!("{label}: {end}"),
        Err(BridgeError::TargetNotFound { id }) => {
            info!("{label}: rejected, no route for ID {id:?}");
        }
        Err(e) => warn!("{label}: {e}"),
    }
}

/// Runs the complete lifecycle of one bridged connection.
///
/// 1. Completes the WebSocket upgrade, capturing the request path.
/// 2. Resolves the backend target; on a routing miss the socket is closed
///    with code 4000 / "Invalid ID" and no TCP connect is attempted.
/// 3. Opens the TCP leg — at most once, with no retry.  On connect failure
///    the WebSocket leg is closed with a generic close.
/// 4. Hands both legs to the relay loop until either side terminates.
async fn run_session<S>(
    stream: S,
    label: &str,
    config: Arc<BridgeConfig>,
) -> Result<RelayEnd, BridgeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Capture the request path during the upgrade handshake.  The callback
    // runs exactly once, before `accept_hdr_async` resolves, so the
    // `OnceLock` is filled by the time we read it.
    let path_cell = Arc::new(OnceLock::new());
    let cell = Arc::clone(&path_cell);

    let mut ws_stream = accept_hdr_async(stream, move |req: &Request, resp: Response| {
        let _ = cell.set(req.uri().path().to_string());
        Ok(resp)
    })
    .await
    .map_err(|e| BridgeError::Transport(format!("WebSocket handshake failed: {e}")))?;

    let path = path_cell.get().map(String::as_str).unwrap_or("/");

    let (host, port) = match config.target.resolve(path) {
        Ok(target) => target,
        Err(e) => {
            // Routing miss: distinct application close code, then drain the
            // stream so the close handshake can complete.  The TCP leg is
            // never opened.
            let frame = CloseFrame {
                code: CloseCode::Library(INVALID_ID_CLOSE_CODE),
                reason: INVALID_ID_REASON.into(),
            };
            let _ = ws_stream.close(Some(frame)).await;
            while let Some(Ok(_)) = ws_stream.next().await {}
            return Err(e);
        }
    };

    if config.debug {
        debug!("{label}: resolved target {host}:{port} (path {path:?})");
    }

    // The one and only TCP connect attempt for this session.  Frames the
    // client sends in the meantime queue in the transport's receive buffer;
    // the relay loop starts reading them only once this leg is open.
    let tcp_stream = match TcpStream::connect((host.as_str(), port)).await {
        Ok(s) => s,
        Err(e) => {
            let _ = ws_stream.close(None).await;
            return Err(BridgeError::Connect(e));
        }
    };

    if config.debug {
        debug!("{label}: TCP leg open to {host}:{port}");
    }

    Ok(relay::run(ws_stream, tcp_stream, label, config.debug).await)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::target::TargetSpec;

    fn test_config() -> BridgeConfig {
        BridgeConfig::new(
            "127.0.0.1:0".parse().unwrap(),
            TargetSpec::Fixed {
                host: "127.0.0.1".to_string(),
                port: 9,
            },
        )
    }

    #[tokio::test]
    async fn test_bind_port_zero_reports_real_port() {
        let server = Server::bind(test_config()).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_connection_ids_start_at_one() {
        let server = Server::bind(test_config()).await.unwrap();
        assert_eq!(server.next_conn_id.fetch_add(1, Ordering::Relaxed), 1);
        assert_eq!(server.next_conn_id.fetch_add(1, Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_run_exits_when_running_flag_cleared() {
        let server = Server::bind(test_config()).await.unwrap();
        let running = Arc::new(AtomicBool::new(false));

        // With the flag already cleared the loop must return promptly.
        timeout(Duration::from_secs(2), server.run(running))
            .await
            .expect("accept loop did not observe the shutdown flag")
            .unwrap();
    }

    #[tokio::test]
    async fn test_bind_with_missing_tls_files_is_fatal() {
        let mut config = test_config();
        config.tls = Some(crate::domain::config::TlsFiles {
            cert: "/nonexistent/cert.pem".into(),
            key: "/nonexistent/key.pem".into(),
        });

        assert!(Server::bind(config).await.is_err());
    }
}
