//! The duplex byte-forwarding loop — the heart of the bridge.
//!
//! Once both legs of a session are open (the WebSocket leg with the client
//! and the TCP leg with the backend), [`run`] relays opaque bytes in both
//! directions until either leg closes or errors, then tears the other leg
//! down.
//!
//! # Forwarding rules
//!
//! - **WebSocket → TCP**: the payload of each Text or Binary frame is written
//!   verbatim to the TCP stream.  TCP is a byte stream, so frame boundaries
//!   survive only as byte order — no delimiters are reintroduced.
//! - **TCP → WebSocket**: each chunk read from the TCP stream (up to 4 KiB)
//!   is sent as one Binary WebSocket frame.  Binary is used unconditionally;
//!   the bridge never guesses at the payload's content type.
//!
//! # Coupled teardown
//!
//! The two directions run as two futures raced with `tokio::select!` inside
//! the connection's single task.  Whichever direction finishes first cancels
//! the other at its next suspension point, and the code after the `select!`
//! then closes both legs best-effort: the TCP write half is shut down
//! (half-close, so the backend sees EOF) and a WebSocket Close is sent.
//! There is no path on which one leg outlives the other.
//!
//! # Flow control
//!
//! Each direction reads its source only as fast as the opposite leg accepts
//! writes (`write_all` / `send` are awaited before the next read).  The
//! bridge adds no buffering of its own beyond the 4 KiB read chunk, so
//! transport-level flow control is the backpressure mechanism.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

/// Size of the TCP read chunk.  Each chunk becomes one WebSocket frame.
const TCP_CHUNK_SIZE: usize = 4096;

// ── Session outcome ───────────────────────────────────────────────────────────

/// How a relay session ended.
///
/// The first leg to terminate determines the variant; the caller uses it to
/// pick a log level (normal closes are routine, transport errors are not).
#[derive(Debug)]
pub enum RelayEnd {
    /// The client sent a Close frame or its stream ended.
    ClientClosed,
    /// The backend closed its TCP connection (EOF).
    BackendClosed,
    /// The WebSocket leg failed after establishment.
    ClientError(WsError),
    /// The TCP leg failed after establishment.
    BackendError(std::io::Error),
}

impl RelayEnd {
    /// `true` when the session ended by a normal close on either leg.
    pub fn is_clean(&self) -> bool {
        matches!(self, RelayEnd::ClientClosed | RelayEnd::BackendClosed)
    }
}

impl std::fmt::Display for RelayEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayEnd::ClientClosed => write!(f, "client closed"),
            RelayEnd::BackendClosed => write!(f, "backend closed"),
            RelayEnd::ClientError(e) => write!(f, "client transport error: {e}"),
            RelayEnd::BackendError(e) => write!(f, "backend transport error: {e}"),
        }
    }
}

// ── Relay loop ────────────────────────────────────────────────────────────────

/// Relays bytes between an established WebSocket stream and an established
/// TCP-like stream until either leg terminates, then closes both legs.
///
/// Generic over both raw streams so the same loop serves plain TCP and TLS
/// sessions, and so tests can drive it over in-memory duplex pipes.
///
/// `trace` enables a per-chunk debug event for every forwarded payload; it
/// never affects forwarding behavior.
pub async fn run<W, T>(
    ws_stream: WebSocketStream<W>,
    tcp_stream: T,
    label: &str,
    trace: bool,
) -> RelayEnd
where
    W: AsyncRead + AsyncWrite + Unpin,
    T: AsyncRead + AsyncWrite + Unpin,
{
    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (mut tcp_rx, mut tcp_wx) = tokio::io::split(tcp_stream);

    // Race the two directions.  `select!` drops the losing future at its
    // next await point, which is the structured-cancellation half of the
    // coupled-teardown invariant.
    let end = tokio::select! {
        end = ws_to_tcp(&mut ws_rx, &mut tcp_wx, label, trace) => end,
        end = tcp_to_ws(&mut tcp_rx, &mut ws_tx, label, trace) => end,
    };

    if trace {
        debug!("{label}: relay ended ({end}), tearing down both legs");
    }

    // Best-effort teardown of both legs in the same processing step.
    // Half-close the TCP write side so the backend observes EOF, and send a
    // WebSocket Close so the client observes a clean shutdown.  Either call
    // may fail if that leg is already gone; that is fine.
    let _ = tcp_wx.shutdown().await;
    let _ = ws_tx.close().await;

    end
}

/// One direction: WebSocket frames from the client → raw bytes to the backend.
async fn ws_to_tcp<W, T>(
    ws_rx: &mut SplitStream<WebSocketStream<W>>,
    tcp_wx: &mut WriteHalf<T>,
    label: &str,
    trace: bool,
) -> RelayEnd
where
    W: AsyncRead + AsyncWrite + Unpin,
    T: AsyncRead + AsyncWrite,
{
    loop {
        let payload = match ws_rx.next().await {
            // Text and Binary frames are forwarded identically: the bridge
            // is payload-agnostic and only sees bytes.
            Some(Ok(WsMessage::Text(text))) => text.into_bytes(),
            Some(Ok(WsMessage::Binary(data))) => data,

            Some(Ok(WsMessage::Close(_))) => return RelayEnd::ClientClosed,

            // Protocol-level ping/pong is handled by tungstenite itself;
            // nothing to forward.
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
            Some(Ok(WsMessage::Frame(_))) => continue,

            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                return RelayEnd::ClientClosed
            }
            Some(Err(e)) => return RelayEnd::ClientError(e),
            None => return RelayEnd::ClientClosed,
        };

        if trace {
            debug!("{label}: ws → tcp, {} bytes", payload.len());
        }

        // `write_all` guarantees the whole payload is written even when the
        // OS accepts only part of it in one call; byte order is preserved.
        if let Err(e) = tcp_wx.write_all(&payload).await {
            return RelayEnd::BackendError(e);
        }
    }
}

/// The other direction: raw bytes from the backend → Binary frames to the client.
async fn tcp_to_ws<W, T>(
    tcp_rx: &mut ReadHalf<T>,
    ws_tx: &mut SplitSink<WebSocketStream<W>, WsMessage>,
    label: &str,
    trace: bool,
) -> RelayEnd
where
    W: AsyncRead + AsyncWrite + Unpin,
    T: AsyncRead + AsyncWrite,
{
    let mut buf = vec![0u8; TCP_CHUNK_SIZE];

    loop {
        let n = match tcp_rx.read(&mut buf).await {
            // read() returning 0 bytes means the backend closed its end.
            Ok(0) => return RelayEnd::BackendClosed,
            Ok(n) => n,
            Err(e) => return RelayEnd::BackendError(e),
        };

        if trace {
            debug!("{label}: tcp → ws, {n} bytes");
        }

        if let Err(e) = ws_tx.send(WsMessage::Binary(buf[..n].to_vec())).await {
            return match e {
                WsError::ConnectionClosed | WsError::AlreadyClosed => RelayEnd::ClientClosed,
                other => RelayEnd::ClientError(other),
            };
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
