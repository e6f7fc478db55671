//! WebSocket transport implementation using `tokio-tungstenite`.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;

use crate::{ConnectionId, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Listens for TCP connections that will be upgraded to WebSocket.
pub struct WebSocketListener {
    listener: TcpListener,
}

impl WebSocketListener {
    /// Binds a listener to the given address. Port 0 picks a free port;
    /// see [`WebSocketListener::local_addr`].
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket listener bound");
        Ok(Self { listener })
    }

    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }

    /// Waits for the next TCP connection. The WebSocket handshake has not
    /// happened yet; call [`PendingConnection::upgrade`] on the result,
    /// preferably from a spawned task so a slow client cannot stall the
    /// accept loop.
    pub async fn accept(&self) -> Result<PendingConnection, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer, "accepted TCP connection");

        Ok(PendingConnection { id, stream, peer })
    }
}

// ---------------------------------------------------------------------------
// PendingConnection
// ---------------------------------------------------------------------------

/// A TCP connection waiting for its WebSocket handshake.
pub struct PendingConnection {
    id: ConnectionId,
    stream: TcpStream,
    peer: SocketAddr,
}

impl PendingConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Performs the WebSocket handshake.
    ///
    /// `inspect` receives the raw query string of the upgrade request
    /// (empty if there is none). Returning `Err(reason)` refuses the
    /// upgrade with HTTP 400 and `reason` as the response body.
    ///
    /// # Errors
    /// - [`TransportError::HandshakeRejected`] if `inspect` refused
    /// - [`TransportError::HandshakeFailed`] if the request was not a
    ///   valid WebSocket upgrade
    pub async fn upgrade<T, F>(
        self,
        inspect: F,
    ) -> Result<(T, WebSocketConnection), TransportError>
    where
        T: Send,
        F: FnOnce(&str) -> Result<T, String> + Send + Unpin,
    {
        let mut accepted: Option<T> = None;
        let mut rejected: Option<String> = None;

        let callback = |request: &Request,
                        response: Response|
         -> Result<Response, ErrorResponse> {
            let query = request.uri().query().unwrap_or_default();
            match inspect(query) {
                Ok(value) => {
                    accepted = Some(value);
                    Ok(response)
                }
                Err(reason) => {
                    rejected = Some(reason.clone());
                    Err(bad_request(reason))
                }
            }
        };

        let result =
            tokio_tungstenite::accept_hdr_async(self.stream, callback).await;

        let ws = match result {
            Ok(ws) => ws,
            Err(e) => {
                if let Some(reason) = rejected {
                    tracing::debug!(id = %self.id, peer = %self.peer, %reason, "upgrade rejected");
                    return Err(TransportError::HandshakeRejected(reason));
                }
                return Err(TransportError::HandshakeFailed(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    e,
                )));
            }
        };

        let value = accepted.ok_or_else(|| {
            TransportError::HandshakeRejected("request was not inspected".into())
        })?;
        tracing::debug!(id = %self.id, peer = %self.peer, "WebSocket upgrade complete");

        Ok((
            value,
            WebSocketConnection {
                id: self.id,
                peer: self.peer,
                ws,
            },
        ))
    }
}

fn bad_request(reason: String) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason));
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response
}

// ---------------------------------------------------------------------------
// WebSocketConnection and its halves
// ---------------------------------------------------------------------------

/// An upgraded WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    ws: WsStream,
}

impl WebSocketConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Splits the connection so one task can write while another reads.
    pub fn split(self) -> (WebSocketSender, WebSocketReceiver) {
        let (sink, stream) = self.ws.split();
        (
            WebSocketSender { id: self.id, sink },
            WebSocketReceiver {
                id: self.id,
                stream,
            },
        )
    }
}

/// The writing half of a [`WebSocketConnection`].
pub struct WebSocketSender {
    id: ConnectionId,
    sink: SplitSink<WsStream, Message>,
}

impl WebSocketSender {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends one text frame.
    pub async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| {
                TransportError::SendFailed(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    /// Sends a close frame and flushes.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.sink.close().await.map_err(|e| {
            TransportError::SendFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

/// The reading half of a [`WebSocketConnection`].
pub struct WebSocketReceiver {
    id: ConnectionId,
    stream: SplitStream<WsStream>,
}

impl WebSocketReceiver {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Receives the payload of the next text or binary frame.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed. Ping and
    /// pong frames are skipped.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }
}
