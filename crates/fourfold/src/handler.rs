//! Per-connection handler: handshake, placement, and move routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Upgrade, reading `username` and `gameId` from the request query
//!   2. Register an outbound queue and spawn the writer task
//!   3. Rejoin the requested session, or ask the registry for a placement
//!   4. Loop: receive moves → registry → push state to participants

use std::sync::Arc;

use fourfold_protocol::{
    ClientMessage, Codec, Identity, ServerMessage, SessionId, SessionStatus,
};
use fourfold_session::{Session, SessionError};
use fourfold_transport::{ConnectionId, PendingConnection, WebSocketSender};
use percent_encoding::percent_decode_str;
use time::OffsetDateTime;
use tokio::sync::mpsc;

use crate::FourfoldError;
use crate::server::ServerState;

/// Body of the HTTP 400 sent when the query has no usable name.
pub(crate) const USERNAME_REQUIRED: &str = "username required";
pub(crate) const USERNAME_RESERVED: &str = "username reserved";

/// What the client declared in the upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Handshake {
    pub(crate) identity: Identity,
    pub(crate) rejoin: Option<SessionId>,
}

/// Parses `username` (required) and `gameId` (optional) from a raw query
/// string. The error string is sent to the client as the 400 body.
pub(crate) fn parse_handshake(query: &str) -> Result<Handshake, String> {
    let mut username = None;
    let mut game_id = None;

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = decode_component(value);
        match key {
            "username" => username = Some(value),
            "gameId" => game_id = Some(value),
            _ => {}
        }
    }

    let username = username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| USERNAME_REQUIRED.to_string())?;
    let identity = Identity::new(username);
    if identity.is_reserved() {
        return Err(USERNAME_RESERVED.to_string());
    }

    Ok(Handshake {
        identity,
        rejoin: game_id.filter(|g| !g.is_empty()).map(SessionId::new),
    })
}

/// Form-style decoding: `+` is a space, then percent escapes.
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

// ---------------------------------------------------------------------------
// Messages built from session snapshots
// ---------------------------------------------------------------------------

pub(crate) fn state_message(session: &Session) -> ServerMessage {
    ServerMessage::State {
        board: *session.grid(),
        turn: session.turn,
        status: session.status,
        winner: session.winner.clone(),
        winning_line: session.winning_line.clone(),
    }
}

/// The `init` snapshot as seen by `identity`, or `None` if it does not
/// play in `session`.
pub(crate) fn init_message(session: &Session, identity: &Identity) -> Option<ServerMessage> {
    let me = session.participant(identity)?;
    Some(ServerMessage::Init {
        game_id: session.id.clone(),
        board: *session.grid(),
        turn: session.turn,
        you: identity.clone(),
        slot: me.mark,
        opponent: session.opponent_of(identity).map(|p| p.identity.clone()),
        status: session.status,
        winner: session.winner.clone(),
        timestamp: OffsetDateTime::now_utc(),
    })
}

// ---------------------------------------------------------------------------
// Connection guard
// ---------------------------------------------------------------------------

/// Drop guard that tells the registry a connection is gone.
///
/// Since `Drop` is synchronous, the async cleanup runs in a spawned task.
/// A connection that was replaced by a newer one for the same identity
/// does nothing: the newer connection now speaks for the identity.
struct ConnectionGuard<C: Codec> {
    identity: Identity,
    connection: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let identity = self.identity.clone();
        let connection = self.connection;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            if !state.hub.unregister(&identity, connection).await {
                return;
            }
            let mut registry = state.registry.lock().await;
            // A reconnect may have registered between the two locks.
            if state.hub.is_online(&identity).await {
                return;
            }
            if registry.is_waiting(&identity) {
                registry.abandon(&identity);
            } else {
                registry.mark_disconnected(&identity);
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Handles a single connection from upgrade to close.
pub(crate) async fn handle_connection<C: Codec>(
    pending: PendingConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), FourfoldError> {
    let (handshake, conn) = pending.upgrade(parse_handshake).await?;
    let Handshake { identity, rejoin } = handshake;
    let conn_id = conn.id();
    tracing::debug!(%conn_id, %identity, peer = %conn.peer_addr(), "participant connected");

    let (sender, mut receiver) = conn.split();
    let outbound = state.hub.register(identity.clone(), conn_id).await;
    tokio::spawn(write_loop(sender, outbound));

    let _guard = ConnectionGuard {
        identity: identity.clone(),
        connection: conn_id,
        state: Arc::clone(&state),
    };

    establish(&state, &identity, rejoin.as_ref()).await;

    loop {
        let data = match receiver.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%identity, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%identity, error = %e, "recv error");
                break;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%identity, error = %e, "undecodable client message");
                state
                    .push(&identity, &ServerMessage::error("invalid message"))
                    .await;
                continue;
            }
        };

        match msg {
            ClientMessage::Move { column } => {
                handle_move(&state, &identity, rejoin.as_ref(), column).await;
            }
        }
    }

    // _guard drops here → unregister + mark_disconnected / abandon.
    Ok(())
}

/// Places a freshly connected participant.
async fn establish<C: Codec>(
    state: &Arc<ServerState<C>>,
    identity: &Identity,
    rejoin: Option<&SessionId>,
) {
    if let Some(session_id) = rejoin {
        let rejoined = state.registry.lock().await.rejoin(identity, session_id);
        if let Some(session) = rejoined {
            if let Some(init) = init_message(&session, identity) {
                state.push(identity, &init).await;
            }
            state.push(identity, &state_message(&session)).await;
            return;
        }
    }

    let assignment = state.registry.lock().await.assign_participant(identity);

    if assignment.waiting {
        state.push(identity, &ServerMessage::waiting()).await;
        arm_fallback(state, identity);
        return;
    }

    let Some(session) = assignment.session else {
        return;
    };
    if let Some(init) = init_message(&session, identity) {
        state.push(identity, &init).await;
    }
    for peer in session.remote_identities().filter(|p| *p != identity) {
        if state.hub.is_online(peer).await {
            if let Some(init) = init_message(&session, peer) {
                state.push(peer, &init).await;
            }
        }
    }
}

/// Starts the one-shot fallback timer for a waiting participant.
///
/// There is no cancel: when the timer fires it only acts if the identity
/// still holds the waiting slot.
fn arm_fallback<C: Codec>(state: &Arc<ServerState<C>>, identity: &Identity) {
    let state = Arc::clone(state);
    let identity = identity.clone();
    tokio::spawn(async move {
        tokio::time::sleep(state.config.fallback_delay).await;

        let started = {
            let mut registry = state.registry.lock().await;
            registry.fallback_if_waiting(&identity).map(|session| {
                let opening = registry.play_opponent_turn(&session.id);
                (session, opening)
            })
        };
        let Some((session, opening)) = started else {
            return;
        };

        if let Some(init) = init_message(&session, &identity) {
            state.push(&identity, &init).await;
        }
        if let Some((_, session)) = opening {
            state.broadcast_state(&session).await;
        }
    });
}

/// Applies one move from `identity`, then lets the embedded opponent
/// answer if it is its turn.
async fn handle_move<C: Codec>(
    state: &Arc<ServerState<C>>,
    identity: &Identity,
    requested: Option<&SessionId>,
    column: i64,
) {
    // Negative columns fall through to the grid's own range check.
    let column = usize::try_from(column).unwrap_or(usize::MAX);

    let result = {
        let mut registry = state.registry.lock().await;
        match registry.resolve_session(identity, requested) {
            Some(session_id) => registry.handle_move(identity, &session_id, column),
            None => Err(SessionError::InvalidTurn),
        }
    };

    let session = match result {
        Ok((_, session)) => session,
        Err(e) => {
            tracing::debug!(%identity, error = %e, "move rejected");
            state.push(identity, &ServerMessage::error(e)).await;
            return;
        }
    };
    state.broadcast_state(&session).await;

    if session.status != SessionStatus::Active {
        return;
    }
    let reply = state.registry.lock().await.play_opponent_turn(&session.id);
    if let Some((_, session)) = reply {
        state.broadcast_state(&session).await;
    }
}

/// Drains a connection's outbound queue into its socket. Ends when the
/// queue's sender is dropped (the connection was unregistered or
/// replaced) or the socket fails.
async fn write_loop(mut sender: WebSocketSender, mut outbound: mpsc::Receiver<String>) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = sender.send_text(frame).await {
            tracing::debug!(conn_id = %sender.id(), error = %e, "write failed");
            break;
        }
    }
    let _ = sender.close().await;
}
