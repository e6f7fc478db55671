//! `FourfoldServer` builder and server loop.
//!
//! This is the entry point for running a match server. It ties together
//! all the layers: transport → protocol → session registry, plus the
//! background sweeper and the collaborator dispatch task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fourfold_protocol::{Codec, Identity, JsonCodec, ServerMessage};
use fourfold_session::{RegistryConfig, Session, SessionEvent, SessionRegistry};
use fourfold_transport::WebSocketListener;
use tokio::sync::{Mutex, mpsc};
use tokio::time::MissedTickBehavior;

use crate::FourfoldError;
use crate::config::ServerConfig;
use crate::dispatch::run_dispatch;
use crate::handler::{handle_connection, state_message};
use crate::hub::ConnectionHub;
use crate::publisher::EventPublisher;
use crate::store::GameStore;

/// Lower bound for the sweep period; `tokio::time::interval` rejects zero.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Mutex<SessionRegistry>,
    pub(crate) hub: ConnectionHub,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

impl<C: Codec> ServerState<C> {
    /// Encodes `msg` and queues it for `identity`. Offline identities and
    /// full queues are skipped.
    pub(crate) async fn push(&self, identity: &Identity, msg: &ServerMessage) {
        match self.codec.encode_text(msg) {
            Ok(frame) => {
                self.hub.deliver(identity, frame).await;
            }
            Err(e) => tracing::warn!(%identity, error = %e, "failed to encode message"),
        }
    }

    /// Queues a `state` snapshot of `session` for every remote participant.
    pub(crate) async fn broadcast_state(&self, session: &Session) {
        let frame = match self.codec.encode_text(&state_message(session)) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "failed to encode state");
                return;
            }
        };
        for identity in session.remote_identities() {
            self.hub.deliver(identity, frame.clone()).await;
        }
    }
}

/// Builder for configuring and starting a Fourfold server.
///
/// # Example
///
/// ```rust,no_run
/// use fourfold::prelude::*;
///
/// # async fn start() -> Result<(), FourfoldError> {
/// let server = FourfoldServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(MemoryStore::new(), TracingPublisher)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct FourfoldServerBuilder {
    config: ServerConfig,
}

impl FourfoldServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a lone participant waits before facing the embedded
    /// opponent.
    pub fn fallback_delay(mut self, delay: Duration) -> Self {
        self.config.fallback_delay = delay;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn registry_config(mut self, config: RegistryConfig) -> Self {
        self.config.registry = config;
        self
    }

    /// Binds the listener and assembles the server.
    ///
    /// Uses `JsonCodec` and the WebSocket listener.
    pub async fn build<S, P>(
        self,
        store: S,
        publisher: P,
    ) -> Result<FourfoldServer<S, P, JsonCodec>, FourfoldError>
    where
        S: GameStore,
        P: EventPublisher,
    {
        let listener = WebSocketListener::bind(&self.config.bind_addr).await?;
        let (registry, events) = SessionRegistry::new(self.config.registry.clone());

        let state = Arc::new(ServerState {
            registry: Mutex::new(registry),
            hub: ConnectionHub::new(self.config.outbound_capacity),
            codec: JsonCodec,
            config: self.config,
        });

        Ok(FourfoldServer {
            listener,
            state,
            events,
            store: Arc::new(store),
            publisher: Arc::new(publisher),
        })
    }
}

impl Default for FourfoldServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Fourfold server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct FourfoldServer<S, P, C: Codec> {
    listener: WebSocketListener,
    state: Arc<ServerState<C>>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    store: Arc<S>,
    publisher: Arc<P>,
}

impl FourfoldServer<(), (), JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> FourfoldServerBuilder {
        FourfoldServerBuilder::new()
    }
}

impl<S, P, C> FourfoldServer<S, P, C>
where
    S: GameStore,
    P: EventPublisher,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, FourfoldError> {
        Ok(self.listener.local_addr()?)
    }

    /// The store finished matches are written to.
    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    /// Runs the server.
    ///
    /// Starts the dispatch task and the sweeper, then accepts connections
    /// and spawns a handler task for each. Runs until the process is
    /// terminated.
    pub async fn run(self) -> Result<(), FourfoldError> {
        let Self {
            listener,
            state,
            events,
            store,
            publisher,
        } = self;

        tokio::spawn(async move {
            run_dispatch(events, &*store, &*publisher).await;
        });
        tokio::spawn(run_sweeper(Arc::clone(&state)));

        tracing::info!(addr = %state.config.bind_addr, "Fourfold server running");

        loop {
            match listener.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let conn_id = pending.id();
                        if let Err(e) = handle_connection(pending, state).await {
                            tracing::debug!(
                                %conn_id,
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Periodically forfeits stale sessions, tells their remaining
/// participants, and purges old finished sessions.
async fn run_sweeper<C: Codec>(state: Arc<ServerState<C>>) {
    let period = state.config.sweep_interval.max(MIN_SWEEP_INTERVAL);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let forfeited = {
            let mut registry = state.registry.lock().await;
            let forfeited = registry.sweep_disconnects();
            registry.purge_finished();
            forfeited
        };
        for session in &forfeited {
            state.broadcast_state(session).await;
        }
    }
}
