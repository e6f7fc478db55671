//! # Fourfold
//!
//! Real-time four-in-a-row match server.
//!
//! Clients connect over WebSocket with `?username=<name>` and are paired
//! with the next arriving participant. Anyone left waiting too long is
//! seated against an embedded opponent instead. The server owns every
//! grid: clients only send the column they want to play and receive the
//! resulting state.
//!
//! ```text
//! Transport (WebSocket) → Protocol (JSON) → Session registry → Grid engine
//!                                                  │
//!                                                  └→ events → GameStore / EventPublisher
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fourfold::prelude::*;
//!
//! # async fn start() -> Result<(), FourfoldError> {
//! let server = FourfoldServer::builder()
//!     .config(ServerConfig::from_env())
//!     .build(MemoryStore::new(), TracingPublisher)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod dispatch;
mod error;
mod handler;
mod hub;
mod publisher;
mod server;
mod store;

pub use config::{ConfigError, ServerConfig};
pub use error::FourfoldError;
pub use publisher::{EventPublisher, PublishError, TracingPublisher};
pub use server::{FourfoldServer, FourfoldServerBuilder};
pub use store::{GameStore, LeaderboardRow, MemoryStore, StoreError};

/// Everything needed to start a server and talk about its sessions.
pub mod prelude {
    pub use crate::{
        ConfigError, EventPublisher, FourfoldError, FourfoldServer,
        FourfoldServerBuilder, GameStore, LeaderboardRow, MemoryStore,
        PublishError, ServerConfig, StoreError, TracingPublisher,
    };
    pub use fourfold_grid::{Cell, Grid, Mark};
    pub use fourfold_protocol::{
        ClientMessage, Identity, ServerMessage, SessionId, SessionStatus,
    };
    pub use fourfold_session::{FinishedGame, RegistryConfig, SessionEvent};
}
