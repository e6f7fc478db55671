//! Wire protocol for Fourfold.
//!
//! This crate defines what travels between a browser client and the
//! server:
//!
//! - **Types** ([`Identity`], [`SessionId`], [`ClientMessage`],
//!   [`ServerMessage`]): the JSON messages and the ids they carry.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! # Architecture
//!
//! ```text
//! Transport (text frames) → Protocol (ClientMessage / ServerMessage) → Session registry
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, Identity, OPPONENT_IDENTITY, ServerMessage, SessionId,
    SessionStatus, WAITING_MESSAGE,
};
