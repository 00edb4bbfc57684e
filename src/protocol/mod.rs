//! Client-server communication protocol.
//!
//! This module defines the binary protocol spoken between staffdb clients and the
//! server, the per-connection state machine that interprets it, and the
//! single-threaded multiplexer that serves many connections at once.
//!
//! # Overview
//!
//! A connection opens with a handshake: the client sends a hello request carrying
//! [`PROTOCOL_VERSION`] and the server answers with its own version. Only then are
//! employee commands accepted. Every command gets exactly one reply. Any failure,
//! whether a malformed message, a wrong version, or a rejected command, is answered
//! with an error message and the server closes the connection.
//!
//! # Key Components
//!
//! - [`Message`]: Every request and response, with its wire encoding.
//! - [`Session`]: Protocol state of one connection.
//! - [`Server`]: Readiness-driven loop over a fixed table of connection slots.
//! - [`Client`]: Typed, blocking access to a server.
//!
//! # Binary Format
//!
//! - Each message begins with a 6-byte header, `type: u32` and `len: u16`.
//! - `len` fixed-size payload records follow.
//! - All integers are big-endian (network order).
//!
//! A request must arrive whole within one readiness event and fit in a
//! [`BUFFER_SIZE`] receive buffer; the server does not reassemble messages split
//! across events.
//!
//! # See Also
//!
//! - [`storage`](crate::storage): Record store mutated by protocol commands.
mod client;
pub mod message;
mod request;
mod response;
mod server;
mod session;
mod slots;
mod transport;

pub use client::{Client, ClientError};
pub use error::{ProtocolError, SessionError};
pub use message::{CodecError, Message, MessageKind};
pub use server::{DEFAULT_CAPACITY, Server, ServerConfig, ServerError, ShutdownHandle};
pub use session::{ConnectionState, Session};
pub use slots::{SlotHandle, SlotTable};
pub use transport::{ProtocolTransport, TransportError};

/// Version both sides must announce in the handshake.
pub const PROTOCOL_VERSION: u16 = 100;

/// Receive buffer of one connection slot; no request may be larger.
pub const BUFFER_SIZE: usize = 4096;

pub mod error {
    use thiserror::Error;

    use crate::storage::StoreError;

    use super::{CodecError, MessageKind};

    #[derive(Debug, Error)]
    pub enum ProtocolError {
        #[error("expected a hello request to open the session, got {0:?}")]
        HandshakeRequired(MessageKind),

        #[error("protocol version mismatch: expected {expected}, got {got}")]
        VersionMismatch { expected: u16, got: u16 },

        #[error("{0:?} is not a valid request")]
        UnexpectedMessage(MessageKind),

        #[error("message of {size} bytes exceeds the {limit} byte limit")]
        Oversized { size: usize, limit: usize },

        #[error("{0} bytes of an incomplete message left after the read")]
        Truncated(usize),

        #[error("session is not accepting messages")]
        Closed,

        #[error("malformed message: {0}")]
        Malformed(#[from] CodecError),
    }

    /// Failure that ends a connection.
    #[derive(Debug, Error)]
    pub enum SessionError {
        #[error(transparent)]
        Protocol(#[from] ProtocolError),

        #[error(transparent)]
        Store(#[from] StoreError),
    }

    impl From<CodecError> for SessionError {
        fn from(value: CodecError) -> Self {
            SessionError::Protocol(value.into())
        }
    }
}
