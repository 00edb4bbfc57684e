//! Per-connection protocol state machine.
//!
//! ```text
//! New --start--> Hello --hello(v100)--> Msg --command--> Msg
//!                  |                      |
//!                  +------ failure -------+----> Disconnected
//! ```
//!
//! A [`Session`] never touches a socket. It consumes raw bytes, drives the
//! [`RecordStore`], and appends encoded replies to an outbound buffer owned by the
//! caller, which makes the whole handshake and dispatch logic testable in memory.
use log::{debug, warn};

use crate::{Command, storage::RecordStore};

use super::{
    BUFFER_SIZE, PROTOCOL_VERSION, ProtocolError, SessionError,
    message::{CodecError, FrameHeader, Message},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Slot allocated, nothing exchanged yet.
    New,
    /// Waiting for the hello request.
    Hello,
    /// Handshake done; commands are accepted.
    Msg,
    Disconnected,
}

#[derive(Debug)]
pub struct Session {
    state: ConnectionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::New,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Arms the handshake once the connection owns a slot.
    pub fn start(&mut self) {
        if self.state == ConnectionState::New {
            self.state = ConnectionState::Hello;
        }
    }

    pub fn close(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// Handles every complete message at the start of `input`, appending each
    /// reply to `out`, and returns the number of bytes consumed. An incomplete
    /// trailing message is left unconsumed.
    ///
    /// On failure an error message is appended to `out`, the session moves to
    /// [`ConnectionState::Disconnected`], and the connection must be closed.
    pub fn receive(
        &mut self,
        input: &[u8],
        store: &mut RecordStore,
        out: &mut Vec<u8>,
    ) -> Result<usize, SessionError> {
        let mut consumed = 0;

        while consumed < input.len() {
            match self.step(&input[consumed..], store) {
                Ok(Some((reply, read))) => {
                    out.extend_from_slice(&reply);
                    consumed += read;
                }
                Ok(None) => break,
                Err(e) => return Err(self.reject(e, out)),
            }
        }

        Ok(consumed)
    }

    /// Fails the session with `error`, queueing the error reply.
    pub fn reject(&mut self, error: impl Into<SessionError>, out: &mut Vec<u8>) -> SessionError {
        let error = error.into();
        warn!("rejecting session in state {:?}: {error}", self.state);

        if let Ok(bytes) = Message::Error.encode() {
            out.extend_from_slice(&bytes);
        }
        self.state = ConnectionState::Disconnected;
        error
    }

    fn step(
        &mut self,
        input: &[u8],
        store: &mut RecordStore,
    ) -> Result<Option<(Vec<u8>, usize)>, SessionError> {
        let header = match FrameHeader::decode(input) {
            Ok(header) => header,
            Err(CodecError::Incomplete { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let size = header.frame_size();
        if size > BUFFER_SIZE {
            return Err(ProtocolError::Oversized {
                size,
                limit: BUFFER_SIZE,
            }
            .into());
        }

        let (message, read) = match Message::decode(input) {
            Ok(decoded) => decoded,
            Err(CodecError::Incomplete { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let reply = self.dispatch(message, store)?;
        Ok(Some((reply.encode()?, read)))
    }

    fn dispatch(&mut self, message: Message, store: &mut RecordStore) -> Result<Message, SessionError> {
        match self.state {
            ConnectionState::Hello => match message {
                Message::HelloRequest { protocol } if protocol == PROTOCOL_VERSION => {
                    debug!("handshake complete, protocol v{protocol}");
                    self.state = ConnectionState::Msg;
                    Ok(Message::HelloResponse {
                        protocol: PROTOCOL_VERSION,
                    })
                }
                Message::HelloRequest { protocol } => Err(ProtocolError::VersionMismatch {
                    expected: PROTOCOL_VERSION,
                    got: protocol,
                }
                .into()),
                other => Err(ProtocolError::HandshakeRequired(other.kind()).into()),
            },
            ConnectionState::Msg => {
                let command = Command::try_from(message)?;
                debug!("executing {command}");

                Ok(command.execute(store)?.into())
            }
            ConnectionState::New | ConnectionState::Disconnected => {
                Err(ProtocolError::Closed.into())
            }
        }
    }
}
