use std::io::{self, Read, Write};

use log::trace;
use thiserror::Error;

use super::message::{CodecError, FrameHeader, HEADER_SIZE, Message};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
}

/// Blocking message exchange over a byte stream.
pub struct ProtocolTransport<T: Read + Write> {
    stream: T,
}

impl<T: Read + Write> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        Self { stream }
    }

    pub fn get_ref(&self) -> &T {
        &self.stream
    }

    pub fn write_message(&mut self, message: &Message) -> Result<(), TransportError> {
        let bytes = message.encode()?;
        trace!("writing {:?} ({} bytes)", message.kind(), bytes.len());
        self.stream.write_all(&bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Reads exactly one message: the header first, then as many payload bytes as
    /// the header declares.
    pub fn read_message(&mut self) -> Result<Message, TransportError> {
        let mut buf = vec![0; HEADER_SIZE];
        self.stream.read_exact(&mut buf)?;

        let header = FrameHeader::decode(&buf)?;
        buf.resize(header.frame_size(), 0);
        self.stream.read_exact(&mut buf[HEADER_SIZE..])?;
        trace!("read {:?} ({} bytes)", header.kind, buf.len());

        let (message, _) = Message::decode(&buf)?;
        Ok(message)
    }
}
