//! Wire codec.
//!
//! Every message is a 6-byte header followed by `len` fixed-size payload records:
//!
//! ```text
//! header   type: u32 | len: u16
//! hello    protocol: u16
//! text     data: [u8; 1024]            (NUL-terminated, comma separated fields)
//! number   value: u32                  (delete-by-id, add and delete responses)
//! entry    id: u32 | name: [u8; 256] | address: [u8; 256] | hours: u32
//! ```
//!
//! Integers are big-endian. Each message type accepts exactly one element count
//! except the list response, whose `len` is the number of entries that follow.
use bincode::{
    Decode, Encode,
    config::{BigEndian, Configuration, Fixint},
    decode_from_slice, encode_into_std_write,
};
use thiserror::Error;

use crate::{
    storage::{
        Employee,
        layout::record::{ADDRESS_MAX_LENGTH, NAME_MAX_LENGTH},
    },
    utilities::{pack_text, unpack_text},
};

/// Size of the text payload carried by add, add-hours, delete and edit requests.
pub const DATA_SIZE: usize = 1024;
pub const HEADER_SIZE: usize = size_of::<u32>() + size_of::<u16>();

const HELLO_SIZE: usize = size_of::<u16>();
const NUMBER_SIZE: usize = size_of::<u32>();
const ENTRY_SIZE: usize = 2 * size_of::<u32>() + NAME_MAX_LENGTH + ADDRESS_MAX_LENGTH;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown message type {0}")]
    UnknownKind(u32),

    #[error("{kind:?} cannot carry {len} payload record(s)")]
    Length { kind: MessageKind, len: u16 },

    #[error("incomplete message: need {needed} bytes, have {available}")]
    Incomplete { needed: usize, available: usize },

    #[error("invalid text payload: {0}")]
    Text(String),

    #[error("{0} records do not fit in one message")]
    TooManyRecords(usize),

    #[error("failed to encode message: {0}")]
    Serialize(#[from] bincode::error::EncodeError),

    #[error("failed to decode message: {0}")]
    Deserialize(#[from] bincode::error::DecodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageKind {
    HelloRequest = 0,
    HelloResponse = 1,
    ListRequest = 2,
    ListResponse = 3,
    AddRequest = 4,
    AddResponse = 5,
    AddHoursRequest = 6,
    AddHoursResponse = 7,
    DeleteRequest = 8,
    DeleteResponse = 9,
    DeleteIdRequest = 10,
    DeleteIdResponse = 11,
    EditRequest = 12,
    EditResponse = 13,
    Error = 14,
}

impl TryFrom<u32> for MessageKind {
    type Error = CodecError;

    fn try_from(value: u32) -> Result<Self, CodecError> {
        use MessageKind::*;

        Ok(match value {
            0 => HelloRequest,
            1 => HelloResponse,
            2 => ListRequest,
            3 => ListResponse,
            4 => AddRequest,
            5 => AddResponse,
            6 => AddHoursRequest,
            7 => AddHoursResponse,
            8 => DeleteRequest,
            9 => DeleteResponse,
            10 => DeleteIdRequest,
            11 => DeleteIdResponse,
            12 => EditRequest,
            13 => EditResponse,
            14 => Error,
            n => return Err(CodecError::UnknownKind(n)),
        })
    }
}

impl MessageKind {
    fn payload_size(self) -> usize {
        use MessageKind::*;

        match self {
            HelloRequest | HelloResponse => HELLO_SIZE,
            AddRequest | AddHoursRequest | DeleteRequest | EditRequest => DATA_SIZE,
            DeleteIdRequest | AddResponse | DeleteResponse => NUMBER_SIZE,
            ListResponse => ENTRY_SIZE,
            ListRequest | AddHoursResponse | DeleteIdResponse | EditResponse | Error => 0,
        }
    }

    fn check_len(self, len: u16) -> Result<(), CodecError> {
        let valid = match self {
            MessageKind::ListResponse => true,
            kind if kind.payload_size() == 0 => len == 0,
            _ => len == 1,
        };

        if valid {
            Ok(())
        } else {
            Err(CodecError::Length { kind: self, len })
        }
    }
}

/// Decoded message header; tells how many bytes the whole frame occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: MessageKind,
    pub len: u16,
}

impl FrameHeader {
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < HEADER_SIZE {
            return Err(CodecError::Incomplete {
                needed: HEADER_SIZE,
                available: buf.len(),
            });
        }

        let (header, _): (WireHeader, _) = decode_from_slice(&buf[..HEADER_SIZE], config())?;
        let kind = MessageKind::try_from(header.kind)?;
        kind.check_len(header.len)?;

        Ok(Self {
            kind,
            len: header.len,
        })
    }

    /// Total bytes of the frame, header included.
    pub fn frame_size(&self) -> usize {
        HEADER_SIZE + usize::from(self.len) * self.kind.payload_size()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    HelloRequest { protocol: u16 },
    HelloResponse { protocol: u16 },
    ListRequest,
    ListResponse(Vec<Employee>),
    AddRequest(String),
    AddResponse { id: u32 },
    AddHoursRequest(String),
    AddHoursResponse,
    DeleteRequest(String),
    DeleteResponse { count: u32 },
    DeleteIdRequest { id: u32 },
    DeleteIdResponse,
    EditRequest(String),
    EditResponse,
    Error,
}

#[derive(Encode, Decode)]
struct WireHeader {
    kind: u32,
    len: u16,
}

#[derive(Encode, Decode)]
struct Hello {
    protocol: u16,
}

#[derive(Encode, Decode)]
struct Data {
    data: [u8; DATA_SIZE],
}

#[derive(Encode, Decode)]
struct Number {
    value: u32,
}

#[derive(Encode, Decode)]
struct Entry {
    id: u32,
    name: [u8; NAME_MAX_LENGTH],
    address: [u8; ADDRESS_MAX_LENGTH],
    hours: u32,
}

fn config() -> Configuration<BigEndian, Fixint> {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::HelloRequest { .. } => MessageKind::HelloRequest,
            Message::HelloResponse { .. } => MessageKind::HelloResponse,
            Message::ListRequest => MessageKind::ListRequest,
            Message::ListResponse(_) => MessageKind::ListResponse,
            Message::AddRequest(_) => MessageKind::AddRequest,
            Message::AddResponse { .. } => MessageKind::AddResponse,
            Message::AddHoursRequest(_) => MessageKind::AddHoursRequest,
            Message::AddHoursResponse => MessageKind::AddHoursResponse,
            Message::DeleteRequest(_) => MessageKind::DeleteRequest,
            Message::DeleteResponse { .. } => MessageKind::DeleteResponse,
            Message::DeleteIdRequest { .. } => MessageKind::DeleteIdRequest,
            Message::DeleteIdResponse => MessageKind::DeleteIdResponse,
            Message::EditRequest(_) => MessageKind::EditRequest,
            Message::EditResponse => MessageKind::EditResponse,
            Message::Error => MessageKind::Error,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let kind = self.kind();
        let len = match self {
            Message::ListResponse(records) => u16::try_from(records.len())
                .map_err(|_| CodecError::TooManyRecords(records.len()))?,
            _ if kind.payload_size() == 0 => 0,
            _ => 1,
        };

        let header = FrameHeader { kind, len };
        let mut out = Vec::with_capacity(header.frame_size());
        let config = config();
        encode_into_std_write(
            WireHeader {
                kind: kind as u32,
                len,
            },
            &mut out,
            config,
        )?;

        match self {
            Message::HelloRequest { protocol } | Message::HelloResponse { protocol } => {
                encode_into_std_write(Hello { protocol: *protocol }, &mut out, config)?;
            }
            Message::AddRequest(text)
            | Message::AddHoursRequest(text)
            | Message::DeleteRequest(text)
            | Message::EditRequest(text) => {
                let data = pack_text::<DATA_SIZE>(text).ok_or_else(|| {
                    CodecError::Text(format!(
                        "request text must be under {DATA_SIZE} bytes without NUL"
                    ))
                })?;
                encode_into_std_write(Data { data }, &mut out, config)?;
            }
            Message::AddResponse { id: value }
            | Message::DeleteResponse { count: value }
            | Message::DeleteIdRequest { id: value } => {
                encode_into_std_write(Number { value: *value }, &mut out, config)?;
            }
            Message::ListResponse(records) => {
                for record in records {
                    encode_into_std_write(Entry::try_from(record)?, &mut out, config)?;
                }
            }
            Message::ListRequest
            | Message::AddHoursResponse
            | Message::DeleteIdResponse
            | Message::EditResponse
            | Message::Error => {}
        }

        Ok(out)
    }

    /// Decodes the message at the start of `buf`, returning it with the number of
    /// bytes it occupied. Nothing is decoded unless the whole frame is present.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), CodecError> {
        let header = FrameHeader::decode(buf)?;
        let size = header.frame_size();
        if buf.len() < size {
            return Err(CodecError::Incomplete {
                needed: size,
                available: buf.len(),
            });
        }

        let mut payload = PayloadReader {
            buf: &buf[HEADER_SIZE..size],
            offset: 0,
        };

        let message = match header.kind {
            MessageKind::HelloRequest => Message::HelloRequest {
                protocol: payload.read::<Hello>()?.protocol,
            },
            MessageKind::HelloResponse => Message::HelloResponse {
                protocol: payload.read::<Hello>()?.protocol,
            },
            MessageKind::ListRequest => Message::ListRequest,
            MessageKind::ListResponse => Message::ListResponse(
                (0..header.len)
                    .map(|_| payload.read::<Entry>().and_then(Employee::try_from))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            MessageKind::AddRequest => Message::AddRequest(payload.read_text()?),
            MessageKind::AddResponse => Message::AddResponse {
                id: payload.read::<Number>()?.value,
            },
            MessageKind::AddHoursRequest => Message::AddHoursRequest(payload.read_text()?),
            MessageKind::AddHoursResponse => Message::AddHoursResponse,
            MessageKind::DeleteRequest => Message::DeleteRequest(payload.read_text()?),
            MessageKind::DeleteResponse => Message::DeleteResponse {
                count: payload.read::<Number>()?.value,
            },
            MessageKind::DeleteIdRequest => Message::DeleteIdRequest {
                id: payload.read::<Number>()?.value,
            },
            MessageKind::DeleteIdResponse => Message::DeleteIdResponse,
            MessageKind::EditRequest => Message::EditRequest(payload.read_text()?),
            MessageKind::EditResponse => Message::EditResponse,
            MessageKind::Error => Message::Error,
        };

        Ok((message, size))
    }
}

struct PayloadReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl PayloadReader<'_> {
    fn read<D: Decode<()>>(&mut self) -> Result<D, CodecError> {
        let (value, read) = decode_from_slice(&self.buf[self.offset..], config())?;
        self.offset += read;
        Ok(value)
    }

    fn read_text(&mut self) -> Result<String, CodecError> {
        let data = self.read::<Data>()?;
        unpack_text(&data.data).ok_or_else(|| {
            CodecError::Text("request text is unterminated or not valid UTF-8".into())
        })
    }
}

impl TryFrom<&Employee> for Entry {
    type Error = CodecError;

    fn try_from(value: &Employee) -> Result<Self, Self::Error> {
        let invalid = |field: &str| CodecError::Text(format!("{field} of employee {}", value.id));

        Ok(Self {
            id: value.id,
            name: pack_text(&value.name).ok_or_else(|| invalid("name"))?,
            address: pack_text(&value.address).ok_or_else(|| invalid("address"))?,
            hours: value.hours,
        })
    }
}

impl TryFrom<Entry> for Employee {
    type Error = CodecError;

    fn try_from(value: Entry) -> Result<Self, Self::Error> {
        let invalid = |field: &str| CodecError::Text(format!("{field} of entry {}", value.id));

        Ok(Self {
            id: value.id,
            name: unpack_text(&value.name).ok_or_else(|| invalid("name"))?,
            address: unpack_text(&value.address).ok_or_else(|| invalid("address"))?,
            hours: value.hours,
        })
    }
}
