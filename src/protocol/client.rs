use std::{
    io::{Read, Write},
    net::{TcpStream, ToSocketAddrs},
};

use log::debug;
use thiserror::Error;

use crate::{
    Command, Outcome,
    storage::{Employee, EmployeeEdit, HoursUpdate, NewEmployee, StoreError},
};

use super::{
    Message, MessageKind, PROTOCOL_VERSION, ProtocolTransport, TransportError,
    request::response_kind,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("server rejected {0}")]
    Rejected(String),

    #[error("unexpected {0:?} from server")]
    Unexpected(MessageKind),

    #[error(transparent)]
    Invalid(#[from] StoreError),
}

/// Blocking connection to a staffdb server.
///
/// Construction performs the handshake, so every `Client` is ready for commands.
/// A rejected command ends the session on the server side; further calls will
/// fail with a transport error.
pub struct Client<T: Read + Write> {
    transport: ProtocolTransport<T>,
    protocol: u16,
}

impl Client<TcpStream> {
    pub fn connect(address: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(address).map_err(TransportError::from)?;
        Self::handshake(stream)
    }
}

impl<T: Read + Write> Client<T> {
    pub fn handshake(stream: T) -> Result<Self, ClientError> {
        let mut transport = ProtocolTransport::new(stream);
        transport.write_message(&Message::HelloRequest {
            protocol: PROTOCOL_VERSION,
        })?;

        match transport.read_message()? {
            Message::HelloResponse { protocol } => {
                debug!("server speaks protocol v{protocol}");
                Ok(Self {
                    transport,
                    protocol,
                })
            }
            Message::Error => Err(ClientError::Rejected("handshake".into())),
            other => Err(ClientError::Unexpected(other.kind())),
        }
    }

    /// Protocol version announced by the server.
    pub fn protocol(&self) -> u16 {
        self.protocol
    }

    pub fn execute(&mut self, command: Command) -> Result<Outcome, ClientError> {
        let expected = response_kind(&command);
        let description = command.to_string();
        self.transport.write_message(&command.into())?;

        let reply = self.transport.read_message()?;
        match reply.kind() {
            MessageKind::Error => Err(ClientError::Rejected(description)),
            kind if kind == expected => {
                Outcome::try_from(reply).map_err(|_| ClientError::Unexpected(kind))
            }
            kind => Err(ClientError::Unexpected(kind)),
        }
    }

    pub fn list(&mut self) -> Result<Vec<Employee>, ClientError> {
        match self.execute(Command::List)? {
            Outcome::Listed(employees) => Ok(employees),
            other => Err(unexpected(other)),
        }
    }

    /// Returns the id assigned to the new employee.
    pub fn add(&mut self, employee: NewEmployee) -> Result<u32, ClientError> {
        match self.execute(Command::Add(employee))? {
            Outcome::Added { id } => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    pub fn add_hours(&mut self, name: &str, delta: u32) -> Result<(), ClientError> {
        let update = HoursUpdate::new(name, delta)?;
        self.execute(Command::AddHours(update)).map(|_| ())
    }

    /// Returns how many employees were removed.
    pub fn delete_by_name(&mut self, name: &str) -> Result<u32, ClientError> {
        match self.execute(Command::RemoveByName(name.to_string()))? {
            Outcome::RemovedByName { count } => Ok(count),
            other => Err(unexpected(other)),
        }
    }

    pub fn delete_by_id(&mut self, id: u32) -> Result<(), ClientError> {
        self.execute(Command::RemoveById(id)).map(|_| ())
    }

    pub fn edit(&mut self, edit: EmployeeEdit) -> Result<(), ClientError> {
        self.execute(Command::Edit(edit)).map(|_| ())
    }
}

fn unexpected(outcome: Outcome) -> ClientError {
    ClientError::Unexpected(Message::from(outcome).kind())
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use super::*;

    /// Stream that replays canned server bytes and records what the client sends.
    struct Scripted {
        replies: Cursor<Vec<u8>>,
        sent: Vec<u8>,
    }

    impl Scripted {
        fn new(replies: &[Message]) -> Self {
            let bytes = replies
                .iter()
                .flat_map(|m| m.encode().unwrap())
                .collect::<Vec<_>>();
            Self {
                replies: Cursor::new(bytes),
                sent: Vec::new(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.replies.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.sent.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sent(client: &Client<Scripted>) -> Vec<Message> {
        let mut bytes = client.transport.get_ref().sent.as_slice();
        let mut out = Vec::new();
        while !bytes.is_empty() {
            let (message, read) = Message::decode(bytes).unwrap();
            out.push(message);
            bytes = &bytes[read..];
        }
        out
    }

    #[test]
    fn handshake_first() {
        let stream = Scripted::new(&[
            Message::HelloResponse { protocol: 100 },
            Message::AddResponse { id: 7 },
        ]);
        let mut client = Client::handshake(stream).unwrap();
        assert_eq!(client.protocol(), 100);

        let id = client
            .add(NewEmployee::new("Alice", "123 Main St", 10).unwrap())
            .unwrap();
        assert_eq!(id, 7);
        assert_eq!(
            sent(&client),
            vec![
                Message::HelloRequest { protocol: 100 },
                Message::AddRequest("Alice,123 Main St,10".into()),
            ]
        );
    }

    #[test]
    fn rejected_handshake() {
        let stream = Scripted::new(&[Message::Error]);
        assert!(matches!(
            Client::handshake(stream),
            Err(ClientError::Rejected(_))
        ));
    }

    #[test]
    fn error_reply_is_rejection() {
        let stream = Scripted::new(&[Message::HelloResponse { protocol: 100 }, Message::Error]);
        let mut client = Client::handshake(stream).unwrap();

        let err = client.delete_by_name("nobody").unwrap_err();
        assert_eq!(err.to_string(), "server rejected remove 'nobody'");
    }

    #[test]
    fn mismatched_reply_is_unexpected() {
        let stream = Scripted::new(&[
            Message::HelloResponse { protocol: 100 },
            Message::EditResponse,
        ]);
        let mut client = Client::handshake(stream).unwrap();

        assert!(matches!(
            client.list(),
            Err(ClientError::Unexpected(MessageKind::EditResponse))
        ));
    }

    #[test]
    fn invalid_fields_never_reach_the_wire() {
        let stream = Scripted::new(&[Message::HelloResponse { protocol: 100 }]);
        let mut client = Client::handshake(stream).unwrap();

        assert!(matches!(
            client.add_hours("a,b", 1),
            Err(ClientError::Invalid(StoreError::Validation { .. }))
        ));
        assert_eq!(sent(&client).len(), 1);
    }

    #[test]
    fn list_returns_employees() {
        let employees = vec![Employee {
            id: 1,
            name: "Alice".into(),
            address: "1 Elm".into(),
            hours: 4,
        }];
        let stream = Scripted::new(&[
            Message::HelloResponse { protocol: 100 },
            Message::ListResponse(employees.clone()),
            Message::DeleteResponse { count: 1 },
        ]);
        let mut client = Client::handshake(stream).unwrap();

        assert_eq!(client.list().unwrap(), employees);
        assert_eq!(client.delete_by_name("Alice").unwrap(), 1);
    }
}
