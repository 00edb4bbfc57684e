//! Single-threaded connection multiplexer.
//!
//! One [`mio::Poll`] instance watches the listening socket, a shutdown waker and
//! every occupied connection slot. All sockets are non-blocking and registered
//! edge-triggered, so each readiness event is drained until the socket would
//! block. The record store lives on the loop thread and is never shared.
use std::{
    io::{self, Read, Write},
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, info, trace, warn};
use mio::{
    Events, Interest, Poll, Token, Waker,
    event::Event,
    net::{TcpListener, TcpStream},
};
use thiserror::Error;

use crate::storage::RecordStore;

use super::{
    BUFFER_SIZE, ProtocolError, SessionError,
    session::Session,
    slots::{SlotHandle, SlotTable},
};

/// Connection slots of a server built with [`ServerConfig::new`].
pub const DEFAULT_CAPACITY: usize = 256;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_SLOT: usize = 2;
const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub address: SocketAddr,
    /// Maximum number of concurrent connections. Connections beyond it are
    /// accepted and closed right away.
    pub capacity: usize,
}

impl ServerConfig {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Server IO Error: {0}")]
    Io(#[from] io::Error),
}

/// Stops a running [`Server`] from any thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    waker: Arc<Waker>,
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) -> io::Result<()> {
        self.flag.store(true, Ordering::SeqCst);
        self.waker.wake()
    }
}

/// Why a connection left its slot.
#[derive(Debug, Error)]
enum Disconnect {
    #[error("peer closed the connection")]
    PeerClosed,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    session: Session,
    buffer: Box<[u8; BUFFER_SIZE]>,
    filled: usize,
    outbound: Vec<u8>,
    interest: Interest,
}

impl Connection {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            session: Session::new(),
            buffer: Box::new([0; BUFFER_SIZE]),
            filled: 0,
            outbound: Vec::new(),
            interest: Interest::READABLE,
        }
    }

    /// Drains the socket and handles every complete message received. The
    /// buffer is compacted whenever it fills up, so only a message left
    /// incomplete once the socket would block is an error.
    fn receive(&mut self, store: &mut RecordStore) -> Result<(), Disconnect> {
        let mut eof = false;

        loop {
            if self.filled == BUFFER_SIZE {
                self.process(store)?;
                if self.filled == BUFFER_SIZE {
                    return Err(self.truncated());
                }
            }

            match self.stream.read(&mut self.buffer[self.filled..]) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(n) => {
                    trace!("read {n} bytes from {}", self.peer);
                    self.filled += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        self.process(store)?;
        if self.filled > 0 {
            return Err(self.truncated());
        }

        self.flush()?;
        if eof {
            return Err(Disconnect::PeerClosed);
        }
        Ok(())
    }

    fn process(&mut self, store: &mut RecordStore) -> Result<(), Disconnect> {
        match self
            .session
            .receive(&self.buffer[..self.filled], store, &mut self.outbound)
        {
            Ok(consumed) => {
                self.buffer.copy_within(consumed..self.filled, 0);
                self.filled -= consumed;
                Ok(())
            }
            Err(e) => {
                self.flush_remaining();
                Err(e.into())
            }
        }
    }

    fn truncated(&mut self) -> Disconnect {
        let error = self
            .session
            .reject(ProtocolError::Truncated(self.filled), &mut self.outbound);
        self.flush_remaining();
        error.into()
    }

    /// Writes queued replies until done or the socket would block.
    fn flush(&mut self) -> io::Result<()> {
        while !self.outbound.is_empty() {
            match self.stream.write(&self.outbound) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    trace!("wrote {n} bytes to {}", self.peer);
                    self.outbound.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Best effort delivery of the final error reply before the slot is freed.
    fn flush_remaining(&mut self) {
        if let Err(e) = self.flush() {
            debug!("dropping reply to {}: {e}", self.peer);
        }
    }

    /// Waits for writability only while replies are pending.
    fn update_interest(&mut self, poll: &Poll, token: Token) -> io::Result<()> {
        let interest = if self.outbound.is_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        };

        if interest != self.interest {
            poll.registry()
                .reregister(&mut self.stream, token, interest)?;
            self.interest = interest;
        }
        Ok(())
    }
}

fn slot_token(handle: SlotHandle) -> Token {
    Token(handle.index() + FIRST_SLOT)
}

pub struct Server {
    poll: Poll,
    listener: TcpListener,
    slots: SlotTable<Connection>,
    store: RecordStore,
    waker: Arc<Waker>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Binds the listening socket. Nothing is accepted until [`Server::run`].
    pub fn bind(config: ServerConfig, store: RecordStore) -> Result<Self, ServerError> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(config.address)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);

        info!(
            "listening at {} with {} connection slots",
            listener.local_addr()?,
            config.capacity
        );

        Ok(Self {
            poll,
            listener,
            slots: SlotTable::with_capacity(config.capacity),
            store,
            waker,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            waker: Arc::clone(&self.waker),
            flag: Arc::clone(&self.shutdown),
        }
    }

    /// Serves connections until shut down, then hands back the store.
    ///
    /// Per-connection failures only close that connection; an error is returned
    /// only when polling itself fails.
    pub fn run(mut self) -> Result<RecordStore, ServerError> {
        let mut events = Events::with_capacity(EVENT_CAPACITY);

        while !self.shutdown.load(Ordering::SeqCst) {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e.into());
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept(),
                    WAKER => debug!("woken for shutdown"),
                    Token(n) => match self.slots.handle_at(n - FIRST_SLOT) {
                        Some(handle) => self.connection_ready(handle, event),
                        None => trace!("event for free slot {}", n - FIRST_SLOT),
                    },
                }
            }
        }

        info!(
            "shutting down, closing {} connection(s)",
            self.slots.len()
        );
        for handle in self.slots.handles() {
            self.close(handle, Disconnect::PeerClosed);
        }
        Ok(self.store)
    }

    fn accept(&mut self) {
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    warn!("failed to accept connection: {e}");
                    return;
                }
            };

            let handle = match self.slots.insert(Connection::new(stream, peer)) {
                Ok(handle) => handle,
                Err(_) => {
                    warn!(
                        "rejecting {peer}: all {} connection slots are in use",
                        self.slots.capacity()
                    );
                    continue;
                }
            };

            let token = slot_token(handle);
            let Some(connection) = self.slots.get_mut(handle) else {
                continue;
            };
            match self
                .poll
                .registry()
                .register(&mut connection.stream, token, Interest::READABLE)
            {
                Ok(()) => {
                    connection.session.start();
                    info!("accepted {peer} into slot {}", handle.index());
                }
                Err(e) => self.close(handle, e.into()),
            }
        }
    }

    fn connection_ready(&mut self, handle: SlotHandle, event: &Event) {
        let Some(connection) = self.slots.get_mut(handle) else {
            return;
        };

        let mut result = Ok(());
        if event.is_readable() || event.is_read_closed() || event.is_error() {
            result = connection.receive(&mut self.store);
        }
        if result.is_ok() && event.is_writable() {
            result = connection.flush().map_err(Disconnect::from);
        }
        let result = result.and_then(|()| {
            connection
                .update_interest(&self.poll, slot_token(handle))
                .map_err(Disconnect::from)
        });

        if let Err(reason) = result {
            self.close(handle, reason);
        }
    }

    fn close(&mut self, handle: SlotHandle, reason: Disconnect) {
        let Some(mut connection) = self.slots.remove(handle) else {
            return;
        };
        connection.session.close();

        match reason {
            Disconnect::PeerClosed => info!("{} disconnected", connection.peer),
            reason => warn!("closing connection to {}: {reason}", connection.peer),
        }

        if let Err(e) = self.poll.registry().deregister(&mut connection.stream) {
            debug!("failed to deregister {}: {e}", connection.peer);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        net::TcpStream,
        thread::{self, JoinHandle},
    };

    use tempdir::TempDir;

    use crate::{
        Command, Outcome,
        protocol::{Client, ClientError, Message, PROTOCOL_VERSION},
        storage::NewEmployee,
    };

    use super::*;

    struct Running {
        address: SocketAddr,
        shutdown: ShutdownHandle,
        thread: JoinHandle<Result<RecordStore, ServerError>>,
    }

    impl Running {
        fn stop(self) -> RecordStore {
            self.shutdown.shutdown().unwrap();
            self.thread.join().unwrap().unwrap()
        }
    }

    fn start(temp: &TempDir, capacity: usize) -> Running {
        let store = RecordStore::create(temp.path().join("employees.db")).unwrap();
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap()).with_capacity(capacity);

        let server = Server::bind(config, store).unwrap();
        let address = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let thread = thread::spawn(move || server.run());

        Running {
            address,
            shutdown,
            thread,
        }
    }

    #[test]
    fn serves_commands() {
        let temp = TempDir::new("server").unwrap();
        let server = start(&temp, 4);
        let mut client = Client::connect(server.address).unwrap();
        assert_eq!(client.protocol(), PROTOCOL_VERSION);

        let id = client
            .add(NewEmployee::new("Alice", "123 Main St", 10).unwrap())
            .unwrap();
        assert_eq!(id, 1);
        client.add_hours("Alice", 5).unwrap();

        let employees = client.list().unwrap();
        assert_eq!(employees.len(), 1);
        assert_eq!(employees[0].hours, 15);
        drop(client);

        let store = server.stop();
        let reopened = RecordStore::open(store.path()).unwrap();
        assert_eq!(reopened.list(), store.list());
    }

    #[test]
    fn clients_share_one_store() {
        let temp = TempDir::new("server").unwrap();
        let server = start(&temp, 4);
        let mut first = Client::connect(server.address).unwrap();
        let mut second = Client::connect(server.address).unwrap();

        first
            .add(NewEmployee::new("Alice", "1 Elm", 1).unwrap())
            .unwrap();
        second
            .add(NewEmployee::new("Bob", "2 Oak", 2).unwrap())
            .unwrap();

        assert_eq!(
            second.execute(Command::RemoveByName("Alice".into())).unwrap(),
            Outcome::RemovedByName { count: 1 }
        );
        let names = first
            .list()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Bob"]);

        drop((first, second));
        server.stop();
    }

    #[test]
    fn full_table_rejects_without_disturbing_others() {
        let temp = TempDir::new("server").unwrap();
        let server = start(&temp, 1);
        let mut first = Client::connect(server.address).unwrap();

        assert!(Client::connect(server.address).is_err());

        first
            .add(NewEmployee::new("Alice", "1 Elm", 1).unwrap())
            .unwrap();
        assert_eq!(first.list().unwrap().len(), 1);

        drop(first);
        server.stop();
    }

    #[test]
    fn command_before_handshake_gets_error_and_close() {
        let temp = TempDir::new("server").unwrap();
        let server = start(&temp, 2);
        let mut stream = TcpStream::connect(server.address).unwrap();

        stream
            .write_all(&Message::AddRequest("Mallory,1 Elm,1".into()).encode().unwrap())
            .unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).unwrap();
        assert_eq!(reply, Message::Error.encode().unwrap());

        let store = server.stop();
        assert!(store.is_empty());
    }

    #[test]
    fn partial_message_closes_connection() {
        let temp = TempDir::new("server").unwrap();
        let server = start(&temp, 2);
        let mut stream = TcpStream::connect(server.address).unwrap();

        let mut request = Message::HelloRequest {
            protocol: PROTOCOL_VERSION,
        }
        .encode()
        .unwrap();
        request.extend(&Message::ListRequest.encode().unwrap()[..3]);
        stream.write_all(&request).unwrap();

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).unwrap();
        let (hello, read) = Message::decode(&reply).unwrap();
        assert_eq!(
            hello,
            Message::HelloResponse {
                protocol: PROTOCOL_VERSION
            }
        );
        assert_eq!(Message::decode(&reply[read..]).unwrap().0, Message::Error);

        server.stop();
    }

    #[test]
    fn failed_command_is_reported() {
        let temp = TempDir::new("server").unwrap();
        let server = start(&temp, 2);
        let mut client = Client::connect(server.address).unwrap();

        assert!(matches!(
            client.delete_by_id(99),
            Err(ClientError::Rejected(_))
        ));

        drop(client);
        server.stop();
    }

    #[test]
    fn shutdown_with_open_connections() {
        let temp = TempDir::new("server").unwrap();
        let server = start(&temp, 2);
        let _idle = TcpStream::connect(server.address).unwrap();
        let _client = Client::connect(server.address).unwrap();

        assert!(server.stop().is_empty());
    }
}
