//! # Unix Domain Socket Transport
//!
//! Requires feature: `network`
//!
//! ## Wire Protocol
//!
//! One JSON-encoded envelope per line (`\n`-terminated). Lines that do not
//! decode as an envelope object, including lines that are not valid UTF-8,
//! are dropped and the connection stays up. Lines longer than
//! `MAX_LINE_BYTES` are discarded whole.
//!
//! ## Socket File
//!
//! Before binding, an existing socket file is checked: if a server answers,
//! `listen` fails with `AddressInUse`; otherwise the stale file is removed.
//! A path that exists but is not a socket is left alone and `listen` fails.
//! The file is removed again when the server closes.
//!
//! ## Reconnect
//!
//! After losing the server, the client retries every `retry` interval and
//! reports `Disconnected`/`Connected` around each gap, until `disconnect`.

use std::collections::HashMap;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{ConnectionId, Envelope, RawEnvelope};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ports::{
    ClientEvent, ClientEvents, ClientTransport, ServerEvent, ServerEvents, ServerTransport,
    TransportError,
};

// =============================================================================
// FRAMING
// =============================================================================

fn encode(envelope: &Envelope) -> Result<String, TransportError> {
    let mut line = serde_json::to_string(envelope).map_err(|e| TransportError::Io(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Longest line accepted from a peer, terminator included.
const MAX_LINE_BYTES: usize = 1 << 20;

fn decode(line: &[u8]) -> Option<RawEnvelope> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_slice(line) {
        Ok(raw) => Some(raw),
        Err(error) => {
            debug!(%error, "Dropping undecodable line");
            None
        }
    }
}

/// Read the next line into `frame`. Returns `false` at end of stream.
///
/// Oversized lines are skipped up to their terminator without buffering them.
async fn read_frame<R>(reader: &mut R, frame: &mut Vec<u8>) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_LINE_BYTES as u64;
    loop {
        frame.clear();
        if (&mut *reader).take(limit).read_until(b'\n', frame).await? == 0 {
            return Ok(false);
        }
        if frame.ends_with(b"\n") || frame.len() < MAX_LINE_BYTES {
            return Ok(true);
        }

        debug!(limit = MAX_LINE_BYTES, "Discarding oversized line");
        loop {
            frame.clear();
            if (&mut *reader).take(limit).read_until(b'\n', frame).await? == 0 {
                return Ok(false);
            }
            if frame.ends_with(b"\n") {
                break;
            }
        }
    }
}

/// Drain queued lines onto the socket until the queue closes or a write fails.
async fn write_lines(mut writer: OwnedWriteHalf, mut lines: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = lines.recv().await {
        if let Err(error) = writer.write_all(line.as_bytes()).await {
            debug!(%error, "Socket write failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
}

fn connect_error(path: &str, error: &io::Error) -> TransportError {
    match error.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => {
            TransportError::ConnectionRefused(path.to_string())
        }
        _ => TransportError::Io(error.to_string()),
    }
}

/// Remove a socket file nobody answers on. Anything other than a socket is kept.
async fn clear_stale_socket(path: &Path) -> Result<(), TransportError> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(error.into()),
    };
    if !metadata.file_type().is_socket() {
        warn!(path = %path.display(), "Socket path is taken by a non-socket file");
        return Err(TransportError::AddressInUse(path.display().to_string()));
    }
    if UnixStream::connect(path).await.is_ok() {
        return Err(TransportError::AddressInUse(path.display().to_string()));
    }
    info!(path = %path.display(), "Removing stale socket");
    std::fs::remove_file(path)?;
    Ok(())
}

// =============================================================================
// SERVER TRANSPORT
// =============================================================================

/// Server transport listening on a Unix socket path.
#[derive(Debug, Default)]
pub struct UnixServerTransport {
    listening: Mutex<Option<Listening>>,
}

#[derive(Debug)]
struct Listening {
    path: PathBuf,
    accept_task: JoinHandle<()>,
    shared: Arc<ServerShared>,
}

#[derive(Debug)]
struct ServerShared {
    events: mpsc::UnboundedSender<ServerEvent>,
    connections: Mutex<HashMap<ConnectionId, Connection>>,
    next_connection: AtomicU64,
}

#[derive(Debug)]
struct Connection {
    writer: mpsc::UnboundedSender<String>,
    reader_task: JoinHandle<()>,
}

impl UnixServerTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn shared(&self) -> Result<Arc<ServerShared>, TransportError> {
        self.listening
            .lock()
            .as_ref()
            .map(|listening| Arc::clone(&listening.shared))
            .ok_or(TransportError::Closed)
    }
}

impl ServerShared {
    fn accept(self: &Arc<Self>, stream: UnixStream) {
        let connection = ConnectionId::new(self.next_connection.fetch_add(1, Ordering::SeqCst) + 1);
        let (reader, writer) = stream.into_split();
        let (lines, queue) = mpsc::unbounded_channel();
        tokio::spawn(write_lines(writer, queue));

        // Connected must precede the first Message from this connection.
        let _ = self.events.send(ServerEvent::Connected(connection));
        // Held across the spawn so the reader cannot remove the entry first.
        let mut connections = self.connections.lock();
        let reader_task = tokio::spawn(Arc::clone(self).read_connection(connection, reader));
        connections.insert(
            connection,
            Connection {
                writer: lines,
                reader_task,
            },
        );
        debug!(%connection, "Socket connection accepted");
    }

    async fn read_connection(self: Arc<Self>, connection: ConnectionId, reader: OwnedReadHalf) {
        let mut reader = BufReader::new(reader);
        let mut frame = Vec::new();
        loop {
            match read_frame(&mut reader, &mut frame).await {
                Ok(true) => {
                    if let Some(raw) = decode(&frame) {
                        let _ = self.events.send(ServerEvent::Message(raw, connection));
                    }
                }
                Ok(false) => break,
                Err(error) => {
                    debug!(%connection, %error, "Socket read failed");
                    break;
                }
            }
        }

        self.connections.lock().remove(&connection);
        let _ = self.events.send(ServerEvent::Disconnected(connection));
    }

    fn write(&self, connection: ConnectionId, line: String) -> Result<(), TransportError> {
        let connections = self.connections.lock();
        let target = connections.get(&connection).ok_or(TransportError::Closed)?;
        target.writer.send(line).map_err(|_| TransportError::Closed)
    }
}

async fn accept_loop(listener: UnixListener, shared: Arc<ServerShared>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => shared.accept(stream),
            Err(error) => {
                warn!(%error, "Socket accept failed");
                let _ = shared.events.send(ServerEvent::Destroyed);
                break;
            }
        }
    }
}

#[async_trait]
impl ServerTransport for UnixServerTransport {
    async fn listen(&self, address: &str) -> Result<ServerEvents, TransportError> {
        let path = PathBuf::from(address);
        clear_stale_socket(&path).await?;

        let listener = UnixListener::bind(&path).map_err(|error| match error.kind() {
            io::ErrorKind::AddrInUse => TransportError::AddressInUse(address.to_string()),
            _ => TransportError::Io(error.to_string()),
        })?;

        let (events, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(ServerShared {
            events,
            connections: Mutex::new(HashMap::new()),
            next_connection: AtomicU64::new(0),
        });
        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&shared)));

        *self.listening.lock() = Some(Listening {
            path,
            accept_task,
            shared,
        });
        Ok(receiver)
    }

    fn send(&self, connection: ConnectionId, envelope: &Envelope) -> Result<(), TransportError> {
        self.shared()?.write(connection, encode(envelope)?)
    }

    fn broadcast(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let shared = self.shared()?;
        let line = encode(envelope)?;
        for connection in shared.connections.lock().values() {
            let _ = connection.writer.send(line.clone());
        }
        Ok(())
    }

    fn close(&self) {
        let Some(listening) = self.listening.lock().take() else {
            return;
        };
        listening.accept_task.abort();

        let connections: Vec<_> = listening.shared.connections.lock().drain().collect();
        for (connection, state) in connections {
            state.reader_task.abort();
            let _ = listening.shared.events.send(ServerEvent::Disconnected(connection));
        }
        let _ = listening.shared.events.send(ServerEvent::Destroyed);

        if let Err(error) = std::fs::remove_file(&listening.path) {
            warn!(path = %listening.path.display(), %error, "Failed to remove socket file");
        }
        info!(path = %listening.path.display(), "Socket server closed");
    }
}

// =============================================================================
// CLIENT TRANSPORT
// =============================================================================

/// Client transport connecting to a Unix socket path, reconnecting on loss.
#[derive(Debug, Default)]
pub struct UnixClientTransport {
    session: Mutex<Option<ClientSession>>,
}

#[derive(Debug)]
struct ClientSession {
    events: mpsc::UnboundedSender<ClientEvent>,
    writer: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    task: JoinHandle<()>,
}

impl UnixClientTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientTransport for UnixClientTransport {
    async fn connect(&self, address: &str, retry: Duration) -> Result<ClientEvents, TransportError> {
        let stream = UnixStream::connect(address)
            .await
            .map_err(|error| connect_error(address, &error))?;

        let (events, receiver) = mpsc::unbounded_channel();
        let writer = Arc::new(Mutex::new(None));
        let task = tokio::spawn(run_client(
            stream,
            address.to_string(),
            retry,
            Arc::clone(&writer),
            events.clone(),
        ));

        if let Some(previous) = self.session.lock().replace(ClientSession { events, writer, task }) {
            previous.task.abort();
        }
        Ok(receiver)
    }

    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let line = encode(envelope)?;
        let session = self.session.lock();
        let session = session.as_ref().ok_or(TransportError::Closed)?;
        let writer = session.writer.lock();
        writer
            .as_ref()
            .ok_or(TransportError::Closed)?
            .send(line)
            .map_err(|_| TransportError::Closed)
    }

    fn disconnect(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };
        session.task.abort();
        session.writer.lock().take();
        let _ = session.events.send(ClientEvent::Destroyed);
    }
}

/// Serve one connection at a time, reconnecting every `retry` after a loss.
async fn run_client(
    mut stream: UnixStream,
    path: String,
    retry: Duration,
    writer: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    events: mpsc::UnboundedSender<ClientEvent>,
) {
    loop {
        let (reader, write_half) = stream.into_split();
        let (lines, queue) = mpsc::unbounded_channel();
        let write_task = tokio::spawn(write_lines(write_half, queue));
        *writer.lock() = Some(lines);

        if events.send(ClientEvent::Connected).is_err() {
            return;
        }

        let mut incoming = BufReader::new(reader);
        let mut frame = Vec::new();
        while let Ok(true) = read_frame(&mut incoming, &mut frame).await {
            if let Some(raw) = decode(&frame) {
                if events.send(ClientEvent::Message(raw)).is_err() {
                    return;
                }
            }
        }

        writer.lock().take();
        write_task.abort();
        if events.send(ClientEvent::Disconnected).is_err() {
            return;
        }
        info!(%path, "Lost connection to server; reconnecting");

        stream = loop {
            tokio::time::sleep(retry).await;
            match UnixStream::connect(&path).await {
                Ok(stream) => break stream,
                Err(error) => debug!(%path, %error, "Reconnect attempt failed"),
            }
        };
    }
}
