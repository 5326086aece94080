//! # In-Memory Transport
//!
//! Server and client transports wired together inside one process, keyed by
//! address. Behaves like the socket transport without touching the OS:
//!
//! - `listen` on a taken address fails with `AddressInUse`
//! - `connect` to an unbound address fails with `ConnectionRefused`
//! - closing the server hangs up every client; clients then retry every
//!   `retry` until a server listens on the address again
//!
//! [`MemoryNetwork::stats`] counts transport sends, so tests can assert that
//! a routing decision performed no network I/O.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{ConnectionId, Envelope, RawEnvelope};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::ports::{
    ClientEvent, ClientEvents, ClientTransport, ServerEvent, ServerEvents, ServerTransport,
    TransportError,
};

/// Frames travelling from a server endpoint to one client.
#[derive(Debug)]
enum Wire {
    Deliver(RawEnvelope),
    Hangup,
}

/// Counts of server-side sends since the network was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub unicasts: u64,
    pub broadcasts: u64,
}

/// A set of in-process addresses servers can listen on.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<NetworkInner>,
}

#[derive(Debug, Default)]
struct NetworkInner {
    endpoints: Mutex<HashMap<String, Arc<Endpoint>>>,
    next_connection: AtomicU64,
    unicasts: AtomicU64,
    broadcasts: AtomicU64,
}

/// One listening server.
#[derive(Debug)]
struct Endpoint {
    events: mpsc::UnboundedSender<ServerEvent>,
    connections: Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<Wire>>>,
    closed: AtomicBool,
}

/// A client's attachment to an endpoint.
#[derive(Debug, Clone)]
struct Link {
    endpoint: Arc<Endpoint>,
    connection: ConnectionId,
}

impl MemoryNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A server transport on this network.
    #[must_use]
    pub fn server(&self) -> MemoryServerTransport {
        MemoryServerTransport {
            network: self.clone(),
            bound: Mutex::new(None),
        }
    }

    /// A client transport on this network.
    #[must_use]
    pub fn client(&self) -> MemoryClientTransport {
        MemoryClientTransport {
            network: self.clone(),
            session: Arc::new(Mutex::new(None)),
            task: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            unicasts: self.inner.unicasts.load(Ordering::SeqCst),
            broadcasts: self.inner.broadcasts.load(Ordering::SeqCst),
        }
    }

    #[must_use]
    pub fn is_listening(&self, address: &str) -> bool {
        self.inner.endpoints.lock().contains_key(address)
    }

    fn attach(&self, address: &str) -> Option<(Link, mpsc::UnboundedReceiver<Wire>)> {
        let endpoint = self.inner.endpoints.lock().get(address).cloned()?;
        let connection = ConnectionId::new(self.inner.next_connection.fetch_add(1, Ordering::SeqCst) + 1);
        let (wire_tx, wire_rx) = mpsc::unbounded_channel();

        endpoint.connections.lock().insert(connection, wire_tx);
        endpoint.events.send(ServerEvent::Connected(connection)).ok()?;
        debug!(%address, %connection, "Memory client attached");

        Some((Link { endpoint, connection }, wire_rx))
    }
}

impl Endpoint {
    fn deliver(&self, connection: ConnectionId, raw: RawEnvelope) -> Result<(), TransportError> {
        let connections = self.connections.lock();
        let wire = connections.get(&connection).ok_or(TransportError::Closed)?;
        wire.send(Wire::Deliver(raw)).map_err(|_| TransportError::Closed)
    }

    fn detach(&self, connection: ConnectionId) {
        if self.connections.lock().remove(&connection).is_some() {
            let _ = self.events.send(ServerEvent::Disconnected(connection));
        }
    }
}

// =============================================================================
// SERVER TRANSPORT
// =============================================================================

/// Server side of a [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryServerTransport {
    network: MemoryNetwork,
    bound: Mutex<Option<(String, Arc<Endpoint>)>>,
}

impl MemoryServerTransport {
    fn endpoint(&self) -> Result<Arc<Endpoint>, TransportError> {
        self.bound
            .lock()
            .as_ref()
            .map(|(_, endpoint)| Arc::clone(endpoint))
            .ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl ServerTransport for MemoryServerTransport {
    async fn listen(&self, address: &str) -> Result<ServerEvents, TransportError> {
        let mut endpoints = self.network.inner.endpoints.lock();
        if endpoints.contains_key(address) {
            return Err(TransportError::AddressInUse(address.to_string()));
        }

        let (events, receiver) = mpsc::unbounded_channel();
        let endpoint = Arc::new(Endpoint {
            events,
            connections: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });
        endpoints.insert(address.to_string(), Arc::clone(&endpoint));
        *self.bound.lock() = Some((address.to_string(), endpoint));
        Ok(receiver)
    }

    fn send(&self, connection: ConnectionId, envelope: &Envelope) -> Result<(), TransportError> {
        self.network.inner.unicasts.fetch_add(1, Ordering::SeqCst);
        self.endpoint()?.deliver(connection, envelope.clone().into())
    }

    fn broadcast(&self, envelope: &Envelope) -> Result<(), TransportError> {
        self.network.inner.broadcasts.fetch_add(1, Ordering::SeqCst);
        let endpoint = self.endpoint()?;
        let raw: RawEnvelope = envelope.clone().into();
        for wire in endpoint.connections.lock().values() {
            let _ = wire.send(Wire::Deliver(raw.clone()));
        }
        Ok(())
    }

    fn close(&self) {
        let Some((address, endpoint)) = self.bound.lock().take() else {
            return;
        };
        self.network.inner.endpoints.lock().remove(&address);
        endpoint.closed.store(true, Ordering::SeqCst);

        let connections: Vec<_> = endpoint.connections.lock().drain().collect();
        for (connection, wire) in connections {
            let _ = wire.send(Wire::Hangup);
            let _ = endpoint.events.send(ServerEvent::Disconnected(connection));
        }
        let _ = endpoint.events.send(ServerEvent::Destroyed);
        debug!(%address, "Memory server closed");
    }
}

// =============================================================================
// CLIENT TRANSPORT
// =============================================================================

/// Client side of a [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryClientTransport {
    network: MemoryNetwork,
    session: Arc<Mutex<Option<Session>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug)]
struct Session {
    events: mpsc::UnboundedSender<ClientEvent>,
    link: Option<Link>,
}

impl MemoryClientTransport {
    /// Send an unvalidated envelope, as a misbehaving peer would.
    pub fn send_raw(&self, raw: RawEnvelope) -> Result<(), TransportError> {
        let session = self.session.lock();
        let link = session
            .as_ref()
            .and_then(|session| session.link.as_ref())
            .ok_or(TransportError::Closed)?;
        if link.endpoint.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        link.endpoint
            .events
            .send(ServerEvent::Message(raw, link.connection))
            .map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl ClientTransport for MemoryClientTransport {
    async fn connect(&self, address: &str, retry: Duration) -> Result<ClientEvents, TransportError> {
        let (link, wire) = self
            .network
            .attach(address)
            .ok_or_else(|| TransportError::ConnectionRefused(address.to_string()))?;

        let (events, receiver) = mpsc::unbounded_channel();
        let _ = events.send(ClientEvent::Connected);
        *self.session.lock() = Some(Session {
            events,
            link: Some(link),
        });

        let task = tokio::spawn(run_client(
            self.network.clone(),
            address.to_string(),
            retry,
            Arc::clone(&self.session),
            wire,
        ));
        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
        Ok(receiver)
    }

    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        self.send_raw(envelope.clone().into())
    }

    fn disconnect(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        let Some(session) = self.session.lock().take() else {
            return;
        };
        if let Some(link) = session.link {
            link.endpoint.detach(link.connection);
        }
        let _ = session.events.send(ClientEvent::Destroyed);
    }
}

/// Pump server frames to the client until hangup, then reconnect every `retry`.
async fn run_client(
    network: MemoryNetwork,
    address: String,
    retry: Duration,
    session: Arc<Mutex<Option<Session>>>,
    mut wire: mpsc::UnboundedReceiver<Wire>,
) {
    loop {
        while let Some(Wire::Deliver(raw)) = wire.recv().await {
            if !emit(&session, ClientEvent::Message(raw)) {
                return;
            }
        }

        if let Some(session) = session.lock().as_mut() {
            session.link = None;
        }
        if !emit(&session, ClientEvent::Disconnected) {
            return;
        }

        wire = loop {
            tokio::time::sleep(retry).await;
            let Some((link, wire)) = network.attach(&address) else {
                debug!(%address, "Memory client retrying");
                continue;
            };
            let mut guard = session.lock();
            let Some(active) = guard.as_mut() else {
                link.endpoint.detach(link.connection);
                return;
            };
            active.link = Some(link);
            let _ = active.events.send(ClientEvent::Connected);
            break wire;
        };
    }
}

fn emit(session: &Mutex<Option<Session>>, event: ClientEvent) -> bool {
    session
        .lock()
        .as_ref()
        .is_some_and(|session| session.events.send(event).is_ok())
}
