//! # Test Harness
//!
//! A running server on a [`MemoryNetwork`] plus helpers to attach clients and
//! wait for notifications with a deadline.

use std::sync::Arc;
use std::time::Duration;

use ipc_hub::{
    ClientEvent, ClientNode, ClientTransport, EventEmitterApi, HubConfig, MemoryClientTransport,
    MemoryNetwork, ServerNode,
};
use shared_bus::{Channel, Notification, NotificationFilter, Subscription};
use shared_types::{Payload, PeerId};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Upper bound for any single wait.
pub const WAIT: Duration = Duration::from_secs(2);

/// How long a subscription must stay empty to count as quiet.
pub const QUIET: Duration = Duration::from_millis(100);

/// Client reconnect interval used by the fixtures.
pub const RETRY: Duration = Duration::from_millis(20);

/// Receive the next notification or panic after [`WAIT`].
pub async fn next(subscription: &mut Subscription) -> Notification {
    timeout(WAIT, subscription.recv())
        .await
        .expect("timed out waiting for a notification")
        .expect("notification bus closed")
}

/// Receive the next `message` notification as `(topic, message, sender)`.
pub async fn next_message(subscription: &mut Subscription) -> (Option<String>, Payload, PeerId) {
    loop {
        if let Notification::Message {
            topic,
            message,
            sender,
        } = next(subscription).await
        {
            return (topic, message, sender);
        }
    }
}

/// Skip notifications until one equal to `expected` arrives.
pub async fn wait_for(subscription: &mut Subscription, expected: &Notification) {
    while next(subscription).await != *expected {}
}

/// Assert nothing arrives within [`QUIET`].
pub async fn assert_quiet(subscription: &mut Subscription) {
    if let Ok(Some(notification)) = timeout(QUIET, subscription.recv()).await {
        panic!("unexpected notification: {notification:?}");
    }
}

/// A started server and the network its clients join.
pub struct TestHub {
    pub network: MemoryNetwork,
    pub config: HubConfig,
    pub server: ServerNode,
    /// Every notification the server raises.
    pub server_events: Subscription,
    joins: Subscription,
}

impl TestHub {
    /// Start a server listening on `address`.
    pub async fn start(address: &str) -> Self {
        let network = MemoryNetwork::new();
        let config = HubConfig::default()
            .with_socket_path(address)
            .with_retry(RETRY);
        let server = ServerNode::new(config.clone(), Arc::new(network.server()));
        let server_events = server.subscribe(NotificationFilter::all());
        let joins = server.subscribe(NotificationFilter::channels(vec![Channel::ClientConnect]));
        server.start().await.expect("server starts");

        Self {
            network,
            config,
            server,
            server_events,
            joins,
        }
    }

    /// Start a client named `id` and wait until the server registered it.
    pub async fn join(&mut self, id: &str) -> TestClient {
        let client = TestClient::new(id, &self.network, &self.config);
        client.node.start().await.expect("client starts");
        self.wait_for_join(id).await;
        client
    }

    /// Wait for the server's `client.connect` for `id`.
    pub async fn wait_for_join(&mut self, id: &str) {
        loop {
            if let Notification::ClientConnect { peer } = next(&mut self.joins).await {
                if peer == id {
                    return;
                }
            }
        }
    }

    /// Connect a bare transport that speaks the wire protocol directly.
    pub async fn raw_client(&self) -> (MemoryClientTransport, mpsc::UnboundedReceiver<ClientEvent>) {
        let transport = self.network.client();
        let mut events = transport
            .connect(&self.config.socket_path, RETRY)
            .await
            .expect("raw client connects");
        assert_eq!(
            timeout(WAIT, events.recv()).await.expect("connected in time"),
            Some(ClientEvent::Connected)
        );
        (transport, events)
    }
}

/// A client node with a subscription opened before it started.
pub struct TestClient {
    pub node: ClientNode,
    /// `message` notifications only.
    pub messages: Subscription,
    /// `open` and `close` notifications only.
    pub lifecycle: Subscription,
}

impl TestClient {
    /// Build an unstarted client.
    pub fn new(id: &str, network: &MemoryNetwork, config: &HubConfig) -> Self {
        let node = ClientNode::with_id(PeerId::from(id), config.clone(), Arc::new(network.client()));
        let messages = node.subscribe(NotificationFilter::channels(vec![Channel::Message]));
        let lifecycle = node.subscribe(NotificationFilter::channels(vec![Channel::Open, Channel::Close]));
        Self {
            node,
            messages,
            lifecycle,
        }
    }
}
