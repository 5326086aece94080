//! # Lifecycle Integration Tests
//!
//! Connection bookkeeping and node state across start, stop and restart.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::harness::{assert_quiet, next, next_message, TestClient, TestHub, QUIET, WAIT};
    use ipc_hub::{
        ClientEvent, ClientNode, ClientState, ClientTransport, EventEmitterApi, HubConfig, HubError,
        MemoryNetwork, ServerNode, ServerState, TransportError,
    };
    use serde_json::json;
    use shared_bus::{Channel, Notification, NotificationFilter};
    use shared_types::{Envelope, Payload, PeerId, RawEnvelope};
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_rehandshake_moves_peer_to_newest_connection() {
        let mut hub = TestHub::start("lifecycle-rehandshake").await;
        let (old, mut old_events) = hub.raw_client().await;
        let (new, mut new_events) = hub.raw_client().await;

        old.send(&Envelope::handshake("dup")).unwrap();
        hub.wait_for_join("dup").await;
        new.send(&Envelope::handshake("dup")).unwrap();
        hub.wait_for_join("dup").await;
        assert_eq!(hub.server.peers(), vec![PeerId::from("dup")]);

        hub.server
            .emit_to(PeerId::from("dup"), Payload::from("which?"), None, false)
            .unwrap();

        let expected: RawEnvelope = Envelope::new("server", "dup", "which?").into();
        assert_eq!(
            timeout(WAIT, new_events.recv()).await.unwrap(),
            Some(ClientEvent::Message(expected))
        );
        assert!(timeout(QUIET, old_events.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_anonymous_connection_lifecycle() {
        let mut hub = TestHub::start("lifecycle-anonymous").await;
        let (raw, _events) = hub.raw_client().await;
        assert_eq!(next(&mut hub.server_events).await, Notification::Open);
        assert_eq!(next(&mut hub.server_events).await, Notification::ClientConnectRaw);

        raw.disconnect();
        assert_eq!(
            next(&mut hub.server_events).await,
            Notification::ClientDisconnect { peer: None }
        );
    }

    #[tokio::test]
    async fn test_client_stop_reports_disconnect() {
        let mut hub = TestHub::start("lifecycle-client-stop").await;
        let alice = hub.join("alice").await;
        let mut leaves = hub
            .server
            .subscribe(NotificationFilter::channels(vec![Channel::ClientDisconnect]));

        alice.node.stop().unwrap();
        assert_eq!(alice.node.state(), ClientState::Stopped);
        assert_eq!(
            next(&mut leaves).await,
            Notification::ClientDisconnect {
                peer: Some(PeerId::from("alice"))
            }
        );
        assert!(hub.server.peers().is_empty());

        // Stopping twice is fine; emitting is not.
        assert!(alice.node.stop().is_ok());
        assert!(matches!(
            alice.node.emit(Payload::from("x"), None, false),
            Err(HubError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_client_survives_server_restart() {
        let mut hub = TestHub::start("lifecycle-restart").await;
        hub.server.emit(Payload::from("v1"), Some("cfg".into()), true).unwrap();
        let mut alice = hub.join("alice").await;
        assert_eq!(next(&mut alice.lifecycle).await, Notification::Open);
        assert_eq!(
            next_message(&mut alice.messages).await,
            (Some("cfg".into()), Payload::from("v1"), PeerId::server())
        );

        hub.server.stop().unwrap();
        assert_eq!(hub.server.state(), ServerState::Stopped);
        assert_eq!(next(&mut alice.lifecycle).await, Notification::Close);
        assert_eq!(alice.node.state(), ClientState::Closed);
        assert!(matches!(
            alice.node.emit(Payload::from("x"), None, false),
            Err(HubError::InvalidState { .. })
        ));

        // Sticky state does not survive the server.
        let restarted = ServerNode::new(hub.config.clone(), Arc::new(hub.network.server()));
        let mut joins = restarted.subscribe(NotificationFilter::channels(vec![Channel::ClientConnect]));
        restarted.start().await.unwrap();

        assert_eq!(next(&mut alice.lifecycle).await, Notification::Open);
        assert_eq!(
            next(&mut joins).await,
            Notification::ClientConnect {
                peer: PeerId::from("alice")
            }
        );
        assert_eq!(alice.node.state(), ClientState::Open);
        assert_quiet(&mut alice.messages).await;

        alice.node.emit(Payload::from("back"), None, false).unwrap();
        restarted.stop().unwrap();
    }

    #[tokio::test]
    async fn test_listen_on_taken_address() {
        let hub = TestHub::start("lifecycle-taken").await;
        let second = ServerNode::new(hub.config.clone(), Arc::new(hub.network.server()));

        let result = second.start().await;
        assert!(matches!(
            result,
            Err(HubError::Transport(TransportError::AddressInUse(_)))
        ));
        assert_eq!(second.state(), ServerState::Idle);

        hub.server.stop().unwrap();
        second.start().await.unwrap();
        assert_eq!(second.state(), ServerState::Running);
        second.stop().unwrap();
    }

    #[tokio::test]
    async fn test_client_start_without_server() {
        let network = MemoryNetwork::new();
        let config = HubConfig::default().with_socket_path("lifecycle-nobody");
        let client = ClientNode::new(config, Arc::new(network.client()));

        assert!(matches!(
            client.start().await,
            Err(HubError::Transport(TransportError::ConnectionRefused(_)))
        ));
        assert_eq!(client.state(), ClientState::Idle);
        assert!(matches!(client.stop(), Err(HubError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let mut hub = TestHub::start("lifecycle-double").await;
        assert!(matches!(
            hub.server.start().await,
            Err(HubError::InvalidState { .. })
        ));

        let alice = hub.join("alice").await;
        assert!(matches!(
            alice.node.start().await,
            Err(HubError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_server_stop_publishes_close_once() {
        let mut hub = TestHub::start("lifecycle-close").await;
        assert_eq!(next(&mut hub.server_events).await, Notification::Open);

        hub.server.stop().unwrap();
        hub.server.stop().unwrap();
        assert_eq!(next(&mut hub.server_events).await, Notification::Close);
        assert_quiet(&mut hub.server_events).await;
        assert!(!hub.network.is_listening("lifecycle-close"));
    }

    #[tokio::test]
    async fn test_unstarted_client_ignores_traffic() {
        let hub = TestHub::start("lifecycle-unstarted").await;
        let mut idle = TestClient::new("idle", &hub.network, &hub.config);

        hub.server.emit(json!("nobody").into(), None, false).unwrap();
        assert_quiet(&mut idle.messages).await;
        assert_eq!(idle.node.state(), ClientState::Idle);
    }
}
