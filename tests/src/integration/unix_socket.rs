//! # Unix Socket Integration Tests
//!
//! The full node stack over a real socket file in a temporary directory.

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use crate::harness::{assert_quiet, next, next_message, RETRY};
    use ipc_hub::{
        ClientNode, EventEmitterApi, HubConfig, ServerNode, UnixClientTransport,
        UnixServerTransport,
    };
    use serde_json::json;
    use shared_bus::{Channel, Notification, NotificationFilter, Subscription};
    use shared_types::{Envelope, Payload, PeerId};

    fn config(dir: &tempfile::TempDir) -> HubConfig {
        HubConfig::default()
            .with_socket_path(dir.path().join("hub.sock").display().to_string())
            .with_retry(RETRY)
    }

    async fn start_server(config: &HubConfig) -> (ServerNode, Subscription) {
        let server = ServerNode::new(config.clone(), Arc::new(UnixServerTransport::new()));
        let joins = server.subscribe(NotificationFilter::channels(vec![Channel::ClientConnect]));
        server.start().await.unwrap();
        (server, joins)
    }

    async fn start_client(id: &str, config: &HubConfig, joins: &mut Subscription) -> (ClientNode, Subscription) {
        let client = ClientNode::with_id(
            PeerId::from(id),
            config.clone(),
            Arc::new(UnixClientTransport::new()),
        );
        let messages = client.subscribe(NotificationFilter::channels(vec![Channel::Message]));
        client.start().await.unwrap();
        assert_eq!(
            next(joins).await,
            Notification::ClientConnect {
                peer: PeerId::from(id)
            }
        );
        (client, messages)
    }

    #[tokio::test]
    async fn test_sticky_replay_and_broadcast_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let (server, mut joins) = start_server(&config).await;
        server
            .emit(Payload::Value(json!({"mode": "fast"})), Some("settings".into()), true)
            .unwrap();

        let (alice, mut alice_messages) = start_client("alice", &config, &mut joins).await;
        assert_eq!(
            next_message(&mut alice_messages).await,
            (
                Some("settings".into()),
                Payload::Value(json!({"mode": "fast"})),
                PeerId::server()
            )
        );

        let (bob, mut bob_messages) = start_client("bob", &config, &mut joins).await;
        assert_eq!(next_message(&mut bob_messages).await.0.as_deref(), Some("settings"));

        alice.emit(Payload::from("hello"), None, false).unwrap();
        assert_eq!(
            next_message(&mut bob_messages).await,
            (None, Payload::from("hello"), PeerId::from("alice"))
        );
        assert_quiet(&mut alice_messages).await;

        bob.emit_to(PeerId::from("alice"), json!(7).into(), None, false)
            .unwrap();
        assert_eq!(
            next_message(&mut alice_messages).await,
            (None, Payload::Value(json!(7)), PeerId::from("bob"))
        );

        alice.stop().unwrap();
        bob.stop().unwrap();
        server.stop().unwrap();
        assert!(!Path::new(&config.socket_path).exists());
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_before_handshake() {
        use tokio::io::AsyncWriteExt;

        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let (server, mut joins) = start_server(&config).await;

        let mut peer = tokio::net::UnixStream::connect(&config.socket_path).await.unwrap();
        let mut bytes = b"\xff\xfe not a frame\n".to_vec();
        bytes.extend(serde_json::to_vec(&Envelope::handshake("raw")).unwrap());
        bytes.push(b'\n');
        peer.write_all(&bytes).await.unwrap();

        assert_eq!(
            next(&mut joins).await,
            Notification::ClientConnect {
                peer: PeerId::from("raw")
            }
        );
        assert_eq!(server.peers(), vec![PeerId::from("raw")]);
        server.stop().unwrap();
    }

    #[tokio::test]
    async fn test_client_follows_server_restart_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let (server, mut joins) = start_server(&config).await;
        let (client, _messages) = start_client("alice", &config, &mut joins).await;
        let mut lifecycle = client.subscribe(NotificationFilter::channels(vec![Channel::Open, Channel::Close]));

        server.stop().unwrap();
        assert_eq!(next(&mut lifecycle).await, Notification::Close);

        let (restarted, mut joins) = start_server(&config).await;
        assert_eq!(next(&mut lifecycle).await, Notification::Open);
        assert_eq!(
            next(&mut joins).await,
            Notification::ClientConnect {
                peer: PeerId::from("alice")
            }
        );

        client.stop().unwrap();
        restarted.stop().unwrap();
    }
}
