//! # Routing Integration Tests
//!
//! Addressing rules end to end over the memory transport:
//!
//! 1. **Broadcast**: reaches the server and every other client, never the sender
//! 2. **Directed**: reaches only the addressed peer; the server overhears it
//! 3. **Self-addressed**: delivered locally with no transport I/O
//! 4. **Malformed / unknown recipient**: dropped without side effects

#[cfg(test)]
mod tests {
    use crate::harness::{assert_quiet, next, next_message, wait_for, TestHub};
    use ipc_hub::EventEmitterApi;
    use serde_json::json;
    use shared_bus::Notification;
    use shared_types::{Payload, PeerId, RawEnvelope};

    #[tokio::test]
    async fn test_client_broadcast_reaches_everyone_but_sender() {
        let mut hub = TestHub::start("routing-broadcast").await;
        let mut alice = hub.join("alice").await;
        let mut bob = hub.join("bob").await;
        let mut carol = hub.join("carol").await;

        alice.node.emit(Payload::from("hi all"), None, false).unwrap();

        let expected = (None, Payload::from("hi all"), PeerId::from("alice"));
        assert_eq!(next_message(&mut bob.messages).await, expected);
        assert_eq!(next_message(&mut carol.messages).await, expected);
        assert_eq!(next_message(&mut hub.server_events).await, expected);
        assert_quiet(&mut alice.messages).await;
        assert_eq!(hub.network.stats().broadcasts, 1);
    }

    #[tokio::test]
    async fn test_server_broadcast_reaches_every_client() {
        let mut hub = TestHub::start("routing-server-broadcast").await;
        let mut alice = hub.join("alice").await;
        let mut bob = hub.join("bob").await;

        hub.server
            .emit(Payload::Value(json!({"level": 3})), Some("alerts".into()), false)
            .unwrap();

        for client in [&mut alice, &mut bob] {
            let (topic, message, sender) = next_message(&mut client.messages).await;
            assert_eq!(topic.as_deref(), Some("alerts"));
            assert_eq!(message, Payload::Value(json!({"level": 3})));
            assert_eq!(sender, "server");
        }
    }

    #[tokio::test]
    async fn test_directed_message_between_clients() {
        let mut hub = TestHub::start("routing-directed").await;
        let alice = hub.join("alice").await;
        let mut bob = hub.join("bob").await;
        let mut carol = hub.join("carol").await;

        alice
            .node
            .emit_to(PeerId::from("bob"), Payload::from("psst"), None, false)
            .unwrap();

        assert_eq!(
            next_message(&mut bob.messages).await,
            (None, Payload::from("psst"), PeerId::from("alice"))
        );
        loop {
            if let Notification::Promiscuous {
                message,
                sender,
                recipient,
                ..
            } = next(&mut hub.server_events).await
            {
                assert_eq!(message, Payload::from("psst"));
                assert_eq!(sender, "alice");
                assert_eq!(recipient, "bob");
                break;
            }
        }
        assert_quiet(&mut carol.messages).await;
        assert_eq!(hub.network.stats().broadcasts, 0);
    }

    #[tokio::test]
    async fn test_client_to_server_is_not_forwarded() {
        let mut hub = TestHub::start("routing-to-server").await;
        let alice = hub.join("alice").await;
        let mut bob = hub.join("bob").await;
        let before = hub.network.stats();

        alice
            .node
            .emit_to(PeerId::server(), Payload::from("status?"), None, false)
            .unwrap();

        assert_eq!(
            next_message(&mut hub.server_events).await,
            (None, Payload::from("status?"), PeerId::from("alice"))
        );
        assert_quiet(&mut bob.messages).await;
        assert_eq!(hub.network.stats(), before);
    }

    #[tokio::test]
    async fn test_self_addressing_performs_no_io() {
        let mut hub = TestHub::start("routing-self").await;
        let mut alice = hub.join("alice").await;
        let before = hub.network.stats();

        hub.server
            .emit_to(PeerId::server(), Payload::from("x"), None, false)
            .unwrap();
        alice
            .node
            .emit_to(PeerId::from("alice"), Payload::from("y"), None, false)
            .unwrap();

        assert_eq!(
            next_message(&mut hub.server_events).await,
            (None, Payload::from("x"), PeerId::server())
        );
        assert_eq!(
            next_message(&mut alice.messages).await,
            (None, Payload::from("y"), PeerId::from("alice"))
        );
        assert_eq!(hub.network.stats(), before);
    }

    #[tokio::test]
    async fn test_unknown_recipient_is_silent() {
        let hub = TestHub::start("routing-ghost").await;
        let before = hub.network.stats();

        assert!(hub
            .server
            .emit_to(PeerId::from("ghost"), Payload::from("x"), None, false)
            .is_ok());
        assert_eq!(hub.network.stats(), before);
    }

    #[tokio::test]
    async fn test_malformed_envelopes_are_dropped() {
        let mut hub = TestHub::start("routing-malformed").await;
        let mut alice = hub.join("alice").await;
        let (raw, _events) = hub.raw_client().await;
        wait_for(&mut hub.server_events, &Notification::ClientConnectRaw).await;

        let cases = [
            RawEnvelope {
                message: Some(json!("x")),
                recipient: Some("$all".into()),
                ..RawEnvelope::default()
            },
            RawEnvelope {
                message: Some(json!("x")),
                sender: Some("mallory".into()),
                ..RawEnvelope::default()
            },
            RawEnvelope {
                sender: Some("mallory".into()),
                recipient: Some("$all".into()),
                ..RawEnvelope::default()
            },
            RawEnvelope {
                topic: Some("t".into()),
                message: Some(json!("poison")),
                recipient: Some("$all".into()),
                sticky: Some(true),
                ..RawEnvelope::default()
            },
            RawEnvelope {
                message: Some(json!("$hello")),
                recipient: Some("server".into()),
                ..RawEnvelope::default()
            },
        ];
        for case in cases {
            raw.send_raw(case).unwrap();
        }
        // Fence: a valid message sent after the malformed ones.
        raw.send_raw(RawEnvelope {
            message: Some(json!("fence")),
            sender: Some("mallory".into()),
            recipient: Some("server".into()),
            ..RawEnvelope::default()
        })
        .unwrap();

        assert_eq!(
            next(&mut hub.server_events).await,
            Notification::message(None, Payload::from("fence"), PeerId::from("mallory"))
        );
        assert_eq!(hub.server.peers(), vec![PeerId::from("alice")]);
        assert!(hub.server.sticky_snapshot().is_empty());
        assert_quiet(&mut alice.messages).await;
    }
}
