//! # Sticky Topic Integration Tests
//!
//! Retention and replay across the full server/client path:
//! - late joiners receive every retained topic, oldest first, before live traffic
//! - client-originated sticky writes are retained too
//! - an empty sticky write clears the topic

#[cfg(test)]
mod tests {
    use crate::harness::{assert_quiet, next_message, TestHub};
    use ipc_hub::EventEmitterApi;
    use serde_json::json;
    use shared_types::{Payload, PeerId};

    fn server() -> PeerId {
        PeerId::server()
    }

    #[tokio::test]
    async fn test_replay_precedes_live_traffic() {
        let mut hub = TestHub::start("sticky-replay").await;
        hub.server.emit(Payload::from("a"), Some("t1".into()), true).unwrap();
        hub.server.emit(Payload::from("b"), Some("t2".into()), true).unwrap();

        let mut late = hub.join("late").await;
        hub.server.emit(Payload::from("live"), None, false).unwrap();

        assert_eq!(
            next_message(&mut late.messages).await,
            (Some("t1".into()), Payload::from("a"), server())
        );
        assert_eq!(
            next_message(&mut late.messages).await,
            (Some("t2".into()), Payload::from("b"), server())
        );
        assert_eq!(
            next_message(&mut late.messages).await,
            (None, Payload::from("live"), server())
        );
    }

    #[tokio::test]
    async fn test_client_sticky_is_retained_for_later_joiners() {
        let mut hub = TestHub::start("sticky-client").await;
        let alice = hub.join("alice").await;
        let mut bob = hub.join("bob").await;

        alice
            .node
            .emit(Payload::Value(json!({"up": true})), Some("status".into()), true)
            .unwrap();
        assert_eq!(
            next_message(&mut bob.messages).await,
            (
                Some("status".into()),
                Payload::Value(json!({"up": true})),
                PeerId::from("alice")
            )
        );
        assert_eq!(
            hub.server.sticky_snapshot(),
            vec![("status".to_string(), json!({"up": true}))]
        );

        // Replays carry the server as sender.
        let mut carol = hub.join("carol").await;
        assert_eq!(
            next_message(&mut carol.messages).await,
            (Some("status".into()), Payload::Value(json!({"up": true})), server())
        );
    }

    #[tokio::test]
    async fn test_tombstone_clears_topic() {
        let mut hub = TestHub::start("sticky-clear").await;
        let mut watcher = hub.join("watcher").await;
        hub.server.emit(Payload::from("x"), Some("t".into()), true).unwrap();
        assert_eq!(
            next_message(&mut watcher.messages).await,
            (Some("t".into()), Payload::from("x"), server())
        );

        hub.server.emit(Payload::Tombstone, Some("t".into()), true).unwrap();
        assert_eq!(
            next_message(&mut watcher.messages).await,
            (Some("t".into()), Payload::Tombstone, server())
        );
        assert!(hub.server.sticky_snapshot().is_empty());

        let mut late = hub.join("late").await;
        assert_quiet(&mut late.messages).await;
    }

    #[tokio::test]
    async fn test_overwrite_keeps_replay_position() {
        let mut hub = TestHub::start("sticky-order").await;
        hub.server.emit(Payload::from("1"), Some("first".into()), true).unwrap();
        hub.server.emit(Payload::from("2"), Some("second".into()), true).unwrap();
        hub.server.emit(Payload::from("1b"), Some("first".into()), true).unwrap();

        let mut late = hub.join("late").await;
        assert_eq!(
            next_message(&mut late.messages).await,
            (Some("first".into()), Payload::from("1b"), server())
        );
        assert_eq!(
            next_message(&mut late.messages).await,
            (Some("second".into()), Payload::from("2"), server())
        );
        assert_quiet(&mut late.messages).await;
    }

    #[tokio::test]
    async fn test_clear_then_rewrite_moves_to_end() {
        let hub = TestHub::start("sticky-rewrite").await;
        hub.server.emit(Payload::from("1"), Some("first".into()), true).unwrap();
        hub.server.emit(Payload::from("2"), Some("second".into()), true).unwrap();
        hub.server.emit(Payload::Tombstone, Some("first".into()), true).unwrap();
        hub.server.emit(Payload::from("3"), Some("first".into()), true).unwrap();

        assert_eq!(
            hub.server.sticky_snapshot(),
            vec![
                ("second".to_string(), json!("2")),
                ("first".to_string(), json!("3")),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_sticky_topic_is_not_retained() {
        let mut hub = TestHub::start("sticky-transient").await;
        hub.server.emit(Payload::from("gone"), Some("t".into()), false).unwrap();

        let mut late = hub.join("late").await;
        assert!(hub.server.sticky_snapshot().is_empty());
        assert_quiet(&mut late.messages).await;
    }
}
