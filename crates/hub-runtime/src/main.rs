//! # Hub Runtime
//!
//! Starts a server or client node on the Unix socket transport, logs every
//! notification, emits console lines, and stops on Ctrl+C.

use std::sync::Arc;

use anyhow::{Context, Result};
use hub_runtime::{parse_command, render, Command, Role, RuntimeConfig};
use ipc_hub::{
    ClientNode, EventEmitterApi, ServerNode, UnixClientTransport, UnixServerTransport,
};
use shared_bus::NotificationFilter;
use shared_types::PeerId;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn build_node(config: &RuntimeConfig) -> Arc<dyn EventEmitterApi> {
    match config.role {
        Role::Server => Arc::new(ServerNode::new(
            config.hub.clone(),
            Arc::new(UnixServerTransport::new()),
        )),
        Role::Client => {
            let id = config.client_id.clone().unwrap_or_else(PeerId::random);
            Arc::new(ClientNode::with_id(
                id,
                config.hub.clone(),
                Arc::new(UnixClientTransport::new()),
            ))
        }
    }
}

/// Emit every console line until stdin closes.
async fn run_console(node: Arc<dyn EventEmitterApi>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_command(&line) else {
            continue;
        };
        let result = match command {
            Command::Broadcast(message) => node.emit(message, None, false),
            Command::Direct { recipient, message } => node.emit_to(recipient, message, None, false),
            Command::Sticky { topic, message } => node.emit(message, Some(topic), true),
        };
        if let Err(error) = result {
            warn!(%error, "Emit failed");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::load(std::env::args().nth(1))?;

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let node = build_node(&config);
    info!(role = %config.role, id = %node.id(), path = %config.hub.socket_path, "Starting hub node");

    let mut notifications = node.stream(NotificationFilter::all());
    tokio::spawn(async move {
        while let Some(notification) = notifications.next().await {
            info!(channel = %notification.channel(), "{}", render(&notification));
        }
    });

    node.start()
        .await
        .with_context(|| format!("failed to start {} on {}", config.role, config.hub.socket_path))?;

    let console = tokio::spawn(run_console(Arc::clone(&node)));

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    console.abort();
    node.stop()?;
    info!("Node stopped");
    Ok(())
}
