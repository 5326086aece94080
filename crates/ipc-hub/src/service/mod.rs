//! # Hub Nodes
//!
//! Server and client nodes implementing the `EventEmitterApi` port.
//!
//! Each node drives its router from one tokio task fed by the transport's
//! event receiver. Routing state sits behind a `parking_lot::Mutex`; the
//! lock covers classification and the (non-blocking) transport sends, and
//! is released before notifications are published so handlers may call
//! back into the node.

mod client;
mod dispatch;
mod server;

pub use client::ClientNode;
pub use server::ServerNode;
