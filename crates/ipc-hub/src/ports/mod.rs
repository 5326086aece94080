//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! - **Driving Ports (Inbound):** the event-emitter API nodes expose to applications
//! - **Driven Ports (Outbound):** the transports and log sink nodes require

pub mod inbound;
pub mod outbound;

pub use inbound::EventEmitterApi;
pub use outbound::{
    ClientEvent, ClientEvents, ClientTransport, LogSink, ServerEvent, ServerEvents,
    ServerTransport, TransportError,
};
