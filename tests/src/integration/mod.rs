//! Integration tests across shared-types, shared-bus and ipc-hub.

mod lifecycle;
mod routing;
mod sticky;
mod unix_socket;
