//! # IPC Hub Test Suite
//!
//! Cross-crate tests driving real server and client nodes.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Hub and client fixtures, notification waits
//! └── integration/
//!     ├── routing.rs    # Addressing, echo suppression, malformed input
//!     ├── sticky.rs     # Retention, replay order, tombstones
//!     ├── lifecycle.rs  # Handshakes, disconnects, restarts, reconnects
//!     └── unix_socket.rs  # End to end over a Unix domain socket
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p hub-tests
//! cargo test -p hub-tests integration::sticky::
//! ```

pub mod harness;
pub mod integration;
