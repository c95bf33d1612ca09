//! Browser debugging transport.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   GET /json/version, /json/list   ┌─────────────────┐
//! │  CdpClient      │──────────────────────────────────►│  Browser        │
//! │                 │                                   │  (debugging     │
//! │  Connection     │◄─────────────────────────────────►│   endpoint)     │
//! │  EventRegistry  │       WebSocket, flatten mode     │                 │
//! └─────────────────┘                                   └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Discovery::version` - Resolve the browser-level transport URL
//! 2. `Connection::new` - Split the socket and spawn the receive loop
//! 3. `Connection::send` - Correlated command exchange
//! 4. `Connection::shutdown` - Close; pending requests fail
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `client` | `ProtocolClient` trait and `CdpClient` |
//! | `connection` | WebSocket connection and receive loop |
//! | `discovery` | HTTP discovery endpoint |
//! | `events` | Event handler registry |

// ============================================================================
// Submodules
// ============================================================================

/// Protocol client seam and implementation.
pub mod client;

/// WebSocket connection and receive loop.
pub mod connection;

/// HTTP discovery endpoint.
pub mod discovery;

/// Event handler registry.
pub mod events;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::{CdpClient, DEFAULT_CONNECT_TIMEOUT, ProtocolClient};
pub use connection::{Connection, DEFAULT_COMMAND_TIMEOUT, MAX_PENDING_REQUESTS};
pub use discovery::Discovery;
pub use events::{EventHandler, EventRegistry};
