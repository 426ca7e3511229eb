//! `armada-middleware` – Coordinator plumbing.
//!
//! Moves sync messages and forwarded requests between coordinators without
//! caring what they mean.
//!
//! # Modules
//!
//! - [`bus`] – [`SyncBus`][bus::SyncBus]: broadcast channel for config-sync
//!   messages.
//! - [`transport`] – [`PeerTransport`][transport::PeerTransport] /
//!   [`ServiceHandler`][transport::ServiceHandler] seams and the in-process
//!   transport.
//! - [`peer_link`] – WebSocket transport, peer server and sync relay.

pub mod bus;
pub mod peer_link;
pub mod transport;

pub use bus::{SyncBus, SyncSubscriber};
pub use peer_link::{PeerServer, WsPeerTransport, spawn_sync_relay};
pub use transport::{InProcessTransport, PeerTransport, ServiceHandler};
