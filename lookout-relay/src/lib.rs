//! Reference signaling relay: rooms, peer identities and envelope
//! forwarding over a WebSocket endpoint.

pub mod config;
pub mod room;
pub mod signaling;

pub use config::RelayConfig;
pub use room::RoomRegistry;
pub use signaling::{RelayService, router, serve, ws_handler};
