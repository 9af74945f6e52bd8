mod manager;
mod session;
mod table;
mod worker;

pub use manager::PeerConnectionManager;
pub use session::{NegotiationRole, PeerSession, SessionState};
pub use table::{PeerTable, SlotKey};
pub use worker::PeerCommand;
