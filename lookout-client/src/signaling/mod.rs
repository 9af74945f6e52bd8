mod link;
mod reconnect;
mod transport;
mod ws_transport;

pub(crate) use link::{LinkEvent, SignalingLink};
pub use reconnect::{ReconnectDecision, ReconnectSupervisor};
pub use transport::{SignalConnection, SignalTransport};
pub use ws_transport::WsTransport;
