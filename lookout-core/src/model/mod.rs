mod peer;
mod room;
mod signaling;
mod state;

pub use peer::PeerId;
pub use room::{Role, RoomId};
pub use signaling::{
    DEFAULT_STUN_SERVERS, Envelope, EnvelopeType, ErrorPayload, IceServerConfig, JoinPayload,
    PeerJoinedPayload, RoomInfoPayload, RoomPeer,
};
pub use state::ConnectionState;
