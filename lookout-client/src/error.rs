use lookout_core::PeerId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The initial connection to the relay could not be opened.
    #[error("signaling relay unavailable: {0}")]
    SignalingUnavailable(String),

    /// The relay connection dropped. Handled by the reconnect supervisor.
    #[error("signaling connection lost")]
    SignalingLost,

    #[error("signaling relay unreachable after {attempts} reconnect attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("capture device access denied: {0}")]
    CaptureDenied(String),

    #[error("capture device unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("negotiation with {peer_id} failed: {reason}")]
    Negotiation { peer_id: PeerId, reason: String },

    #[error("media backend unavailable: {0}")]
    MediaBackend(String),

    #[error("media connection to {peer_id} failed")]
    PeerConnectionFailed { peer_id: PeerId },

    #[error("room id must not be empty")]
    InvalidRoom,

    #[error("not connected to the signaling relay")]
    NotConnected,

    #[error("already joined to room {0}")]
    AlreadyJoined(String),

    #[error("relay rejected join: {0}")]
    JoinRejected(String),

    #[error("relay reported an error: {0}")]
    Relay(String),

    #[error("local track has been stopped")]
    TrackStopped,

    /// The operation was abandoned by a local leave, disconnect or shutdown.
    #[error("operation cancelled")]
    Cancelled,

    #[error("peer client has shut down")]
    Shutdown,
}
