//! Peer session manager: keeps a control link to a signaling relay, joins a
//! room as streamer or viewer and negotiates one media session per remote
//! peer.

pub mod client;
pub mod config;
pub mod error;
pub mod media;
pub mod observer;
pub mod peer;
pub mod room;
pub mod signaling;
pub mod transport;

pub use client::{PeerClient, PeerClientBuilder};
pub use config::{CaptureConstraints, ClientConfig, ReconnectPolicy};
pub use error::ClientError;
pub use media::{
    CaptureSource, LocalCapture, LocalStreamHandle, LocalTrack, MediaSessionBridge, MediaTrack,
    RemoteStream, RemoteTrack, SampleCapture, TrackKind,
};
pub use observer::{NoopObserver, SessionObserver};
pub use peer::{NegotiationRole, SessionState, SlotKey};
pub use room::{RoomInfoOutcome, RoomMembership};
pub use signaling::{
    ReconnectDecision, ReconnectSupervisor, SignalConnection, SignalTransport, WsTransport,
};
pub use transport::{
    IceCandidate, LinkState, PeerConnector, PeerLink, SdpKind, SessionDescription,
    TransportEvent, WebRtcConnector,
};

pub use lookout_core::{ConnectionState, PeerId, Role, RoomId};
