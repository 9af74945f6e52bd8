use crate::media::RemoteStream;
use crate::peer::worker::PeerCommand;
use crate::transport::LinkState;
use lookout_core::PeerId;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    New,
    Negotiating,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Failed | SessionState::Closed)
    }

    /// Next state after the backend reports `link`. Terminal states absorb.
    pub fn apply(self, link: LinkState) -> SessionState {
        if self.is_terminal() {
            return self;
        }
        match link {
            LinkState::New | LinkState::Connecting => match self {
                SessionState::New => SessionState::Negotiating,
                other => other,
            },
            LinkState::Connected => SessionState::Connected,
            LinkState::Disconnected => match self {
                SessionState::Connected | SessionState::Negotiating => SessionState::Disconnected,
                other => other,
            },
            // A link closing underneath a live session is a transport failure.
            LinkState::Failed | LinkState::Closed => SessionState::Failed,
        }
    }
}

/// Dispatcher-side record of one remote peer.
pub struct PeerSession {
    pub peer_id: PeerId,
    pub role: NegotiationRole,
    pub state: SessionState,
    pub local_tracks_attached: bool,
    pub remote_stream: Option<RemoteStream>,
    /// Whether `on_remote_stream` has fired for this session.
    pub announced: bool,
    pub(crate) inbox: mpsc::UnboundedSender<PeerCommand>,
}

impl PeerSession {
    pub(crate) fn new(
        peer_id: PeerId,
        role: NegotiationRole,
        inbox: mpsc::UnboundedSender<PeerCommand>,
    ) -> Self {
        Self {
            peer_id,
            role,
            state: SessionState::New,
            local_tracks_attached: false,
            remote_stream: None,
            announced: false,
            inbox,
        }
    }

    /// Queue a command for the worker. A worker that already exited is ignored.
    pub(crate) fn command(&self, cmd: PeerCommand) {
        let _ = self.inbox.send(cmd);
    }
}
