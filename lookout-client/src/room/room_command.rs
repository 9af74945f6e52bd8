use crate::error::ClientError;
use crate::media::LocalCapture;
use crate::peer::SessionState;
use lookout_core::{PeerId, Role, RoomId};
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Requests from the public API to the dispatcher.
#[derive(Debug)]
pub(crate) enum RoomCommand {
    /// Resolves once the signaling link is open.
    Connect {
        reply: oneshot::Sender<Result<(), ClientError>>,
    },

    /// Resolves once the relay answered with room-info. The capture, if
    /// any, is owned by the media bridge from here on.
    Join {
        room_id: RoomId,
        role: Role,
        capture: Option<LocalCapture>,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },

    Leave {
        reply: oneshot::Sender<()>,
    },

    Disconnect {
        reply: oneshot::Sender<()>,
    },

    SessionStates {
        reply: oneshot::Sender<HashMap<PeerId, SessionState>>,
    },
}
