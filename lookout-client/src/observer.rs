use crate::error::ClientError;
use crate::media::{LocalStreamHandle, RemoteStream};
use lookout_core::{ConnectionState, PeerId};
use tracing::error;

/// Hooks through which the application observes the session manager.
///
/// Called from the dispatcher task, so implementations must return quickly.
/// Every method defaults to a no-op except [`SessionObserver::on_error`],
/// which logs.
pub trait SessionObserver: Send + Sync + 'static {
    fn on_local_stream(&self, _stream: &LocalStreamHandle) {}

    fn on_remote_stream(&self, _stream: &RemoteStream, _peer_id: &PeerId) {}

    fn on_state_change(&self, _state: ConnectionState) {}

    fn on_error(&self, err: &ClientError) {
        error!("Peer session error: {}", err);
    }
}

pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
