use crate::config::{CaptureConstraints, ClientConfig};
use crate::error::ClientError;
use crate::media::{
    CaptureSource, LocalStreamHandle, MediaSessionBridge, RemoteStream, SampleCapture,
};
use crate::observer::{NoopObserver, SessionObserver};
use crate::peer::{PeerConnectionManager, SessionState};
use crate::room::{RoomCommand, RoomLoop, RoomLoopParts, RoomMembership};
use crate::signaling::{ReconnectSupervisor, SignalTransport, SignalingLink, WsTransport};
use crate::transport::{PeerConnector, WebRtcConnector};
use dashmap::DashMap;
use lookout_core::{ConnectionState, PeerId, Role, RoomId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Handle to one peer session manager.
///
/// All work happens on a dispatcher task spawned by [`PeerClientBuilder::build`];
/// dropping the client shuts that task down and releases everything it owns.
pub struct PeerClient {
    command_tx: mpsc::Sender<RoomCommand>,
    capture: Arc<dyn CaptureSource>,
    constraints: CaptureConstraints,
    state_rx: watch::Receiver<ConnectionState>,
    membership_rx: watch::Receiver<Option<RoomMembership>>,
    remote_streams: Arc<DashMap<PeerId, RemoteStream>>,
}

impl PeerClient {
    /// A client using the WebSocket signaling transport, the webrtc-rs media
    /// backend and sample-fed capture tracks. Must be called inside a tokio
    /// runtime.
    pub fn new(
        config: ClientConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self, ClientError> {
        Self::builder(config).observer(observer).build()
    }

    pub fn builder(config: ClientConfig) -> PeerClientBuilder {
        PeerClientBuilder {
            config,
            transport: None,
            connector: None,
            capture: None,
            observer: None,
        }
    }

    /// Opens the signaling link.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.request(|reply| RoomCommand::Connect { reply }).await?
    }

    /// Acquires local capture, joins `room` as the streamer and returns the
    /// local tracks. The capture is released if the join fails.
    pub async fn start_streaming(&self, room: &str) -> Result<LocalStreamHandle, ClientError> {
        let room_id = RoomId::new(room).ok_or(ClientError::InvalidRoom)?;
        let capture = MediaSessionBridge::acquire(self.capture.as_ref(), &self.constraints).await?;
        let handle = capture.handle();

        let res = self
            .request(|reply| RoomCommand::Join {
                room_id,
                role: Role::Streamer,
                capture: Some(capture.clone()),
                reply,
            })
            .await
            .and_then(|r| r);

        match res {
            Ok(()) => Ok(handle),
            Err(e) => {
                capture.release();
                Err(e)
            }
        }
    }

    /// Joins `room` as a viewer. Remote streams are delivered through
    /// [`SessionObserver::on_remote_stream`].
    pub async fn join_as_viewer(&self, room: &str) -> Result<(), ClientError> {
        let room_id = RoomId::new(room).ok_or(ClientError::InvalidRoom)?;
        self.request(|reply| RoomCommand::Join {
            room_id,
            role: Role::Viewer,
            capture: None,
            reply,
        })
        .await?
    }

    /// Leaves the current room. Every session is closed and the capture is
    /// released before this returns.
    pub async fn leave_room(&self) {
        let _ = self.request(|reply| RoomCommand::Leave { reply }).await;
    }

    /// Leaves the room and closes the signaling link without reconnecting.
    pub async fn disconnect(&self) {
        let _ = self.request(|reply| RoomCommand::Disconnect { reply }).await;
    }

    pub async fn session_states(&self) -> HashMap<PeerId, SessionState> {
        self.request(|reply| RoomCommand::SessionStates { reply })
            .await
            .unwrap_or_default()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch channel following the aggregate connection state.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn remote_streams(&self) -> HashMap<PeerId, RemoteStream> {
        crate::media::snapshot(&self.remote_streams)
    }

    /// The room we belong to. The local peer id is filled in once the relay
    /// has answered the join.
    pub fn membership(&self) -> Option<RoomMembership> {
        self.membership_rx.borrow().clone()
    }

    pub fn local_peer_id(&self) -> Option<PeerId> {
        self.membership_rx
            .borrow()
            .as_ref()
            .and_then(|m| m.local_peer_id.clone())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(make(reply))
            .await
            .map_err(|_| ClientError::Shutdown)?;
        rx.await.map_err(|_| ClientError::Shutdown)
    }
}

/// Builder for [`PeerClient`] with replaceable backends.
pub struct PeerClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn SignalTransport>>,
    connector: Option<Arc<dyn PeerConnector>>,
    capture: Option<Arc<dyn CaptureSource>>,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl PeerClientBuilder {
    pub fn transport(mut self, transport: Arc<dyn SignalTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn PeerConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn capture(mut self, capture: Arc<dyn CaptureSource>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Spawns the dispatcher task. Must be called inside a tokio runtime.
    pub fn build(self) -> Result<PeerClient, ClientError> {
        let connector: Arc<dyn PeerConnector> = match self.connector {
            Some(c) => c,
            None => Arc::new(
                WebRtcConnector::new(self.config.effective_ice_servers())
                    .map_err(|e| ClientError::MediaBackend(format!("{:#}", e)))?,
            ),
        };
        let transport = self.transport.unwrap_or_else(|| Arc::new(WsTransport));
        let capture = self
            .capture
            .unwrap_or_else(|| Arc::new(SampleCapture::default()));
        let observer = self.observer.unwrap_or_else(|| Arc::new(NoopObserver));

        let (command_tx, command_rx) = mpsc::channel(64);
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::channel(256);
        let (state_tx, state_rx) = watch::channel(ConnectionState::New);
        let (membership_tx, membership_rx) = watch::channel(None);
        let remote_streams = Arc::new(DashMap::new());

        let room_loop = RoomLoop::new(RoomLoopParts {
            command_rx,
            link_rx,
            transport_rx,
            link: SignalingLink::new(transport, self.config.signaling_url.clone(), link_tx),
            supervisor: ReconnectSupervisor::new(self.config.reconnect),
            peers: PeerConnectionManager::new(connector, transport_tx),
            media: MediaSessionBridge::new(remote_streams.clone()),
            observer,
            state_tx,
            membership_tx,
        });
        tokio::spawn(room_loop.run());

        Ok(PeerClient {
            command_tx,
            capture,
            constraints: self.config.capture,
            state_rx,
            membership_rx,
            remote_streams,
        })
    }
}
