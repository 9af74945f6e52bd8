use crate::error::ClientError;
use crate::media::{MediaSessionBridge, RemoteStream};
use crate::observer::SessionObserver;
use crate::peer::{NegotiationRole, PeerConnectionManager, SessionState, SlotKey};
use crate::room::membership::{RoomMembership, RoomSession};
use crate::room::room_command::RoomCommand;
use crate::signaling::{LinkEvent, ReconnectDecision, ReconnectSupervisor, SignalingLink};
use crate::transport::{IceCandidate, SdpKind, SessionDescription, TransportEvent};
use lookout_core::{
    ConnectionState, Envelope, EnvelopeType, ErrorPayload, PeerId, PeerJoinedPayload,
    RoomInfoPayload,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkPhase {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Failed,
}

type Reply = oneshot::Sender<Result<(), ClientError>>;

/// The per-client dispatcher. Sole owner of the link, the peer table, the
/// room membership and the media bridge.
pub(crate) struct RoomLoop {
    command_rx: mpsc::Receiver<RoomCommand>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    link: SignalingLink,
    supervisor: ReconnectSupervisor,
    phase: LinkPhase,
    peers: PeerConnectionManager,
    media: MediaSessionBridge,
    room: Option<RoomSession>,
    pending_connect: Vec<Reply>,
    pending_join: Option<Reply>,
    connect_requested: bool,
    observer: Arc<dyn SessionObserver>,
    state_tx: watch::Sender<ConnectionState>,
    membership_tx: watch::Sender<Option<RoomMembership>>,
}

pub(crate) struct RoomLoopParts {
    pub command_rx: mpsc::Receiver<RoomCommand>,
    pub link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    pub transport_rx: mpsc::Receiver<TransportEvent>,
    pub link: SignalingLink,
    pub supervisor: ReconnectSupervisor,
    pub peers: PeerConnectionManager,
    pub media: MediaSessionBridge,
    pub observer: Arc<dyn SessionObserver>,
    pub state_tx: watch::Sender<ConnectionState>,
    pub membership_tx: watch::Sender<Option<RoomMembership>>,
}

impl RoomLoop {
    pub fn new(parts: RoomLoopParts) -> Self {
        Self {
            command_rx: parts.command_rx,
            link_rx: parts.link_rx,
            transport_rx: parts.transport_rx,
            link: parts.link,
            supervisor: parts.supervisor,
            phase: LinkPhase::Idle,
            peers: parts.peers,
            media: parts.media,
            room: None,
            pending_connect: Vec::new(),
            pending_join: None,
            connect_requested: false,
            observer: parts.observer,
            state_tx: parts.state_tx,
            membership_tx: parts.membership_tx,
        }
    }

    pub async fn run(mut self) {
        info!("Peer session loop started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c),
                        None => {
                            info!("Command channel closed. Shutting down peer session loop.");
                            break;
                        }
                    }
                }

                Some(evt) = self.link_rx.recv() => self.handle_link_event(evt),

                Some(evt) = self.transport_rx.recv() => self.handle_transport_event(evt),
            }
        }

        self.teardown_room(ClientError::Shutdown);
        self.link.close();
        self.phase = LinkPhase::Idle;
        for reply in self.pending_connect.drain(..) {
            let _ = reply.send(Err(ClientError::Shutdown));
        }
        info!("Peer session loop finished");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Connect { reply } => match self.phase {
                LinkPhase::Connecting | LinkPhase::Reconnecting => {
                    self.pending_connect.push(reply);
                }
                LinkPhase::Open | LinkPhase::Idle | LinkPhase::Failed => {
                    if self.phase == LinkPhase::Open {
                        info!("Replacing open signaling connection");
                    } else {
                        info!("Connecting to signaling relay");
                    }
                    self.connect_requested = true;
                    self.supervisor.on_open();
                    self.link.begin_connect();
                    self.phase = LinkPhase::Connecting;
                    self.pending_connect.push(reply);
                    self.publish_state();
                }
            },

            RoomCommand::Join {
                room_id,
                role,
                capture,
                reply,
            } => {
                let rejection = if self.phase != LinkPhase::Open {
                    Some(ClientError::NotConnected)
                } else {
                    self.room
                        .as_ref()
                        .map(|r| ClientError::AlreadyJoined(r.room_id().to_string()))
                };
                if let Some(err) = rejection {
                    if let Some(capture) = capture {
                        capture.release();
                    }
                    let _ = reply.send(Err(err));
                    return;
                }

                info!("Joining room {} as {:?}", room_id, role);
                if let Some(capture) = capture {
                    self.media.install(capture);
                }
                let room = RoomSession::new(room_id, role);
                self.link.send(&room.join_envelope());
                self.room = Some(room);
                self.pending_join = Some(reply);
                self.publish_membership();
                self.publish_state();
            }

            RoomCommand::Leave { reply } => {
                if let Some(room) = &self.room {
                    info!("Leaving room {}", room.room_id());
                    self.link.send(&room.leave_envelope());
                }
                self.teardown_room(ClientError::Cancelled);
                self.publish_state();
                let _ = reply.send(());
            }

            RoomCommand::Disconnect { reply } => {
                if let Some(room) = &self.room {
                    self.link.send(&room.leave_envelope());
                }
                self.teardown_room(ClientError::Cancelled);
                self.link.close();
                self.phase = LinkPhase::Idle;
                for pending in self.pending_connect.drain(..) {
                    let _ = pending.send(Err(ClientError::Cancelled));
                }
                info!("Disconnected from signaling relay");
                self.publish_state();
                let _ = reply.send(());
            }

            RoomCommand::SessionStates { reply } => {
                let _ = reply.send(self.peers.states());
            }
        }
    }

    fn handle_link_event(&mut self, evt: LinkEvent) {
        match evt {
            LinkEvent::Connected(epoch, res) => {
                if !self.link.is_current(epoch) {
                    return;
                }
                match res {
                    Ok(conn) => self.on_link_open(epoch, conn),
                    Err(e) if self.phase == LinkPhase::Connecting => {
                        warn!("Signaling connect failed: {}", e);
                        self.link.mark_closed();
                        self.phase = LinkPhase::Idle;
                        self.teardown_room(e.clone());
                        for reply in self.pending_connect.drain(..) {
                            let _ = reply.send(Err(e.clone()));
                        }
                        self.publish_state();
                    }
                    Err(e) => {
                        warn!("Signaling reconnect attempt failed: {}", e);
                        self.link.mark_closed();
                        self.on_unexpected_close();
                    }
                }
            }

            LinkEvent::Message(epoch, envelope) => {
                if self.link.is_current(epoch) {
                    self.handle_envelope(envelope);
                }
            }

            LinkEvent::Closed(epoch) => {
                if !self.link.is_current(epoch) || self.phase != LinkPhase::Open {
                    return;
                }
                warn!("{}", ClientError::SignalingLost);
                self.link.mark_closed();
                self.on_unexpected_close();
            }

            LinkEvent::RetryDue(epoch) => {
                if self.link.is_current(epoch) && self.phase == LinkPhase::Reconnecting {
                    info!(
                        "Reconnecting to signaling relay (attempt {})",
                        self.supervisor.attempt()
                    );
                    self.link.begin_connect();
                }
            }
        }
    }

    fn on_link_open(&mut self, epoch: u64, conn: crate::signaling::SignalConnection) {
        if !self.link.attach(epoch, conn) {
            return;
        }
        self.phase = LinkPhase::Open;
        self.supervisor.on_open();
        info!("Signaling link open");

        for reply in self.pending_connect.drain(..) {
            let _ = reply.send(Ok(()));
        }

        if let Some(room) = &self.room {
            info!("Re-joining room {} on the new connection", room.room_id());
            self.link.send(&room.join_envelope());
        }
        self.publish_state();
    }

    fn on_unexpected_close(&mut self) {
        match self.supervisor.on_unexpected_close() {
            ReconnectDecision::RetryAfter(delay) => {
                info!("Signaling reconnect scheduled in {:?}", delay);
                self.phase = LinkPhase::Reconnecting;
                self.link.schedule_retry(delay);
                self.publish_state();
            }
            ReconnectDecision::Exhausted => {
                let err = ClientError::ReconnectExhausted {
                    attempts: self.supervisor.attempt(),
                };
                warn!("{}", err);
                self.link.close();
                self.phase = LinkPhase::Failed;
                self.teardown_room(err.clone());
                for reply in self.pending_connect.drain(..) {
                    let _ = reply.send(Err(err.clone()));
                }
                self.observer.on_error(&err);
                self.publish_state();
            }
        }
    }

    fn handle_envelope(&mut self, env: Envelope) {
        let Some(room) = self.room.as_mut() else {
            debug!("No room joined, ignoring {:?} envelope", env.kind);
            return;
        };
        if env.peer_id.as_ref().is_some_and(|p| room.is_self(p)) {
            debug!("Ignoring {:?} envelope naming ourselves", env.kind);
            return;
        }

        match env.kind {
            EnvelopeType::RoomInfo => {
                let Some(info) = env.payload_as::<RoomInfoPayload>() else {
                    warn!("Dropping room-info without a valid payload");
                    return;
                };
                let me = info.peer_id.clone();
                let outcome = room.on_room_info(info);
                info!("Joined room {} as {}", room.room_id(), me);
                self.publish_membership();

                if outcome.identity_changed {
                    info!("Relay assigned a new identity, renegotiating every peer");
                    for session in self.peers.close_all() {
                        self.media.withdraw_remote(&session.peer_id);
                    }
                }

                if let Some(reply) = self.pending_join.take() {
                    if let Some(handle) = self.media.local_handle() {
                        self.observer.on_local_stream(&handle);
                    }
                    let _ = reply.send(Ok(()));
                }
                for peer in outcome.targets {
                    self.open_session(peer, NegotiationRole::Initiator);
                }
                self.publish_state();
            }

            EnvelopeType::PeerJoined => {
                let Some(peer) = env.peer_id.clone() else {
                    warn!("Dropping peer-joined without a peer id");
                    return;
                };
                let is_streamer = env
                    .payload_as::<PeerJoinedPayload>()
                    .is_some_and(|p| p.is_streamer);
                debug!("Peer {} joined (streamer: {})", peer, is_streamer);
                if room.on_peer_joined(&peer, is_streamer) {
                    self.open_session(peer, NegotiationRole::Initiator);
                    self.publish_state();
                }
            }

            EnvelopeType::PeerLeft => {
                let Some(peer) = env.peer_id.clone() else {
                    warn!("Dropping peer-left without a peer id");
                    return;
                };
                info!("Peer {} left", peer);
                if self.peers.close(&peer).is_some() {
                    self.media.withdraw_remote(&peer);
                    self.publish_state();
                }
            }

            EnvelopeType::Offer | EnvelopeType::Answer => {
                let Some(peer) = env.counterpart().cloned() else {
                    return;
                };
                let Some(desc) = env.payload_as::<SessionDescription>() else {
                    warn!("Dropping {:?} from {} without a session description", env.kind, peer);
                    return;
                };
                let expected = match env.kind {
                    EnvelopeType::Offer => SdpKind::Offer,
                    _ => SdpKind::Answer,
                };

                if !self.peers.contains(&peer) {
                    let accept = expected == SdpKind::Offer && room.accepts_unsolicited_offer();
                    if !accept {
                        debug!("Ignoring {:?} from peer {} without a session", env.kind, peer);
                        return;
                    }
                    room.note_seen(&peer);
                    self.open_session(peer.clone(), NegotiationRole::Responder);
                    self.publish_state();
                }

                if desc.kind != expected {
                    if let Some(key) = self.peers.key_of(&peer) {
                        let reason =
                            format!("{:?} envelope carried an {:?} description", env.kind, desc.kind);
                        self.fail_session(key, reason);
                    }
                    return;
                }
                self.peers.route_description(&peer, desc);
            }

            EnvelopeType::IceCandidate => {
                let Some(peer) = env.counterpart().cloned() else {
                    return;
                };
                let Some(candidate) = env.payload else {
                    warn!("Dropping ice-candidate from {} without a payload", peer);
                    return;
                };
                if !self.peers.contains(&peer) && !room.accepts_unsolicited_offer() {
                    debug!("Dropping ice-candidate from peer {} without a session", peer);
                    return;
                }
                self.peers.route_candidate(&peer, IceCandidate(candidate));
            }

            EnvelopeType::Error => {
                let message = env
                    .payload_as::<ErrorPayload>()
                    .map(|p| p.message)
                    .unwrap_or_else(|| "unspecified relay error".to_owned());

                match self.pending_join.take() {
                    Some(reply) => {
                        warn!("Join rejected by relay: {}", message);
                        self.room = None;
                        self.publish_membership();
                        self.media.release_capture();
                        let _ = reply.send(Err(ClientError::JoinRejected(message)));
                        self.publish_state();
                    }
                    None => self.observer.on_error(&ClientError::Relay(message)),
                }
            }

            EnvelopeType::Join | EnvelopeType::Leave => {
                debug!("Ignoring client-only {:?} envelope from relay", env.kind);
            }
        }
    }

    fn open_session(&mut self, peer: PeerId, role: NegotiationRole) {
        let tracks = self.media.local_tracks();
        if self.peers.create_session(peer.clone(), role, tracks).is_none() {
            debug!("Session for {} already exists", peer);
        }
    }

    fn handle_transport_event(&mut self, evt: TransportEvent) {
        let key = evt.slot();
        let Some(peer) = self.peers.session(key).map(|s| s.peer_id.clone()) else {
            debug!("Dropping event for retired session: {:?}", evt);
            return;
        };

        match evt {
            TransportEvent::StateChanged(_, link_state) => {
                let Some(session) = self.peers.session_mut(key) else {
                    return;
                };
                let next = session.state.apply(link_state);
                if next == session.state {
                    return;
                }
                debug!("Session {} {:?} -> {:?}", peer, session.state, next);
                session.state = next;

                if next == SessionState::Failed
                    && self.peers.retire(key, SessionState::Failed).is_some()
                {
                    self.media.withdraw_remote(&peer);
                    self.observer
                        .on_error(&ClientError::PeerConnectionFailed { peer_id: peer });
                }
                self.publish_state();
            }

            TransportEvent::TrackAdded(_, track) => {
                let Some(session) = self.peers.session_mut(key) else {
                    return;
                };
                let stream = session
                    .remote_stream
                    .get_or_insert_with(|| RemoteStream::new(peer.clone()))
                    .clone();
                stream.add_track(track);

                if !session.announced {
                    session.announced = true;
                    self.media.publish_remote(stream.clone());
                    self.observer.on_remote_stream(&stream, &peer);
                }
            }

            TransportEvent::CandidateGenerated(_, candidate) => {
                self.link.send(&Envelope::ice_candidate(peer, candidate.0));
            }

            TransportEvent::LocalDescription(_, desc) => {
                let kind = desc.kind;
                let payload = match serde_json::to_value(&desc) {
                    Ok(v) => v,
                    Err(e) => {
                        self.fail_session(key, format!("unserializable description: {}", e));
                        return;
                    }
                };
                let envelope = match kind {
                    SdpKind::Offer => Envelope::offer(peer, payload),
                    SdpKind::Answer => Envelope::answer(peer, payload),
                };
                self.link.send(&envelope);
            }

            TransportEvent::TracksAttached(_) => {
                if let Some(session) = self.peers.session_mut(key) {
                    session.local_tracks_attached = true;
                }
            }

            TransportEvent::NegotiationFailed(_, reason) => self.fail_session(key, reason),
        }
    }

    fn fail_session(&mut self, key: SlotKey, reason: String) {
        let Some(session) = self.peers.retire(key, SessionState::Failed) else {
            return;
        };
        self.media.withdraw_remote(&session.peer_id);
        self.observer.on_error(&ClientError::Negotiation {
            peer_id: session.peer_id,
            reason,
        });
        self.publish_state();
    }

    /// Closes every session, releases capture and forgets the room.
    fn teardown_room(&mut self, pending_join_error: ClientError) {
        for session in self.peers.close_all() {
            self.media.withdraw_remote(&session.peer_id);
        }
        self.media.release_capture();
        if let Some(reply) = self.pending_join.take() {
            let _ = reply.send(Err(pending_join_error));
        }
        if self.room.take().is_some() {
            self.publish_membership();
        }
    }

    fn publish_membership(&self) {
        self.membership_tx
            .send_replace(self.room.as_ref().map(RoomSession::membership));
    }

    fn aggregate_state(&self) -> ConnectionState {
        match self.phase {
            LinkPhase::Failed => ConnectionState::Failed,
            LinkPhase::Idle if !self.connect_requested => ConnectionState::New,
            LinkPhase::Connecting | LinkPhase::Reconnecting => ConnectionState::Connecting,
            LinkPhase::Open if self.peers.any_connected() => ConnectionState::Connected,
            LinkPhase::Open if self.pending_join.is_some() || self.peers.any_negotiating() => {
                ConnectionState::Connecting
            }
            _ => ConnectionState::Disconnected,
        }
    }

    fn publish_state(&self) {
        let next = self.aggregate_state();
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            info!("Connection state: {}", next);
            self.observer.on_state_change(next);
        }
    }
}
