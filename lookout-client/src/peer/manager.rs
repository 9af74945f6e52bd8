use crate::media::LocalTrack;
use crate::peer::session::{NegotiationRole, PeerSession, SessionState};
use crate::peer::table::{PeerTable, SlotKey};
use crate::peer::worker::{PeerCommand, PeerWorker};
use crate::transport::{IceCandidate, PeerConnector, SessionDescription, TransportEvent};
use lookout_core::PeerId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Candidates held for a peer that has no session yet.
const MAX_EARLY_CANDIDATES: usize = 64;

/// Distinct unknown peers we hold candidates for.
const MAX_EARLY_PEERS: usize = 16;

/// Owns the peer table and spawns one worker per session.
pub struct PeerConnectionManager {
    table: PeerTable<PeerSession>,
    connector: Arc<dyn PeerConnector>,
    events: mpsc::Sender<TransportEvent>,
    early_candidates: HashMap<PeerId, Vec<IceCandidate>>,
}

impl PeerConnectionManager {
    pub fn new(connector: Arc<dyn PeerConnector>, events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            table: PeerTable::new(),
            connector,
            events,
            early_candidates: HashMap::new(),
        }
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.table.key_of(peer_id).is_some()
    }

    /// Creates a negotiating session and starts its worker. Returns `None`
    /// when the peer already has a session.
    pub fn create_session(
        &mut self,
        peer_id: PeerId,
        role: NegotiationRole,
        tracks: Vec<LocalTrack>,
    ) -> Option<SlotKey> {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let key = self.table.insert_with(peer_id.clone(), |_| {
            PeerSession::new(peer_id.clone(), role, inbox_tx.clone())
        })?;

        if let Some(session) = self.table.get_mut(key) {
            session.state = SessionState::Negotiating;
        }

        // Anything that arrived before the session existed goes first.
        for candidate in self.early_candidates.remove(&peer_id).unwrap_or_default() {
            let _ = inbox_tx.send(PeerCommand::RemoteCandidate(candidate));
        }

        info!("Session for {} created as {:?}", peer_id, role);
        let worker = PeerWorker {
            slot: key,
            peer_id,
            role,
            tracks,
            connector: self.connector.clone(),
            events: self.events.clone(),
            inbox: inbox_rx,
        };
        tokio::spawn(worker.run());
        Some(key)
    }

    /// Hands a remote offer or answer to the peer's worker.
    pub fn route_description(&self, peer_id: &PeerId, desc: SessionDescription) -> bool {
        let Some(session) = self.table.key_of(peer_id).and_then(|k| self.table.get(k)) else {
            return false;
        };
        session.command(PeerCommand::RemoteDescription(desc));
        true
    }

    /// Hands a remote candidate to the peer's worker, or holds it until a
    /// session for that peer is created.
    pub fn route_candidate(&mut self, peer_id: &PeerId, candidate: IceCandidate) {
        if let Some(session) = self.table.key_of(peer_id).and_then(|k| self.table.get(k)) {
            session.command(PeerCommand::RemoteCandidate(candidate));
            return;
        }

        if !self.early_candidates.contains_key(peer_id)
            && self.early_candidates.len() >= MAX_EARLY_PEERS
        {
            warn!("Dropping early candidate from {}: too many unknown peers", peer_id);
            return;
        }
        let queue = self.early_candidates.entry(peer_id.clone()).or_default();
        if queue.len() >= MAX_EARLY_CANDIDATES {
            warn!("Dropping early candidate from {}: queue full", peer_id);
            return;
        }
        debug!("Holding early candidate from unknown peer {}", peer_id);
        queue.push(candidate);
    }

    pub fn session(&self, key: SlotKey) -> Option<&PeerSession> {
        self.table.get(key)
    }

    pub fn session_mut(&mut self, key: SlotKey) -> Option<&mut PeerSession> {
        self.table.get_mut(key)
    }

    pub fn key_of(&self, peer_id: &PeerId) -> Option<SlotKey> {
        self.table.key_of(peer_id)
    }

    /// Removes the session, stops its worker and remote tracks. Returns
    /// `None` if the key was already retired.
    pub fn retire(&mut self, key: SlotKey, final_state: SessionState) -> Option<PeerSession> {
        let (peer_id, mut session) = self.table.remove(key)?;
        session.state = final_state;
        session.command(PeerCommand::Close);
        if let Some(stream) = &session.remote_stream {
            stream.stop();
        }
        self.early_candidates.remove(&peer_id);
        info!("Session for {} ended: {:?}", peer_id, final_state);
        Some(session)
    }

    pub fn close(&mut self, peer_id: &PeerId) -> Option<PeerSession> {
        self.early_candidates.remove(peer_id);
        let key = self.table.key_of(peer_id)?;
        self.retire(key, SessionState::Closed)
    }

    pub fn close_all(&mut self) -> Vec<PeerSession> {
        self.early_candidates.clear();
        self.table
            .keys()
            .into_iter()
            .filter_map(|key| self.retire(key, SessionState::Closed))
            .collect()
    }

    pub fn states(&self) -> HashMap<PeerId, SessionState> {
        self.table
            .iter()
            .map(|(_, peer, session)| (peer.clone(), session.state))
            .collect()
    }

    pub fn any_connected(&self) -> bool {
        self.table
            .iter()
            .any(|(_, _, s)| s.state == SessionState::Connected)
    }

    pub fn any_negotiating(&self) -> bool {
        self.table
            .iter()
            .any(|(_, _, s)| matches!(s.state, SessionState::New | SessionState::Negotiating))
    }
}
