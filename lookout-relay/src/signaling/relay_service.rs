use crate::room::RoomRegistry;
use dashmap::DashMap;
use lookout_core::{Envelope, EnvelopeType, JoinPayload, PeerId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

struct RelayInner {
    peers: DashMap<PeerId, mpsc::UnboundedSender<String>>,
    bindings: DashMap<u64, PeerId>,
    rooms: RoomRegistry,
    next_connection: AtomicU64,
}

/// Shared relay state. Each socket is a connection id; it is bound to a
/// fresh peer id every time it joins a room.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<RelayInner>,
}

impl RelayService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RelayInner {
                peers: DashMap::new(),
                bindings: DashMap::new(),
                rooms: RoomRegistry::new(),
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    pub fn open_connection(&self) -> u64 {
        self.inner.next_connection.fetch_add(1, Ordering::Relaxed)
    }

    /// A closed socket leaves its room.
    pub fn close_connection(&self, conn: u64) {
        self.leave(conn);
    }

    pub fn peer_of(&self, conn: u64) -> Option<PeerId> {
        self.inner.bindings.get(&conn).map(|p| p.clone())
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.inner.rooms
    }

    pub fn handle_text(&self, conn: u64, tx: &mpsc::UnboundedSender<String>, text: &str) {
        let env = match serde_json::from_str::<Envelope>(text) {
            Ok(env) => env,
            Err(e) => {
                warn!("Invalid envelope on connection {}: {}", conn, e);
                reply(tx, &Envelope::error(format!("malformed envelope: {}", e)));
                return;
            }
        };

        match env.kind {
            EnvelopeType::Join => self.join(conn, tx, env),
            EnvelopeType::Leave => self.leave(conn),
            EnvelopeType::Offer | EnvelopeType::Answer | EnvelopeType::IceCandidate => {
                self.forward(conn, tx, env)
            }
            other => reply(
                tx,
                &Envelope::error(format!("unsupported envelope type {:?}", other)),
            ),
        }
    }

    fn join(&self, conn: u64, tx: &mpsc::UnboundedSender<String>, env: Envelope) {
        let Some(room_id) = env.room_id.clone() else {
            reply(tx, &Envelope::error("join requires a roomId"));
            return;
        };
        let is_streamer = env
            .payload_as::<JoinPayload>()
            .is_some_and(|p| p.is_streamer);

        self.leave(conn);

        let peer_id = PeerId::generate();
        self.inner.peers.insert(peer_id.clone(), tx.clone());
        self.inner.bindings.insert(conn, peer_id.clone());
        let existing = self.inner.rooms.join(&room_id, &peer_id, is_streamer);

        reply(
            tx,
            &Envelope::room_info(room_id.clone(), peer_id.clone(), &existing),
        );
        let announce = Envelope::peer_joined(room_id, peer_id, is_streamer);
        for member in existing {
            self.send_to(&member.peer_id, &announce);
        }
    }

    fn leave(&self, conn: u64) {
        let Some((_, peer_id)) = self.inner.bindings.remove(&conn) else {
            return;
        };
        self.inner.peers.remove(&peer_id);
        let Some((room_id, remaining)) = self.inner.rooms.leave(&peer_id) else {
            return;
        };
        let notice = Envelope::peer_left(room_id, peer_id);
        for member in remaining {
            self.send_to(&member, &notice);
        }
    }

    fn forward(&self, conn: u64, tx: &mpsc::UnboundedSender<String>, mut env: Envelope) {
        let Some(sender) = self.peer_of(conn) else {
            reply(tx, &Envelope::error("join a room before negotiating"));
            return;
        };
        let Some(target) = env.target_peer_id.clone() else {
            reply(tx, &Envelope::error("negotiation envelope requires targetPeerId"));
            return;
        };
        if !self.inner.rooms.same_room(&sender, &target) {
            reply(tx, &Envelope::error(format!("unknown target peer {}", target)));
            return;
        }

        debug!("Forwarding {:?} {} -> {}", env.kind, sender, target);
        env.peer_id = Some(sender);
        self.send_to(&target, &env);
    }

    fn send_to(&self, peer_id: &PeerId, env: &Envelope) {
        let Some(peer) = self.inner.peers.get(peer_id) else {
            warn!("Attempted to send to disconnected peer {}", peer_id);
            return;
        };
        reply(peer.value(), env);
    }
}

impl Default for RelayService {
    fn default() -> Self {
        Self::new()
    }
}

fn reply(tx: &mpsc::UnboundedSender<String>, env: &Envelope) {
    match serde_json::to_string(env) {
        Ok(json) => {
            if tx.send(json).is_err() {
                debug!("Socket writer gone, dropping {:?}", env.kind);
            }
        }
        Err(e) => error!("Failed to serialize envelope: {}", e),
    }
}
