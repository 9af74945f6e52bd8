use dashmap::DashMap;
use lookout_core::{PeerId, RoomId, RoomPeer};
use std::collections::HashMap;
use tracing::info;

/// Room membership for the relay. A peer belongs to at most one room.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomId, HashMap<PeerId, bool>>,
    membership: DashMap<PeerId, RoomId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `peer_id` to `room_id` and returns the members already present.
    pub fn join(&self, room_id: &RoomId, peer_id: &PeerId, is_streamer: bool) -> Vec<RoomPeer> {
        let existing = {
            let mut members = self.rooms.entry(room_id.clone()).or_default();
            let existing = members
                .iter()
                .map(|(peer_id, is_streamer)| RoomPeer {
                    peer_id: peer_id.clone(),
                    is_streamer: *is_streamer,
                })
                .collect();
            members.insert(peer_id.clone(), is_streamer);
            existing
        };
        self.membership.insert(peer_id.clone(), room_id.clone());
        info!("Peer {} joined room {} (streamer: {})", peer_id, room_id, is_streamer);
        existing
    }

    /// Removes the peer from its room. Returns the room and the members
    /// left behind, dropping the room once it is empty.
    pub fn leave(&self, peer_id: &PeerId) -> Option<(RoomId, Vec<PeerId>)> {
        let (_, room_id) = self.membership.remove(peer_id)?;
        let remaining = match self.rooms.get_mut(&room_id) {
            Some(mut members) => {
                members.remove(peer_id);
                members.keys().cloned().collect::<Vec<_>>()
            }
            None => Vec::new(),
        };
        self.rooms.remove_if(&room_id, |_, members| members.is_empty());
        info!("Peer {} left room {}", peer_id, room_id);
        Some((room_id, remaining))
    }

    pub fn room_of(&self, peer_id: &PeerId) -> Option<RoomId> {
        self.membership.get(peer_id).map(|r| r.clone())
    }

    pub fn same_room(&self, a: &PeerId, b: &PeerId) -> bool {
        match (self.room_of(a), self.room_of(b)) {
            (Some(ra), Some(rb)) => ra == rb,
            _ => false,
        }
    }

    pub fn members(&self, room_id: &RoomId) -> Vec<PeerId> {
        self.rooms
            .get(room_id)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
