use lookout_core::{Envelope, PeerId, Role, RoomId, RoomInfoPayload};
use std::collections::HashSet;

/// Public view of the room the client currently belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMembership {
    pub room_id: RoomId,
    pub local_role: Role,
    pub local_peer_id: Option<PeerId>,
}

/// What a `room-info` means for the sessions we hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfoOutcome {
    /// The relay handed us a different identity than before, so every
    /// remote peer has already dropped its side of our sessions.
    pub identity_changed: bool,
    /// Members already present that we must offer to.
    pub targets: Vec<PeerId>,
}

/// Join/leave bookkeeping and the initiation rules for one room.
pub struct RoomSession {
    room_id: RoomId,
    role: Role,
    local_peer_id: Option<PeerId>,
    seen: HashSet<PeerId>,
}

impl RoomSession {
    pub fn new(room_id: RoomId, role: Role) -> Self {
        Self {
            room_id,
            role,
            local_peer_id: None,
            seen: HashSet::new(),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn join_envelope(&self) -> Envelope {
        Envelope::join(self.room_id.clone(), self.role)
    }

    pub fn leave_envelope(&self) -> Envelope {
        Envelope::leave(self.room_id.clone())
    }

    pub fn is_self(&self, peer_id: &PeerId) -> bool {
        self.local_peer_id.as_ref() == Some(peer_id)
    }

    /// Records the identity the relay assigned us. A changed identity after
    /// a re-join forgets every peer seen so far, so the initiation rule runs
    /// again against the fresh member list.
    pub fn on_room_info(&mut self, info: RoomInfoPayload) -> RoomInfoOutcome {
        let identity_changed = self
            .local_peer_id
            .as_ref()
            .is_some_and(|old| *old != info.peer_id);
        if identity_changed {
            self.seen.clear();
        }
        self.local_peer_id = Some(info.peer_id);

        let targets = info
            .peers
            .into_iter()
            .filter(|p| self.on_peer_joined(&p.peer_id, p.is_streamer))
            .map(|p| p.peer_id)
            .collect();
        RoomInfoOutcome {
            identity_changed,
            targets,
        }
    }

    /// Returns `true` exactly once per distinct peer we should initiate to:
    /// we stream and the newcomer does not.
    pub fn on_peer_joined(&mut self, peer_id: &PeerId, is_streamer: bool) -> bool {
        if self.is_self(peer_id) {
            return false;
        }
        let first_sighting = self.seen.insert(peer_id.clone());
        first_sighting && self.role.is_streamer() && !is_streamer
    }

    /// Only viewers answer offers from peers that were never announced.
    pub fn accepts_unsolicited_offer(&self) -> bool {
        !self.role.is_streamer()
    }

    pub fn note_seen(&mut self, peer_id: &PeerId) {
        self.seen.insert(peer_id.clone());
    }

    pub fn membership(&self) -> RoomMembership {
        RoomMembership {
            room_id: self.room_id.clone(),
            local_role: self.role,
            local_peer_id: self.local_peer_id.clone(),
        }
    }
}
