use crate::model::peer::PeerId;
use crate::model::room::{Role, RoomId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_STUN_SERVERS: [&str; 4] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
    "stun:stun3.l.google.com:19302",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: &str) -> Self {
        Self {
            urls: vec![url.to_owned()],
            username: None,
            credential: None,
        }
    }

    pub fn turn(url: &str, username: &str, credential: &str) -> Self {
        Self {
            urls: vec![url.to_owned()],
            username: Some(username.to_owned()),
            credential: Some(credential.to_owned()),
        }
    }

    /// Public STUN servers used when no ICE servers are configured.
    pub fn default_stun() -> Vec<Self> {
        vec![Self {
            urls: DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()).collect(),
            username: None,
            credential: None,
        }]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvelopeType {
    Join,
    Leave,
    RoomInfo,
    PeerJoined,
    PeerLeft,
    Offer,
    Answer,
    IceCandidate,
    Error,
}

impl EnvelopeType {
    /// Offer, answer and candidate envelopes address exactly one counterpart.
    pub fn is_negotiation(self) -> bool {
        matches!(
            self,
            EnvelopeType::Offer | EnvelopeType::Answer | EnvelopeType::IceCandidate
        )
    }
}

/// One JSON text frame on the signaling connection.
///
/// Inbound negotiation envelopes name the sender in `peer_id`; outbound ones
/// name the recipient in `target_peer_id`. Payloads are opaque to the envelope
/// layer and are decoded per `kind` with [`Envelope::payload_as`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<PeerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_peer_id: Option<PeerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default)]
    pub timestamp: u64,
}

impl Envelope {
    pub fn new(kind: EnvelopeType) -> Self {
        Self {
            kind,
            room_id: None,
            peer_id: None,
            target_peer_id: None,
            payload: None,
            timestamp: now_millis(),
        }
    }

    pub fn with_room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn with_peer(mut self, peer_id: PeerId) -> Self {
        self.peer_id = Some(peer_id);
        self
    }

    pub fn to_peer(mut self, target: PeerId) -> Self {
        self.target_peer_id = Some(target);
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn join(room_id: RoomId, role: Role) -> Self {
        Self::new(EnvelopeType::Join)
            .with_room(room_id)
            .with_payload(json!({ "isStreamer": role.is_streamer() }))
    }

    pub fn leave(room_id: RoomId) -> Self {
        Self::new(EnvelopeType::Leave).with_room(room_id)
    }

    pub fn offer(target: PeerId, description: Value) -> Self {
        Self::new(EnvelopeType::Offer)
            .to_peer(target)
            .with_payload(description)
    }

    pub fn answer(target: PeerId, description: Value) -> Self {
        Self::new(EnvelopeType::Answer)
            .to_peer(target)
            .with_payload(description)
    }

    pub fn ice_candidate(target: PeerId, candidate: Value) -> Self {
        Self::new(EnvelopeType::IceCandidate)
            .to_peer(target)
            .with_payload(candidate)
    }

    pub fn room_info(room_id: RoomId, peer_id: PeerId, peers: &[RoomPeer]) -> Self {
        let peers: Vec<Value> = peers
            .iter()
            .map(|p| json!({ "peerId": p.peer_id, "isStreamer": p.is_streamer }))
            .collect();
        Self::new(EnvelopeType::RoomInfo)
            .with_room(room_id)
            .with_payload(json!({ "peerId": peer_id, "peers": peers }))
    }

    pub fn peer_joined(room_id: RoomId, peer_id: PeerId, is_streamer: bool) -> Self {
        Self::new(EnvelopeType::PeerJoined)
            .with_room(room_id)
            .with_peer(peer_id)
            .with_payload(json!({ "isStreamer": is_streamer }))
    }

    pub fn peer_left(room_id: RoomId, peer_id: PeerId) -> Self {
        Self::new(EnvelopeType::PeerLeft)
            .with_room(room_id)
            .with_peer(peer_id)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EnvelopeType::Error).with_payload(json!({ "message": message.into() }))
    }

    /// The single remote peer a negotiation envelope concerns.
    pub fn counterpart(&self) -> Option<&PeerId> {
        self.peer_id.as_ref().or(self.target_peer_id.as_ref())
    }

    /// Rejects negotiation envelopes that name no counterpart.
    pub fn validate(&self) -> Result<(), String> {
        if self.kind.is_negotiation() && self.counterpart().is_none() {
            return Err(format!("{:?} envelope names no counterpart", self.kind));
        }
        Ok(())
    }

    pub fn payload_as<T: DeserializeOwned>(&self) -> Option<T> {
        let payload = self.payload.clone()?;
        serde_json::from_value(payload).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    #[serde(default)]
    pub is_streamer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerJoinedPayload {
    #[serde(default)]
    pub is_streamer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPeer {
    pub peer_id: PeerId,
    #[serde(default)]
    pub is_streamer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfoPayload {
    pub peer_id: PeerId,
    #[serde(default)]
    pub peers: Vec<RoomPeer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
