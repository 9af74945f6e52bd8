use lookout_client::{PeerClient, SessionState};
use lookout_core::{ConnectionState, Envelope, EnvelopeType, PeerId, RoomId, RoomPeer};
use serde_json::json;
use std::future::Future;
use std::time::Duration;

use super::mock_signaling::MockConnection;

/// Timeout for a single signaling frame (ms).
pub const SIGNAL_TIMEOUT_MS: u64 = 5000;

/// Timeout for sessions to settle (ms).
pub const CONNECTION_TIMEOUT_MS: u64 = 10000;

/// Timeout for the client to (re)open its link (ms). Long enough to cover a
/// full backoff sequence on a paused clock.
pub const ACCEPT_TIMEOUT_MS: u64 = 120000;

/// Polls `check` every 10ms until it holds or `timeout_ms` elapses.
pub async fn wait_until<F, Fut>(timeout_ms: u64, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let poll = async {
        loop {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_millis(timeout_ms), poll)
        .await
        .is_ok()
}

pub async fn wait_for_state(client: &PeerClient, state: ConnectionState) -> bool {
    wait_for_state_within(client, state, CONNECTION_TIMEOUT_MS).await
}

pub async fn wait_for_state_within(
    client: &PeerClient,
    state: ConnectionState,
    timeout_ms: u64,
) -> bool {
    wait_until(timeout_ms, move || async move { client.state() == state }).await
}

pub async fn wait_for_local_peer(client: &PeerClient, peer_id: &str) -> bool {
    let peer_id = PeerId::from(peer_id);
    wait_until(CONNECTION_TIMEOUT_MS, move || {
        let peer_id = peer_id.clone();
        async move { client.local_peer_id() == Some(peer_id) }
    })
    .await
}

pub async fn wait_for_session(client: &PeerClient, peer_id: &str, state: SessionState) -> bool {
    let peer_id = PeerId::from(peer_id);
    wait_until(CONNECTION_TIMEOUT_MS, move || {
        let peer_id = peer_id.clone();
        async move { client.session_states().await.get(&peer_id) == Some(&state) }
    })
    .await
}

pub fn room(name: &str) -> RoomId {
    RoomId::new(name).expect("valid room id")
}

pub fn viewer(peer_id: &str) -> RoomPeer {
    RoomPeer {
        peer_id: PeerId::from(peer_id),
        is_streamer: false,
    }
}

pub fn streamer(peer_id: &str) -> RoomPeer {
    RoomPeer {
        peer_id: PeerId::from(peer_id),
        is_streamer: true,
    }
}

/// Waits for the client's join and answers it with room-info.
pub async fn answer_join(
    conn: &mut MockConnection,
    room_name: &str,
    local_id: &str,
    peers: Vec<RoomPeer>,
) -> Envelope {
    let join = conn.recv_kind(EnvelopeType::Join).await;
    conn.send(Envelope::room_info(room(room_name), PeerId::from(local_id), &peers));
    join
}

pub fn offer_from(peer_id: &str, sdp: &str) -> Envelope {
    Envelope::new(EnvelopeType::Offer)
        .with_peer(PeerId::from(peer_id))
        .with_payload(json!({ "type": "offer", "sdp": sdp }))
}

pub fn answer_from(peer_id: &str, sdp: &str) -> Envelope {
    Envelope::new(EnvelopeType::Answer)
        .with_peer(PeerId::from(peer_id))
        .with_payload(json!({ "type": "answer", "sdp": sdp }))
}

pub fn candidate_from(peer_id: &str, candidate: &str) -> Envelope {
    Envelope::new(EnvelopeType::IceCandidate)
        .with_peer(PeerId::from(peer_id))
        .with_payload(json!({ "candidate": candidate, "sdpMid": "0", "sdpMLineIndex": 0 }))
}

/// The target of every envelope of `kind` in `frames`.
pub fn targets_of(frames: &[Envelope], kind: EnvelopeType) -> Vec<PeerId> {
    frames
        .iter()
        .filter(|e| e.kind == kind)
        .filter_map(|e| e.target_peer_id.clone())
        .collect()
}
