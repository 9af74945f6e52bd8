use anyhow::{Result, bail};
use async_trait::async_trait;
use lookout_client::{
    CaptureConstraints, CaptureSource, ClientError, LinkState, LocalTrack, MediaTrack,
    PeerConnector, PeerLink, RemoteTrack, SdpKind, SessionDescription, SlotKey, TrackKind,
    TransportEvent, IceCandidate,
};
use lookout_core::PeerId;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

use super::signal_helpers::{CONNECTION_TIMEOUT_MS, wait_until};

/// Everything a fake link saw, kept after the link itself is gone.
pub struct LinkRecord {
    slot: SlotKey,
    events: mpsc::Sender<TransportEvent>,
    remote: Mutex<Option<SessionDescription>>,
    candidates: Mutex<Vec<Value>>,
    attached: Mutex<Vec<String>>,
    offers: AtomicUsize,
    closes: AtomicUsize,
}

impl LinkRecord {
    pub fn candidates(&self) -> Vec<Value> {
        self.candidates.lock().clone()
    }

    pub fn attached(&self) -> Vec<String> {
        self.attached.lock().clone()
    }

    pub fn remote(&self) -> Option<SessionDescription> {
        self.remote.lock().clone()
    }

    pub fn offers(&self) -> usize {
        self.offers.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Waits until the link has been closed `n` times.
    pub async fn wait_closes(&self, n: usize) -> bool {
        wait_until(CONNECTION_TIMEOUT_MS, move || async move { self.closes() == n }).await
    }

    async fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event).await;
    }
}

/// Media backend that negotiates instantly.
///
/// Offers carry the attached track ids (`fake-offer;tracks=video,audio`);
/// applying such an offer reports one remote track per id. A responder is
/// connected once it answers, an initiator once the answer is applied.
/// Descriptions whose sdp starts with `garbage` are rejected.
#[derive(Clone, Default)]
pub struct FakeConnector {
    links: Arc<Mutex<HashMap<PeerId, Arc<LinkRecord>>>>,
    opened: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(&self, peer_id: &str) -> Option<Arc<LinkRecord>> {
        self.links.lock().get(&PeerId::from(peer_id)).cloned()
    }

    /// Number of links ever opened.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn total_offers(&self) -> usize {
        self.links.lock().values().map(|l| l.offers()).sum()
    }

    /// Pretend the backend reported `state` for the peer's link.
    pub async fn report_state(&self, peer_id: &str, state: LinkState) {
        let record = self.link(peer_id).expect("link exists");
        record
            .emit(TransportEvent::StateChanged(record.slot, state))
            .await;
    }
}

#[async_trait]
impl PeerConnector for FakeConnector {
    async fn open_link(
        &self,
        slot: SlotKey,
        peer_id: PeerId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerLink>> {
        let record = Arc::new(LinkRecord {
            slot,
            events,
            remote: Mutex::new(None),
            candidates: Mutex::new(Vec::new()),
            attached: Mutex::new(Vec::new()),
            offers: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        });
        self.links.lock().insert(peer_id, record.clone());
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeLink { record }))
    }
}

struct FakeLink {
    record: Arc<LinkRecord>,
}

fn kind_of(id: &str) -> TrackKind {
    if id.starts_with("audio") {
        TrackKind::Audio
    } else {
        TrackKind::Video
    }
}

#[async_trait]
impl PeerLink for FakeLink {
    async fn attach_tracks(&self, tracks: &[LocalTrack]) -> Result<()> {
        self.record
            .attached
            .lock()
            .extend(tracks.iter().map(|t| t.id().to_owned()));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.record.offers.fetch_add(1, Ordering::SeqCst);
        let slot = self.record.slot;
        self.record
            .emit(TransportEvent::StateChanged(slot, LinkState::Connecting))
            .await;
        let tracks = self.record.attached().join(",");
        Ok(SessionDescription::offer(format!("fake-offer;tracks={}", tracks)))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let slot = self.record.slot;
        self.record
            .emit(TransportEvent::StateChanged(slot, LinkState::Connected))
            .await;
        Ok(SessionDescription::answer("fake-answer"))
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        if desc.sdp.starts_with("garbage") {
            bail!("unparseable session description");
        }
        *self.record.remote.lock() = Some(desc.clone());
        let slot = self.record.slot;

        match desc.kind {
            SdpKind::Offer => {
                let tracks = desc
                    .sdp
                    .split_once("tracks=")
                    .map(|(_, t)| t)
                    .unwrap_or_default();
                for id in tracks.split(',').filter(|id| !id.is_empty()) {
                    self.record
                        .emit(TransportEvent::TrackAdded(
                            slot,
                            RemoteTrack::new(id, kind_of(id)),
                        ))
                        .await;
                }
            }
            SdpKind::Answer => {
                self.record
                    .emit(TransportEvent::StateChanged(slot, LinkState::Connected))
                    .await;
            }
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        if self.record.remote.lock().is_none() {
            bail!("candidate before remote description");
        }
        self.record.candidates.lock().push(candidate.0);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Capture that hands out plain tracks and remembers them.
#[derive(Clone, Default)]
pub struct FakeCapture {
    opened: Arc<Mutex<Vec<LocalTrack>>>,
}

impl FakeCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every track ever handed out.
    pub fn tracks(&self) -> Vec<LocalTrack> {
        self.opened.lock().clone()
    }

    pub fn all_stopped(&self) -> bool {
        self.opened.lock().iter().all(LocalTrack::is_stopped)
    }
}

#[async_trait]
impl CaptureSource for FakeCapture {
    async fn open(&self, constraints: &CaptureConstraints) -> Result<Vec<LocalTrack>, ClientError> {
        let mut tracks = Vec::new();
        if constraints.video {
            tracks.push(LocalTrack::new(MediaTrack::new("video", TrackKind::Video)));
        }
        if constraints.audio {
            tracks.push(LocalTrack::new(MediaTrack::new("audio", TrackKind::Audio)));
        }
        self.opened.lock().extend(tracks.iter().cloned());
        Ok(tracks)
    }
}

/// Capture whose device access is always refused.
pub struct DeniedCapture;

#[async_trait]
impl CaptureSource for DeniedCapture {
    async fn open(&self, _constraints: &CaptureConstraints) -> Result<Vec<LocalTrack>, ClientError> {
        Err(ClientError::CaptureDenied("permission dismissed".into()))
    }
}
