use crate::config::CaptureConstraints;
use crate::error::ClientError;
use crate::media::capture::CaptureSource;
use crate::media::track::{LocalStreamHandle, LocalTrack, RemoteStream};
use dashmap::DashMap;
use lookout_core::PeerId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// An acquired set of local tracks. Clones share the release flag.
#[derive(Debug, Clone)]
pub struct LocalCapture {
    tracks: Vec<LocalTrack>,
    released: Arc<AtomicBool>,
}

impl LocalCapture {
    pub fn new(tracks: Vec<LocalTrack>) -> Self {
        Self {
            tracks,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn handle(&self) -> LocalStreamHandle {
        LocalStreamHandle::new(self.tracks.clone())
    }

    /// Stops every track. Only the first call has an effect.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        for track in &self.tracks {
            track.media().stop();
        }
        info!("Local capture released ({} tracks)", self.tracks.len());
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// Owns the local capture and the per-peer remote streams.
///
/// The remote stream map is shared with [`crate::PeerClient`] so the
/// application can read a snapshot without going through the dispatcher.
pub struct MediaSessionBridge {
    capture: Option<LocalCapture>,
    remote_streams: Arc<DashMap<PeerId, RemoteStream>>,
}

impl MediaSessionBridge {
    pub fn new(remote_streams: Arc<DashMap<PeerId, RemoteStream>>) -> Self {
        Self {
            capture: None,
            remote_streams,
        }
    }

    pub async fn acquire(
        source: &dyn CaptureSource,
        constraints: &CaptureConstraints,
    ) -> Result<LocalCapture, ClientError> {
        let tracks = source.open(constraints).await?;
        debug!("Capture acquired: {:?}", tracks);
        Ok(LocalCapture::new(tracks))
    }

    /// Takes ownership of an acquired capture, releasing any previous one.
    pub fn install(&mut self, capture: LocalCapture) {
        if let Some(previous) = self.capture.replace(capture) {
            previous.release();
        }
    }

    pub fn local_tracks(&self) -> Vec<LocalTrack> {
        self.capture
            .as_ref()
            .map(|c| c.tracks().to_vec())
            .unwrap_or_default()
    }

    pub fn local_handle(&self) -> Option<LocalStreamHandle> {
        self.capture.as_ref().map(LocalCapture::handle)
    }

    pub fn release_capture(&mut self) {
        if let Some(capture) = self.capture.take() {
            capture.release();
        }
    }

    pub fn publish_remote(&self, stream: RemoteStream) {
        self.remote_streams.insert(stream.peer_id().clone(), stream);
    }

    /// Stops and forgets the stream received from `peer_id`.
    pub fn withdraw_remote(&self, peer_id: &PeerId) -> Option<RemoteStream> {
        let (_, stream) = self.remote_streams.remove(peer_id)?;
        stream.stop();
        Some(stream)
    }

    pub fn snapshot(&self) -> HashMap<PeerId, RemoteStream> {
        snapshot(&self.remote_streams)
    }
}

pub(crate) fn snapshot(map: &DashMap<PeerId, RemoteStream>) -> HashMap<PeerId, RemoteStream> {
    map.iter()
        .map(|e| (e.key().clone(), e.value().clone()))
        .collect()
}
