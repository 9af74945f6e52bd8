use crate::error::ClientError;
use bytes::Bytes;
use lookout_core::PeerId;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    pub(crate) fn from_codec_type(kind: RTPCodecType) -> Option<Self> {
        match kind {
            RTPCodecType::Audio => Some(TrackKind::Audio),
            RTPCodecType::Video => Some(TrackKind::Video),
            _ => None,
        }
    }
}

/// Identity and liveness of one media track. Clones share the stopped flag.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    stopped: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Returns `true` only for the call that actually stopped the track.
    pub fn stop(&self) -> bool {
        !self.stopped.swap(true, Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Outbound track produced by a capture source.
#[derive(Clone)]
pub struct LocalTrack {
    track: MediaTrack,
    sample: Option<Arc<TrackLocalStaticSample>>,
}

impl LocalTrack {
    pub fn new(track: MediaTrack) -> Self {
        Self {
            track,
            sample: None,
        }
    }

    pub fn with_sample_track(track: MediaTrack, sample: Arc<TrackLocalStaticSample>) -> Self {
        Self {
            track,
            sample: Some(sample),
        }
    }

    pub fn media(&self) -> &MediaTrack {
        &self.track
    }

    pub fn id(&self) -> &str {
        self.track.id()
    }

    pub fn kind(&self) -> TrackKind {
        self.track.kind()
    }

    pub fn is_stopped(&self) -> bool {
        self.track.is_stopped()
    }

    /// The webrtc track every outbound session sends from, if the capture
    /// source is backed by one.
    pub fn sample_track(&self) -> Option<&Arc<TrackLocalStaticSample>> {
        self.sample.as_ref()
    }

    /// Push one encoded frame to every session carrying this track.
    pub async fn write_sample(&self, data: Bytes, duration: Duration) -> Result<(), ClientError> {
        if self.track.is_stopped() {
            return Err(ClientError::TrackStopped);
        }
        let Some(sample_track) = &self.sample else {
            return Ok(());
        };
        let sample = Sample {
            data,
            duration,
            ..Default::default()
        };
        sample_track
            .write_sample(&sample)
            .await
            .map_err(|e| ClientError::CaptureUnavailable(e.to_string()))
    }
}

impl fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrack")
            .field("track", &self.track)
            .field("has_sample_track", &self.sample.is_some())
            .finish()
    }
}

/// What the application gets back from `start_streaming`.
#[derive(Debug, Clone)]
pub struct LocalStreamHandle {
    tracks: Vec<LocalTrack>,
}

impl LocalStreamHandle {
    pub(crate) fn new(tracks: Vec<LocalTrack>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn track(&self, kind: TrackKind) -> Option<&LocalTrack> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    /// True once the capture behind this handle has been released.
    pub fn is_released(&self) -> bool {
        self.tracks.iter().all(LocalTrack::is_stopped)
    }
}

/// Inbound track reported by the media backend.
#[derive(Clone)]
pub struct RemoteTrack {
    track: MediaTrack,
    rtp: Option<Arc<TrackRemote>>,
}

impl RemoteTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            track: MediaTrack::new(id, kind),
            rtp: None,
        }
    }

    pub(crate) fn from_rtp(track: Arc<TrackRemote>) -> Option<Self> {
        let kind = TrackKind::from_codec_type(track.kind())?;
        Some(Self {
            track: MediaTrack::new(track.id(), kind),
            rtp: Some(track),
        })
    }

    pub fn media(&self) -> &MediaTrack {
        &self.track
    }

    pub fn id(&self) -> &str {
        self.track.id()
    }

    pub fn kind(&self) -> TrackKind {
        self.track.kind()
    }

    pub fn is_stopped(&self) -> bool {
        self.track.is_stopped()
    }

    /// Underlying RTP reader when the webrtc backend produced this track.
    pub fn rtp(&self) -> Option<&Arc<TrackRemote>> {
        self.rtp.as_ref()
    }
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("track", &self.track)
            .field("has_rtp", &self.rtp.is_some())
            .finish()
    }
}

/// Accumulator of the tracks received from one remote peer.
///
/// Clones are handles onto the same stream: tracks that arrive after the
/// stream was announced show up in every clone.
#[derive(Clone)]
pub struct RemoteStream {
    peer_id: PeerId,
    tracks: Arc<RwLock<Vec<RemoteTrack>>>,
}

impl RemoteStream {
    pub(crate) fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            tracks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn tracks(&self) -> Vec<RemoteTrack> {
        self.tracks.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.read().is_empty()
    }

    pub fn is_stopped(&self) -> bool {
        self.tracks.read().iter().all(RemoteTrack::is_stopped)
    }

    pub(crate) fn add_track(&self, track: RemoteTrack) {
        self.tracks.write().push(track);
    }

    pub(crate) fn stop(&self) {
        for track in self.tracks.read().iter() {
            track.media().stop();
        }
    }
}

impl fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStream")
            .field("peer_id", &self.peer_id)
            .field("tracks", &*self.tracks.read())
            .finish()
    }
}
