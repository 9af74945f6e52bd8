use crate::config::CaptureConstraints;
use crate::error::ClientError;
use crate::media::track::{LocalTrack, MediaTrack, TrackKind};
use async_trait::async_trait;
use std::sync::Arc;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Where local camera/microphone tracks come from.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    async fn open(&self, constraints: &CaptureConstraints) -> Result<Vec<LocalTrack>, ClientError>;
}

/// Capture backed by webrtc sample tracks. The application feeds encoded
/// frames through [`LocalTrack::write_sample`].
pub struct SampleCapture {
    stream_id: String,
}

impl SampleCapture {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
        }
    }

    fn sample_track(&self, kind: TrackKind) -> LocalTrack {
        let (id, mime) = match kind {
            TrackKind::Video => ("video", MIME_TYPE_VP8),
            TrackKind::Audio => ("audio", MIME_TYPE_OPUS),
        };
        let sample = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime.to_owned(),
                ..Default::default()
            },
            id.to_owned(),
            self.stream_id.clone(),
        ));
        LocalTrack::with_sample_track(MediaTrack::new(id, kind), sample)
    }
}

impl Default for SampleCapture {
    fn default() -> Self {
        Self::new("lookout")
    }
}

#[async_trait]
impl CaptureSource for SampleCapture {
    async fn open(&self, constraints: &CaptureConstraints) -> Result<Vec<LocalTrack>, ClientError> {
        let mut tracks = Vec::with_capacity(2);
        if constraints.video {
            tracks.push(self.sample_track(TrackKind::Video));
        }
        if constraints.audio {
            tracks.push(self.sample_track(TrackKind::Audio));
        }
        if tracks.is_empty() {
            return Err(ClientError::CaptureUnavailable(
                "neither audio nor video requested".to_owned(),
            ));
        }
        Ok(tracks)
    }
}
