mod bridge;
mod capture;
mod track;

pub(crate) use bridge::snapshot;
pub use bridge::{LocalCapture, MediaSessionBridge};
pub use capture::{CaptureSource, SampleCapture};
pub use track::{LocalStreamHandle, LocalTrack, MediaTrack, RemoteStream, RemoteTrack, TrackKind};
