//! Platform capture subsystem interface.
//!
//! The encoder's callbacks (data available, stopped, error) are modeled as
//! explicit [`CaptureEvent`]s delivered on a channel, so the session state
//! machine can be driven without a real microphone.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod cpal_backend;

pub use cpal_backend::CpalBackend;

/// Audio container/codec the capture backend produces, identified by a
/// MIME-like string that is forwarded to the transcription backend as a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingFormat {
    WebmOpus,
    OggOpus,
    Wav,
}

impl EncodingFormat {
    /// Probe order: compressed modern container first, widely supported Opus
    /// container second, uncompressed WAV as the always-available fallback.
    pub const PREFERENCE: [EncodingFormat; 3] = [Self::WebmOpus, Self::OggOpus, Self::Wav];

    pub fn mime(&self) -> &'static str {
        match self {
            Self::WebmOpus => "audio/webm;codecs=opus",
            Self::OggOpus => "audio/ogg;codecs=opus",
            Self::Wav => "audio/wav",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::WebmOpus => "webm",
            Self::OggOpus => "ogg",
            Self::Wav => "wav",
        }
    }
}

impl fmt::Display for EncodingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Notification from an open capture stream. Events arrive in send order;
/// `Stopped` and `Error` are terminal for the stream that sent them.
#[derive(Debug)]
pub enum CaptureEvent {
    /// A chunk of encoded audio became available.
    Data(Vec<u8>),
    /// The encoder finished, whether stop was manual or cap-triggered.
    Stopped,
    /// The encoder or device failed mid-capture.
    Error(String),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("microphone access was denied")]
    PermissionDenied,
    #[error("no audio input device available")]
    NoDevice,
    #[error("audio device error: {0}")]
    Device(String),
}

/// Handle to an open capture stream. Both methods must be idempotent: stop
/// completion is reported via [`CaptureEvent::Stopped`], never synchronously.
pub trait CaptureStream: Send {
    /// Ask the encoder to finish. Redundant requests are ignored.
    fn request_stop(&mut self);

    /// Stop every track of the underlying stream immediately.
    fn release(&mut self);
}

#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Whether any audio input device is present.
    fn has_input_device(&self) -> bool;

    /// Whether the backend can encode into the given format.
    fn is_format_supported(&self, format: EncodingFormat) -> bool;

    /// Request microphone access and bind an encoder to the granted stream.
    /// This is the one suspending acquisition step; it may be denied.
    async fn open(
        &self,
        format: EncodingFormat,
    ) -> Result<(Box<dyn CaptureStream>, mpsc::UnboundedReceiver<CaptureEvent>), CaptureError>;
}

/// Capability probe: the first format in the preference order the backend
/// reports as supported. Reads capability only, acquires nothing.
pub fn negotiate_format(backend: &dyn CaptureBackend) -> Option<EncodingFormat> {
    EncodingFormat::PREFERENCE
        .into_iter()
        .find(|format| backend.is_format_supported(*format))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubBackend {
        formats: Vec<EncodingFormat>,
    }

    #[async_trait]
    impl CaptureBackend for StubBackend {
        fn has_input_device(&self) -> bool {
            true
        }

        fn is_format_supported(&self, format: EncodingFormat) -> bool {
            self.formats.contains(&format)
        }

        async fn open(
            &self,
            _format: EncodingFormat,
        ) -> Result<(Box<dyn CaptureStream>, mpsc::UnboundedReceiver<CaptureEvent>), CaptureError>
        {
            unreachable!("probe must not acquire")
        }
    }

    #[test]
    fn test_preference_order() {
        assert_eq!(EncodingFormat::PREFERENCE[0], EncodingFormat::WebmOpus);
        assert_eq!(EncodingFormat::PREFERENCE[2], EncodingFormat::Wav);
    }

    #[test]
    fn test_negotiate_picks_first_supported() {
        let backend = StubBackend {
            formats: EncodingFormat::PREFERENCE.to_vec(),
        };
        assert_eq!(negotiate_format(&backend), Some(EncodingFormat::WebmOpus));

        let backend = StubBackend {
            formats: vec![EncodingFormat::Wav],
        };
        assert_eq!(negotiate_format(&backend), Some(EncodingFormat::Wav));
    }

    #[test]
    fn test_negotiate_none_when_nothing_supported() {
        let backend = StubBackend { formats: vec![] };
        assert_eq!(negotiate_format(&backend), None);
    }

    #[test]
    fn test_mime_and_extension() {
        assert_eq!(EncodingFormat::Wav.mime(), "audio/wav");
        assert_eq!(EncodingFormat::WebmOpus.extension(), "webm");
        assert_eq!(EncodingFormat::OggOpus.to_string(), "audio/ogg;codecs=opus");
    }
}
