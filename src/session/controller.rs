//! Recording session controller.
//!
//! One live session at a time: idle → recording → transcribing → idle.
//! The microphone stream, the chunk buffer, and the pump task that acts as
//! the duration timer live inside a single [`CaptureResources`] value, so
//! they are acquired and released together on every exit path.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::capture::{
    negotiate_format, CaptureBackend, CaptureError, CaptureEvent, CaptureStream, EncodingFormat,
};
use crate::transcribe::Transcriber;

use super::phase::{SessionPhase, SessionStatus};

pub const ERROR_UNSUPPORTED: &str = "Audio recording is not supported on this device";
pub const ERROR_PERMISSION_DENIED: &str = "Microphone access was denied";
pub const ERROR_MIC_UNAVAILABLE: &str = "Could not access the microphone";
pub const ERROR_RECORDER: &str = "Recording failed due to a microphone error, please try again";
pub const ERROR_TOO_SHORT: &str = "Recording was too short, please try again";
pub const ERROR_NO_AUDIO: &str = "No audio was captured";
pub const ERROR_TRANSCRIPTION: &str = "Transcription failed";

/// Limits applied to every recording session.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// Hard ceiling on recording length; the session auto-stops at this cap.
    pub max_duration: Duration,
    /// Recordings shorter than this are discarded without transcription.
    pub min_duration: Duration,
    /// Duration timer granularity.
    pub tick_interval: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(120),
            min_duration: Duration::from_secs(1),
            tick_interval: Duration::from_millis(250),
        }
    }
}

/// Everything acquired for one recording, released as a unit. The pump task
/// doubles as the duration timer; `stop_requested` makes the stop request
/// idempotent across the manual and cap-triggered paths.
struct CaptureResources {
    stream: Box<dyn CaptureStream>,
    pump: Option<JoinHandle<()>>,
    chunks: Vec<Vec<u8>>,
    stop_requested: bool,
}

impl CaptureResources {
    /// Releases every held resource and hands back the drained chunk buffer.
    /// `abort_pump` is false when the pump task itself is the caller.
    fn release(mut self, abort_pump: bool) -> Vec<Vec<u8>> {
        self.stream.release();
        if let Some(pump) = self.pump.take() {
            if abort_pump {
                pump.abort();
            }
        }
        std::mem::take(&mut self.chunks)
    }
}

#[derive(Default)]
struct SessionInner {
    phase: SessionPhase,
    duration_secs: u64,
    started_at: Option<Instant>,
    format: Option<EncodingFormat>,
    transcript: Option<String>,
    error: Option<String>,
    resources: Option<CaptureResources>,
}

/// Cheaply clonable handle to the one live session.
#[derive(Clone)]
pub struct SessionController {
    backend: Arc<dyn CaptureBackend>,
    transcriber: Arc<dyn Transcriber>,
    policy: SessionPolicy,
    inner: Arc<Mutex<SessionInner>>,
}

impl SessionController {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        transcriber: Arc<dyn Transcriber>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            backend,
            transcriber,
            policy,
            inner: Arc::new(Mutex::new(SessionInner::default())),
        }
    }

    /// True iff a capture device exists and at least one encoding is usable.
    pub fn is_supported(&self) -> bool {
        self.backend.has_input_device() && negotiate_format(self.backend.as_ref()).is_some()
    }

    /// Begins a session. No-op unless idle. Failures never propagate; they
    /// land in the `error` field with the session back in idle.
    pub async fn start_recording(&self) {
        {
            let mut inner = self.inner.lock().await;
            if inner.phase != SessionPhase::Idle {
                debug!("start_recording ignored while {}", inner.phase.as_str());
                return;
            }
            inner.transcript = None;
            inner.error = None;
        }

        if !self.backend.has_input_device() {
            warn!("no audio input device available");
            self.set_idle_error(ERROR_UNSUPPORTED).await;
            return;
        }
        let Some(format) = negotiate_format(self.backend.as_ref()) else {
            warn!("no usable audio encoding");
            self.set_idle_error(ERROR_UNSUPPORTED).await;
            return;
        };

        let opened = self.backend.open(format).await;

        let mut inner = self.inner.lock().await;
        if inner.phase != SessionPhase::Idle {
            // A concurrent start won the race while we awaited acquisition.
            if let Ok((mut stream, _events)) = opened {
                stream.release();
            }
            return;
        }

        match opened {
            Ok((stream, events)) => {
                inner.phase = SessionPhase::Recording;
                inner.duration_secs = 0;
                inner.started_at = Some(Instant::now());
                inner.format = Some(format);
                let pump = tokio::spawn(self.clone().pump(events));
                inner.resources = Some(CaptureResources {
                    stream,
                    pump: Some(pump),
                    chunks: Vec::new(),
                    stop_requested: false,
                });
                info!("recording started ({})", format.mime());
            }
            Err(err) => {
                error!("failed to acquire microphone: {err}");
                let message = match err {
                    CaptureError::PermissionDenied => ERROR_PERMISSION_DENIED,
                    CaptureError::NoDevice | CaptureError::Device(_) => ERROR_MIC_UNAVAILABLE,
                };
                inner.error = Some(message.to_string());
            }
        }
    }

    /// Requests the end of the current recording. No-op unless recording.
    /// The transition itself runs through the encoder's stop notification,
    /// the same path the cap-triggered stop takes.
    pub async fn stop_recording(&self) {
        let mut inner = self.inner.lock().await;
        if inner.phase != SessionPhase::Recording {
            debug!("stop_recording ignored while {}", inner.phase.as_str());
            return;
        }
        Self::request_stop(&mut inner);
    }

    /// Unconditional teardown: releases everything regardless of phase.
    /// For the owning caller going away mid-session.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(resources) = inner.resources.take() {
            debug!("shutdown: releasing capture resources");
            resources.release(true);
        }
        inner.started_at = None;
        inner.phase = SessionPhase::Idle;
    }

    pub async fn state(&self) -> SessionPhase {
        self.inner.lock().await.phase
    }

    pub async fn duration_secs(&self) -> u64 {
        self.inner.lock().await.duration_secs
    }

    pub async fn transcript(&self) -> Option<String> {
        self.inner.lock().await.transcript.clone()
    }

    pub async fn error(&self) -> Option<String> {
        self.inner.lock().await.error.clone()
    }

    pub async fn clear_transcript(&self) {
        self.inner.lock().await.transcript = None;
    }

    pub async fn clear_error(&self) {
        self.inner.lock().await.error = None;
    }

    pub async fn status(&self) -> SessionStatus {
        let inner = self.inner.lock().await;
        SessionStatus {
            phase: inner.phase,
            duration_seconds: inner.duration_secs,
            transcript: inner.transcript.clone(),
            error: inner.error.clone(),
            is_supported: self.is_supported(),
        }
    }

    fn request_stop(inner: &mut SessionInner) {
        if let Some(resources) = inner.resources.as_mut() {
            if !resources.stop_requested {
                resources.stop_requested = true;
                resources.stream.request_stop();
            }
        }
    }

    async fn set_idle_error(&self, message: &str) {
        self.inner.lock().await.error = Some(message.to_string());
    }

    /// Drives one recording: duration ticks and capture events, in arrival
    /// order, until the stream reports stopped or failed.
    async fn pump(self, mut events: mpsc::UnboundedReceiver<CaptureEvent>) {
        let mut ticker = tokio::time::interval(self.policy.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.on_tick().await,
                event = events.recv() => match event {
                    Some(CaptureEvent::Data(chunk)) => self.on_chunk(chunk).await,
                    Some(CaptureEvent::Stopped) => {
                        self.on_stopped().await;
                        break;
                    }
                    Some(CaptureEvent::Error(message)) => {
                        self.on_capture_error(&message).await;
                        break;
                    }
                    None => {
                        self.on_capture_error("capture stream closed unexpectedly").await;
                        break;
                    }
                },
            }
        }
    }

    async fn on_tick(&self) {
        let mut inner = self.inner.lock().await;
        if inner.phase != SessionPhase::Recording {
            return;
        }
        let Some(started_at) = inner.started_at else {
            return;
        };

        // Recomputed from the start timestamp, not an incrementing counter,
        // so the value stays correct across timer jitter.
        let cap = self.policy.max_duration.as_secs();
        let elapsed = started_at.elapsed().as_secs();
        inner.duration_secs = elapsed.min(cap);

        if elapsed >= cap {
            if inner
                .resources
                .as_ref()
                .is_some_and(|r| !r.stop_requested)
            {
                info!("duration cap reached ({cap}s), stopping");
            }
            Self::request_stop(&mut inner);
        }
    }

    async fn on_chunk(&self, chunk: Vec<u8>) {
        let mut inner = self.inner.lock().await;
        if inner.phase != SessionPhase::Recording {
            return;
        }
        if let Some(resources) = inner.resources.as_mut() {
            debug!("captured chunk: {} bytes", chunk.len());
            resources.chunks.push(chunk);
        }
    }

    async fn on_stopped(&self) {
        let (audio, format) = {
            let mut inner = self.inner.lock().await;
            if inner.phase != SessionPhase::Recording {
                return;
            }

            // Hardware goes first: stream and timer are released before any
            // validation or transcription work, so the device indicator turns
            // off promptly.
            let chunks = match inner.resources.take() {
                Some(resources) => resources.release(false),
                None => Vec::new(),
            };
            let elapsed = inner
                .started_at
                .take()
                .map(|t| t.elapsed())
                .unwrap_or_default();

            if elapsed < self.policy.min_duration {
                warn!(
                    "recording discarded: {}ms is under the minimum",
                    elapsed.as_millis()
                );
                inner.phase = SessionPhase::Idle;
                inner.error = Some(ERROR_TOO_SHORT.to_string());
                return;
            }

            let total: usize = chunks.iter().map(Vec::len).sum();
            if total == 0 {
                warn!("recording discarded: no audio captured");
                inner.phase = SessionPhase::Idle;
                inner.error = Some(ERROR_NO_AUDIO.to_string());
                return;
            }

            let mut audio = Vec::with_capacity(total);
            for chunk in &chunks {
                audio.extend_from_slice(chunk);
            }

            inner.phase = SessionPhase::Transcribing;
            info!(
                "recording stopped after {}s, {} bytes captured",
                elapsed.as_secs(),
                total
            );
            (audio, inner.format.unwrap_or(EncodingFormat::Wav))
        };

        let encoded = BASE64.encode(&audio);
        // Single attempt; the caller retries by starting a new recording.
        let result = self.transcriber.transcribe(&encoded, format).await;

        let mut inner = self.inner.lock().await;
        match result {
            Ok(text) => {
                info!("transcription complete: {} chars", text.len());
                inner.transcript = Some(text);
            }
            Err(err) => {
                error!("transcription failed: {err:#}");
                let message = err.to_string();
                inner.error = Some(if message.trim().is_empty() {
                    ERROR_TRANSCRIPTION.to_string()
                } else {
                    message
                });
            }
        }
        inner.phase = SessionPhase::Idle;
    }

    /// Encoder-level failure while recording: full cleanup, straight back to
    /// idle. No partial audio is ever submitted for transcription.
    async fn on_capture_error(&self, message: &str) {
        let mut inner = self.inner.lock().await;
        if inner.phase != SessionPhase::Recording {
            return;
        }
        error!("capture failed mid-recording: {message}");
        if let Some(resources) = inner.resources.take() {
            resources.release(false);
        }
        inner.started_at = None;
        inner.phase = SessionPhase::Idle;
        inner.error = Some(ERROR_RECORDER.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = SessionPolicy::default();
        assert_eq!(policy.max_duration, Duration::from_secs(120));
        assert_eq!(policy.min_duration, Duration::from_secs(1));
        assert!(policy.tick_interval < Duration::from_secs(1));
    }
}
