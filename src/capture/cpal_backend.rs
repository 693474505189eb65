//! Microphone capture via cpal.
//!
//! cpal streams are not `Send`, so the stream lives on a dedicated capture
//! thread; the handle returned from `open` only carries a stop signal. The
//! thread accumulates mono f32 samples and encodes them into a WAV container
//! with hound when capture ends, delivered as one `Data` event followed by
//! `Stopped`.

use std::io::Cursor;
use std::sync::{mpsc as std_mpsc, Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::{CaptureBackend, CaptureError, CaptureEvent, CaptureStream, EncodingFormat};

/// 16 kHz mono is what speech transcription backends want.
const CAPTURE_SAMPLE_RATE: u32 = 16_000;

#[derive(Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CaptureBackend for CpalBackend {
    fn has_input_device(&self) -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    fn is_format_supported(&self, format: EncodingFormat) -> bool {
        // No Opus encoder on this path; the probe degrades to the WAV fallback.
        matches!(format, EncodingFormat::Wav)
    }

    async fn open(
        &self,
        format: EncodingFormat,
    ) -> Result<(Box<dyn CaptureStream>, mpsc::UnboundedReceiver<CaptureEvent>), CaptureError>
    {
        if !self.is_format_supported(format) {
            return Err(CaptureError::Device(format!(
                "unsupported encoding {}",
                format.mime()
            )));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("voxnote-capture".to_string())
            .spawn(move || capture_thread(event_tx, stop_rx, ready_tx))
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(())) => Ok((Box::new(CpalStream { stop: Some(stop_tx) }), event_rx)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CaptureError::Device(
                "capture thread exited during setup".to_string(),
            )),
        }
    }
}

struct CpalStream {
    stop: Option<std_mpsc::Sender<()>>,
}

impl CaptureStream for CpalStream {
    fn request_stop(&mut self) {
        if let Some(stop) = &self.stop {
            let _ = stop.send(());
        }
    }

    fn release(&mut self) {
        // Dropping the sender wakes the capture thread, which drops the
        // cpal stream and exits.
        self.stop.take();
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.release();
    }
}

fn capture_thread(
    events: mpsc::UnboundedSender<CaptureEvent>,
    stop_rx: std_mpsc::Receiver<()>,
    ready_tx: oneshot::Sender<Result<(), CaptureError>>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_input_device() else {
        let _ = ready_tx.send(Err(CaptureError::NoDevice));
        return;
    };

    debug!(
        "capture device: {}",
        device.name().unwrap_or_else(|_| "unknown".to_string())
    );

    let config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(CAPTURE_SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let samples: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
    let samples_in = Arc::clone(&samples);
    let error_events = events.clone();

    let stream = match device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if let Ok(mut buffer) = samples_in.lock() {
                buffer.extend_from_slice(data);
            }
        },
        move |err| {
            let _ = error_events.send(CaptureEvent::Error(err.to_string()));
        },
        None,
    ) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(map_build_error(e)));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(CaptureError::Device(e.to_string())));
        return;
    }

    let _ = ready_tx.send(Ok(()));
    info!("microphone capture started");

    // Blocks until stop is requested or the stream handle is released.
    let _ = stop_rx.recv();
    drop(stream);

    let captured = match samples.lock() {
        Ok(mut buffer) => std::mem::take(&mut *buffer),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    };
    info!("microphone capture stopped, {} samples", captured.len());

    if captured.is_empty() {
        // No data event: the session flags this as an empty recording.
        let _ = events.send(CaptureEvent::Stopped);
        return;
    }

    match encode_wav(&captured, CAPTURE_SAMPLE_RATE) {
        Ok(bytes) => {
            let _ = events.send(CaptureEvent::Data(bytes));
            let _ = events.send(CaptureEvent::Stopped);
        }
        Err(e) => {
            error!("failed to encode captured audio: {e}");
            let _ = events.send(CaptureEvent::Error(e.to_string()));
        }
    }
}

fn map_build_error(err: cpal::BuildStreamError) -> CaptureError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::NoDevice,
        other => {
            let message = other.to_string();
            let lowered = message.to_lowercase();
            if lowered.contains("denied") || lowered.contains("permission") {
                CaptureError::PermissionDenied
            } else {
                CaptureError::Device(message)
            }
        }
    }
}

fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * f32::from(i16::MAX)) as i16)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_wav_round_trips() {
        let samples = vec![0.0_f32, 0.5, -0.5, 1.0, -1.0];
        let bytes = encode_wav(&samples, CAPTURE_SAMPLE_RATE).unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, CAPTURE_SAMPLE_RATE);
        assert_eq!(spec.bits_per_sample, 16);

        let decoded: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(decoded.len(), samples.len());
        assert_eq!(decoded[0], 0);
        assert_eq!(decoded[3], i16::MAX);
    }

    #[test]
    fn test_release_is_idempotent() {
        let (stop_tx, _stop_rx) = std_mpsc::channel();
        let mut stream = CpalStream { stop: Some(stop_tx) };
        stream.release();
        stream.release();
        stream.request_stop();
    }
}
