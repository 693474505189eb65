use anyhow::Result;
use async_trait::async_trait;

use crate::capture::EncodingFormat;

pub mod http_api;

pub use http_api::HttpProvider;

/// Transcription collaborator. One attempt per recording; the controller
/// never retries on its own.
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &'static str;

    /// Transcribes base64-encoded audio. The format identifier tells the
    /// backend which container/codec the decoded bytes hold.
    async fn transcribe(&self, audio_base64: &str, format: EncodingFormat) -> Result<String>;
}
