//! Whisper-style HTTP transcription provider.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::multipart;
use serde::Deserialize;
use tracing::{debug, error, info};

use super::Transcriber;
use crate::capture::EncodingFormat;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct HttpProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    language: Option<String>,
}

impl HttpProvider {
    pub fn new(
        api_key: String,
        endpoint: Option<String>,
        model: Option<String>,
        language: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::new();
        let endpoint = endpoint
            .unwrap_or_else(|| "https://api.openai.com/v1/audio/transcriptions".to_string());

        info!("Initialized HTTP transcription provider with endpoint: {endpoint}");

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: model.unwrap_or_else(|| "whisper-1".to_string()),
            language,
        })
    }
}

#[async_trait]
impl Transcriber for HttpProvider {
    fn name(&self) -> &'static str {
        "Whisper API"
    }

    async fn transcribe(&self, audio_base64: &str, format: EncodingFormat) -> Result<String> {
        let audio = BASE64
            .decode(audio_base64)
            .context("Invalid base64 audio payload")?;

        debug!("Uploading {} bytes of {} audio", audio.len(), format.mime());

        let part = multipart::Part::bytes(audio)
            .file_name(format!("recording.{}", format.extension()))
            .mime_str(format.mime())
            .context("Invalid audio MIME type")?;

        let mut form = multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Failed to send transcription request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read transcription response body")?;

        if !status.is_success() {
            error!("transcription request failed with status {status}: {body}");

            // Surface the server's own message when it gives one, so the
            // session error reads like the backend's failure, not ours.
            if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(anyhow::anyhow!(parsed.error.message));
            }
            return Err(anyhow::anyhow!(
                "Transcription request failed with status {status}"
            ));
        }

        let parsed: TranscriptionResponse =
            serde_json::from_str(&body).context("Failed to parse transcription response")?;

        Ok(parsed.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transcription_response() {
        let parsed: TranscriptionResponse =
            serde_json::from_str(r#"{"text":" hello world "}"#).unwrap();
        assert_eq!(parsed.text.trim(), "hello world");
    }

    #[test]
    fn test_parse_error_response() {
        let body = r#"{"error":{"message":"quota exceeded","type":"insufficient_quota"}}"#;
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message, "quota exceeded");
    }
}
