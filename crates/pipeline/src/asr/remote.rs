use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::Transcriber;
use crate::audio::encode_wav;
use crate::error::{PipelineError, Result};
use crate::{AudioBuffer, TranscriptSegment};

/// Wire shape of the remote ASR service's response.
#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    segments: Vec<WireSegment>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireSegment {
    text: String,
    start_ms: u64,
    end_ms: u64,
}

/// Speech-to-text backend that posts the recording to a remote ASR service.
pub struct HttpTranscriber {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTranscriber {
    /// Creates a client for the ASR service. The API key is attached as a
    /// default header and marked sensitive so it never shows up in logs.
    pub fn new(base_url: &str, api_key: Option<&str>) -> anyhow::Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(key) = api_key {
            let mut value = reqwest::header::HeaderValue::from_str(key)
                .map_err(|e| anyhow::anyhow!("Invalid ASR API key format: {e}"))?;
            value.set_sensitive(true);
            headers.insert("authorization", value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<Vec<TranscriptSegment>> {
        let wav = encode_wav(&audio.samples, audio.sample_rate)
            .map_err(|e| PipelineError::TranscriptionFailed(format!("WAV encode: {e}")))?;

        debug!(bytes = wav.len(), "Posting audio to ASR service");

        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| PipelineError::TranscriptionFailed(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let url = format!("{}/transcribe", self.base_url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!("ASR service request failed: {e}");
                PipelineError::TranscriptionFailed(format!("ASR service unreachable: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::TranscriptionFailed(format!(
                "ASR service returned {status}: {body}"
            )));
        }

        let payload: TranscribeResponse = response.json().await.map_err(|e| {
            PipelineError::TranscriptionFailed(format!("invalid ASR response: {e}"))
        })?;

        if let Some(err) = payload.error {
            return Err(PipelineError::TranscriptionFailed(err));
        }

        info!(segments = payload.segments.len(), "Remote transcription complete");

        Ok(payload
            .segments
            .into_iter()
            .map(|s| TranscriptSegment {
                text: s.text,
                start_ms: s.start_ms,
                end_ms: s.end_ms,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "remote_http"
    }
}
