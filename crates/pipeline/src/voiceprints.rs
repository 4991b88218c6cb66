//! Enrolled voiceprint wire format and the store client.
//!
//! Embeddings travel as base64-encoded little-endian f32 vectors, keyed by
//! the enrolled user's display name.

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::EnrolledVoiceprint;
use crate::error::{PipelineError, Result};

/// Decodes one base64 little-endian f32 embedding. Rejects empty vectors,
/// byte counts that are not a multiple of four, and non-finite components.
pub fn decode_embedding_b64(encoded: &str) -> anyhow::Result<Vec<f32>> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| anyhow::anyhow!("invalid base64: {e}"))?;
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        anyhow::bail!("embedding byte length {} is not a multiple of 4", bytes.len());
    }

    let embedding: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    if embedding.iter().any(|v| !v.is_finite()) {
        anyhow::bail!("embedding contains non-finite components");
    }
    Ok(embedding)
}

/// Parses a name -> base64 embedding map into enrolled voiceprints.
///
/// A malformed entry is skipped with a warning rather than failing the whole
/// set; one corrupt enrollment should not block resolving the others.
pub fn parse_enrolled(raw: &BTreeMap<String, String>) -> Vec<EnrolledVoiceprint> {
    let mut out = Vec::with_capacity(raw.len());
    for (user_name, encoded) in raw {
        match decode_embedding_b64(encoded) {
            Ok(embedding) => out.push(EnrolledVoiceprint {
                user_name: user_name.clone(),
                embedding,
            }),
            Err(e) => warn!(user = %user_name, "Skipping malformed voiceprint: {e}"),
        }
    }
    out
}

/// Source of enrolled voiceprints for a team.
#[async_trait]
pub trait VoiceprintStore: Send + Sync + 'static {
    async fn fetch(&self, team_id: &str) -> Result<Vec<EnrolledVoiceprint>>;
}

#[derive(Deserialize)]
struct VoiceprintsResponse {
    voiceprints: BTreeMap<String, String>,
}

/// Fetches enrollments from the voiceprint service over HTTP.
pub struct HttpVoiceprintStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVoiceprintStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<&str>) -> anyhow::Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(key) = api_key {
            let mut value = reqwest::header::HeaderValue::from_str(key)
                .map_err(|e| anyhow::anyhow!("invalid voiceprint store API key: {e}"))?;
            value.set_sensitive(true);
            headers.insert("x-api-key", value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build voiceprint store client: {e}"))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl VoiceprintStore for HttpVoiceprintStore {
    async fn fetch(&self, team_id: &str) -> Result<Vec<EnrolledVoiceprint>> {
        let url = format!("{}/voiceprints/{team_id}", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                PipelineError::UpstreamTimeout(format!("voiceprint store: {e}"))
            } else {
                PipelineError::UpstreamUnavailable(format!("voiceprint store: {e}"))
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(team_id, "No voiceprints enrolled for team");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(PipelineError::UpstreamUnavailable(format!(
                "voiceprint store returned {status}"
            )));
        }

        let body: VoiceprintsResponse = response.json().await.map_err(|e| {
            PipelineError::MalformedUpstreamResponse(format!("voiceprint store: {e}"))
        })?;

        let enrolled = parse_enrolled(&body.voiceprints);
        debug!(team_id, count = enrolled.len(), "Fetched enrolled voiceprints");
        Ok(enrolled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(values: &[f32]) -> String {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        BASE64.encode(bytes)
    }

    #[test]
    fn decodes_le_f32_vectors() {
        let embedding = decode_embedding_b64(&encode(&[1.0, -0.5, 0.25])).unwrap();
        assert_eq!(embedding, vec![1.0, -0.5, 0.25]);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(decode_embedding_b64("not base64!!!").is_err());
        assert!(decode_embedding_b64("").is_err());
        // 3 bytes, not a multiple of 4
        assert!(decode_embedding_b64(&BASE64.encode([1u8, 2, 3])).is_err());
        assert!(decode_embedding_b64(&encode(&[f32::NAN])).is_err());
        assert!(decode_embedding_b64(&encode(&[f32::INFINITY, 0.0])).is_err());
    }

    #[test]
    fn parse_enrolled_skips_malformed_entries() {
        let mut raw = BTreeMap::new();
        raw.insert("Alice".to_string(), encode(&[1.0, 0.0]));
        raw.insert("Broken".to_string(), "%%%".to_string());
        raw.insert("Bob".to_string(), encode(&[0.0, 1.0]));

        let enrolled = parse_enrolled(&raw);
        let names: Vec<&str> = enrolled.iter().map(|v| v.user_name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }
}
