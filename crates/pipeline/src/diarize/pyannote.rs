use std::path::Path;
use std::sync::Mutex;

use pyannote_rs::EmbeddingExtractor;
use tracing::info;

use super::SpeakerEmbedder;

/// Speaker embedder backed by a pyannote/wespeaker ONNX model.
pub struct PyannoteEmbedder {
    // EmbeddingExtractor holds an ONNX session with mutable inference state.
    extractor: Mutex<EmbeddingExtractor>,
}

impl PyannoteEmbedder {
    /// Loads the embedding model (e.g. wespeaker_en_voxceleb_CAM++.onnx).
    pub fn new(model_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = model_path.as_ref();
        if !path.exists() {
            anyhow::bail!("Embedding model not found: {}", path.display());
        }
        info!(model = %path.display(), "Loading speaker embedding model");
        let extractor = EmbeddingExtractor::new(path)
            .map_err(|e| anyhow::anyhow!("Failed to create embedding extractor: {e}"))?;
        Ok(Self {
            extractor: Mutex::new(extractor),
        })
    }
}

impl SpeakerEmbedder for PyannoteEmbedder {
    fn embed(&self, samples: &[f32], _sample_rate: u32) -> anyhow::Result<Vec<f32>> {
        // The model consumes i16 PCM
        let samples_i16: Vec<i16> = samples
            .iter()
            .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
            .collect();

        let mut extractor = self
            .extractor
            .lock()
            .map_err(|_| anyhow::anyhow!("embedding extractor mutex poisoned"))?;

        let embedding: Vec<f32> = extractor
            .compute(&samples_i16)
            .map_err(|e| anyhow::anyhow!("Failed to compute embedding: {e}"))?
            .collect();

        if embedding.is_empty() || embedding.iter().any(|v| !v.is_finite()) {
            anyhow::bail!("embedding model produced an empty or non-finite vector");
        }

        Ok(embedding)
    }
}
