use std::sync::Arc;

use minuted_pipeline::Pipeline;
use minuted_pipeline::actions::ActionExtractor;
use minuted_pipeline::voiceprints::VoiceprintStore;

/// Shared application state; cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    /// Enrolled-voiceprint store, when one is configured. Without it, callers
    /// must supply voiceprints inline with each upload.
    pub store: Option<Arc<dyn VoiceprintStore>>,
    /// Action-extraction backend, when one is configured.
    pub actions: Option<Arc<dyn ActionExtractor>>,
    pub max_upload_mb: usize,
}
