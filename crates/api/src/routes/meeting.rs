use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Deserialize;
use tracing::info;

use minuted_pipeline::actions::ActionRecord;
use minuted_pipeline::assemble::apply_resolutions;
use minuted_pipeline::voiceprints::parse_enrolled;
use minuted_pipeline::{MeetingResult, SpeakerMap};

use crate::error::ApiError;
use crate::state::AppState;

/// Processes one uploaded meeting recording.
///
/// Multipart fields:
/// - `audio` (required): the recording, WAV or anything ffmpeg can decode.
/// - `enrolled_voiceprints` (optional): JSON object of display name ->
///   base64 little-endian f32 embedding, used instead of the store.
/// - `team_id` (optional): team whose enrollments to fetch from the store.
pub async fn process(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MeetingResult>, ApiError> {
    let mut audio: Option<Vec<u8>> = None;
    let mut enrolled_raw: Option<String> = None;
    let mut team_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("audio") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("reading audio upload: {e}")))?;
                audio = Some(bytes.to_vec());
            }
            Some("enrolled_voiceprints") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("reading voiceprints: {e}")))?;
                enrolled_raw = Some(text);
            }
            Some("team_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("reading team_id: {e}")))?;
                team_id = Some(text);
            }
            _ => {}
        }
    }

    let audio = audio.ok_or_else(|| ApiError::BadRequest("missing 'audio' part".to_string()))?;
    info!(bytes = audio.len(), "Meeting upload received");

    let result = if let Some(raw) = enrolled_raw {
        let map: BTreeMap<String, String> = serde_json::from_str(&raw).map_err(|e| {
            ApiError::BadRequest(format!("'enrolled_voiceprints' is not a JSON object: {e}"))
        })?;
        let enrolled = parse_enrolled(&map);
        state.pipeline.process(audio, &enrolled).await?
    } else if let (Some(team), Some(store)) = (team_id, state.store.as_ref()) {
        state
            .pipeline
            .process_for_team(audio, &**store, &team)
            .await?
    } else {
        state.pipeline.process(audio, &[]).await?
    };

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct ResolveRequest {
    pub result: MeetingResult,
    /// Unresolved label -> display name.
    pub resolutions: SpeakerMap,
}

/// Applies human-supplied speaker resolutions to a previously returned
/// result. Safe to replay.
pub async fn resolve(
    Json(request): Json<ResolveRequest>,
) -> Result<Json<MeetingResult>, ApiError> {
    let updated = apply_resolutions(&request.result, &request.resolutions)?;
    Ok(Json(updated))
}

/// Extracts structured task actions from a finished meeting result.
pub async fn actions(
    State(state): State<AppState>,
    Json(result): Json<MeetingResult>,
) -> Result<Json<Vec<ActionRecord>>, ApiError> {
    let extractor = state.actions.as_ref().ok_or_else(|| {
        ApiError::NotConfigured("no action-extraction service configured".to_string())
    })?;
    let actions = extractor.extract(&result).await?;
    Ok(Json(actions))
}
