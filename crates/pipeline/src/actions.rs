//! Action-item extraction from a finished meeting transcript.
//!
//! The extraction service takes the speaker-attributed transcript as plain
//! text and returns a JSON array of structured task actions, wrapped in an
//! `ai_response` envelope that may still carry markdown code fences.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::MeetingResult;
use crate::error::{PipelineError, Result};

/// One structured task operation extracted from the meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionRecord {
    Create {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        assignee: Option<String>,
        #[serde(default)]
        due_date: Option<String>,
        #[serde(default)]
        list_id: Option<String>,
    },
    Update {
        task_id: String,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        assignee: Option<String>,
    },
    Comment {
        task_id: String,
        comment: String,
    },
    Close {
        task_id: String,
    },
    Flag {
        task_id: String,
        reason: String,
    },
    /// A free-form note the model could not express as a task operation.
    Meta {
        note: String,
    },
}

/// Trait for pluggable action extraction backends.
#[async_trait]
pub trait ActionExtractor: Send + Sync + 'static {
    async fn extract(&self, result: &MeetingResult) -> Result<Vec<ActionRecord>>;
}

/// Renders a result as the "Name: text" line format the extraction service
/// was prompted with.
pub fn render_transcript(result: &MeetingResult) -> String {
    let mut out = String::new();
    for utterance in &result.transcript {
        out.push_str(&utterance.speaker);
        out.push_str(": ");
        out.push_str(&utterance.text);
        out.push('\n');
    }
    out
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    transcript: &'a str,
}

#[derive(Deserialize)]
struct ExtractResponse {
    ai_response: String,
}

/// HTTP client for the action extraction service.
pub struct HttpActionExtractor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpActionExtractor {
    pub fn new(base_url: impl Into<String>, bearer_token: Option<&str>) -> anyhow::Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = bearer_token {
            let mut value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| anyhow::anyhow!("invalid action service token: {e}"))?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build action service client: {e}"))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ActionExtractor for HttpActionExtractor {
    async fn extract(&self, result: &MeetingResult) -> Result<Vec<ActionRecord>> {
        let transcript = render_transcript(result);
        let url = format!("{}/process-transcript", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ExtractRequest {
                transcript: &transcript,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PipelineError::UpstreamTimeout(format!("action service: {e}"))
                } else {
                    PipelineError::UpstreamUnavailable(format!("action service: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::UpstreamUnavailable(format!(
                "action service returned {status}"
            )));
        }

        let body: ExtractResponse = response.json().await.map_err(|e| {
            PipelineError::MalformedUpstreamResponse(format!("action service: {e}"))
        })?;

        let actions = parse_actions(&body.ai_response)?;
        debug!(count = actions.len(), "Actions extracted");
        Ok(actions)
    }
}

/// Parses the model's response text into action records. The model often
/// wraps the JSON array in markdown code fences; strip them before parsing.
pub fn parse_actions(raw: &str) -> Result<Vec<ActionRecord>> {
    let trimmed = strip_code_fences(raw);
    serde_json::from_str(trimmed).map_err(|e| {
        PipelineError::MalformedUpstreamResponse(format!("action payload is not valid JSON: {e}"))
    })
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag after the opening fence
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MeetingStats, SpeakerMap, Utterance};

    fn result_with(lines: &[(&str, &str)]) -> MeetingResult {
        let transcript: Vec<Utterance> = lines
            .iter()
            .enumerate()
            .map(|(i, (speaker, text))| Utterance {
                speaker: speaker.to_string(),
                text: text.to_string(),
                start_ms: i as u64 * 1000,
                end_ms: (i as u64 + 1) * 1000,
            })
            .collect();
        MeetingResult {
            stats: MeetingStats {
                segment_count: transcript.len(),
                speaker_count: 1,
                duration_ms: transcript.last().map_or(0, |u| u.end_ms),
            },
            transcript,
            speaker_map: SpeakerMap::new(),
            unresolved_speakers: Vec::new(),
        }
    }

    #[test]
    fn renders_name_colon_text_lines() {
        let result = result_with(&[("Alice", "let's ship it"), ("Bob", "agreed")]);
        assert_eq!(render_transcript(&result), "Alice: let's ship it\nBob: agreed\n");
    }

    #[test]
    fn parses_plain_json_array() {
        let actions = parse_actions(
            r#"[{"action":"create","title":"Ship the release","assignee":"Bob"},
                {"action":"close","task_id":"T-42"}]"#,
        )
        .unwrap();
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[0], ActionRecord::Create { title, .. } if title == "Ship the release"));
        assert!(matches!(&actions[1], ActionRecord::Close { task_id } if task_id == "T-42"));
    }

    #[test]
    fn strips_markdown_fences() {
        let raw = "```json\n[{\"action\":\"meta\",\"note\":\"no tasks discussed\"}]\n```";
        let actions = parse_actions(raw).unwrap();
        assert_eq!(
            actions,
            vec![ActionRecord::Meta {
                note: "no tasks discussed".to_string()
            }]
        );
    }

    #[test]
    fn empty_array_is_valid() {
        assert!(parse_actions("[]").unwrap().is_empty());
    }

    #[test]
    fn non_json_response_is_malformed() {
        let err = parse_actions("I couldn't find any actions, sorry!").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedUpstreamResponse(_)));
    }

    #[test]
    fn unknown_action_tag_is_malformed() {
        let err = parse_actions(r#"[{"action":"explode","task_id":"T-1"}]"#).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedUpstreamResponse(_)));
    }
}
