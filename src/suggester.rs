//! Label suggestions from a generative-text model
//!
//! The model reply is treated as untrusted text: it is split on commas,
//! cleaned up, validated against Gmail's label naming rules and capped at the
//! configured number of names before anything reaches the mail provider.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SuggestionConfig;
use crate::error::{LabelerError, Result};

/// Gmail rejects user label names longer than this
pub const MAX_LABEL_NAME_LEN: usize = 225;

/// System label names a user label may not take
const RESERVED_LABEL_NAMES: &[&str] = &[
    "INBOX", "SPAM", "TRASH", "UNREAD", "STARRED", "IMPORTANT", "SENT", "DRAFT", "DRAFTS",
    "CHAT", "CHATS", "ALL MAIL", "SCHEDULED", "SNOOZED",
];

static LABEL_NAME_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}\p{N} _\-/&.']+$").expect("valid label charset regex"));

/// Source of label name suggestions for a message snippet
#[async_trait]
pub trait LabelSuggester: Send + Sync {
    /// Ordered label names for the snippet. May be empty when the reply held
    /// nothing usable and no fallback is configured.
    async fn suggest(&self, snippet: &str) -> Result<Vec<String>>;
}

/// Prompt sent to the model for one snippet
pub fn build_prompt(snippet: &str, max_labels: usize) -> String {
    let count = match max_labels {
        1 => "one appropriate label name".to_string(),
        2 => "two appropriate label names".to_string(),
        n => format!("{} appropriate label names", n),
    };
    format!(
        "Given the following email content, suggest {} (only the label names, separated by commas): {}",
        count, snippet
    )
}

/// Whether a name can be sent to Gmail as a user label
pub fn is_valid_label_name(name: &str) -> bool {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed != name {
        return false;
    }
    if name.chars().count() > MAX_LABEL_NAME_LEN {
        return false;
    }
    if name.starts_with('/') || name.ends_with('/') || name.contains("//") {
        return false;
    }
    let upper = name.to_uppercase();
    if RESERVED_LABEL_NAMES.contains(&upper.as_str()) || upper.starts_with("CATEGORY_") {
        return false;
    }
    LABEL_NAME_CHARSET.is_match(name)
}

/// Strip the decoration models like to add around each name
fn clean_entry(entry: &str) -> String {
    let is_decoration = |c: char| matches!(c, '"' | '`' | '*' | '\u{201c}' | '\u{201d}');
    let stripped = entry.trim().trim_end_matches('.').trim_matches(is_decoration).trim();
    let stripped = stripped.strip_prefix("- ").unwrap_or(stripped);
    stripped.trim_end_matches('.').trim().to_string()
}

/// Turn a raw model reply into at most `max_labels` valid names.
///
/// Invalid and duplicate entries are dropped. When nothing valid remains the
/// fallback label is used, if any.
pub fn parse_suggestions(raw: &str, max_labels: usize, fallback: Option<&str>) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();

    for entry in raw.split([',', '\n']) {
        let name = clean_entry(entry);
        if name.is_empty() {
            continue;
        }
        if !is_valid_label_name(&name) {
            warn!("Dropping unusable label suggestion: {:?}", name);
            continue;
        }
        if labels.contains(&name) {
            continue;
        }
        labels.push(name);
    }

    if labels.len() > max_labels {
        debug!(
            "Model returned {} labels, keeping first {}",
            labels.len(),
            max_labels
        );
        labels.truncate(max_labels);
    }

    if labels.is_empty() {
        if let Some(fallback) = fallback {
            debug!("No usable suggestion, using fallback label '{}'", fallback);
            labels.push(fallback.to_string());
        }
    }

    labels
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Suggester backed by the Gemini `generateContent` endpoint
pub struct GeminiSuggester {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
    max_labels: usize,
    fallback_label: Option<String>,
}

impl GeminiSuggester {
    pub fn new(api_key: impl Into<String>, config: &SuggestionConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            max_labels: config.max_labels,
            fallback_label: config.fallback_label.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, self.model)
    }

    /// Single completion call, returning the reply text
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LabelerError::SuggestionError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LabelerError::SuggestionError(format!(
                "Model endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LabelerError::SuggestionError(format!("Invalid response body: {}", e)))?;

        let text = parsed.text();
        if text.trim().is_empty() {
            return Err(LabelerError::SuggestionError(
                "Model returned an empty response".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl LabelSuggester for GeminiSuggester {
    async fn suggest(&self, snippet: &str) -> Result<Vec<String>> {
        let prompt = build_prompt(snippet, self.max_labels);
        let raw = self.generate(&prompt).await?;
        debug!("Model reply: {:?}", raw);
        Ok(parse_suggestions(
            &raw,
            self.max_labels,
            self.fallback_label.as_deref(),
        ))
    }
}
