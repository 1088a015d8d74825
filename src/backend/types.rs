//! Wire types for the prompt service

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier assigned to a prompt by the service.
///
/// The service has shipped both integer ids and string object ids; both are
/// normalised to their string form here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PromptId(String);

impl PromptId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PromptId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Integer(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => PromptId(text),
            RawId::Integer(n) => PromptId(n.to_string()),
        })
    }
}

/// A prompt as stored by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRecord {
    #[serde(alias = "_id")]
    pub id: PromptId,
    pub content: String,
}

impl PromptRecord {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: PromptId::new(id),
            content: content.into(),
        }
    }
}

/// Body of `POST /start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub user_input: String,
    pub system_prompts: Vec<String>,
}

/// Body of `POST /prompts` and `PUT /prompts/{id}`
#[derive(Debug, Serialize)]
pub(crate) struct PromptContentBody<'a> {
    pub content: &'a str,
}

/// Body of `POST /select`
#[derive(Debug, Serialize)]
pub(crate) struct SelectBody {
    pub selected_index: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListPromptsResponse {
    #[serde(default)]
    pub prompts: Vec<PromptRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatePromptResponse {
    pub prompt: PromptRecord,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    pub responses: Vec<String>,
}

/// Error payload the service returns alongside 4xx/5xx statuses
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}
