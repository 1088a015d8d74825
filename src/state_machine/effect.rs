//! Effects produced by state transitions

use super::prompts::PromptKey;
use super::state::{CallId, Notification};
use crate::backend::{GenerateRequest, PromptId};

/// Severity of a message shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// `GET /prompts`
    FetchPrompts { call: CallId },

    /// `POST /prompts`
    CreatePrompt {
        call: CallId,
        key: PromptKey,
        content: String,
    },

    /// `PUT /prompts/{id}`
    UpdatePrompt {
        call: CallId,
        key: PromptKey,
        id: PromptId,
        content: String,
    },

    /// `DELETE /prompts/{id}`
    DeletePrompt {
        call: CallId,
        key: PromptKey,
        id: PromptId,
    },

    /// `POST /start`
    GenerateResponses {
        call: CallId,
        request: GenerateRequest,
    },

    /// `POST /select`, `/continue` or `/stop`
    NotifyBackend {
        call: CallId,
        notification: Notification,
    },

    /// Show a message to the user
    NotifyUser { level: NoticeLevel, text: String },
}

impl Effect {
    pub fn info(text: impl Into<String>) -> Self {
        Effect::NotifyUser {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Effect::NotifyUser {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }

    /// Whether this effect talks to the service
    pub fn is_remote(&self) -> bool {
        !matches!(self, Effect::NotifyUser { .. })
    }
}
