//! Events that can occur in a conversation

use super::state::CallId;
use crate::backend::{BackendError, PromptRecord};

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User intents
    SetDraft {
        text: String,
    },
    SubmitQuery {
        text: String,
    },
    /// Refresh the prompt collection (also issued at startup)
    LoadPrompts,
    AddPrompt,
    EditPrompt {
        index: usize,
        text: String,
    },
    SavePrompt {
        index: usize,
    },
    UpdatePrompt {
        index: usize,
    },
    RemovePrompt {
        index: usize,
    },
    RequestResponses,
    HighlightResponse {
        index: usize,
    },
    SelectResponse {
        index: usize,
    },
    /// Select the highlighted response
    ConfirmSelection,
    ContinueConversation,
    EndConversation,
    StartNewConversation,
    /// Re-send a turn notification the service did not confirm
    RetryNotification,

    // Remote call completions
    PromptsFetched {
        call: CallId,
        result: Result<Vec<PromptRecord>, BackendError>,
    },
    PromptCreated {
        call: CallId,
        result: Result<PromptRecord, BackendError>,
    },
    PromptUpdated {
        call: CallId,
        result: Result<(), BackendError>,
    },
    PromptDeleted {
        call: CallId,
        result: Result<(), BackendError>,
    },
    ResponsesGenerated {
        call: CallId,
        result: Result<Vec<String>, BackendError>,
    },
    NotificationAcknowledged {
        call: CallId,
        result: Result<(), BackendError>,
    },
}

impl Event {
    /// Completion events carry the id of the call they finish
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            Event::PromptsFetched { call, .. }
            | Event::PromptCreated { call, .. }
            | Event::PromptUpdated { call, .. }
            | Event::PromptDeleted { call, .. }
            | Event::ResponsesGenerated { call, .. }
            | Event::NotificationAcknowledged { call, .. } => Some(*call),
            _ => None,
        }
    }
}
