//! Conversation state types

use super::log::ConversationLog;
use super::prompts::{PromptKey, PromptSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Turn Phase
// ============================================================================

/// Which affordance is active. Exactly one at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnPhase {
    /// Waiting for a query
    #[default]
    Idle,

    /// Query sent, prompt panel open
    PromptEditing,

    /// Generation request in flight, prompt panel still open
    ResponsePending,

    /// Candidate responses shown
    ResponseSelecting {
        options: Vec<String>,
        highlighted: Option<usize>,
    },

    /// Response picked, continue/done offered
    PostSelection,

    /// Conversation ended, only a new conversation can be started
    Closed,
}

impl TurnPhase {
    pub fn name(&self) -> &'static str {
        match self {
            TurnPhase::Idle => "idle",
            TurnPhase::PromptEditing => "prompt_editing",
            TurnPhase::ResponsePending => "response_pending",
            TurnPhase::ResponseSelecting { .. } => "response_selecting",
            TurnPhase::PostSelection => "post_selection",
            TurnPhase::Closed => "closed",
        }
    }

    /// Prompt CRUD is accepted only while the panel is open
    pub fn prompt_panel_open(&self) -> bool {
        matches!(
            self,
            TurnPhase::PromptEditing
                | TurnPhase::ResponsePending
                | TurnPhase::ResponseSelecting { .. }
        )
    }

    pub fn response_options(&self) -> &[String] {
        match self {
            TurnPhase::ResponseSelecting { options, .. } => options,
            _ => &[],
        }
    }

    pub fn highlighted(&self) -> Option<usize> {
        match self {
            TurnPhase::ResponseSelecting { highlighted, .. } => *highlighted,
            _ => None,
        }
    }
}

// ============================================================================
// Remote Calls
// ============================================================================

/// Identifier of one issued remote call. Completions echo it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// Turn notifications sent to the service after local effects are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Selection { index: usize },
    Continue,
    Stop,
}

impl Notification {
    pub fn label(self) -> &'static str {
        match self {
            Notification::Selection { .. } => "selection",
            Notification::Continue => "continue",
            Notification::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteStatus {
    Pending,
    Confirmed,
    Failed { message: String },
}

/// The most recent turn notification and whether the service confirmed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationState {
    pub notification: Notification,
    pub status: RemoteStatus,
}

/// What an in-flight call was issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCall {
    LoadPrompts,
    /// `content` is what was sent, used to detect edits made during flight
    SavePrompt { key: PromptKey, content: String },
    UpdatePrompt { key: PromptKey, content: String },
    DeletePrompt { key: PromptKey },
    Generate,
    Notify(Notification),
}

impl PendingCall {
    pub fn label(&self) -> &'static str {
        match self {
            PendingCall::LoadPrompts => "load_prompts",
            PendingCall::SavePrompt { .. } => "save_prompt",
            PendingCall::UpdatePrompt { .. } => "update_prompt",
            PendingCall::DeletePrompt { .. } => "delete_prompt",
            PendingCall::Generate => "generate",
            PendingCall::Notify(n) => n.label(),
        }
    }

    /// Entry a prompt write was issued for
    pub fn prompt_key(&self) -> Option<PromptKey> {
        match self {
            PendingCall::SavePrompt { key, .. }
            | PendingCall::UpdatePrompt { key, .. }
            | PendingCall::DeletePrompt { key } => Some(*key),
            _ => None,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Everything the controller owns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub draft: String,
    pub log: ConversationLog,
    pub prompts: PromptSet,
    pub phase: TurnPhase,
    /// Calls issued and not yet completed
    pub pending: BTreeMap<CallId, PendingCall>,
    pub notification: Option<NotificationState>,
    next_call: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh session. The call counter carries over so completions of
    /// calls issued before the reset can never match a new call.
    pub fn reset(&self) -> Self {
        Self {
            next_call: self.next_call,
            ..Self::default()
        }
    }

    /// Any remote call outstanding
    pub fn is_thinking(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn is_pending(&self, call: &PendingCall) -> bool {
        self.pending.values().any(|p| p == call)
    }

    pub fn response_options(&self) -> &[String] {
        self.phase.response_options()
    }

    /// Register a call and hand out its id
    pub(crate) fn issue(&mut self, call: PendingCall) -> CallId {
        let id = CallId(self.next_call);
        self.next_call += 1;
        self.pending.insert(id, call);
        id
    }

    /// Whether this session is indistinguishable from a brand new one
    pub fn is_pristine(&self) -> bool {
        self.draft.is_empty()
            && self.log.is_empty()
            && self.prompts.is_empty()
            && self.phase == TurnPhase::Idle
            && self.pending.is_empty()
            && self.notification.is_none()
    }
}
