//! Pure state transition function
//!
//! Given the same session and event this always produces the same result.
//! Remote calls are described as effects and executed by the runtime.

use super::effect::Effect;
use super::event::Event;
use super::log::{Message, CONTINUE_MESSAGE, FAREWELL_MESSAGE};
use super::prompts::{PromptKey, PromptOp, SyncStatus};
use super::state::{
    CallId, Notification, NotificationState, PendingCall, RemoteStatus, Session, TurnPhase,
};
use crate::backend::GenerateRequest;
use thiserror::Error;

pub const PROMPT_UPDATED_NOTICE: &str = "Prompt updated successfully!";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: Session) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Intents rejected locally before any remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("Type a query before sending")]
    EmptyQuery,
    #[error("Please add at least one prompt!")]
    NoPrompts,
    #[error("Prompt {} is empty", .index + 1)]
    EmptyPromptContent { index: usize },
    #[error("Prompt {} is already saved, update it instead", .index + 1)]
    PromptAlreadySaved { index: usize },
    #[error("Prompt {} has not been saved yet", .index + 1)]
    PromptNotSaved { index: usize },
    #[error("There is no prompt {}", .index + 1)]
    PromptIndexOutOfRange { index: usize },
    #[error("Choose a response first")]
    NoSelection,
    #[error("There is no response option {}", .index + 1)]
    ResponseIndexOutOfRange { index: usize },
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error("A {0} request is already in flight")]
    Busy(&'static str),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Completion for {0} arrived after the call was forgotten")]
    StaleCompletion(CallId),
}

impl TransitionError {
    /// Stale completions are expected after a reset and are not shown
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, TransitionError::StaleCompletion(_))
    }
}

/// Pure transition function
#[allow(clippy::too_many_lines)] // One arm per intent
pub fn transition(state: &Session, event: Event) -> Result<TransitionResult, TransitionError> {
    // Completions are accepted in every phase while their call is tracked
    if let Some(call) = event.call_id() {
        let mut next = state.clone();
        let Some(pending) = next.pending.remove(&call) else {
            return Err(TransitionError::StaleCompletion(call));
        };
        return complete(next, pending, event);
    }

    match (&state.phase, event) {
        (_, Event::SetDraft { text }) => {
            let mut next = state.clone();
            next.draft = text;
            Ok(TransitionResult::new(next))
        }

        // ============================================================
        // Turn: query -> prompts -> responses -> selection
        // ============================================================

        (TurnPhase::Idle, Event::SubmitQuery { text }) => {
            if text.trim().is_empty() {
                return Err(ValidationFailure::EmptyQuery.into());
            }
            let mut next = state.clone();
            next.log.append(Message::user(text));
            next.draft.clear();
            next.phase = TurnPhase::PromptEditing;
            let refresh = load_prompts(&mut next);
            Ok(TransitionResult::new(next).with_effects(refresh))
        }

        (_, Event::LoadPrompts) => {
            let mut next = state.clone();
            let refresh = load_prompts(&mut next);
            Ok(TransitionResult::new(next).with_effects(refresh))
        }

        (TurnPhase::PromptEditing | TurnPhase::ResponseSelecting { .. }, Event::RequestResponses) => {
            if state.prompts.is_empty() {
                return Err(ValidationFailure::NoPrompts.into());
            }
            let Some(query) = state.log.last_user_message() else {
                return Err(TransitionError::InvalidTransition(
                    "no query to answer".to_string(),
                ));
            };
            let request = GenerateRequest {
                user_input: query.text.clone(),
                system_prompts: state.prompts.contents(),
            };
            let mut next = state.clone();
            next.phase = TurnPhase::ResponsePending;
            let call = next.issue(PendingCall::Generate);
            Ok(TransitionResult::new(next).with_effect(Effect::GenerateResponses { call, request }))
        }

        (TurnPhase::ResponsePending, Event::RequestResponses) => Err(TransitionError::Busy("generate")),

        (TurnPhase::ResponseSelecting { options, .. }, Event::HighlightResponse { index }) => {
            if index >= options.len() {
                return Err(ValidationFailure::ResponseIndexOutOfRange { index }.into());
            }
            let mut next = state.clone();
            next.phase = TurnPhase::ResponseSelecting {
                options: options.clone(),
                highlighted: Some(index),
            };
            Ok(TransitionResult::new(next))
        }

        (TurnPhase::ResponseSelecting { options, .. }, Event::SelectResponse { index }) => {
            select_response(state, options, index)
        }

        (TurnPhase::ResponseSelecting { options, highlighted }, Event::ConfirmSelection) => {
            let index = highlighted.ok_or(ValidationFailure::NoSelection)?;
            select_response(state, options, index)
        }

        (TurnPhase::PostSelection, Event::ContinueConversation) => {
            let mut next = state.clone();
            next.log.append(Message::info(CONTINUE_MESSAGE));
            next.phase = TurnPhase::Idle;
            let notify = notify_backend(&mut next, Notification::Continue);
            Ok(TransitionResult::new(next).with_effect(notify))
        }

        (TurnPhase::PostSelection, Event::EndConversation) => {
            let mut next = state.clone();
            next.log.append(Message::info(FAREWELL_MESSAGE));
            next.phase = TurnPhase::Closed;
            let notify = notify_backend(&mut next, Notification::Stop);
            Ok(TransitionResult::new(next).with_effect(notify))
        }

        (_, Event::StartNewConversation) => Ok(TransitionResult::new(state.reset())),

        (_, Event::RetryNotification) => match &state.notification {
            Some(NotificationState {
                notification,
                status: RemoteStatus::Failed { .. },
            }) => {
                let mut next = state.clone();
                let notify = notify_backend(&mut next, *notification);
                Ok(TransitionResult::new(next).with_effect(notify))
            }
            _ => Err(TransitionError::InvalidTransition(
                "there is no failed notification to retry".to_string(),
            )),
        },

        // ============================================================
        // Prompt set management (panel open only)
        // ============================================================

        (phase, Event::AddPrompt) if phase.prompt_panel_open() => {
            let mut next = state.clone();
            next.prompts.add_blank();
            Ok(TransitionResult::new(next))
        }

        (phase, Event::EditPrompt { index, text }) if phase.prompt_panel_open() => {
            let entry = state
                .prompts
                .get(index)
                .ok_or(ValidationFailure::PromptIndexOutOfRange { index })?;
            if entry.sync == SyncStatus::Deleting {
                return Err(TransitionError::Busy("delete_prompt"));
            }
            let mut next = state.clone();
            next.prompts.edit(index, text);
            Ok(TransitionResult::new(next))
        }

        (phase, Event::SavePrompt { index }) if phase.prompt_panel_open() => {
            let entry = state
                .prompts
                .get(index)
                .ok_or(ValidationFailure::PromptIndexOutOfRange { index })?;
            reject_if_in_flight(&entry.sync)?;
            if entry.is_persisted() {
                return Err(ValidationFailure::PromptAlreadySaved { index }.into());
            }
            if entry.content.trim().is_empty() {
                return Err(ValidationFailure::EmptyPromptContent { index }.into());
            }
            let key = entry.key;
            let content = entry.content.clone();
            let mut next = state.clone();
            next.prompts.mark(key, SyncStatus::Saving);
            let call = next.issue(PendingCall::SavePrompt {
                key,
                content: content.clone(),
            });
            Ok(TransitionResult::new(next).with_effect(Effect::CreatePrompt { call, key, content }))
        }

        (phase, Event::UpdatePrompt { index }) if phase.prompt_panel_open() => {
            let entry = state
                .prompts
                .get(index)
                .ok_or(ValidationFailure::PromptIndexOutOfRange { index })?;
            reject_if_in_flight(&entry.sync)?;
            let Some(id) = entry.id.clone() else {
                return Err(ValidationFailure::PromptNotSaved { index }.into());
            };
            if entry.content.trim().is_empty() {
                return Err(ValidationFailure::EmptyPromptContent { index }.into());
            }
            let key = entry.key;
            let content = entry.content.clone();
            let mut next = state.clone();
            next.prompts.mark(key, SyncStatus::Updating);
            let call = next.issue(PendingCall::UpdatePrompt {
                key,
                content: content.clone(),
            });
            Ok(TransitionResult::new(next).with_effect(Effect::UpdatePrompt {
                call,
                key,
                id,
                content,
            }))
        }

        (phase, Event::RemovePrompt { index }) if phase.prompt_panel_open() => {
            let entry = state
                .prompts
                .get(index)
                .ok_or(ValidationFailure::PromptIndexOutOfRange { index })?;
            reject_if_in_flight(&entry.sync)?;
            let key = entry.key;
            let mut next = state.clone();
            match entry.id.clone() {
                // Never persisted: nothing to tell the service
                None => {
                    next.prompts.remove(key);
                    Ok(TransitionResult::new(next))
                }
                Some(id) => {
                    next.prompts.mark(key, SyncStatus::Deleting);
                    let call = next.issue(PendingCall::DeletePrompt { key });
                    Ok(TransitionResult::new(next).with_effect(Effect::DeletePrompt { call, key, id }))
                }
            }
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================

        (phase, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} is not available while {}",
            phase.name()
        ))),
    }
}

/// Apply the completion of a tracked call. `next` no longer tracks it.
fn complete(
    mut next: Session,
    pending: PendingCall,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (pending, event) {
        (PendingCall::LoadPrompts, Event::PromptsFetched { result, .. }) => match result {
            // The selection discarded the prompt set this list was for
            Ok(_) if matches!(next.phase, TurnPhase::PostSelection | TurnPhase::Closed) => {
                next.prompts.forget_refresh();
                Ok(TransitionResult::new(next))
            }
            Ok(records) => {
                next.prompts.reconcile(records);
                Ok(TransitionResult::new(next))
            }
            // Local sequence stays at its last known value
            Err(e) => {
                next.prompts.forget_refresh();
                Ok(TransitionResult::new(next)
                    .with_effect(Effect::error(format!("Error fetching prompts: {e}"))))
            }
        },

        (PendingCall::SavePrompt { key, content }, Event::PromptCreated { result, .. }) => {
            match result {
                Ok(record) => {
                    if next.prompts.confirm_saved(key, record, &content) {
                        note_settled(&mut next, key);
                    }
                    Ok(TransitionResult::new(next))
                }
                Err(e) => {
                    next.prompts.mark_failed(key, PromptOp::Save, e.message.clone());
                    Ok(TransitionResult::new(next)
                        .with_effect(Effect::error(format!("Error saving prompt: {e}"))))
                }
            }
        }

        (PendingCall::UpdatePrompt { key, content }, Event::PromptUpdated { result, .. }) => {
            match result {
                Ok(()) => {
                    let found = next.prompts.confirm_updated(key, &content);
                    if found {
                        note_settled(&mut next, key);
                    }
                    let result = TransitionResult::new(next);
                    Ok(if found {
                        result.with_effect(Effect::info(PROMPT_UPDATED_NOTICE))
                    } else {
                        result
                    })
                }
                Err(e) => {
                    next.prompts.mark_failed(key, PromptOp::Update, e.message.clone());
                    Ok(TransitionResult::new(next)
                        .with_effect(Effect::error(format!("Error updating prompt: {e}"))))
                }
            }
        }

        (PendingCall::DeletePrompt { key }, Event::PromptDeleted { result, .. }) => match result {
            Ok(()) => {
                let removed_id = next.prompts.remove(key).and_then(|entry| entry.id);
                if let Some(id) = removed_id {
                    if next.is_pending(&PendingCall::LoadPrompts) {
                        next.prompts.note_deleted_during_refresh(id);
                    }
                }
                Ok(TransitionResult::new(next))
            }
            Err(e) => {
                next.prompts.mark_failed(key, PromptOp::Delete, e.message.clone());
                Ok(TransitionResult::new(next)
                    .with_effect(Effect::error(format!("Error deleting prompt: {e}"))))
            }
        },

        (PendingCall::Generate, Event::ResponsesGenerated { result, .. }) => {
            if next.phase != TurnPhase::ResponsePending {
                return Ok(TransitionResult::new(next));
            }
            match result {
                Ok(options) => {
                    next.phase = TurnPhase::ResponseSelecting {
                        options,
                        highlighted: None,
                    };
                    Ok(TransitionResult::new(next))
                }
                Err(e) => {
                    next.phase = TurnPhase::PromptEditing;
                    Ok(TransitionResult::new(next)
                        .with_effect(Effect::error(format!("Error fetching responses: {e}"))))
                }
            }
        }

        (PendingCall::Notify(sent), Event::NotificationAcknowledged { result, .. }) => {
            // A later notification supersedes this one
            let is_current = next
                .notification
                .as_ref()
                .is_some_and(|n| n.notification == sent && n.status == RemoteStatus::Pending);
            if !is_current {
                return Ok(TransitionResult::new(next));
            }
            let (status, effects) = match result {
                Ok(()) => (RemoteStatus::Confirmed, None),
                Err(e) => (
                    RemoteStatus::Failed {
                        message: e.message.clone(),
                    },
                    Some(Effect::error(format!(
                        "The service did not record the {}: {e}",
                        sent.label()
                    ))),
                ),
            };
            next.notification = Some(NotificationState {
                notification: sent,
                status,
            });
            Ok(TransitionResult::new(next).with_effects(effects))
        }

        (pending, event) => Err(TransitionError::InvalidTransition(format!(
            "completion {event:?} does not match pending {}",
            pending.label()
        ))),
    }
}

/// An outstanding refresh may predate this write; keep the local entry
fn note_settled(next: &mut Session, key: PromptKey) {
    if next.is_pending(&PendingCall::LoadPrompts) {
        next.prompts.note_settled_during_refresh(key);
    }
}

/// Issue a prompt refresh unless one is already in flight
fn load_prompts(next: &mut Session) -> Option<Effect> {
    if next.is_pending(&PendingCall::LoadPrompts) {
        return None;
    }
    let call = next.issue(PendingCall::LoadPrompts);
    Some(Effect::FetchPrompts { call })
}

fn select_response(
    state: &Session,
    options: &[String],
    index: usize,
) -> Result<TransitionResult, TransitionError> {
    let chosen = options
        .get(index)
        .ok_or(ValidationFailure::ResponseIndexOutOfRange { index })?;
    let mut next = state.clone();
    next.log.append(Message::bot(chosen.clone()));
    next.prompts.clear();
    // Writes for the dropped entries have nothing left to confirm
    next.pending.retain(|_, call| call.prompt_key().is_none());
    next.phase = TurnPhase::PostSelection;
    let notify = notify_backend(&mut next, Notification::Selection { index });
    Ok(TransitionResult::new(next).with_effect(notify))
}

fn notify_backend(next: &mut Session, notification: Notification) -> Effect {
    let call = next.issue(PendingCall::Notify(notification));
    next.notification = Some(NotificationState {
        notification,
        status: RemoteStatus::Pending,
    });
    Effect::NotifyBackend { call, notification }
}

fn reject_if_in_flight(sync: &SyncStatus) -> Result<(), TransitionError> {
    match sync {
        SyncStatus::Saving => Err(TransitionError::Busy("save_prompt")),
        SyncStatus::Updating => Err(TransitionError::Busy("update_prompt")),
        SyncStatus::Deleting => Err(TransitionError::Busy("delete_prompt")),
        _ => Ok(()),
    }
}
