//! Conversation runtime executor

use super::UiEvent;

use crate::backend::PromptBackend;
use crate::state_machine::{
    transition, Effect, Event, NoticeLevel, Notification, Session, TransitionError,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Owns the session of one conversation and executes its effects
pub struct ConversationRuntime<B: PromptBackend + 'static> {
    session: Session,
    backend: Arc<B>,
    event_rx: mpsc::Receiver<Event>,
    /// Weak so that dropping every handle stops the runtime
    event_tx: mpsc::WeakSender<Event>,
    broadcast_tx: broadcast::Sender<UiEvent>,
}

impl<B: PromptBackend + 'static> ConversationRuntime<B> {
    pub fn new(
        backend: B,
        event_rx: mpsc::Receiver<Event>,
        event_tx: &mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<UiEvent>,
    ) -> Self {
        Self {
            session: Session::new(),
            backend: Arc::new(backend),
            event_rx,
            event_tx: event_tx.downgrade(),
            broadcast_tx,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("Starting conversation runtime");

        // The prompt collection is fetched once at startup
        self.process_event(Event::LoadPrompts);

        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event);
        }

        tracing::info!("Conversation runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        let result = match transition(&self.session, event) {
            Ok(r) => r,
            Err(e) => {
                self.report_rejection(&e);
                return;
            }
        };

        let old_phase = std::mem::replace(&mut self.session, result.new_state).phase;
        if old_phase != self.session.phase {
            tracing::debug!(
                from = old_phase.name(),
                to = self.session.phase.name(),
                "Phase changed"
            );
        }

        let _ = self.broadcast_tx.send(UiEvent::StateChange {
            session: Box::new(self.session.clone()),
        });

        for effect in result.effects {
            self.execute_effect(effect);
        }
    }

    fn report_rejection(&self, error: &TransitionError) {
        if !error.is_user_facing() {
            tracing::debug!(error = %error, "Ignoring completion of a forgotten call");
            return;
        }
        tracing::info!(error = %error, phase = self.session.phase.name(), "Event rejected");
        let _ = self.broadcast_tx.send(UiEvent::Rejected {
            message: error.to_string(),
        });
    }

    fn execute_effect(&self, effect: Effect) {
        if let Effect::NotifyUser { level, text } = effect {
            if level == NoticeLevel::Error {
                tracing::warn!(notice = %text, "Reporting failure to user");
            }
            let _ = self.broadcast_tx.send(UiEvent::Notice { level, text });
            return;
        }

        let Some(event_tx) = self.event_tx.upgrade() else {
            tracing::debug!("Runtime shutting down, dropping remote call");
            return;
        };
        let backend = self.backend.clone();

        // Spawn the call as a background task; its completion comes back as
        // an event
        tokio::spawn(async move {
            if let Some(event) = perform(backend.as_ref(), effect).await {
                let _ = event_tx.send(event).await;
            }
        });
    }
}

/// Run one remote effect and turn its outcome into the completion event
async fn perform<B: PromptBackend>(backend: &B, effect: Effect) -> Option<Event> {
    let event = match effect {
        Effect::FetchPrompts { call } => Event::PromptsFetched {
            call,
            result: backend.list_prompts().await,
        },
        Effect::CreatePrompt { call, content, .. } => Event::PromptCreated {
            call,
            result: backend.create_prompt(&content).await,
        },
        Effect::UpdatePrompt {
            call, id, content, ..
        } => Event::PromptUpdated {
            call,
            result: backend.update_prompt(&id, &content).await,
        },
        Effect::DeletePrompt { call, id, .. } => Event::PromptDeleted {
            call,
            result: backend.delete_prompt(&id).await,
        },
        Effect::GenerateResponses { call, request } => Event::ResponsesGenerated {
            call,
            result: backend.generate(&request).await,
        },
        Effect::NotifyBackend { call, notification } => {
            let result = match notification {
                Notification::Selection { index } => backend.select(index).await,
                Notification::Continue => backend.continue_conversation().await,
                Notification::Stop => backend.stop().await,
            };
            Event::NotificationAcknowledged { call, result }
        }
        Effect::NotifyUser { .. } => return None,
    };
    Some(event)
}
