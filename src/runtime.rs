//! Runtime for driving a conversation
//!
//! The runtime owns the [`Session`], feeds events through the pure
//! transition function and executes the resulting effects. Remote calls run
//! as background tasks and report back through the same event channel, so
//! the user interface never waits on the network.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;

use crate::backend::PromptBackend;
use crate::state_machine::{Event, NoticeLevel, Session};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

const EVENT_CHANNEL_CAPACITY: usize = 32;
const BROADCAST_CAPACITY: usize = 128;

/// Events sent to whoever renders the conversation
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Session after an accepted event
    StateChange { session: Box<Session> },
    /// Message for the user (errors, confirmations)
    Notice { level: NoticeLevel, text: String },
    /// An intent the current session does not allow
    Rejected { message: String },
}

#[derive(Debug, Error)]
#[error("conversation runtime has stopped")]
pub struct RuntimeStopped;

/// Handle to interact with a running conversation
#[derive(Clone)]
pub struct ConversationHandle {
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<UiEvent>,
}

impl ConversationHandle {
    pub async fn send(&self, event: Event) -> Result<(), RuntimeStopped> {
        self.event_tx.send(event).await.map_err(|_| RuntimeStopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.broadcast_tx.subscribe()
    }
}

/// Start a conversation runtime in the background.
///
/// The runtime stops once every handle is dropped and no remote call is
/// outstanding.
pub fn spawn<B: PromptBackend + 'static>(backend: B) -> ConversationHandle {
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

    let runtime = ConversationRuntime::new(backend, event_rx, &event_tx, broadcast_tx.clone());
    tokio::spawn(async move {
        runtime.run().await;
        tracing::info!("Conversation runtime finished");
    });

    ConversationHandle {
        event_tx,
        broadcast_tx,
    }
}
