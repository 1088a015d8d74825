//! Turn state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.
//! The session holds the transcript, the prompt set and the turn phase;
//! [`transition`] maps an intent or a remote completion to a new session and
//! the effects the runtime must execute.

mod effect;
pub mod event;
pub mod log;
pub mod prompts;
pub mod state;
pub(crate) mod transition;


pub use effect::{Effect, NoticeLevel};
pub use event::Event;
pub use log::{ConversationLog, Message, MessageKind};
pub use prompts::{PromptEntry, PromptKey, PromptOp, PromptSet, SyncStatus};
pub use state::{CallId, Notification, NotificationState, PendingCall, RemoteStatus, Session, TurnPhase};
pub use transition::{transition, TransitionError, TransitionResult, ValidationFailure};
