//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use crate::backend::{BackendError, GenerateRequest, PromptBackend, PromptId, PromptRecord};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Backend
// ============================================================================

/// In-memory prompt service with queued generation results
#[allow(dead_code)]
pub struct MockBackend {
    prompts: Mutex<Vec<PromptRecord>>,
    next_id: Mutex<u64>,
    responses: Mutex<VecDeque<Result<Vec<String>, BackendError>>>,
    /// Operations that fail with the given error instead of running
    failures: Mutex<HashMap<&'static str, BackendError>>,
    delay: Duration,
    /// Record of every call, e.g. `"select 1"`
    pub calls: Mutex<Vec<String>>,
    /// Record of generation requests
    pub requests: Mutex<Vec<GenerateRequest>>,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
            responses: Mutex::new(VecDeque::new()),
            failures: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Seed the stored prompts
    pub fn with_prompts(self, contents: &[&str]) -> Self {
        for content in contents {
            self.insert(content);
        }
        self
    }

    /// Delay every call (for testing overlapping requests)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a generation result
    pub fn queue_responses(&self, options: &[&str]) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(options.iter().map(ToString::to_string).collect()));
    }

    pub fn queue_generate_error(&self, error: BackendError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Make `operation` fail until [`MockBackend::recover`] is called
    pub fn fail(&self, operation: &'static str, error: BackendError) {
        self.failures.lock().unwrap().insert(operation, error);
    }

    pub fn recover(&self, operation: &'static str) {
        self.failures.lock().unwrap().remove(operation);
    }

    pub fn stored_prompts(&self) -> Vec<PromptRecord> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn recorded_requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn insert(&self, content: &str) -> PromptRecord {
        let mut next_id = self.next_id.lock().unwrap();
        let record = PromptRecord::new(next_id.to_string(), content);
        *next_id += 1;
        self.prompts.lock().unwrap().push(record.clone());
        record
    }

    /// Record the call, wait out the delay, then apply any configured failure
    async fn enter(&self, operation: &'static str, call: String) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(call);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.failures.lock().unwrap().get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PromptBackend for MockBackend {
    async fn list_prompts(&self) -> Result<Vec<PromptRecord>, BackendError> {
        self.enter("list_prompts", "list_prompts".to_string())
            .await?;
        Ok(self.stored_prompts())
    }

    async fn create_prompt(&self, content: &str) -> Result<PromptRecord, BackendError> {
        self.enter("create_prompt", format!("create_prompt {content}"))
            .await?;
        Ok(self.insert(content))
    }

    async fn update_prompt(&self, id: &PromptId, content: &str) -> Result<(), BackendError> {
        self.enter("update_prompt", format!("update_prompt {id} {content}"))
            .await?;
        let mut prompts = self.prompts.lock().unwrap();
        let record = prompts
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| BackendError::not_found("Prompt not found"))?;
        record.content = content.to_string();
        Ok(())
    }

    async fn delete_prompt(&self, id: &PromptId) -> Result<(), BackendError> {
        self.enter("delete_prompt", format!("delete_prompt {id}"))
            .await?;
        let mut prompts = self.prompts.lock().unwrap();
        let before = prompts.len();
        prompts.retain(|p| &p.id != id);
        if prompts.len() == before {
            return Err(BackendError::not_found("Prompt not found"));
        }
        Ok(())
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Vec<String>, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        self.enter("generate", format!("generate {}", request.user_input))
            .await?;
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::network("No mock response queued")))
    }

    async fn select(&self, selected_index: usize) -> Result<(), BackendError> {
        self.enter("select", format!("select {selected_index}")).await
    }

    async fn continue_conversation(&self) -> Result<(), BackendError> {
        self.enter("continue", "continue".to_string()).await
    }

    async fn stop(&self) -> Result<(), BackendError> {
        self.enter("stop", "stop".to_string()).await
    }
}

// ============================================================================
// Test Runtime
// ============================================================================

use crate::runtime::{ConversationRuntime, UiEvent};
use crate::state_machine::{Event, NoticeLevel, Session};
use tokio::sync::{broadcast, mpsc};

/// Helper for driving a runtime against a [`MockBackend`]
pub struct TestRuntime {
    pub backend: Arc<MockBackend>,
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_rx: broadcast::Receiver<UiEvent>,
    _runtime_handle: tokio::task::JoinHandle<()>,
}

impl TestRuntime {
    /// Start a runtime. It fetches the prompts right away.
    pub fn start(backend: MockBackend) -> Self {
        let backend = Arc::new(backend);
        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(128);

        let runtime = ConversationRuntime::new(backend.clone(), event_rx, &event_tx, broadcast_tx);
        let handle = tokio::spawn(async move {
            runtime.run().await;
        });

        TestRuntime {
            backend,
            event_tx,
            broadcast_rx,
            _runtime_handle: handle,
        }
    }

    pub async fn send(&self, event: Event) {
        self.event_tx
            .send(event)
            .await
            .expect("Failed to send event");
    }

    pub async fn submit(&self, text: &str) {
        self.send(Event::SubmitQuery {
            text: text.to_string(),
        })
        .await;
    }

    /// Wait for a broadcast session satisfying `pred`
    pub async fn wait_for_session(
        &mut self,
        timeout: Duration,
        pred: impl Fn(&Session) -> bool,
    ) -> Option<Session> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(UiEvent::StateChange { session })) if pred(&session) => {
                    return Some(*session);
                }
                _ => continue,
            }
        }
        None
    }

    /// Wait for a session in the named phase with nothing in flight
    pub async fn wait_for_settled(&mut self, phase: &str, timeout: Duration) -> Option<Session> {
        self.wait_for_session(timeout, |s| s.phase.name() == phase && !s.is_thinking())
            .await
    }

    pub async fn wait_for_notice(&mut self, timeout: Duration) -> Option<(NoticeLevel, String)> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(UiEvent::Notice { level, text })) => return Some((level, text)),
                _ => continue,
            }
        }
        None
    }

    pub async fn wait_for_rejection(&mut self, timeout: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(UiEvent::Rejected { message })) => return Some(message),
                _ => continue,
            }
        }
        None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::log::{CONTINUE_MESSAGE, FAREWELL_MESSAGE};
    use crate::state_machine::{Message, RemoteStatus, SyncStatus, TurnPhase};

    const WAIT: Duration = Duration::from_secs(2);

    /// Drive a fresh runtime to a settled prompt panel for "hello"
    async fn editing(backend: MockBackend) -> TestRuntime {
        let mut rt = TestRuntime::start(backend);
        rt.submit("hello").await;
        rt.wait_for_settled("prompt_editing", WAIT)
            .await
            .expect("prompt panel should open");
        rt
    }

    #[tokio::test]
    async fn test_mock_backend_stores_prompts() {
        let backend = MockBackend::new().with_prompts(&["Be concise"]);
        let created = backend.create_prompt("Be kind").await.unwrap();
        assert_eq!(created.id, PromptId::new("2"));

        backend.update_prompt(&created.id, "Be nice").await.unwrap();
        backend
            .delete_prompt(&PromptId::new("1"))
            .await
            .unwrap();
        assert_eq!(
            backend.list_prompts().await.unwrap(),
            vec![PromptRecord::new("2", "Be nice")]
        );

        let missing = backend.delete_prompt(&PromptId::new("1")).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_startup_fetches_prompts() {
        let mut rt = TestRuntime::start(MockBackend::new().with_prompts(&["Be concise"]));
        let session = rt
            .wait_for_session(WAIT, |s| !s.prompts.is_empty())
            .await
            .expect("prompts should load");
        assert_eq!(session.phase, TurnPhase::Idle);
        assert_eq!(rt.backend.recorded_calls(), vec!["list_prompts"]);
    }

    /// Query, prompts, generation, selection, continue
    #[tokio::test]
    async fn test_full_turn() {
        let backend = MockBackend::new().with_prompts(&["Be concise"]);
        backend.queue_responses(&["Hi!", "Hello there."]);
        let mut rt = editing(backend).await;

        rt.send(Event::RequestResponses).await;
        let session = rt
            .wait_for_settled("response_selecting", WAIT)
            .await
            .expect("options should arrive");
        assert_eq!(session.response_options(), &["Hi!", "Hello there."]);
        assert_eq!(
            rt.backend.recorded_requests(),
            vec![GenerateRequest {
                user_input: "hello".to_string(),
                system_prompts: vec!["Be concise".to_string()],
            }]
        );

        rt.send(Event::SelectResponse { index: 1 }).await;
        let session = rt
            .wait_for_session(WAIT, |s| {
                s.notification
                    .as_ref()
                    .is_some_and(|n| n.status == RemoteStatus::Confirmed)
            })
            .await
            .expect("selection should be confirmed");
        assert_eq!(session.phase, TurnPhase::PostSelection);
        assert_eq!(
            session.log.messages(),
            &[Message::user("hello"), Message::bot("Hello there.")]
        );
        assert!(session.prompts.is_empty());

        rt.send(Event::ContinueConversation).await;
        let session = rt
            .wait_for_settled("idle", WAIT)
            .await
            .expect("should return to idle");
        assert_eq!(
            session.log.messages().last(),
            Some(&Message::info(CONTINUE_MESSAGE))
        );
        assert!(rt.backend.recorded_calls().contains(&"select 1".to_string()));
        assert!(rt.backend.recorded_calls().contains(&"continue".to_string()));
    }

    #[tokio::test]
    async fn test_end_conversation_notifies_stop() {
        let backend = MockBackend::new().with_prompts(&["Be concise"]);
        backend.queue_responses(&["Hi!"]);
        let mut rt = editing(backend).await;
        rt.send(Event::RequestResponses).await;
        rt.wait_for_settled("response_selecting", WAIT).await.unwrap();
        rt.send(Event::SelectResponse { index: 0 }).await;
        rt.send(Event::EndConversation).await;

        let session = rt.wait_for_settled("closed", WAIT).await.unwrap();
        assert_eq!(
            session.log.messages().last(),
            Some(&Message::info(FAREWELL_MESSAGE))
        );
        assert!(rt.backend.recorded_calls().contains(&"stop".to_string()));
    }

    #[tokio::test]
    async fn test_generation_without_prompts_is_rejected_locally() {
        let mut rt = editing(MockBackend::new()).await;
        rt.send(Event::RequestResponses).await;

        let message = rt.wait_for_rejection(WAIT).await.unwrap();
        assert_eq!(message, "Please add at least one prompt!");
        assert!(rt.backend.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_is_reported() {
        let backend = MockBackend::new().with_prompts(&["Be concise"]);
        backend.queue_generate_error(BackendError::server_error("Server error: boom"));
        let mut rt = editing(backend).await;

        rt.send(Event::RequestResponses).await;
        let (level, text) = rt.wait_for_notice(WAIT).await.unwrap();
        assert_eq!(level, NoticeLevel::Error);
        assert!(text.contains("boom"));
    }

    #[tokio::test]
    async fn test_save_assigns_server_id() {
        let mut rt = editing(MockBackend::new()).await;
        rt.send(Event::AddPrompt).await;
        rt.send(Event::EditPrompt {
            index: 0,
            text: "Be brief".to_string(),
        })
        .await;
        rt.send(Event::SavePrompt { index: 0 }).await;

        let session = rt
            .wait_for_session(WAIT, |s| {
                s.prompts.get(0).is_some_and(|e| e.sync == SyncStatus::Synced)
            })
            .await
            .expect("save should complete");
        assert_eq!(session.prompts.get(0).unwrap().id, Some(PromptId::new("1")));
        assert_eq!(
            rt.backend.stored_prompts(),
            vec![PromptRecord::new("1", "Be brief")]
        );
    }

    #[tokio::test]
    async fn test_update_confirms_with_notice() {
        let mut rt = editing(MockBackend::new().with_prompts(&["Be concise"])).await;
        rt.send(Event::EditPrompt {
            index: 0,
            text: "Be very concise".to_string(),
        })
        .await;
        rt.send(Event::UpdatePrompt { index: 0 }).await;

        let (level, text) = rt.wait_for_notice(WAIT).await.unwrap();
        assert_eq!(level, NoticeLevel::Info);
        assert_eq!(text, "Prompt updated successfully!");
        assert_eq!(
            rt.backend.stored_prompts(),
            vec![PromptRecord::new("1", "Be very concise")]
        );
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_entry() {
        let backend = MockBackend::new().with_prompts(&["Be concise"]);
        backend.fail("delete_prompt", BackendError::network("Connection failed"));
        let mut rt = editing(backend).await;

        rt.send(Event::RemovePrompt { index: 0 }).await;
        let (level, _) = rt.wait_for_notice(WAIT).await.unwrap();
        assert_eq!(level, NoticeLevel::Error);

        rt.backend.recover("delete_prompt");
        rt.send(Event::RemovePrompt { index: 0 }).await;
        let session = rt
            .wait_for_session(WAIT, |s| s.prompts.is_empty())
            .await
            .expect("retry should delete the prompt");
        assert!(!session.is_thinking());
        assert!(rt.backend.stored_prompts().is_empty());
    }

    #[tokio::test]
    async fn test_failed_selection_can_be_retried() {
        let backend = MockBackend::new().with_prompts(&["Be concise"]);
        backend.queue_responses(&["Hi!"]);
        backend.fail("select", BackendError::invalid_request("No responses available"));
        let mut rt = editing(backend).await;
        rt.send(Event::RequestResponses).await;
        rt.wait_for_settled("response_selecting", WAIT).await.unwrap();

        rt.send(Event::SelectResponse { index: 0 }).await;
        let (level, _) = rt.wait_for_notice(WAIT).await.unwrap();
        assert_eq!(level, NoticeLevel::Error);

        rt.backend.recover("select");
        rt.send(Event::RetryNotification).await;
        let session = rt
            .wait_for_session(WAIT, |s| {
                s.notification
                    .as_ref()
                    .is_some_and(|n| n.status == RemoteStatus::Confirmed)
            })
            .await
            .expect("retry should be confirmed");
        assert_eq!(session.phase, TurnPhase::PostSelection);
        let selects = rt
            .backend
            .recorded_calls()
            .iter()
            .filter(|c| c.starts_with("select"))
            .count();
        assert_eq!(selects, 2);
    }

    #[tokio::test]
    async fn test_late_responses_after_new_conversation_are_ignored() {
        let backend = MockBackend::new()
            .with_prompts(&["Be concise"])
            .with_delay(Duration::from_millis(100));
        backend.queue_responses(&["late"]);
        let mut rt = editing(backend).await;

        rt.send(Event::RequestResponses).await;
        rt.wait_for_session(WAIT, |s| s.phase == TurnPhase::ResponsePending)
            .await
            .unwrap();
        rt.send(Event::StartNewConversation).await;
        let fresh = rt.wait_for_session(WAIT, Session::is_pristine).await.unwrap();
        assert_eq!(fresh.phase, TurnPhase::Idle);

        // The late completion is dropped without a state change or rejection
        tokio::time::sleep(Duration::from_millis(200)).await;
        while let Ok(event) = rt.broadcast_rx.try_recv() {
            assert!(
                !matches!(event, UiEvent::StateChange { .. } | UiEvent::Rejected { .. }),
                "unexpected {event:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_runtime_stops_when_handles_drop() {
        let rt = TestRuntime::start(MockBackend::new());
        let TestRuntime {
            event_tx,
            _runtime_handle: handle,
            ..
        } = rt;
        drop(event_tx);
        tokio::time::timeout(WAIT, handle)
            .await
            .expect("runtime should stop")
            .unwrap();
    }
}
