//! Prompt service client abstraction
//!
//! The remote service stores system prompts, generates candidate responses
//! and records which candidate the user picked. Everything the controller
//! needs from it goes through [`PromptBackend`].

mod error;
mod http;
mod types;

pub use error::{BackendError, BackendErrorKind};
pub use http::HttpBackend;
pub use types::{GenerateRequest, PromptId, PromptRecord};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Client side of the prompt service HTTP contract
#[async_trait]
pub trait PromptBackend: Send + Sync {
    /// `GET /prompts`
    async fn list_prompts(&self) -> Result<Vec<PromptRecord>, BackendError>;

    /// `POST /prompts`
    async fn create_prompt(&self, content: &str) -> Result<PromptRecord, BackendError>;

    /// `PUT /prompts/{id}`
    async fn update_prompt(&self, id: &PromptId, content: &str) -> Result<(), BackendError>;

    /// `DELETE /prompts/{id}`
    async fn delete_prompt(&self, id: &PromptId) -> Result<(), BackendError>;

    /// `POST /start`
    async fn generate(&self, request: &GenerateRequest) -> Result<Vec<String>, BackendError>;

    /// `POST /select`
    async fn select(&self, selected_index: usize) -> Result<(), BackendError>;

    /// `POST /continue`
    async fn continue_conversation(&self) -> Result<(), BackendError>;

    /// `POST /stop`
    async fn stop(&self) -> Result<(), BackendError>;
}

#[async_trait]
impl<T: PromptBackend + ?Sized> PromptBackend for Arc<T> {
    async fn list_prompts(&self) -> Result<Vec<PromptRecord>, BackendError> {
        (**self).list_prompts().await
    }

    async fn create_prompt(&self, content: &str) -> Result<PromptRecord, BackendError> {
        (**self).create_prompt(content).await
    }

    async fn update_prompt(&self, id: &PromptId, content: &str) -> Result<(), BackendError> {
        (**self).update_prompt(id, content).await
    }

    async fn delete_prompt(&self, id: &PromptId) -> Result<(), BackendError> {
        (**self).delete_prompt(id).await
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Vec<String>, BackendError> {
        (**self).generate(request).await
    }

    async fn select(&self, selected_index: usize) -> Result<(), BackendError> {
        (**self).select(selected_index).await
    }

    async fn continue_conversation(&self) -> Result<(), BackendError> {
        (**self).continue_conversation().await
    }

    async fn stop(&self) -> Result<(), BackendError> {
        (**self).stop().await
    }
}

/// Logging wrapper for prompt backends
pub struct LoggingBackend<B> {
    inner: B,
}

impl<B: PromptBackend> LoggingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    fn record<T>(operation: &'static str, started: Instant, result: &Result<T, BackendError>) {
        let duration = started.elapsed();
        match result {
            Ok(_) => {
                tracing::info!(
                    operation,
                    duration_ms = %duration.as_millis(),
                    "Prompt service call completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    operation,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = %e.kind,
                    transient = e.kind.is_transient(),
                    "Prompt service call failed"
                );
            }
        }
    }
}

#[async_trait]
impl<B: PromptBackend> PromptBackend for LoggingBackend<B> {
    async fn list_prompts(&self) -> Result<Vec<PromptRecord>, BackendError> {
        let started = Instant::now();
        let result = self.inner.list_prompts().await;
        Self::record("list_prompts", started, &result);
        result
    }

    async fn create_prompt(&self, content: &str) -> Result<PromptRecord, BackendError> {
        let started = Instant::now();
        let result = self.inner.create_prompt(content).await;
        Self::record("create_prompt", started, &result);
        result
    }

    async fn update_prompt(&self, id: &PromptId, content: &str) -> Result<(), BackendError> {
        let started = Instant::now();
        let result = self.inner.update_prompt(id, content).await;
        Self::record("update_prompt", started, &result);
        result
    }

    async fn delete_prompt(&self, id: &PromptId) -> Result<(), BackendError> {
        let started = Instant::now();
        let result = self.inner.delete_prompt(id).await;
        Self::record("delete_prompt", started, &result);
        result
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Vec<String>, BackendError> {
        let started = Instant::now();
        let result = self.inner.generate(request).await;
        if let Ok(responses) = &result {
            tracing::debug!(
                prompts = request.system_prompts.len(),
                responses = responses.len(),
                "Generated response options"
            );
        }
        Self::record("generate", started, &result);
        result
    }

    async fn select(&self, selected_index: usize) -> Result<(), BackendError> {
        let started = Instant::now();
        let result = self.inner.select(selected_index).await;
        Self::record("select", started, &result);
        result
    }

    async fn continue_conversation(&self) -> Result<(), BackendError> {
        let started = Instant::now();
        let result = self.inner.continue_conversation().await;
        Self::record("continue", started, &result);
        result
    }

    async fn stop(&self) -> Result<(), BackendError> {
        let started = Instant::now();
        let result = self.inner.stop().await;
        Self::record("stop", started, &result);
        result
    }
}
