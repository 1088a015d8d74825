//! reqwest implementation of the prompt service contract

use super::types::{
    CreatePromptResponse, ErrorBody, GenerateResponse, ListPromptsResponse, PromptContentBody,
    SelectBody,
};
use super::{BackendError, GenerateRequest, PromptBackend, PromptId, PromptRecord};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Prompt service reached over HTTP
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Build a client for `base_url`. Without a timeout a hung call stays
    /// pending until the service answers.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send and decode a JSON body
    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            BackendError::decode(format!("Failed to parse response: {e} - body: {body}"))
        })
    }

    /// Send and return the raw body of a 2xx response
    async fn send(&self, request: RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                BackendError::network(format!("Connection failed: {e}"))
            } else {
                BackendError::unknown(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }
        Ok(body)
    }
}

fn classify_error(status: StatusCode, body: &str) -> BackendError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map_or_else(|_| body.to_string(), |parsed| parsed.error);
    match status.as_u16() {
        400 => BackendError::invalid_request(format!("Invalid request: {message}")),
        404 => BackendError::not_found(format!("Not found: {message}")),
        500..=599 => BackendError::server_error(format!("Server error: {message}")),
        _ => BackendError::unknown(format!("HTTP {status}: {message}")),
    }
}

#[async_trait]
impl PromptBackend for HttpBackend {
    async fn list_prompts(&self) -> Result<Vec<PromptRecord>, BackendError> {
        let list: ListPromptsResponse = self.fetch(self.client.get(self.url("/prompts"))).await?;
        Ok(list.prompts)
    }

    async fn create_prompt(&self, content: &str) -> Result<PromptRecord, BackendError> {
        let created: CreatePromptResponse = self
            .fetch(
                self.client
                    .post(self.url("/prompts"))
                    .json(&PromptContentBody { content }),
            )
            .await?;
        Ok(created.prompt)
    }

    async fn update_prompt(&self, id: &PromptId, content: &str) -> Result<(), BackendError> {
        self.send(
            self.client
                .put(self.url(&format!("/prompts/{id}")))
                .json(&PromptContentBody { content }),
        )
        .await?;
        Ok(())
    }

    async fn delete_prompt(&self, id: &PromptId) -> Result<(), BackendError> {
        self.send(self.client.delete(self.url(&format!("/prompts/{id}"))))
            .await?;
        Ok(())
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Vec<String>, BackendError> {
        let generated: GenerateResponse = self
            .fetch(self.client.post(self.url("/start")).json(request))
            .await?;
        Ok(generated.responses)
    }

    async fn select(&self, selected_index: usize) -> Result<(), BackendError> {
        self.send(
            self.client
                .post(self.url("/select"))
                .json(&SelectBody { selected_index }),
        )
        .await?;
        Ok(())
    }

    async fn continue_conversation(&self) -> Result<(), BackendError> {
        self.send(self.client.post(self.url("/continue"))).await?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), BackendError> {
        self.send(self.client.post(self.url("/stop"))).await?;
        Ok(())
    }
}
