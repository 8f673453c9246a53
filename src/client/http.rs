//! HTTP client for the mirrorcast API

use crate::error::ApiError;
use crate::protocol::api::{
    CreateSessionRequest, CreateSessionResponse, CurrentSessionResponse, ErrorBody,
    HealthResponse, JoinSessionRequest, JoinSessionResponse, PublishResponse, SuccessResponse,
};
use crate::protocol::{decode_event, ServerEvent, SseDecoder, UpdateRequest};
use crate::session::{SessionStats, SessionSummary};
use crate::types::SessionId;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use tracing::debug;

/// Decoded frames of an `/events` stream.
pub type EventStream = BoxStream<'static, Result<ServerEvent, ApiError>>;

/// A client identity on one server. The identity cookie is kept for the
/// client's lifetime, so every call acts as the same participant.
#[derive(Clone)]
pub struct SyncClient {
    http: reqwest::Client,
    base_url: String,
}

impl SyncClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    pub async fn health(&self) -> Result<HealthResponse, ApiError> {
        self.call(self.http.get(self.url("/health"))).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ApiError> {
        self.call(self.http.get(self.url("/api/sessions"))).await
    }

    pub async fn create_session(&self, name: &str) -> Result<CreateSessionResponse, ApiError> {
        let body = CreateSessionRequest {
            name: Some(name.to_string()),
        };
        self.call(self.http.post(self.url("/api/sessions")).json(&body))
            .await
    }

    pub async fn join_session(&self, id: &SessionId) -> Result<JoinSessionResponse, ApiError> {
        let body = JoinSessionRequest {
            session_id: Some(id.clone()),
        };
        self.call(self.http.post(self.url("/api/sessions/join")).json(&body))
            .await
    }

    pub async fn claim(&self) -> Result<SuccessResponse, ApiError> {
        self.call(self.http.post(self.url("/api/sessions/claim")))
            .await
    }

    pub async fn current(&self) -> Result<CurrentSessionResponse, ApiError> {
        self.call(self.http.get(self.url("/api/sessions/current")))
            .await
    }

    pub async fn leave(&self) -> Result<SuccessResponse, ApiError> {
        self.call(self.http.post(self.url("/api/sessions/leave")))
            .await
    }

    pub async fn publish(&self, update: &UpdateRequest) -> Result<PublishResponse, ApiError> {
        self.call(self.http.post(self.url("/sync/update")).json(update))
            .await
    }

    pub async fn stats(&self) -> Result<SessionStats, ApiError> {
        self.call(self.http.get(self.url("/sync/stats"))).await
    }

    /// Open the push channel of the current session.
    pub async fn open_events(&self) -> Result<EventStream, ApiError> {
        let response = check(self.http.get(self.url("/events")).send().await?).await?;
        debug!(url = %response.url(), "Event stream connected");

        let bytes = response.bytes_stream().boxed();
        let state = (bytes, SseDecoder::new(), VecDeque::<String>::new());
        let events = stream::unfold(state, |(mut bytes, mut decoder, mut pending)| async move {
            loop {
                if let Some(data) = pending.pop_front() {
                    return Some((decode_event(&data), (bytes, decoder, pending)));
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => pending.extend(decoder.push(&chunk)),
                    Some(Err(e)) => return Some((Err(e.into()), (bytes, decoder, pending))),
                    None => return None,
                }
            }
        });
        Ok(events.boxed())
    }
}

/// Turn a non-success response into [`ApiError::Remote`], keeping the
/// server's error message when it sent one.
async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(ApiError::Remote {
        status: status.as_u16(),
        message,
    })
}
