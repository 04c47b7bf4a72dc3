//! JSON-over-HTTP session client

use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{completion_ack, CompletionAck, SessionApi};
use crate::{
    api::responses::{
        AckResponse, CompleteResponse, ErrorResponse, PauseResponse, ResumeResponse,
        SaveProgressRequest, SessionResponse, StartSessionRequest, StartSessionResponse,
    },
    error::{ApiError, NOT_IN_USE_CODE},
};

/// Session client for a remote session service
#[derive(Debug, Clone)]
pub struct HttpSessionApi {
    base_url: String,
    client: Client,
}

impl HttpSessionApi {
    /// Create a client for the service at `base_url` (e.g. `http://127.0.0.1:20560`)
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B, T>(&self, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        debug!("POST {}", path);
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        decode(request.send().await?).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!("GET {}", path);
        decode(self.client.get(self.url(path)).send().await?).await
    }
}

/// Decode a success body, or turn an error body into an [`ApiError`]
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ErrorResponse>(&text).unwrap_or_else(|_| ErrorResponse {
        error: "unknown".to_string(),
        message: text,
    });

    if body.error == NOT_IN_USE_CODE {
        return Err(ApiError::NotInUse(body.message));
    }
    Err(ApiError::Server {
        status: status.as_u16(),
        code: body.error,
        message: body.message,
    })
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn start_session(&self, request: &StartSessionRequest) -> Result<StartSessionResponse, ApiError> {
        self.post("/sessions", Some(request)).await
    }

    async fn pause_session(&self, id: Uuid) -> Result<PauseResponse, ApiError> {
        self.post::<(), _>(&format!("/sessions/{id}/pause"), None).await
    }

    async fn resume_session(&self, id: Uuid) -> Result<ResumeResponse, ApiError> {
        self.post::<(), _>(&format!("/sessions/{id}/resume"), None).await
    }

    async fn save_progress(&self, id: Uuid, elapsed_seconds: u64) -> Result<(), ApiError> {
        let body = SaveProgressRequest { elapsed_seconds };
        let _: AckResponse = self.post(&format!("/sessions/{id}/progress"), Some(&body)).await?;
        Ok(())
    }

    async fn complete_session(&self, id: Uuid) -> Result<CompletionAck, ApiError> {
        let result: Result<CompleteResponse, ApiError> =
            self.post::<(), _>(&format!("/sessions/{id}/complete"), None).await;
        completion_ack(result)
    }

    async fn abandon_session(&self, id: Uuid) -> Result<(), ApiError> {
        let _: AckResponse = self.post::<(), _>(&format!("/sessions/{id}/abandon"), None).await?;
        Ok(())
    }

    async fn fetch_session(&self, id: Uuid) -> Result<SessionResponse, ApiError> {
        self.get(&format!("/sessions/{id}")).await
    }
}
