//! reqwest-backed [`EngineClient`] and catalog [`PieceSource`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{Connection, CreateFlowRequest, EngineClient, FlowOperation, FlowShell, decode_listing};
use crate::auth::AuthTokenProvider;
use crate::catalog::{PieceDescriptor, PieceSource};
use crate::error::{EngineError, EngineFailure};

/// Upper bound on pieces fetched per catalog sync.
const PIECE_PAGE_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy)]
enum Verb {
    Get,
    Post,
    Delete,
}

impl Verb {
    fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Delete => "DELETE",
        }
    }

    fn method(self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Delete => Method::DELETE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpEngineClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    auth: Arc<AuthTokenProvider>,
}

impl HttpEngineClient {
    /// `http` should carry the per-request timeout.
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        auth: Arc<AuthTokenProvider>,
    ) -> Self {
        HttpEngineClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call<B: Serialize + Sync + ?Sized>(
        &self,
        verb: Verb,
        path: &str,
        body: Option<&B>,
    ) -> Result<Value, EngineError> {
        let fail = |failure| EngineError::new(verb.as_str(), path, failure);

        let token = self
            .auth
            .get_token()
            .await
            .map_err(|e| fail(EngineFailure::Auth(e)))?;

        let mut request = self
            .http
            .request(verb.method(), format!("{}{}", self.base_url, path))
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(method = verb.as_str(), path, "engine request");
        let response = request.send().await.map_err(|e| fail(transport(e)))?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let text = response.text().await.map_err(|e| fail(transport(e)))?;
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                self.auth.clear_token().await;
            }
            return Err(fail(EngineFailure::Status {
                status: status.as_u16(),
                body: text,
            }));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| fail(EngineFailure::Decode(e.to_string())))
    }

    async fn get(&self, path: &str) -> Result<Value, EngineError> {
        self.call::<Value>(Verb::Get, path, None).await
    }
}

fn transport(err: reqwest::Error) -> EngineFailure {
    if err.is_timeout() {
        EngineFailure::Timeout
    } else {
        EngineFailure::Transport(err.to_string())
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    verb: Verb,
    path: &str,
    value: Value,
    with: impl FnOnce(Value) -> Result<T, serde_json::Error>,
) -> Result<T, EngineError> {
    with(value)
        .map_err(|e| EngineError::new(verb.as_str(), path, EngineFailure::Decode(e.to_string())))
}

#[async_trait]
impl EngineClient for HttpEngineClient {
    async fn create_flow(
        &self,
        display_name: &str,
        folder_id: Option<&str>,
    ) -> Result<FlowShell, EngineError> {
        let path = "/api/v1/flows";
        let body = CreateFlowRequest {
            display_name: display_name.to_string(),
            project_id: self.project_id.clone(),
            folder_id: folder_id.map(str::to_string),
        };
        let value = self.call(Verb::Post, path, Some(&body)).await?;
        decode(Verb::Post, path, value, serde_json::from_value)
    }

    async fn apply(&self, flow_id: &str, operation: FlowOperation) -> Result<(), EngineError> {
        let path = format!("/api/v1/flows/{flow_id}");
        debug!(flow_id, operation = operation.name(), "applying flow operation");
        self.call(Verb::Post, &path, Some(&operation)).await?;
        Ok(())
    }

    async fn delete_flow(&self, flow_id: &str) -> Result<(), EngineError> {
        let path = format!("/api/v1/flows/{flow_id}");
        self.call::<Value>(Verb::Delete, &path, None).await?;
        Ok(())
    }

    async fn get_flow(&self, flow_id: &str) -> Result<Value, EngineError> {
        self.get(&format!("/api/v1/flows/{flow_id}")).await
    }

    async fn list_flows(&self, limit: usize) -> Result<Value, EngineError> {
        self.get(&format!(
            "/api/v1/flows?limit={limit}&projectId={}",
            self.project_id
        ))
        .await
    }

    async fn list_connections(&self) -> Result<Vec<Connection>, EngineError> {
        let path = format!("/api/v1/connections?projectId={}", self.project_id);
        let value = self.get(&path).await?;
        decode(Verb::Get, &path, value, decode_listing)
    }

    async fn list_runs(&self, flow_id: Option<&str>, limit: usize) -> Result<Value, EngineError> {
        let path = match flow_id {
            Some(id) => format!("/api/v1/flow-runs?flowId={id}&limit={limit}"),
            None => format!(
                "/api/v1/flow-runs?limit={limit}&projectId={}",
                self.project_id
            ),
        };
        self.get(&path).await
    }
}

#[async_trait]
impl PieceSource for HttpEngineClient {
    async fn fetch_pieces(&self) -> Result<Vec<PieceDescriptor>, EngineError> {
        let path = format!("/api/v1/pieces?limit={PIECE_PAGE_LIMIT}");
        let value = self.get(&path).await?;
        decode(Verb::Get, &path, value, decode_listing)
    }
}
