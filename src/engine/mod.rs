//! Execution-engine boundary: the [`EngineClient`] trait and its wire types.

#[cfg(not(target_arch = "wasm32"))]
pub mod http;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

#[cfg(not(target_arch = "wasm32"))]
pub use http::HttpEngineClient;

// =============================================================================
// WIRE TYPES
// =============================================================================

/// One mutation of an existing flow (`POST /api/v1/flows/{id}`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "request", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowOperation {
    UpdateTrigger(StepRequest),
    AddAction(AddActionRequest),
    LockAndPublish(EmptyRequest),
    ChangeStatus(ChangeStatusRequest),
}

impl FlowOperation {
    pub fn name(&self) -> &'static str {
        match self {
            FlowOperation::UpdateTrigger(_) => "UPDATE_TRIGGER",
            FlowOperation::AddAction(_) => "ADD_ACTION",
            FlowOperation::LockAndPublish(_) => "LOCK_AND_PUBLISH",
            FlowOperation::ChangeStatus(_) => "CHANGE_STATUS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    PieceTrigger,
    Piece,
    Code,
    Branch,
}

/// A trigger or action as the engine stores it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: StepType,
    pub display_name: String,
    pub settings: Value,
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepLocation {
    After,
    InsideTrueBranch,
    InsideFalseBranch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddActionRequest {
    pub parent_step: String,
    pub step_location_relative_to_parent: StepLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_index: Option<u32>,
    pub action: StepRequest,
}

/// Serializes as `{}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EmptyRequest {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowState {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeStatusRequest {
    pub status: FlowState,
}

/// Body of `POST /api/v1/flows`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlowRequest {
    pub display_name: String,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
}

/// The empty flow created by [`EngineClient::create_flow`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FlowShell {
    pub id: String,
}

/// An app connection configured in the engine project.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub piece_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Engine listings come back either bare or wrapped in a `{ "data": [...] }` page.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Paged { data: Vec<T> },
}

pub(crate) fn decode_listing<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, serde_json::Error> {
    Ok(match serde_json::from_value(value)? {
        Listing::Bare(items) | Listing::Paged { data: items } => items,
    })
}

// =============================================================================
// CLIENT
// =============================================================================

/// A remote workflow-execution engine. Every call is fallible and may be slow.
#[async_trait]
pub trait EngineClient: Send + Sync {
    async fn create_flow(
        &self,
        display_name: &str,
        folder_id: Option<&str>,
    ) -> Result<FlowShell, EngineError>;

    async fn apply(&self, flow_id: &str, operation: FlowOperation) -> Result<(), EngineError>;

    async fn delete_flow(&self, flow_id: &str) -> Result<(), EngineError>;

    async fn get_flow(&self, flow_id: &str) -> Result<Value, EngineError>;

    async fn list_flows(&self, limit: usize) -> Result<Value, EngineError>;

    async fn list_connections(&self) -> Result<Vec<Connection>, EngineError>;

    /// Runs of one flow, or of the whole project when `flow_id` is `None`.
    async fn list_runs(&self, flow_id: Option<&str>, limit: usize) -> Result<Value, EngineError>;

    async fn update_trigger(&self, flow_id: &str, trigger: StepRequest) -> Result<(), EngineError> {
        self.apply(flow_id, FlowOperation::UpdateTrigger(trigger)).await
    }

    async fn add_action(&self, flow_id: &str, request: AddActionRequest) -> Result<(), EngineError> {
        self.apply(flow_id, FlowOperation::AddAction(request)).await
    }

    async fn publish(&self, flow_id: &str) -> Result<(), EngineError> {
        self.apply(flow_id, FlowOperation::LockAndPublish(EmptyRequest {}))
            .await
    }

    async fn set_status(&self, flow_id: &str, enabled: bool) -> Result<(), EngineError> {
        let status = if enabled {
            FlowState::Enabled
        } else {
            FlowState::Disabled
        };
        self.apply(flow_id, FlowOperation::ChangeStatus(ChangeStatusRequest { status }))
            .await
    }
}
