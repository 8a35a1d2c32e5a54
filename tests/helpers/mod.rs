use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use autoflow::engine::{Connection, EngineClient, FlowOperation, FlowShell};
use autoflow::error::{EngineError, EngineFailure, ProviderError};
use autoflow::ir::*;
use autoflow::repair::{ProducerClient, ProducerRequest};

// =============================================================================
// Flow builders
// =============================================================================

pub fn code(name: &str) -> Action {
    Action::CodeBlock(CodeBlock {
        display_name: name.into(),
        code: Some("export const code = async () => true;".into()),
        ..CodeBlock::default()
    })
}

pub fn piece(name: &str, piece: &str, action: &str) -> Action {
    Action::PieceCall(PieceCall {
        display_name: name.into(),
        piece_name: piece.into(),
        action_name: action.into(),
        ..PieceCall::default()
    })
}

pub fn slack(name: &str) -> Action {
    piece(name, "@activepieces/piece-slack", "send-channel-message")
}

pub fn branch(name: &str, on_true: Vec<Action>, on_false: Vec<Action>) -> Action {
    Action::Branch(Branch {
        display_name: name.into(),
        conditions: vec![json!([{
            "firstValue": "{{trigger.status}}",
            "operator": "TEXT_EXACTLY_MATCHES",
            "secondValue": "ok"
        }])],
        on_true,
        on_false,
    })
}

pub fn flow(trigger: Trigger, actions: Vec<Action>) -> FlowDescriptor {
    FlowDescriptor {
        display_name: "Test Flow".into(),
        trigger,
        actions,
        connections_needed: vec![],
        explanation: None,
    }
}

pub fn webhook_flow(actions: Vec<Action>) -> FlowDescriptor {
    flow(
        Trigger::Webhook(WebhookTrigger {
            display_name: "Incoming".into(),
            ..WebhookTrigger::default()
        }),
        actions,
    )
}

pub fn schedule_flow(cron: &str, actions: Vec<Action>) -> FlowDescriptor {
    flow(Trigger::Schedule(ScheduleTrigger::new(cron, None)), actions)
}

/// Producer-format JSON for a webhook flow with `n` code steps.
pub fn candidate_with_code_steps(n: usize) -> Value {
    let actions: Vec<Value> = (1..=n)
        .map(|i| json!({ "type": "CODE", "displayName": format!("Step {i}"), "code": "return 1" }))
        .collect();
    json!({
        "displayName": "Many steps",
        "trigger": { "type": "WEBHOOK", "displayName": "Incoming" },
        "actions": actions
    })
}

// =============================================================================
// Fake engine
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(String),
    Apply(String, FlowOperation),
    Delete(String),
    Get(String),
    ListFlows(usize),
    ListConnections,
    ListRuns(Option<String>, usize),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(self, Call::Create(_) | Call::Apply(..))
    }
}

/// Records every call. Mutation number `fail_at` (1 = shell creation)
/// fails, and mutation number `hang_at` never completes.
#[derive(Default)]
pub struct FakeEngine {
    calls: Mutex<Vec<Call>>,
    mutations: AtomicUsize,
    pub fail_at: Option<usize>,
    pub hang_at: Option<usize>,
    pub fail_delete: bool,
    pub connections: Vec<Connection>,
}

pub const FLOW_ID: &str = "flow_abc";

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(n: usize) -> Self {
        FakeEngine {
            fail_at: Some(n),
            ..Self::default()
        }
    }

    pub fn hanging_at(n: usize) -> Self {
        FakeEngine {
            hang_at: Some(n),
            ..Self::default()
        }
    }

    pub fn with_failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn with_connections(mut self, connections: Vec<Connection>) -> Self {
        self.connections = connections;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn deletes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Delete(_)))
            .count()
    }

    /// The `ADD_ACTION` requests in order.
    pub fn added_steps(&self) -> Vec<autoflow::engine::AddActionRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Apply(_, FlowOperation::AddAction(req)) => Some(req),
                _ => None,
            })
            .collect()
    }

    async fn mutate(&self, call: Call, path: String) -> Result<(), EngineError> {
        self.calls.lock().push(call);
        let n = self.mutations.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hang_at == Some(n) {
            std::future::pending::<()>().await;
        }
        if self.fail_at == Some(n) {
            return Err(EngineError::new(
                "POST",
                path,
                EngineFailure::Status {
                    status: 500,
                    body: r#"{"message":"boom"}"#.into(),
                },
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EngineClient for FakeEngine {
    async fn create_flow(
        &self,
        display_name: &str,
        _folder_id: Option<&str>,
    ) -> Result<FlowShell, EngineError> {
        self.mutate(Call::Create(display_name.into()), "/api/v1/flows".into())
            .await?;
        Ok(FlowShell { id: FLOW_ID.into() })
    }

    async fn apply(&self, flow_id: &str, operation: FlowOperation) -> Result<(), EngineError> {
        self.mutate(
            Call::Apply(flow_id.into(), operation),
            format!("/api/v1/flows/{flow_id}"),
        )
        .await
    }

    async fn delete_flow(&self, flow_id: &str) -> Result<(), EngineError> {
        self.calls.lock().push(Call::Delete(flow_id.into()));
        if self.fail_delete {
            return Err(EngineError::new(
                "DELETE",
                format!("/api/v1/flows/{flow_id}"),
                EngineFailure::Transport("connection reset".into()),
            ));
        }
        Ok(())
    }

    async fn get_flow(&self, flow_id: &str) -> Result<Value, EngineError> {
        self.calls.lock().push(Call::Get(flow_id.into()));
        Ok(json!({ "id": flow_id }))
    }

    async fn list_flows(&self, limit: usize) -> Result<Value, EngineError> {
        self.calls.lock().push(Call::ListFlows(limit));
        Ok(json!({ "data": [] }))
    }

    async fn list_connections(&self) -> Result<Vec<Connection>, EngineError> {
        self.calls.lock().push(Call::ListConnections);
        Ok(self.connections.clone())
    }

    async fn list_runs(&self, flow_id: Option<&str>, limit: usize) -> Result<Value, EngineError> {
        self.calls
            .lock()
            .push(Call::ListRuns(flow_id.map(str::to_string), limit));
        Ok(json!({ "data": [] }))
    }
}

// =============================================================================
// Scripted producer
// =============================================================================

/// Returns the scripted replies in order and records every request.
#[derive(Default)]
pub struct ScriptedProducer {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProducerRequest>>,
}

impl ScriptedProducer {
    pub fn new(replies: impl IntoIterator<Item = String>) -> Arc<Self> {
        Arc::new(ScriptedProducer {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(err: ProviderError) -> Arc<Self> {
        Arc::new(ScriptedProducer {
            replies: Mutex::new(VecDeque::from([Err(err)])),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<ProducerRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ProducerClient for ScriptedProducer {
    async fn generate(&self, request: ProducerRequest) -> Result<String, ProviderError> {
        self.requests.lock().push(request);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Call("script exhausted".into())))
    }
}
