//! IR type definitions for the flow compiler.
//!
//! The IR is what the external producer emits (one trigger plus an ordered,
//! possibly branching list of actions) and what the graph compiler walks to
//! materialize a remote flow. Wire names follow the producer format; the
//! generic identifiers (`pieceId`, `eventId`, `operationId`, `onTrue`,
//! `onFalse`) are accepted as aliases.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Piece backing the `Schedule` trigger at the engine boundary.
pub const SCHEDULE_PIECE: &str = "@activepieces/piece-schedule";
/// Trigger of [`SCHEDULE_PIECE`] that takes a cron expression.
pub const SCHEDULE_TRIGGER: &str = "cron_expression";
/// Piece backing the `Webhook` trigger at the engine boundary.
pub const WEBHOOK_PIECE: &str = "@activepieces/piece-webhook";
pub const WEBHOOK_TRIGGER: &str = "catch_request";

// =============================================================================
// TOP-LEVEL IR
// =============================================================================

/// One complete automation. Immutable once accepted: repair and modify
/// produce a new descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDescriptor {
    pub display_name: String,
    pub trigger: Trigger,
    pub actions: Vec<Action>,
    /// Piece names the producer expects the user to have connected.
    #[serde(default, rename = "connections_needed", alias = "connectionsNeeded")]
    pub connections_needed: Vec<String>,
    #[serde(
        default,
        alias = "explanation_ar",
        skip_serializing_if = "Option::is_none"
    )]
    pub explanation: Option<String>,
}

impl FlowDescriptor {
    /// Number of actions at every nesting level.
    pub fn total_actions(&self) -> usize {
        count_actions(&self.actions)
    }

    /// Depth-first walk over every action with its path, e.g. `actions[1].onSuccessActions[0]`.
    pub fn walk(&self, mut visit: impl FnMut(&str, &Action)) {
        walk_actions(&self.actions, "actions", &mut visit);
    }
}

fn count_actions(actions: &[Action]) -> usize {
    actions
        .iter()
        .map(|a| match a {
            Action::Branch(b) => 1 + count_actions(&b.on_true) + count_actions(&b.on_false),
            _ => 1,
        })
        .sum()
}

fn walk_actions(actions: &[Action], prefix: &str, visit: &mut impl FnMut(&str, &Action)) {
    for (i, action) in actions.iter().enumerate() {
        let path = format!("{prefix}[{i}]");
        visit(&path, action);
        if let Action::Branch(branch) = action {
            walk_actions(&branch.on_true, &format!("{path}.onSuccessActions"), visit);
            walk_actions(&branch.on_false, &format!("{path}.onFailureActions"), visit);
        }
    }
}

// =============================================================================
// TRIGGER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Trigger {
    #[serde(rename = "SCHEDULE")]
    Schedule(ScheduleTrigger),
    #[serde(rename = "PIECE_TRIGGER")]
    PieceEvent(PieceEventTrigger),
    #[serde(rename = "WEBHOOK")]
    Webhook(WebhookTrigger),
}

impl Trigger {
    pub fn display_name(&self) -> &str {
        match self {
            Trigger::Schedule(t) => &t.display_name,
            Trigger::PieceEvent(t) => &t.display_name,
            Trigger::Webhook(t) => &t.display_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTrigger {
    pub display_name: String,
    #[serde(default)]
    pub input: ScheduleInput,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl ScheduleTrigger {
    pub fn new(cron: impl Into<String>, timezone: Option<String>) -> Self {
        ScheduleTrigger {
            display_name: "Schedule".into(),
            input: ScheduleInput {
                cron_expression: Some(cron.into()),
                timezone,
            },
        }
    }

    /// The cron expression, if one was given and is not blank.
    pub fn cron(&self) -> Option<&str> {
        self.input
            .cron_expression
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceEventTrigger {
    pub display_name: String,
    #[serde(default, alias = "pieceId")]
    pub piece_name: String,
    #[serde(default, alias = "eventId")]
    pub trigger_name: String,
    #[serde(default)]
    pub input: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTrigger {
    pub display_name: String,
    #[serde(default)]
    pub input: Map<String, Value>,
}

// =============================================================================
// ACTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    #[serde(rename = "PIECE")]
    PieceCall(PieceCall),
    #[serde(rename = "CODE")]
    CodeBlock(CodeBlock),
    #[serde(rename = "BRANCH")]
    Branch(Branch),
}

impl Action {
    pub fn display_name(&self) -> &str {
        match self {
            Action::PieceCall(a) => &a.display_name,
            Action::CodeBlock(a) => &a.display_name,
            Action::Branch(a) => &a.display_name,
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            Action::PieceCall(_) => StepKind::Piece,
            Action::CodeBlock(_) => StepKind::Code,
            Action::Branch(_) => StepKind::Branch,
        }
    }
}

/// Call one operation of a catalog piece.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceCall {
    pub display_name: String,
    #[serde(default, alias = "pieceId")]
    pub piece_name: String,
    #[serde(default, alias = "operationId")]
    pub action_name: String,
    #[serde(default)]
    pub input: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    pub display_name: String,
    #[serde(default, alias = "sourceText", skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub input: Map<String, Value>,
}

impl CodeBlock {
    /// Source text from `code`, falling back to `input.code`. `None` when both are blank.
    pub fn source(&self) -> Option<&str> {
        self.code
            .as_deref()
            .or_else(|| self.input.get("code").and_then(Value::as_str))
            .filter(|s| !s.trim().is_empty())
    }
}

/// Conditional fork. Condition groups are passed through to the engine as-is
/// (outer list is OR, inner list is AND).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub display_name: String,
    #[serde(default)]
    pub conditions: Vec<Value>,
    #[serde(default, rename = "onSuccessActions", alias = "onTrue")]
    pub on_true: Vec<Action>,
    #[serde(default, rename = "onFailureActions", alias = "onFalse")]
    pub on_false: Vec<Action>,
}

// =============================================================================
// COMPILED OUTPUT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    Piece,
    Code,
    Branch,
}

/// Which side of a conditional a step hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchSlot {
    None,
    TrueBranch,
    FalseBranch,
}

/// One step materialized during a single compilation. Owned by that
/// compilation only; dropped once the engine owns the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStep {
    pub name: String,
    pub parent_name: String,
    pub branch_slot: BranchSlot,
    pub kind: StepKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStatus {
    Draft,
    Published,
}

/// Result of a successful materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledFlow {
    pub flow_id: String,
    pub url: String,
    /// Every appended step, branch children included.
    pub step_count: usize,
    pub status: FlowStatus,
}
