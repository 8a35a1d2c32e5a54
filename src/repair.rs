//! Producer round-trip with one bounded repair.
//!
//! ```text
//! Draft ──▶ Validating ──▶ Accepted
//!               │    └───▶ Rejected   (producer refusal, or second failure)
//!               ▼
//!           Repairing ──▶ Validating (final pass)
//! ```
//!
//! The producer is called at most twice per request.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{COMPACT_LIMIT, Catalog};
use crate::error::{Issue, ProviderError};
use crate::ir::FlowDescriptor;
use crate::parse::{Candidate, parse_candidate};
use crate::validate::{Limits, ValidationResult, validate_with};

const GENERATE_TEMPERATURE: f32 = 0.1;
const REPAIR_TEMPERATURE: f32 = 0.0;

pub const SYSTEM_PROMPT: &str = r#"You are a workflow architect. Turn the user's request into one JSON automation flow.

Rules:
1. A flow has exactly one trigger and an ordered array of actions.
2. Only use pieces listed in PIECES_CATALOG.
3. Times, schedules, "every day" -> trigger type "SCHEDULE" with input.cronExpression and input.timezone.
4. "When X arrives" -> trigger type "PIECE_TRIGGER" (pieceName + triggerName) or "WEBHOOK".
5. Conditions ("if", "when") -> action type "BRANCH" with conditions, onSuccessActions and onFailureActions.
6. Custom logic -> action type "CODE" with a JavaScript "code" string.
7. Reference data between steps as {{trigger.field}} or {{step_1.field}}.
8. Reply with JSON only: no markdown, no backticks, no prose.

Schedules: every day "0 8 * * *", every hour "0 * * * *", every Monday "0 8 * * 1".

Shape:
{
  "displayName": "Clear name",
  "trigger": { "type": "SCHEDULE | PIECE_TRIGGER | WEBHOOK", "pieceName": "@activepieces/piece-xxx", "triggerName": "trigger-name", "displayName": "...", "input": {} },
  "actions": [
    { "type": "PIECE", "pieceName": "@activepieces/piece-xxx", "actionName": "action-name", "displayName": "...", "input": {} }
  ],
  "connections_needed": [],
  "explanation": "Two short lines"
}

If the request cannot be automated, reply {"error": "reason"}."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProducerRequest {
    pub system_prompt: String,
    pub context: Vec<ChatMessage>,
    pub user_message: String,
    pub temperature: f32,
}

/// External generator of candidate IR text.
#[async_trait]
pub trait ProducerClient: Send + Sync {
    async fn generate(&self, request: ProducerRequest) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepairOutcome {
    Accepted {
        flow: FlowDescriptor,
        warnings: Vec<Issue>,
        /// The accepted flow came from the repair call.
        repaired: bool,
    },
    Rejected {
        errors: Vec<Issue>,
        /// The producer refused the request itself.
        user_error: bool,
        /// Producer calls made, 1 or 2.
        attempts: u8,
    },
}

/// Loop states. `attempt` counts producer calls so far.
#[derive(Debug)]
enum RepairState {
    Draft,
    Validating { candidate: Candidate, attempt: u8 },
    Repairing { candidate: Candidate, errors: Vec<Issue> },
    Done(RepairOutcome),
}

pub struct RepairLoop {
    producer: Arc<dyn ProducerClient>,
    limits: Limits,
    compact_limit: usize,
}

impl RepairLoop {
    pub fn new(producer: Arc<dyn ProducerClient>) -> Self {
        RepairLoop {
            producer,
            limits: Limits::default(),
            compact_limit: COMPACT_LIMIT,
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_compact_limit(mut self, compact_limit: usize) -> Self {
        self.compact_limit = compact_limit;
        self
    }

    /// Generate a flow for `request`, repairing it at most once.
    pub async fn run(
        &self,
        request: &str,
        context: &[ChatMessage],
        catalog: &Catalog,
    ) -> Result<RepairOutcome, ProviderError> {
        let mut state = RepairState::Draft;
        loop {
            state = match state {
                RepairState::Draft => {
                    let raw = self
                        .producer
                        .generate(ProducerRequest {
                            system_prompt: self.system_prompt(catalog),
                            context: context.to_vec(),
                            user_message: request.to_string(),
                            temperature: GENERATE_TEMPERATURE,
                        })
                        .await?;
                    RepairState::Validating {
                        candidate: parse_candidate(&raw)?,
                        attempt: 1,
                    }
                }
                RepairState::Validating { candidate, attempt } => {
                    let result = validate_with(&candidate, catalog, &self.limits);
                    self.after_validation(candidate, result, attempt)
                }
                RepairState::Repairing { candidate, errors } => {
                    info!(errors = errors.len(), "repairing candidate flow");
                    let raw = self
                        .producer
                        .generate(ProducerRequest {
                            system_prompt: self.system_prompt(catalog),
                            context: Vec::new(),
                            user_message: repair_message(request, &candidate, &errors),
                            temperature: REPAIR_TEMPERATURE,
                        })
                        .await?;
                    RepairState::Validating {
                        candidate: parse_candidate(&raw)?,
                        attempt: 2,
                    }
                }
                RepairState::Done(outcome) => return Ok(outcome),
            };
        }
    }

    fn after_validation(
        &self,
        candidate: Candidate,
        result: ValidationResult,
        attempt: u8,
    ) -> RepairState {
        let warnings: Vec<Issue> = result.warnings().cloned().collect();
        let errors: Vec<Issue> = result.errors().cloned().collect();

        if let Some(flow) = result.flow {
            debug!(attempt, warnings = warnings.len(), "candidate accepted");
            return RepairState::Done(RepairOutcome::Accepted {
                flow,
                warnings,
                repaired: attempt > 1,
            });
        }

        if result.is_user_error || attempt > 1 {
            warn!(attempt, user_error = result.is_user_error, "candidate rejected");
            return RepairState::Done(RepairOutcome::Rejected {
                errors,
                user_error: result.is_user_error,
                attempts: attempt,
            });
        }

        RepairState::Repairing { candidate, errors }
    }

    fn system_prompt(&self, catalog: &Catalog) -> String {
        let compact = catalog.list_compact(self.compact_limit);
        let listing = serde_json::to_string_pretty(&compact).unwrap_or_else(|_| "[]".into());
        format!(
            "{SYSTEM_PROMPT}\n\n## PIECES_CATALOG ({} total, showing {}):\n{listing}",
            catalog.snapshot().len(),
            compact.len()
        )
    }
}

/// The repair request: numbered errors, the previous candidate, and the original request.
fn repair_message(request: &str, candidate: &Candidate, errors: &[Issue]) -> String {
    let numbered = errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{}. {e}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    let previous = serde_json::to_string_pretty(candidate).unwrap_or_else(|_| candidate.to_string());
    format!(
        "Fix the following errors and reply with corrected JSON only.\n\nErrors:\n{numbered}\n\nPrevious JSON:\n{previous}\n\nRequest: {request}"
    )
}
