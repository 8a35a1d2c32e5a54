//! Validation phase.
//!
//! Runs on a raw candidate (`serde_json::Value`) so malformed producer
//! output is reported as findings instead of a decode error. Order:
//! producer refusal, structural pass (short-circuits), typed decode,
//! semantic pass against the catalog.

pub mod cron;
pub mod semantic;
pub mod structural;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::Catalog;
use crate::error::{self, Finding, Issue};
use crate::ir::FlowDescriptor;
use crate::parse::Candidate;

/// Policy ceilings shared by the validator and the safety guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Top-level action count at which the validator starts warning.
    pub warn_actions: usize,
    /// Top-level action count above which the safety guard blocks.
    pub max_actions: usize,
    pub max_branch_depth: usize,
    pub min_interval_minutes: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            warn_actions: 20,
            max_actions: 30,
            max_branch_depth: 10,
            min_interval_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub findings: Vec<Finding>,
    /// The producer itself declared the request impossible.
    pub is_user_error: bool,
    /// The decoded flow, present only when nothing blocks.
    #[serde(skip)]
    pub flow: Option<FlowDescriptor>,
}

impl ValidationResult {
    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        error::blocking(&self.findings)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        error::advisory(&self.findings)
    }

    pub fn is_valid(&self) -> bool {
        self.flow.is_some()
    }

    fn rejected(findings: Vec<Finding>, is_user_error: bool) -> Self {
        ValidationResult {
            findings,
            is_user_error,
            flow: None,
        }
    }
}

/// Validate a candidate with the default [`Limits`].
pub fn validate(candidate: &Candidate, catalog: &Catalog) -> ValidationResult {
    validate_with(candidate, catalog, &Limits::default())
}

pub fn validate_with(candidate: &Candidate, catalog: &Catalog, limits: &Limits) -> ValidationResult {
    if let Some(reason) = producer_refusal(candidate) {
        return ValidationResult::rejected(
            vec![Finding::Blocking(Issue::semantic("V001", reason, None))],
            true,
        );
    }

    let structural = structural::validate_structural(candidate, limits.max_branch_depth);
    if !structural.is_empty() {
        return ValidationResult::rejected(
            structural.into_iter().map(Finding::Blocking).collect(),
            false,
        );
    }

    let flow = match decode(candidate) {
        Ok(flow) => flow,
        Err(e) => {
            return ValidationResult::rejected(
                vec![Finding::Blocking(Issue::schema(
                    "S012",
                    format!("Flow does not match the expected shape: {e}"),
                    None,
                ))],
                false,
            );
        }
    };

    let findings = validate_flow(&flow, catalog, limits);
    let blocked = findings.iter().any(Finding::is_blocking);
    ValidationResult {
        findings,
        is_user_error: false,
        flow: (!blocked).then_some(flow),
    }
}

/// Semantic pass over an already-decoded flow.
pub fn validate_flow(flow: &FlowDescriptor, catalog: &Catalog, limits: &Limits) -> Vec<Finding> {
    let mut findings = Vec::new();
    semantic::check_trigger(&flow.trigger, catalog, &mut findings);
    semantic::check_actions(flow, catalog, &mut findings);
    semantic::check_action_count(flow, limits, &mut findings);
    findings
}

/// Full check of a typed flow that never went through [`validate_with`],
/// e.g. one built or edited in code before deploy. Shape errors short-circuit
/// the semantic pass, as they do for raw candidates.
pub fn check_flow(flow: &FlowDescriptor, catalog: &Catalog, limits: &Limits) -> Vec<Finding> {
    let shape = structural::check_flow_shape(flow, limits.max_branch_depth);
    if !shape.is_empty() {
        return shape.into_iter().map(Finding::Blocking).collect();
    }
    validate_flow(flow, catalog, limits)
}

/// The producer's own `{"error": "..."}` answer.
fn producer_refusal(candidate: &Value) -> Option<String> {
    candidate
        .get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn decode(candidate: &Value) -> Result<FlowDescriptor, serde_json::Error> {
    let mut candidate = candidate.clone();
    if let Some(root) = candidate.as_object_mut() {
        strip_nulls(root);
        if let Some(trigger) = root.get_mut("trigger").and_then(Value::as_object_mut) {
            strip_nulls(trigger);
        }
        if let Some(actions) = root.get_mut("actions").and_then(Value::as_array_mut) {
            strip_action_nulls(actions);
        }
    }
    serde_json::from_value(candidate)
}

/// Producers emit `"input": null` and the like; treat those keys as absent.
fn strip_nulls(obj: &mut Map<String, Value>) {
    obj.retain(|_, v| !v.is_null());
}

fn strip_action_nulls(actions: &mut [Value]) {
    for action in actions {
        let Some(obj) = action.as_object_mut() else {
            continue;
        };
        strip_nulls(obj);
        for key in ["onSuccessActions", "onFailureActions", "onTrue", "onFalse"] {
            if let Some(children) = obj.get_mut(key).and_then(Value::as_array_mut) {
                strip_action_nulls(children);
            }
        }
    }
}
