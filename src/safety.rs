//! Policy checks applied after validation. Catalog-independent.

use serde::Serialize;

use crate::error::{self, Finding, Issue};
use crate::ir::{Action, FlowDescriptor, Trigger};
use crate::validate::{Limits, cron};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyResult {
    pub findings: Vec<Finding>,
}

impl SafetyResult {
    pub fn blocks(&self) -> impl Iterator<Item = &Issue> {
        error::blocking(&self.findings)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        error::advisory(&self.findings)
    }

    pub fn is_blocked(&self) -> bool {
        self.findings.iter().any(Finding::is_blocking)
    }
}

pub fn guard(flow: &FlowDescriptor) -> SafetyResult {
    guard_with(flow, &Limits::default())
}

pub fn guard_with(flow: &FlowDescriptor, limits: &Limits) -> SafetyResult {
    let mut findings = Vec::new();

    match &flow.trigger {
        Trigger::Schedule(schedule) => {
            if let Some(expr) = schedule.cron() {
                check_schedule(expr, limits, &mut findings);
            }
        }
        Trigger::Webhook(_) => {
            if calls_http_or_webhook(&flow.actions) {
                findings.push(Finding::Advisory(Issue::safety(
                    "G004",
                    "Webhook trigger with an HTTP or webhook step may call itself in a loop",
                )));
            }
        }
        Trigger::PieceEvent(_) => {}
    }

    let count = flow.actions.len();
    if count > limits.max_actions {
        findings.push(Finding::Blocking(Issue::safety(
            "G005",
            format!(
                "Flow has {count} steps; the maximum is {}",
                limits.max_actions
            ),
        )));
    }

    SafetyResult { findings }
}

fn check_schedule(expr: &str, limits: &Limits, findings: &mut Vec<Finding>) {
    // `*/1` is every minute and reported by G002 below; `*/0` blocks.
    if let Some(step) = cron::minute_step(expr)
        && step != 1
        && step < limits.min_interval_minutes
    {
        findings.push(Finding::Blocking(Issue::safety(
            "G001",
            format!(
                "Schedule runs every {step} minutes; the minimum interval is {} minutes",
                limits.min_interval_minutes
            ),
        )));
    }

    if cron::fires_every_minute(expr) {
        findings.push(Finding::Advisory(Issue::safety(
            "G002",
            "Schedule runs every minute; this may use a lot of executions",
        )));
    }

    if cron::fires_sub_minute(expr) {
        findings.push(Finding::Advisory(Issue::safety(
            "G003",
            "Schedule runs more than once per minute",
        )));
    }
}

/// Substring heuristic on piece names, including branch children.
fn calls_http_or_webhook(actions: &[Action]) -> bool {
    actions.iter().any(|action| match action {
        Action::PieceCall(call) => {
            let name = call.piece_name.to_lowercase();
            name.contains("http") || name.contains("webhook")
        }
        Action::Branch(branch) => {
            calls_http_or_webhook(&branch.on_true) || calls_http_or_webhook(&branch.on_false)
        }
        Action::CodeBlock(_) => false,
    })
}
