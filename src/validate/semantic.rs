//! Semantic rules V002–V010 over a decoded flow.
//!
//! Only impossible-to-emit calls block. References the catalog does not
//! know are advisory: the catalog may be stale, and the compiler emits
//! such steps unchanged.

use crate::catalog::Catalog;
use crate::error::{Finding, Issue};
use crate::ir::*;

use super::{Limits, cron};

pub fn check_trigger(trigger: &Trigger, catalog: &Catalog, findings: &mut Vec<Finding>) {
    let at = || Some("trigger".to_string());

    match trigger {
        Trigger::Schedule(schedule) => {
            match schedule.cron() {
                None => findings.push(Finding::Blocking(Issue::semantic(
                    "V002",
                    "Schedule trigger requires input.cronExpression",
                    at(),
                ))),
                Some(expr) if !cron::is_plausible(expr) => {
                    findings.push(Finding::Advisory(Issue::semantic(
                        "V003",
                        format!("Cron expression '{expr}' does not look valid; the schedule may be wrong"),
                        at(),
                    )))
                }
                Some(_) => {}
            }
            if let Err(e) = catalog.validate_reference(SCHEDULE_PIECE, Some(SCHEDULE_TRIGGER)) {
                findings.push(Finding::Advisory(Issue::semantic(
                    "V005",
                    format!("Trigger will be ignored at build time: {e}"),
                    at(),
                )));
            }
        }
        Trigger::PieceEvent(event) => {
            if event.piece_name.trim().is_empty() || event.trigger_name.trim().is_empty() {
                findings.push(Finding::Blocking(Issue::semantic(
                    "V004",
                    "Piece trigger requires both pieceName and triggerName",
                    at(),
                )));
                return;
            }
            if let Err(e) = catalog.validate_reference(&event.piece_name, Some(&event.trigger_name)) {
                findings.push(Finding::Advisory(Issue::semantic(
                    "V005",
                    format!("Trigger will be ignored at build time: {e}"),
                    at(),
                )));
            }
        }
        Trigger::Webhook(_) => {}
    }
}

pub fn check_actions(flow: &FlowDescriptor, catalog: &Catalog, findings: &mut Vec<Finding>) {
    flow.walk(|path, action| {
        let at = || Some(path.to_string());
        match action {
            Action::PieceCall(call) => {
                if call.piece_name.trim().is_empty() || call.action_name.trim().is_empty() {
                    findings.push(Finding::Blocking(Issue::semantic(
                        "V006",
                        format!(
                            "Step '{}' requires both pieceName and actionName",
                            call.display_name
                        ),
                        at(),
                    )));
                } else if let Err(e) =
                    catalog.validate_reference(&call.piece_name, Some(&call.action_name))
                {
                    findings.push(Finding::Advisory(Issue::semantic(
                        "V007",
                        format!("Step '{}' will be ignored at build time: {e}", call.display_name),
                        at(),
                    )));
                }
            }
            Action::CodeBlock(code) => {
                if code.source().is_none() {
                    findings.push(Finding::Advisory(Issue::semantic(
                        "V009",
                        format!(
                            "Code step '{}' has no source and will compile to a placeholder",
                            code.display_name
                        ),
                        at(),
                    )));
                }
            }
            Action::Branch(branch) => {
                if branch.conditions.is_empty() {
                    findings.push(Finding::Blocking(Issue::semantic(
                        "V008",
                        format!("Branch '{}' requires at least one condition", branch.display_name),
                        at(),
                    )));
                }
            }
        }
    });
}

pub fn check_action_count(flow: &FlowDescriptor, limits: &Limits, findings: &mut Vec<Finding>) {
    let count = flow.actions.len();
    if count >= limits.warn_actions && count <= limits.max_actions {
        findings.push(Finding::Advisory(Issue::semantic(
            "V010",
            format!("Flow has {count} steps; consider splitting it into smaller flows"),
            None,
        )));
    }
}
