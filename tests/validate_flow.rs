//! Integration tests for candidate validation (S0xx structural, V0xx semantic).

#[allow(dead_code)]
mod helpers;

use autoflow::catalog::Catalog;
use autoflow::ir::{Action, Trigger};
use autoflow::parse::parse_candidate;
use autoflow::validate::{Limits, validate, validate_with};
use serde_json::json;

use helpers::candidate_with_code_steps;

fn codes<'a>(issues: impl Iterator<Item = &'a autoflow::error::Issue>) -> Vec<&'static str> {
    issues.map(|i| i.code).collect()
}

#[test]
fn example_flow_is_valid() {
    let candidate = parse_candidate(include_str!("fixtures/daily_report.json")).unwrap();
    let result = validate(&candidate, &Catalog::fallback());
    assert!(result.is_valid(), "unexpected findings: {:?}", result.findings);
    assert!(result.findings.is_empty());

    let flow = result.flow.unwrap();
    assert_eq!(flow.total_actions(), 6);
    assert!(matches!(flow.trigger, Trigger::Schedule(_)));
    assert_eq!(flow.connections_needed.len(), 2);
}

#[test]
fn empty_branch_conditions_give_one_error_at_branch_index() {
    let candidate = parse_candidate(include_str!("fixtures/empty_branch_conditions.json")).unwrap();
    let result = validate(&candidate, &Catalog::fallback());

    let errors: Vec<_> = result.errors().collect();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert_eq!(errors[0].code, "V008");
    assert_eq!(errors[0].location.as_deref(), Some("actions[1]"));
    assert!(result.flow.is_none());
    assert!(!result.is_user_error);
}

#[test]
fn unknown_pieces_are_warnings_not_errors() {
    let candidate = parse_candidate(include_str!("fixtures/unknown_piece.json")).unwrap();
    let result = validate(&candidate, &Catalog::fallback());

    assert!(result.is_valid());
    assert_eq!(codes(result.warnings()), vec!["V005", "V007"]);
    assert!(result.warnings().all(|w| w.message.contains("ignored at build time")));
}

#[test]
fn unknown_operation_warning_lists_alternatives() {
    let candidate = json!({
        "displayName": "x",
        "trigger": { "type": "WEBHOOK", "displayName": "t" },
        "actions": [{ "type": "PIECE", "displayName": "a", "pieceName": "@activepieces/piece-slack", "actionName": "send-fax" }]
    });
    let result = validate(&candidate, &Catalog::fallback());
    let warning = result.warnings().next().unwrap();
    assert_eq!(warning.code, "V007");
    assert!(warning.message.contains("send-channel-message"), "{}", warning.message);
}

#[test]
fn twenty_actions_warn() {
    let result = validate(&candidate_with_code_steps(20), &Catalog::fallback());
    assert!(result.is_valid());
    assert_eq!(codes(result.warnings()), vec!["V010"]);
}

#[test]
fn nineteen_actions_do_not_warn() {
    let result = validate(&candidate_with_code_steps(19), &Catalog::fallback());
    assert_eq!(result.warnings().count(), 0);
}

#[test]
fn producer_refusal_is_user_error() {
    let candidate = parse_candidate(r#"{"error": "Sending faxes is not supported"}"#).unwrap();
    let result = validate(&candidate, &Catalog::fallback());
    assert!(result.is_user_error);
    assert_eq!(codes(result.errors()), vec!["V001"]);
}

#[test]
fn structural_failure_hides_semantic_findings() {
    let candidate = json!({
        "trigger": { "type": "SCHEDULE", "displayName": "t" },
        "actions": [{ "type": "BRANCH", "displayName": "b", "conditions": [] }]
    });
    let result = validate(&candidate, &Catalog::fallback());
    assert_eq!(codes(result.errors()), vec!["S002"]);
    assert_eq!(result.warnings().count(), 0);
}

#[test]
fn missing_piece_identifiers_block() {
    let candidate = json!({
        "displayName": "x",
        "trigger": { "type": "PIECE_TRIGGER", "displayName": "t", "pieceName": "@activepieces/piece-gmail" },
        "actions": [{ "type": "PIECE", "displayName": "a", "actionName": "send-email" }]
    });
    let result = validate(&candidate, &Catalog::fallback());
    assert_eq!(codes(result.errors()), vec!["V004", "V006"]);
}

#[test]
fn code_without_source_is_advisory() {
    let candidate = json!({
        "displayName": "x",
        "trigger": { "type": "WEBHOOK", "displayName": "t" },
        "actions": [{ "type": "CODE", "displayName": "Empty", "code": "   " }]
    });
    let result = validate(&candidate, &Catalog::fallback());
    assert!(result.is_valid());
    assert_eq!(codes(result.warnings()), vec!["V009"]);
    let flow = result.flow.unwrap();
    assert!(matches!(&flow.actions[0], Action::CodeBlock(c) if c.source().is_none()));
}

#[test]
fn depth_limit_comes_from_limits() {
    let candidate = json!({
        "displayName": "x",
        "trigger": { "type": "WEBHOOK", "displayName": "t" },
        "actions": [{
            "type": "BRANCH", "displayName": "outer", "conditions": [[]],
            "onSuccessActions": [{
                "type": "BRANCH", "displayName": "inner", "conditions": [[]],
                "onFailureActions": [{ "type": "CODE", "displayName": "leaf", "code": "1" }]
            }]
        }]
    });
    let shallow = Limits {
        max_branch_depth: 1,
        ..Limits::default()
    };
    let result = validate_with(&candidate, &Catalog::fallback(), &shallow);
    assert_eq!(codes(result.errors()), vec!["S010"]);
    assert_eq!(
        result.errors().next().unwrap().location.as_deref(),
        Some("actions[0].onSuccessActions[0]")
    );

    assert!(validate(&candidate, &Catalog::fallback()).is_valid());
}
