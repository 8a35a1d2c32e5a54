//! Integration tests for the safety guard (G0xx).

#[allow(dead_code)]
mod helpers;

use autoflow::catalog::Catalog;
use autoflow::safety::{guard, guard_with};
use autoflow::validate::{Limits, validate};

use helpers::*;

fn block_codes(flow: &autoflow::ir::FlowDescriptor) -> Vec<&'static str> {
    guard(flow).blocks().map(|i| i.code).collect()
}

fn warning_codes(flow: &autoflow::ir::FlowDescriptor) -> Vec<&'static str> {
    guard(flow).warnings().map(|i| i.code).collect()
}

#[test]
fn every_three_minutes_is_blocked() {
    let flow = schedule_flow("*/3 * * * *", vec![code("a")]);
    assert_eq!(block_codes(&flow), vec!["G001"]);
}

#[test]
fn zero_minute_step_is_blocked() {
    let flow = schedule_flow("*/0 * * * *", vec![code("a")]);
    assert_eq!(block_codes(&flow), vec!["G001"]);
    assert!(warning_codes(&flow).is_empty());
}

#[test]
fn every_ten_minutes_is_allowed() {
    let flow = schedule_flow("*/10 * * * *", vec![code("a")]);
    let result = guard(&flow);
    assert!(!result.is_blocked());
    assert!(result.findings.is_empty());
}

#[test]
fn every_minute_warns_without_blocking() {
    let flow = schedule_flow("* * * * *", vec![code("a")]);
    assert!(block_codes(&flow).is_empty());
    assert_eq!(warning_codes(&flow), vec!["G002"]);
}

#[test]
fn interval_floor_is_configurable() {
    let flow = schedule_flow("*/10 * * * *", vec![code("a")]);
    let strict = Limits {
        min_interval_minutes: 15,
        ..Limits::default()
    };
    assert!(guard_with(&flow, &strict).is_blocked());
}

#[test]
fn webhook_calling_http_piece_warns() {
    let flow = webhook_flow(vec![piece(
        "Forward",
        "@activepieces/piece-http",
        "send-request",
    )]);
    assert_eq!(warning_codes(&flow), vec!["G004"]);
    assert!(block_codes(&flow).is_empty());
}

#[test]
fn schedule_calling_http_piece_does_not_warn() {
    let flow = schedule_flow(
        "0 8 * * *",
        vec![piece("Forward", "@activepieces/piece-http", "send-request")],
    );
    assert!(guard(&flow).findings.is_empty());
}

#[test]
fn thirty_one_actions_block_regardless_of_validity() {
    let flow = webhook_flow((0..31).map(|i| code(&format!("s{i}"))).collect());
    assert_eq!(block_codes(&flow), vec!["G005"]);
}

#[test]
fn twenty_actions_warn_in_validator_but_pass_guard() {
    let candidate = candidate_with_code_steps(20);
    let validation = validate(&candidate, &Catalog::fallback());
    assert_eq!(
        validation.warnings().map(|i| i.code).collect::<Vec<_>>(),
        vec!["V010"]
    );

    let flow = validation.flow.unwrap();
    assert!(!guard(&flow).is_blocked());
}
