//! Structural (schema) rules S001–S011, run on the raw candidate before it
//! is decoded into typed IR. Any finding here short-circuits validation.

use serde_json::{Map, Value};

use crate::error::Issue;
use crate::ir::{Action, FlowDescriptor};

const TRIGGER_TYPES: [&str; 3] = ["SCHEDULE", "PIECE_TRIGGER", "WEBHOOK"];
const ACTION_TYPES: [&str; 3] = ["PIECE", "CODE", "BRANCH"];

/// Keys that may hold a child action list on a `BRANCH`.
const BRANCH_ARMS: [(&str, &str); 2] = [("onSuccessActions", "onTrue"), ("onFailureActions", "onFalse")];

/// Run all structural rules. Returns all issues found.
pub fn validate_structural(candidate: &Value, max_branch_depth: usize) -> Vec<Issue> {
    let mut errors = Vec::new();

    let Some(root) = candidate.as_object() else {
        errors.push(Issue::schema("S001", "Flow must be a JSON object", None));
        return errors;
    };

    s002_display_name(root, &mut errors);
    s003_trigger(root, &mut errors);
    s006_actions(root, max_branch_depth, &mut errors);

    errors
}

fn non_empty_str(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

fn s002_display_name(root: &Map<String, Value>, errors: &mut Vec<Issue>) {
    if !non_empty_str(root.get("displayName")) {
        errors.push(Issue::schema(
            "S002",
            "displayName is required and must be a non-empty string",
            None,
        ));
    }
}

fn s003_trigger(root: &Map<String, Value>, errors: &mut Vec<Issue>) {
    let at = || Some("trigger".to_string());

    let Some(trigger) = root.get("trigger").and_then(Value::as_object) else {
        errors.push(Issue::schema("S003", "trigger is required and must be an object", at()));
        return;
    };

    let kind = trigger.get("type").and_then(Value::as_str);
    if !kind.is_some_and(|k| TRIGGER_TYPES.contains(&k)) {
        errors.push(Issue::schema(
            "S004",
            format!("trigger.type must be one of: {}", TRIGGER_TYPES.join(", ")),
            at(),
        ));
    }

    if !trigger.get("displayName").is_some_and(Value::is_string) {
        errors.push(Issue::schema("S005", "trigger.displayName is required", at()));
    }

    s011_field_shapes(trigger, "trigger", errors);
    if let Some(input) = trigger.get("input").and_then(Value::as_object) {
        for key in ["cronExpression", "timezone"] {
            if input.get(key).is_some_and(|v| !v.is_string() && !v.is_null()) {
                errors.push(Issue::schema(
                    "S011",
                    format!("trigger.input.{key} must be a string"),
                    at(),
                ));
            }
        }
    }
}

fn s006_actions(root: &Map<String, Value>, max_branch_depth: usize, errors: &mut Vec<Issue>) {
    match root.get("actions").and_then(Value::as_array) {
        Some(actions) if !actions.is_empty() => {
            validate_action_list(actions, "actions", 0, max_branch_depth, errors);
        }
        _ => errors.push(Issue::schema(
            "S006",
            "actions is required and must be a non-empty array",
            None,
        )),
    }
}

fn validate_action_list(
    actions: &[Value],
    prefix: &str,
    depth: usize,
    max_branch_depth: usize,
    errors: &mut Vec<Issue>,
) {
    for (i, action) in actions.iter().enumerate() {
        let path = format!("{prefix}[{i}]");
        let at = || Some(path.clone());

        let Some(obj) = action.as_object() else {
            errors.push(Issue::schema("S007", "Action must be an object", at()));
            continue;
        };

        let kind = obj.get("type").and_then(Value::as_str);
        if !kind.is_some_and(|k| ACTION_TYPES.contains(&k)) {
            errors.push(Issue::schema(
                "S008",
                format!("Action type must be one of: {}", ACTION_TYPES.join(", ")),
                at(),
            ));
        }

        if !obj.get("displayName").is_some_and(Value::is_string) {
            errors.push(Issue::schema("S009", "Action displayName is required", at()));
        }

        s011_field_shapes(obj, &path, errors);

        if kind != Some("BRANCH") {
            continue;
        }

        let arms: Vec<(&str, &[Value])> = BRANCH_ARMS
            .iter()
            .filter_map(|(key, alias)| {
                let (name, value) = obj
                    .get(*key)
                    .map(|v| (*key, v))
                    .or_else(|| obj.get(*alias).map(|v| (*key, v)))?;
                match value {
                    Value::Array(children) => Some((name, children.as_slice())),
                    Value::Null => None,
                    _ => {
                        errors.push(Issue::schema(
                            "S011",
                            format!("{name} must be an array of actions"),
                            at(),
                        ));
                        None
                    }
                }
            })
            .collect();

        let has_children = arms.iter().any(|(_, children)| !children.is_empty());
        if has_children && depth + 1 > max_branch_depth {
            errors.push(Issue::schema(
                "S010",
                format!("Branches are nested deeper than {max_branch_depth} levels"),
                at(),
            ));
            continue;
        }

        for (name, children) in arms {
            validate_action_list(
                children,
                &format!("{path}.{name}"),
                depth + 1,
                max_branch_depth,
                errors,
            );
        }
    }
}

// =============================================================================
// Typed flows
// =============================================================================

/// The subset of the structural rules a typed flow can still break:
/// blank name (S002), no actions (S006) and branch depth (S010).
pub fn check_flow_shape(flow: &FlowDescriptor, max_branch_depth: usize) -> Vec<Issue> {
    let mut errors = Vec::new();
    if flow.display_name.trim().is_empty() {
        errors.push(Issue::schema(
            "S002",
            "displayName is required and must be a non-empty string",
            None,
        ));
    }
    if flow.actions.is_empty() {
        errors.push(Issue::schema(
            "S006",
            "actions is required and must be a non-empty array",
            None,
        ));
    }
    check_depth(&flow.actions, "actions", 0, max_branch_depth, &mut errors);
    errors
}

fn check_depth(
    actions: &[Action],
    prefix: &str,
    depth: usize,
    max_branch_depth: usize,
    errors: &mut Vec<Issue>,
) {
    for (i, action) in actions.iter().enumerate() {
        let Action::Branch(branch) = action else {
            continue;
        };
        let path = format!("{prefix}[{i}]");
        let has_children = !branch.on_true.is_empty() || !branch.on_false.is_empty();
        if has_children && depth + 1 > max_branch_depth {
            errors.push(Issue::schema(
                "S010",
                format!("Branches are nested deeper than {max_branch_depth} levels"),
                Some(path),
            ));
            continue;
        }
        for (name, children) in [
            ("onSuccessActions", &branch.on_true),
            ("onFailureActions", &branch.on_false),
        ] {
            check_depth(
                children,
                &format!("{path}.{name}"),
                depth + 1,
                max_branch_depth,
                errors,
            );
        }
    }
}

/// Optional fields must have the shape the typed IR expects, so decoding cannot fail later.
fn s011_field_shapes(obj: &Map<String, Value>, path: &str, errors: &mut Vec<Issue>) {
    let expect = |key: &str, ok: fn(&Value) -> bool, what: &str, errors: &mut Vec<Issue>| {
        if obj.get(key).is_some_and(|v| !v.is_null() && !ok(v)) {
            errors.push(Issue::schema(
                "S011",
                format!("{key} must be {what}"),
                Some(path.to_string()),
            ));
        }
    };

    expect("input", Value::is_object, "an object", errors);
    expect("conditions", Value::is_array, "an array", errors);
    for key in [
        "pieceName",
        "pieceId",
        "triggerName",
        "eventId",
        "actionName",
        "operationId",
        "code",
        "sourceText",
    ] {
        expect(key, Value::is_string, "a string", errors);
    }
}
