//! WASM entry points for browser use.
//!
//! Validation and safety checks need no engine, so the browser can run
//! them on producer output before anything is sent to the server.

use wasm_bindgen::prelude::*;

use crate::catalog::{Catalog, PieceDescriptor};
use crate::error::{Finding, Issue};
use crate::parse::parse_candidate;

/// Validate producer text. `catalog_json` is an optional piece listing
/// (bare array or `{ "data": [...] }`); the built-in catalog is used otherwise.
/// Returns a `CheckReport` object.
#[wasm_bindgen]
pub fn validate_candidate(text: &str, catalog_json: Option<String>) -> JsValue {
    let result = validate_candidate_inner(text, catalog_json.as_deref());
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn validate_candidate_inner(text: &str, catalog_json: Option<&str>) -> CheckReport {
    let catalog = match load_catalog(catalog_json) {
        Ok(c) => c,
        Err(report) => return report,
    };
    let candidate = match parse_candidate(text) {
        Ok(c) => c,
        Err(e) => return CheckReport::parse_error(e.to_string()),
    };

    let result = crate::validate::validate(&candidate, &catalog);
    CheckReport::from_findings(&result.findings, result.is_user_error)
}

/// Validate, then run the safety guard on the decoded flow.
/// Returns a `CheckReport` object with both sets of findings.
#[wasm_bindgen]
pub fn guard_candidate(text: &str) -> JsValue {
    let result = guard_candidate_inner(text);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn guard_candidate_inner(text: &str) -> CheckReport {
    let candidate = match parse_candidate(text) {
        Ok(c) => c,
        Err(e) => return CheckReport::parse_error(e.to_string()),
    };

    let result = crate::validate::validate(&candidate, &Catalog::fallback());
    let Some(flow) = &result.flow else {
        return CheckReport::from_findings(&result.findings, result.is_user_error);
    };

    let mut findings = result.findings.clone();
    findings.extend(crate::safety::guard(flow).findings);
    CheckReport::from_findings(&findings, false)
}

fn load_catalog(catalog_json: Option<&str>) -> Result<Catalog, CheckReport> {
    let Some(json) = catalog_json else {
        return Ok(Catalog::fallback());
    };
    let parsed = serde_json::from_str(json)
        .and_then(crate::engine::decode_listing::<PieceDescriptor>)
        .map_err(|e| CheckReport::parse_error(format!("Failed to parse catalog JSON: {e}")))?;
    Ok(if parsed.is_empty() {
        Catalog::fallback()
    } else {
        Catalog::live(parsed)
    })
}

// ---------------------------------------------------------------------------
// DTOs for serialization to JS
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Serialize)]
struct IssueDto {
    code: String,
    phase: String,
    message: String,
    location: Option<String>,
}

impl From<&Issue> for IssueDto {
    fn from(issue: &Issue) -> Self {
        IssueDto {
            code: issue.code.to_string(),
            phase: issue.phase.to_string(),
            message: issue.message.clone(),
            location: issue.location.clone(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReport {
    ok: bool,
    user_error: bool,
    errors: Vec<IssueDto>,
    warnings: Vec<IssueDto>,
}

impl CheckReport {
    fn from_findings(findings: &[Finding], user_error: bool) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) = findings.iter().partition(|f| f.is_blocking());
        CheckReport {
            ok: errors.is_empty(),
            user_error,
            errors: errors.into_iter().map(|f| IssueDto::from(f.issue())).collect(),
            warnings: warnings.into_iter().map(|f| IssueDto::from(f.issue())).collect(),
        }
    }

    fn parse_error(message: String) -> Self {
        CheckReport {
            ok: false,
            user_error: false,
            errors: vec![IssueDto {
                code: "P001".into(),
                phase: "Parse".into(),
                message,
                location: None,
            }],
            warnings: Vec::new(),
        }
    }
}
