//! Findings and error taxonomy shared by every phase.
//!
//! Validation and safety checks never fail: they return [`Finding`]s.
//! Phases that touch external state (producer, engine, auth) return the
//! error types below.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Schema,
    Semantic,
    Safety,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Schema => write!(f, "Schema"),
            Phase::Semantic => write!(f, "Semantic"),
            Phase::Safety => write!(f, "Safety"),
        }
    }
}

/// One human-readable finding about a candidate flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub code: &'static str,
    pub phase: Phase,
    pub message: String,
    /// Path of the offending element, e.g. `trigger` or `actions[2].onSuccessActions[0]`.
    pub location: Option<String>,
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(at) => write!(
                f,
                "[{}:{}] {} (at {})",
                self.phase, self.code, self.message, at
            ),
            None => write!(f, "[{}:{}] {}", self.phase, self.code, self.message),
        }
    }
}

impl Issue {
    pub fn schema(code: &'static str, message: impl Into<String>, location: Option<String>) -> Self {
        Issue {
            code,
            phase: Phase::Schema,
            message: message.into(),
            location,
        }
    }

    pub fn semantic(
        code: &'static str,
        message: impl Into<String>,
        location: Option<String>,
    ) -> Self {
        Issue {
            code,
            phase: Phase::Semantic,
            message: message.into(),
            location,
        }
    }

    pub fn safety(code: &'static str, message: impl Into<String>) -> Self {
        Issue {
            code,
            phase: Phase::Safety,
            message: message.into(),
            location: None,
        }
    }
}

/// Severity is carried by the variant, so a blocking finding can never be
/// mistaken for an advisory one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "severity", content = "issue", rename_all = "lowercase")]
pub enum Finding {
    Blocking(Issue),
    Advisory(Issue),
}

impl Finding {
    pub fn issue(&self) -> &Issue {
        match self {
            Finding::Blocking(issue) | Finding::Advisory(issue) => issue,
        }
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self, Finding::Blocking(_))
    }

    pub fn code(&self) -> &'static str {
        self.issue().code
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.issue().fmt(f)
    }
}

pub(crate) fn blocking(findings: &[Finding]) -> impl Iterator<Item = &Issue> {
    findings.iter().filter_map(|f| match f {
        Finding::Blocking(issue) => Some(issue),
        Finding::Advisory(_) => None,
    })
}

pub(crate) fn advisory(findings: &[Finding]) -> impl Iterator<Item = &Issue> {
    findings.iter().filter_map(|f| match f {
        Finding::Advisory(issue) => Some(issue),
        Finding::Blocking(_) => None,
    })
}

fn join_issues(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Hard failures
// ---------------------------------------------------------------------------

/// Top-level failure of a generate / modify / deploy request.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Structurally or semantically malformed flow that survived the repair cycle.
    #[error("flow is malformed: {}", join_issues(.0))]
    Schema(Vec<Issue>),
    /// The IR producer declared the request impossible.
    #[error("request cannot be automated: {0}")]
    Refused(String),
    #[error("flow is not allowed: {}", join_issues(.0))]
    SafetyBlock(Vec<Issue>),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// The IR producer failed or returned text that is not a flow.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("IR producer call failed: {0}")]
    Call(String),
    #[error("IR producer returned no JSON object")]
    NoJson { raw: String },
    #[error("IR producer returned unparseable JSON: {reason}")]
    Parse { reason: String, raw: String },
}

/// Credential acquisition failed. Not retried automatically.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("engine credentials are not configured")]
    MissingCredentials,
    #[error("sign-in failed ({status}): {body}")]
    SignIn { status: u16, body: String },
    #[error("sign-in response has no token: {0}")]
    MalformedResponse(String),
    #[error("sign-in request failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Error)]
pub enum EngineFailure {
    #[error("engine returned HTTP {status}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode engine response: {0}")]
    Decode(String),
    #[error("timed out")]
    Timeout,
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// A remote-engine call failed. Carries the request path and raw response for diagnostics.
#[derive(Debug, Clone, Error)]
#[error("engine call {method} {path} failed: {failure}")]
pub struct EngineError {
    pub method: &'static str,
    pub path: String,
    #[source]
    pub failure: EngineFailure,
}

impl EngineError {
    pub fn new(method: &'static str, path: impl Into<String>, failure: EngineFailure) -> Self {
        EngineError {
            method,
            path: path.into(),
            failure,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match &self.failure {
            EngineFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response body, when the engine answered at all.
    pub fn body(&self) -> Option<&str> {
        match &self.failure {
            EngineFailure::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.failure, EngineFailure::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_display_includes_phase_code_and_location() {
        let issue = Issue::semantic("V008", "Branch needs conditions", Some("actions[1]".into()));
        assert_eq!(
            issue.to_string(),
            "[Semantic:V008] Branch needs conditions (at actions[1])"
        );
    }

    #[test]
    fn findings_filter_by_severity() {
        let findings = vec![
            Finding::Blocking(Issue::schema("S001", "a", None)),
            Finding::Advisory(Issue::semantic("V007", "b", None)),
            Finding::Blocking(Issue::schema("S002", "c", None)),
        ];
        assert_eq!(blocking(&findings).count(), 2);
        assert_eq!(advisory(&findings).map(|i| i.code).collect::<Vec<_>>(), vec!["V007"]);
    }

    #[test]
    fn engine_error_exposes_status_and_body() {
        let err = EngineError::new(
            "POST",
            "/api/v1/flows/abc",
            EngineFailure::Status {
                status: 409,
                body: "conflict".into(),
            },
        );
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.body(), Some("conflict"));
        assert!(err.to_string().contains("/api/v1/flows/abc"));
    }
}
