//! Parse phase: producer text → raw candidate JSON.
//!
//! The producer is asked for bare JSON but often wraps it in prose or code
//! fences. We take the outermost `{ ... }` span, parse it, and on failure
//! retry once with trailing commas removed. Anything else is a
//! [`ProviderError`].

use serde_json::Value;
use tracing::debug;

use crate::error::ProviderError;

/// Raw, not yet validated candidate IR.
pub type Candidate = Value;

/// Extract and parse the JSON object embedded in `raw`.
pub fn parse_candidate(raw: &str) -> Result<Candidate, ProviderError> {
    let Some(span) = object_span(raw) else {
        return Err(ProviderError::NoJson {
            raw: raw.to_string(),
        });
    };

    match serde_json::from_str::<Value>(span) {
        Ok(value) => Ok(value),
        Err(first) => {
            let repaired = strip_trailing_commas(span);
            serde_json::from_str::<Value>(&repaired)
                .inspect(|_| debug!("candidate parsed after removing trailing commas"))
                .map_err(|_| ProviderError::Parse {
                    reason: first.to_string(),
                    raw: raw.to_string(),
                })
        }
    }
}

/// Span from the first `{` to the last `}`.
fn object_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Drop commas that directly precede `}` or `]` (ignoring whitespace),
/// leaving string literals untouched.
fn strip_trailing_commas(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }

    out
}
