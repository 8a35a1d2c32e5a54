//! Lightweight cron-shape helpers. Not a cron parser: only what the
//! validator and the safety guard need.

/// 5 fields (`min hour dom mon dow`) or 6 (`sec min hour dom mon dow`).
pub fn is_plausible(expr: &str) -> bool {
    (5..=6).contains(&fields(expr).len())
}

fn fields(expr: &str) -> Vec<&str> {
    expr.split_whitespace().collect()
}

/// The minutes field, when the expression has a plausible shape.
pub fn minute_field(expr: &str) -> Option<&str> {
    let fields = fields(expr);
    match fields.len() {
        5 => Some(fields[0]),
        6 => Some(fields[1]),
        _ => None,
    }
}

/// The seconds field of a 6-field expression.
pub fn seconds_field(expr: &str) -> Option<&str> {
    let fields = fields(expr);
    (fields.len() == 6).then(|| fields[0])
}

/// `N` from a `*/N` minutes field.
pub fn minute_step(expr: &str) -> Option<u32> {
    minute_field(expr)?.strip_prefix("*/")?.parse().ok()
}

/// True when the expression fires on every minute (`*` or `*/1` minutes).
pub fn fires_every_minute(expr: &str) -> bool {
    matches!(minute_field(expr), Some("*") | Some("*/1"))
}

/// True when a 6-field expression fires more than once within a minute.
pub fn fires_sub_minute(expr: &str) -> bool {
    seconds_field(expr).is_some_and(|s| s == "*" || s.starts_with("*/"))
}
