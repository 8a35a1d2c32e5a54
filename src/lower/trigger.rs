//! Map an IR trigger to the engine's `UPDATE_TRIGGER` request.
//!
//! `Schedule` and `Webhook` are distinct IR variants; the engine only knows
//! piece triggers, so both become settings of their backing piece here.

use serde_json::{Map, Value, json};

use crate::engine::{StepRequest, StepType};
use crate::ir::*;

/// The trigger step is always named `trigger`.
pub const TRIGGER_STEP: &str = "trigger";

/// Used when a schedule reaches the compiler without a cron expression.
const DEFAULT_CRON: &str = "0 8 * * *";

pub fn lower_trigger(trigger: &Trigger, default_timezone: &str) -> StepRequest {
    let settings = match trigger {
        Trigger::Schedule(schedule) => {
            let mut input = Map::new();
            input.insert(
                "cronExpression".into(),
                Value::from(schedule.cron().unwrap_or(DEFAULT_CRON)),
            );
            input.insert(
                "timezone".into(),
                Value::from(
                    schedule
                        .input
                        .timezone
                        .as_deref()
                        .filter(|tz| !tz.trim().is_empty())
                        .unwrap_or(default_timezone),
                ),
            );
            piece_trigger_settings(SCHEDULE_PIECE, SCHEDULE_TRIGGER, input)
        }
        Trigger::Webhook(webhook) => {
            piece_trigger_settings(WEBHOOK_PIECE, WEBHOOK_TRIGGER, webhook.input.clone())
        }
        Trigger::PieceEvent(event) => piece_trigger_settings(
            &event.piece_name,
            &event.trigger_name,
            event.input.clone(),
        ),
    };

    StepRequest {
        name: TRIGGER_STEP.into(),
        kind: StepType::PieceTrigger,
        display_name: trigger.display_name().to_string(),
        settings,
        valid: true,
    }
}

fn piece_trigger_settings(piece: &str, trigger: &str, input: Map<String, Value>) -> Value {
    json!({
        "input": input,
        "inputUiInfo": {},
        "packageType": "REGISTRY",
        "pieceName": piece,
        "pieceType": "OFFICIAL",
        "pieceVersion": super::PIECE_VERSION,
        "propertySettings": {},
        "triggerName": trigger,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_becomes_schedule_piece_with_default_timezone() {
        let request = lower_trigger(
            &Trigger::Schedule(ScheduleTrigger::new("*/15 * * * *", None)),
            "Asia/Riyadh",
        );
        assert_eq!(request.name, "trigger");
        assert_eq!(request.kind, StepType::PieceTrigger);
        assert_eq!(request.settings["pieceName"], SCHEDULE_PIECE);
        assert_eq!(request.settings["triggerName"], SCHEDULE_TRIGGER);
        assert_eq!(request.settings["input"]["cronExpression"], "*/15 * * * *");
        assert_eq!(request.settings["input"]["timezone"], "Asia/Riyadh");
    }

    #[test]
    fn explicit_timezone_wins() {
        let request = lower_trigger(
            &Trigger::Schedule(ScheduleTrigger::new("0 9 * * 1", Some("Europe/Berlin".into()))),
            "Asia/Riyadh",
        );
        assert_eq!(request.settings["input"]["timezone"], "Europe/Berlin");
    }

    #[test]
    fn piece_event_passes_identifiers_through() {
        let request = lower_trigger(
            &Trigger::PieceEvent(PieceEventTrigger {
                display_name: "New mail".into(),
                piece_name: "@acme/piece-unknown".into(),
                trigger_name: "anything".into(),
                input: Map::new(),
            }),
            "UTC",
        );
        assert_eq!(request.display_name, "New mail");
        assert_eq!(request.settings["pieceName"], "@acme/piece-unknown");
        assert_eq!(request.settings["triggerName"], "anything");
    }

    #[test]
    fn webhook_uses_catch_request() {
        let request = lower_trigger(&Trigger::Webhook(WebhookTrigger::default()), "UTC");
        assert_eq!(request.settings["pieceName"], WEBHOOK_PIECE);
        assert_eq!(request.settings["triggerName"], WEBHOOK_TRIGGER);
    }
}
