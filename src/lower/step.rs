//! Map one IR action to the engine step it materializes as.

use serde_json::{Value, json};

use crate::engine::{StepRequest, StepType};
use crate::ir::*;

/// Source emitted for a code step that has none.
pub const CODE_PLACEHOLDER: &str = "// Add your code here";

pub fn lower_step(name: &str, action: &Action) -> StepRequest {
    let (kind, settings) = match action {
        Action::PieceCall(call) => (StepType::Piece, piece_settings(call)),
        Action::CodeBlock(code) => (StepType::Code, code_settings(code)),
        Action::Branch(branch) => (
            StepType::Branch,
            json!({ "conditions": branch.conditions }),
        ),
    };

    StepRequest {
        name: name.to_string(),
        kind,
        display_name: action.display_name().to_string(),
        settings,
        valid: true,
    }
}

/// Unknown pieces are emitted unchanged; the engine decides.
fn piece_settings(call: &PieceCall) -> Value {
    json!({
        "actionName": call.action_name,
        "input": call.input,
        "inputUiInfo": {},
        "packageType": "REGISTRY",
        "pieceName": call.piece_name,
        "pieceType": "OFFICIAL",
        "pieceVersion": super::PIECE_VERSION,
        "propertySettings": {},
    })
}

fn code_settings(code: &CodeBlock) -> Value {
    let mut input = code.input.clone();
    input.insert(
        "code".into(),
        Value::from(code.source().unwrap_or(CODE_PLACEHOLDER)),
    );
    json!({
        "input": input,
        "inputUiInfo": {},
        "propertySettings": {},
    })
}
