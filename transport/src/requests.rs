//! Commands the bridge sends to the remote debugger.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearBreakpoints {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetBreakpoint {
    pub path: String,
    pub line: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    pub start_frame: i64,
    pub end_frame: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluate {
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<i64>,
}

/// Execution-control actions, all fire-and-forget: the debugger reports
/// the outcome through a stop event rather than a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UiAction {
    Continue,
    ContinueReverse,
    StepOver,
    StepBack,
    StepIn,
    StepOut,
}

/// The body of an outbound command, one variant per wire `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    ClearBreakpoints(ClearBreakpoints),
    SetBreakpoint(SetBreakpoint),
    Stack(Stack),
    Variables(Option<Value>),
    UiAction(UiAction),
    Evaluate(Evaluate),
}

impl RequestBody {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestBody::ClearBreakpoints(_) => "clearBreakpoints",
            RequestBody::SetBreakpoint(_) => "setBreakpoint",
            RequestBody::Stack(_) => "stack",
            RequestBody::Variables(_) => "variables",
            RequestBody::UiAction(_) => "uiAction",
            RequestBody::Evaluate(_) => "evaluate",
        }
    }

    pub(crate) fn into_content(self) -> Option<Value> {
        match self {
            RequestBody::ClearBreakpoints(args) => Some(serde_json::to_value(args).unwrap()),
            RequestBody::SetBreakpoint(args) => Some(serde_json::to_value(args).unwrap()),
            RequestBody::Stack(args) => Some(serde_json::to_value(args).unwrap()),
            RequestBody::Variables(args) => args,
            RequestBody::UiAction(action) => Some(serde_json::json!({ "action": action })),
            RequestBody::Evaluate(args) => Some(serde_json::to_value(args).unwrap()),
        }
    }
}
