//! Records carried between the session layer and the remote debugger.
//!
//! The bridge round-trips these without interpreting them; verification
//! and evaluation happen on the remote side.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub type BreakpointId = i64;
pub type FrameIndex = i64;

/// A breakpoint as the debugger reports it back after verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub id: BreakpointId,
    pub verified: bool,
    pub line: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub index: FrameIndex,
    pub name: String,
    pub file: PathBuf,
    pub line: i64,
}

/// A window of stack frames plus the total frame count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StackListing {
    #[serde(default)]
    pub frames: Vec<StackFrame>,
    #[serde(default)]
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub variables_reference: i64,
}
