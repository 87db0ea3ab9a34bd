//! Tool call records consumed by the context assembler.
//!
//! Tool execution itself belongs to the surrounding application; the core
//! only receives the resulting records and budgets them into the context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Tool types the surrounding application may execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Calculator,
    WebSearch,
    Wikipedia,
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolKind::Calculator => write!(f, "calculator"),
            ToolKind::WebSearch => write!(f, "web_search"),
            ToolKind::Wikipedia => write!(f, "wikipedia"),
        }
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "calculator" => Ok(ToolKind::Calculator),
            "web_search" => Ok(ToolKind::WebSearch),
            "wikipedia" => Ok(ToolKind::Wikipedia),
            other => Err(format!("invalid tool kind: '{other}'")),
        }
    }
}

/// One tool invocation made while answering a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: Uuid,
    pub session_id: Uuid,
    pub kind: ToolKind,
    pub parameters: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub execution_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl ToolCall {
    pub fn new(
        session_id: Uuid,
        kind: ToolKind,
        parameters: serde_json::Value,
        result: Option<serde_json::Value>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            session_id,
            kind,
            parameters,
            result,
            execution_time_ms,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_kind_roundtrip() {
        for kind in [ToolKind::Calculator, ToolKind::WebSearch, ToolKind::Wikipedia] {
            let s = kind.to_string();
            let parsed: ToolKind = s.parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_tool_call_serialize() {
        let call = ToolCall {
            id: Uuid::now_v7(),
            session_id: Uuid::now_v7(),
            kind: ToolKind::Calculator,
            parameters: serde_json::json!({"expression": "2+2"}),
            result: Some(serde_json::json!(4)),
            execution_time_ms: 3,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&call).unwrap();
        assert!(json.contains("\"kind\":\"calculator\""));
        assert!(json.contains("\"expression\":\"2+2\""));
    }
}
