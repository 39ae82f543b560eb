//! The "MCP bridge": the four decision/control operations exposed to agents
//! as named tools.
//!
//! This is deliberately *not* a subprocess MCP server — the teacher's real
//! `mcp/` client/transport stack talked to an external process over stdio.
//! Here the bridge is just a local message bus: named tools with
//! `schemars`-generated schemas (mirroring the teacher's `Tool` trait
//! convention) that the orchestrator recognizes by name in the normalized
//! message stream and converts directly into [`DriverCommand`] /
//! [`NavigatorCommand`] values, instead of executing anything.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{DriverCommand, NavigatorCommand, ToolUseItem};

pub const DRIVER_REQUEST_REVIEW: &str = "driver.requestReview";
pub const DRIVER_REQUEST_GUIDANCE: &str = "driver.requestGuidance";
pub const NAVIGATOR_APPROVE: &str = "navigator.approve";
pub const NAVIGATOR_DENY: &str = "navigator.deny";
pub const NAVIGATOR_CODE_REVIEW: &str = "navigator.codeReview";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RequestReviewInput {
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RequestGuidanceInput {
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApproveInput {
    pub request_id: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DenyInput {
    pub request_id: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CodeReviewInput {
    pub pass: bool,
    pub comment: Option<String>,
}

/// A named tool the bridge registers with a provider session, including its
/// JSON schema for the model's tool-use payload.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

fn schema_for<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

/// The two control tools surfaced to the Driver's provider.
pub fn driver_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: DRIVER_REQUEST_REVIEW,
            description: "Signal that the implementation is ready for review.",
            input_schema: schema_for::<RequestReviewInput>(),
        },
        ToolDefinition {
            name: DRIVER_REQUEST_GUIDANCE,
            description: "Ask the navigator for a hint without requesting a full review.",
            input_schema: schema_for::<RequestGuidanceInput>(),
        },
    ]
}

/// The three decision tools surfaced to the Navigator's provider.
pub fn navigator_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: NAVIGATOR_APPROVE,
            description: "Grant a pending file-modification permission request.",
            input_schema: schema_for::<ApproveInput>(),
        },
        ToolDefinition {
            name: NAVIGATOR_DENY,
            description: "Refuse a pending file-modification permission request.",
            input_schema: schema_for::<DenyInput>(),
        },
        ToolDefinition {
            name: NAVIGATOR_CODE_REVIEW,
            description: "Deliver a pass/fail review verdict for the driver's current batch.",
            input_schema: schema_for::<CodeReviewInput>(),
        },
    ]
}

pub fn is_driver_command_tool(name: &str) -> bool {
    name == DRIVER_REQUEST_REVIEW || name == DRIVER_REQUEST_GUIDANCE
}

pub fn is_navigator_command_tool(name: &str) -> bool {
    name == NAVIGATOR_APPROVE || name == NAVIGATOR_DENY || name == NAVIGATOR_CODE_REVIEW
}

/// Converts a Driver tool-use into its structured command, if it names one
/// of the Driver's control tools.
pub fn parse_driver_command(tool_use: &ToolUseItem) -> Option<DriverCommand> {
    match tool_use.name.as_str() {
        DRIVER_REQUEST_REVIEW => {
            let input: RequestReviewInput = serde_json::from_value(tool_use.input.clone()).ok()?;
            Some(DriverCommand::RequestReview {
                context: input.context,
            })
        }
        DRIVER_REQUEST_GUIDANCE => {
            let input: RequestGuidanceInput =
                serde_json::from_value(tool_use.input.clone()).ok()?;
            Some(DriverCommand::RequestGuidance {
                context: input.context,
            })
        }
        _ => None,
    }
}

/// Converts a Navigator tool-use into its structured command, if it names
/// one of the Navigator's decision tools.
pub fn parse_navigator_command(tool_use: &ToolUseItem) -> Option<NavigatorCommand> {
    match tool_use.name.as_str() {
        NAVIGATOR_APPROVE => {
            let input: ApproveInput = serde_json::from_value(tool_use.input.clone()).ok()?;
            Some(NavigatorCommand::Approve {
                request_id: input.request_id,
                comment: input.comment,
            })
        }
        NAVIGATOR_DENY => {
            let input: DenyInput = serde_json::from_value(tool_use.input.clone()).ok()?;
            Some(NavigatorCommand::Deny {
                request_id: input.request_id,
                comment: input.comment,
            })
        }
        NAVIGATOR_CODE_REVIEW => {
            let input: CodeReviewInput = serde_json::from_value(tool_use.input.clone()).ok()?;
            Some(NavigatorCommand::CodeReview {
                pass: input.pass,
                comment: input.comment,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_use(name: &str, input: Value) -> ToolUseItem {
        ToolUseItem {
            id: "t1".into(),
            name: name.into(),
            input,
        }
    }

    #[test]
    fn test_parse_driver_request_review() {
        let tu = tool_use(DRIVER_REQUEST_REVIEW, serde_json::json!({"context": "done"}));
        let cmd = parse_driver_command(&tu).unwrap();
        assert_eq!(
            cmd,
            DriverCommand::RequestReview {
                context: Some("done".into())
            }
        );
    }

    #[test]
    fn test_parse_navigator_code_review() {
        let tu = tool_use(
            NAVIGATOR_CODE_REVIEW,
            serde_json::json!({"pass": true, "comment": "ok"}),
        );
        let cmd = parse_navigator_command(&tu).unwrap();
        assert_eq!(
            cmd,
            NavigatorCommand::CodeReview {
                pass: true,
                comment: Some("ok".into())
            }
        );
    }

    #[test]
    fn test_unknown_tool_parses_to_none() {
        let tu = tool_use("fs.write", serde_json::json!({}));
        assert!(parse_driver_command(&tu).is_none());
        assert!(parse_navigator_command(&tu).is_none());
    }

    #[test]
    fn test_tool_definitions_have_schemas() {
        let driver_tools = driver_tool_definitions();
        assert_eq!(driver_tools.len(), 2);
        assert!(driver_tools[0].input_schema.is_object());

        let nav_tools = navigator_tool_definitions();
        assert_eq!(nav_tools.len(), 3);
        assert!(is_navigator_command_tool(NAVIGATOR_APPROVE));
        assert!(!is_navigator_command_tool(DRIVER_REQUEST_REVIEW));
    }
}
