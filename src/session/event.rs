// src/session/event.rs — Wire event kinds and their decoded payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::research::ResearchOutput;

/// The closed set of event kinds the research workflow emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    LlmFullResponse,
    ToolStart,
    ToolEnd,
    AgentAction,
    AgentFinish,
    AgentReasoningStart,
    FinalResearchOutput,
    WorkflowEnd,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::LlmFullResponse,
        EventKind::ToolStart,
        EventKind::ToolEnd,
        EventKind::AgentAction,
        EventKind::AgentFinish,
        EventKind::AgentReasoningStart,
        EventKind::FinalResearchOutput,
        EventKind::WorkflowEnd,
    ];

    /// Map an SSE `event:` label to a known kind. Unknown labels return `None`.
    pub fn from_wire(label: &str) -> Option<Self> {
        match label {
            "llm_full_response" => Some(Self::LlmFullResponse),
            "tool_start" => Some(Self::ToolStart),
            "tool_end" => Some(Self::ToolEnd),
            "agent_action" => Some(Self::AgentAction),
            "agent_finish" => Some(Self::AgentFinish),
            "agent_reasoning_start" => Some(Self::AgentReasoningStart),
            "final_research_output" => Some(Self::FinalResearchOutput),
            "workflow_end" => Some(Self::WorkflowEnd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LlmFullResponse => "llm_full_response",
            Self::ToolStart => "tool_start",
            Self::ToolEnd => "tool_end",
            Self::AgentAction => "agent_action",
            Self::AgentFinish => "agent_finish",
            Self::AgentReasoningStart => "agent_reasoning_start",
            Self::FinalResearchOutput => "final_research_output",
            Self::WorkflowEnd => "workflow_end",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::WorkflowEnd)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload decoded from the event's JSON body.
///
/// `any`-typed fields default to `null` when the producer omits them; string
/// fields are required.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    LlmFullResponse {
        content: String,
    },
    ToolStart {
        tool_name: String,
        input: Value,
    },
    ToolEnd {
        output: Value,
    },
    AgentAction {
        tool: String,
        tool_input: Value,
    },
    AgentFinish {
        output: Value,
    },
    AgentReasoningStart,
    FinalResearchOutput(Map<String, Value>),
    WorkflowEnd,
}

#[derive(Deserialize)]
struct LlmFullResponseBody {
    content: String,
}

#[derive(Deserialize)]
struct ToolStartBody {
    tool_name: String,
    #[serde(default)]
    input: Value,
}

#[derive(Deserialize)]
struct OutputBody {
    #[serde(default)]
    output: Value,
}

#[derive(Deserialize)]
struct AgentActionBody {
    tool: String,
    #[serde(default)]
    tool_input: Value,
}

impl EventPayload {
    /// Decode `data` as the payload for `kind`.
    ///
    /// `workflow_end` carries no required fields, so its body is never inspected.
    pub fn decode(kind: EventKind, data: &str) -> Result<Self, serde_json::Error> {
        let payload = match kind {
            EventKind::LlmFullResponse => {
                let body: LlmFullResponseBody = serde_json::from_str(data)?;
                Self::LlmFullResponse {
                    content: body.content,
                }
            }
            EventKind::ToolStart => {
                let body: ToolStartBody = serde_json::from_str(data)?;
                Self::ToolStart {
                    tool_name: body.tool_name,
                    input: body.input,
                }
            }
            EventKind::ToolEnd => {
                let body: OutputBody = serde_json::from_str(data)?;
                Self::ToolEnd {
                    output: body.output,
                }
            }
            EventKind::AgentAction => {
                let body: AgentActionBody = serde_json::from_str(data)?;
                Self::AgentAction {
                    tool: body.tool,
                    tool_input: body.tool_input,
                }
            }
            EventKind::AgentFinish => {
                let body: OutputBody = serde_json::from_str(data)?;
                Self::AgentFinish {
                    output: body.output,
                }
            }
            EventKind::AgentReasoningStart => {
                let _: Map<String, Value> = serde_json::from_str(data)?;
                Self::AgentReasoningStart
            }
            EventKind::FinalResearchOutput => {
                let mut body: Map<String, Value> = serde_json::from_str(data)?;
                // The producer echoes the event label into the body.
                body.remove("type");
                Self::FinalResearchOutput(body)
            }
            EventKind::WorkflowEnd => Self::WorkflowEnd,
        };
        Ok(payload)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::LlmFullResponse { .. } => EventKind::LlmFullResponse,
            Self::ToolStart { .. } => EventKind::ToolStart,
            Self::ToolEnd { .. } => EventKind::ToolEnd,
            Self::AgentAction { .. } => EventKind::AgentAction,
            Self::AgentFinish { .. } => EventKind::AgentFinish,
            Self::AgentReasoningStart => EventKind::AgentReasoningStart,
            Self::FinalResearchOutput(_) => EventKind::FinalResearchOutput,
            Self::WorkflowEnd => EventKind::WorkflowEnd,
        }
    }
}

/// One accepted event, stamped with its arrival index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceivedEvent {
    pub sequence: u64,
    pub kind: EventKind,
    pub payload: EventPayload,
    pub received_at: DateTime<Utc>,
}

impl ReceivedEvent {
    /// Typed view of a `final_research_output` payload, when it fits.
    pub fn research_output(&self) -> Option<ResearchOutput> {
        match &self.payload {
            EventPayload::FinalResearchOutput(body) => ResearchOutput::from_payload(body),
            _ => None,
        }
    }
}
