use serde::{Deserialize, Serialize};

use crate::registry::{HttpMethod, ToolSpec};

/// How cautious the agent is about executing tool calls without confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitlLevel {
    Autonomous,
    Cautious,
    Standard,
    Paranoid,
}

impl Default for HitlLevel {
    fn default() -> Self {
        HitlLevel::Cautious
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PauseDecision {
    pub pause: bool,
}

impl PauseDecision {
    pub const fn no() -> Self {
        PauseDecision { pause: false }
    }
    pub const fn yes() -> Self {
        PauseDecision { pause: true }
    }
}

/// Decide whether a tool call must be confirmed by a human before it runs.
///
/// Pure function of the HITL level and the tool's own spec — no I/O.
pub fn decide_pause(level: HitlLevel, spec: &ToolSpec) -> PauseDecision {
    match level {
        HitlLevel::Autonomous => PauseDecision::no(),
        HitlLevel::Cautious => {
            if spec.requires_confirmation {
                PauseDecision::yes()
            } else {
                PauseDecision::no()
            }
        }
        HitlLevel::Standard => match spec.mcp_routing.method {
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch | HttpMethod::Delete => {
                PauseDecision::yes()
            }
            HttpMethod::Get => PauseDecision::no(),
        },
        HitlLevel::Paranoid => PauseDecision::yes(),
    }
}

/// Serialized conversation + pending tool calls a paused run hands to the
/// HITL engine for storage, keyed by a one-time-use resume token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlPendingState {
    pub session_id: String,
    pub conversation_messages: Vec<crate::tool::Message>,
    pub pending_tool_calls: Vec<crate::tool::ToolCall>,
    pub turn_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{LifecycleState, McpRouting, ParamMapping};
    use std::collections::HashMap;

    fn spec(method: HttpMethod, requires_confirmation: bool) -> ToolSpec {
        ToolSpec {
            tool_name: "t".into(),
            description: String::new(),
            input_schema: HashMap::new(),
            mcp_routing: McpRouting {
                endpoint: "/t".into(),
                method,
                param_map: HashMap::new(),
            },
            requires_confirmation,
            category: None,
            lifecycle_state: LifecycleState::Promoted,
            promoted_at: None,
            flagged_at: None,
            retired_at: None,
            baseline_pass_rate: None,
            replaced_by: None,
        }
    }

    #[test]
    fn autonomous_never_pauses() {
        assert_eq!(
            decide_pause(HitlLevel::Autonomous, &spec(HttpMethod::Delete, true)),
            PauseDecision::no()
        );
    }

    #[test]
    fn cautious_pauses_only_on_requires_confirmation() {
        assert_eq!(
            decide_pause(HitlLevel::Cautious, &spec(HttpMethod::Get, true)),
            PauseDecision::yes()
        );
        assert_eq!(
            decide_pause(HitlLevel::Cautious, &spec(HttpMethod::Get, false)),
            PauseDecision::no()
        );
    }

    #[test]
    fn standard_pauses_on_mutating_methods() {
        assert_eq!(
            decide_pause(HitlLevel::Standard, &spec(HttpMethod::Post, false)),
            PauseDecision::yes()
        );
        assert_eq!(
            decide_pause(HitlLevel::Standard, &spec(HttpMethod::Get, false)),
            PauseDecision::no()
        );
    }

    #[test]
    fn paranoid_always_pauses() {
        assert_eq!(
            decide_pause(HitlLevel::Paranoid, &spec(HttpMethod::Get, false)),
            PauseDecision::yes()
        );
    }
}
