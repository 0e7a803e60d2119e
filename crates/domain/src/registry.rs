use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a mapped tool-call argument lands on the outbound HTTP request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamMapping {
    /// Substituted into a `{name}` placeholder in the endpoint path.
    Path,
    /// Appended to the query string under this key.
    Query(String),
    /// Set as `body[key]` of the outbound JSON payload.
    Body(String),
}

/// Fixed HTTP verb used to reach the backend API for a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Default for HttpMethod {
    fn default() -> Self {
        HttpMethod::Get
    }
}

/// How a tool call's arguments are translated into a backend API request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRouting {
    pub endpoint: String,
    #[serde(default)]
    pub method: HttpMethod,
    /// tool param name -> where it lands on the request.
    pub param_map: HashMap<String, ParamMapping>,
}

/// Promotion state of a tool in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Candidate,
    Promoted,
    Flagged,
    Retired,
}

/// A registered tool. Only `Promoted` tools are exposed through chat and MCP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub tool_name: String,
    pub description: String,
    /// parameter name -> `{type, description, optional}`.
    pub input_schema: HashMap<String, ParamSchema>,
    pub mcp_routing: McpRouting,
    #[serde(default)]
    pub requires_confirmation: bool,
    #[serde(default)]
    pub category: Option<String>,
    pub lifecycle_state: LifecycleState,
    #[serde(default)]
    pub promoted_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub flagged_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub retired_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub baseline_pass_rate: Option<f64>,
    #[serde(default)]
    pub replaced_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSchema {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

/// One row of the append-only MCP call log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpCallLog {
    pub tool_name: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub status_code: u16,
    pub latency_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
    pub called_at: chrono::DateTime<chrono::Utc>,
}

impl McpCallLog {
    pub const MAX_OUTPUT_CHARS: usize = 10_000;
    pub const MAX_ERROR_CHARS: usize = 500;
}
