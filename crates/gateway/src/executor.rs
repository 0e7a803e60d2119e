//! Tool executor: turns a promoted tool call into a backend HTTP request,
//! per `mcpRouting`, and logs the result to the MCP call log.

use std::time::{Duration, Instant};

use chrono::Utc;
use forge_domain::registry::{HttpMethod, McpCallLog, ParamMapping};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

use forge_registry::Store;

const TOOL_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of a tool call, always returned rather than propagated as an
/// error — network failures are encoded as `status: 0`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionResult {
    pub status: u16,
    pub body: Value,
    pub error: Option<String>,
}

pub async fn execute_tool_call(
    http: &reqwest::Client,
    store: &dyn Store,
    base_url: &str,
    tool_name: &str,
    args: &Value,
    user_jwt: Option<&str>,
) -> ExecutionResult {
    let tool = match store.get_tool(tool_name).await {
        Ok(Some(tool)) => tool,
        Ok(None) => {
            return ExecutionResult {
                status: 404,
                body: serde_json::json!({"error": "Tool not found"}),
                error: Some("Tool not found".to_string()),
            }
        }
        Err(e) => {
            return ExecutionResult {
                status: 500,
                body: serde_json::json!({"error": e.to_string()}),
                error: Some(e.to_string()),
            }
        }
    };

    let started = Instant::now();
    let result = build_and_send(http, base_url, &tool.mcp_routing, args, user_jwt).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    let log_entry = McpCallLog {
        tool_name: tool_name.to_string(),
        input: args.clone(),
        output: truncate_json(&result.body, McpCallLog::MAX_OUTPUT_CHARS),
        status_code: result.status,
        latency_ms,
        error: result
            .error
            .as_ref()
            .map(|e| truncate_str(e, McpCallLog::MAX_ERROR_CHARS)),
        called_at: Utc::now(),
    };
    if let Err(e) = store.append_call_log(log_entry).await {
        tracing::warn!(tool = tool_name, error = %e, "failed to append MCP call log entry");
    }

    result
}

async fn build_and_send(
    http: &reqwest::Client,
    base_url: &str,
    routing: &forge_domain::registry::McpRouting,
    args: &Value,
    user_jwt: Option<&str>,
) -> ExecutionResult {
    let base = base_url.trim_end_matches('/');
    let mut path = format!("{base}{}", routing.endpoint);
    let mut query_pairs: Vec<(String, String)> = Vec::new();
    let mut body = Map::new();

    let args_obj = args.as_object();
    for (tool_param, mapping) in &routing.param_map {
        let Some(value) = args_obj.and_then(|o| o.get(tool_param)) else {
            continue;
        };
        match mapping {
            ParamMapping::Path => {
                let encoded = utf8_percent_encode(&value_to_string(value), NON_ALPHANUMERIC).to_string();
                path = path.replace(&format!("{{{tool_param}}}"), &encoded);
            }
            ParamMapping::Query(key) => {
                query_pairs.push((key.clone(), value_to_string(value)));
            }
            ParamMapping::Body(key) => {
                body.insert(key.clone(), value.clone());
            }
        }
    }

    let method = match routing.method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    };

    let mut request = http
        .request(method.clone(), &path)
        .query(&query_pairs)
        .timeout(TOOL_CALL_TIMEOUT)
        .header("Accept", "application/json");

    if let Some(jwt) = user_jwt {
        request = request.header("Authorization", format!("Bearer {jwt}"));
    }

    let wants_body = matches!(
        method,
        reqwest::Method::POST | reqwest::Method::PUT | reqwest::Method::PATCH
    );
    if wants_body && !body.is_empty() {
        request = request.json(&Value::Object(body));
    }

    match request.send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let body: Value = serde_json::from_str(&text).unwrap_or_else(|_| serde_json::json!({"text": text}));
            let error = if !(200..300).contains(&status) {
                Some(format!("HTTP {status}: {}", truncate_str(&text, 200)))
            } else {
                None
            };
            ExecutionResult { status, body, error }
        }
        Err(e) => {
            let msg = e.to_string();
            ExecutionResult {
                status: 0,
                body: serde_json::json!({"error": msg}),
                error: Some(msg),
            }
        }
    }
}

/// Build the JSON Schema describing a tool's parameters, shared by the MCP
/// `tools/list` response and the LLM-facing tool definition.
pub fn input_schema(tool: &forge_domain::registry::ToolSpec) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for (name, schema) in &tool.input_schema {
        let mut entry = Map::new();
        entry.insert("type".to_string(), Value::String(schema.type_.clone()));
        if let Some(desc) = &schema.description {
            entry.insert("description".to_string(), Value::String(desc.clone()));
        }
        properties.insert(name.clone(), Value::Object(entry));
        if !schema.optional {
            required.push(Value::String(name.clone()));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    Value::Object(schema)
}

/// Convert a promoted tool into the provider-agnostic definition the LLM is
/// told about.
pub fn to_tool_definition(tool: &forge_domain::registry::ToolSpec) -> forge_domain::tool::ToolDefinition {
    forge_domain::tool::ToolDefinition {
        name: tool.tool_name.clone(),
        description: tool.description.clone(),
        parameters: input_schema(tool),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate_str(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn truncate_json(value: &Value, max_chars: usize) -> Value {
    let rendered = value.to_string();
    if rendered.chars().count() <= max_chars {
        value.clone()
    } else {
        Value::String(truncate_str(&rendered, max_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_str_respects_char_boundaries() {
        let s = "hello world";
        assert_eq!(truncate_str(s, 5), "hello");
        assert_eq!(truncate_str(s, 100), s);
    }

    #[test]
    fn value_to_string_unwraps_plain_strings() {
        assert_eq!(value_to_string(&Value::String("abc".into())), "abc");
        assert_eq!(value_to_string(&Value::from(42)), "42");
    }

    fn sample_tool() -> forge_domain::registry::ToolSpec {
        use forge_domain::registry::{LifecycleState, McpRouting, ParamSchema};
        use std::collections::HashMap;

        let mut input_schema = HashMap::new();
        input_schema.insert(
            "id".to_string(),
            ParamSchema {
                type_: "string".into(),
                description: Some("the id".into()),
                optional: false,
            },
        );
        input_schema.insert(
            "note".to_string(),
            ParamSchema {
                type_: "string".into(),
                description: None,
                optional: true,
            },
        );

        forge_domain::registry::ToolSpec {
            tool_name: "get_widget".into(),
            description: "fetch a widget".into(),
            input_schema,
            mcp_routing: McpRouting {
                endpoint: "/widgets/{id}".into(),
                method: HttpMethod::Get,
                param_map: HashMap::new(),
            },
            requires_confirmation: false,
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
    fn input_schema_marks_required_and_optional() {
        let schema = input_schema(&sample_tool());
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&Value::String("id".into())));
        assert!(!required.contains(&Value::String("note".into())));
        assert_eq!(schema["type"], "object");
    }

    #[test]
    fn to_tool_definition_copies_name_and_description() {
        let def = to_tool_definition(&sample_tool());
        assert_eq!(def.name, "get_widget");
        assert_eq!(def.description, "fetch a widget");
    }
}
