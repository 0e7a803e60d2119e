//! HTTP router: the internal work queue, MCP JSON-RPC bridge, the chat/
//! resume SSE endpoints, preference and admin config surfaces, and static
//! widget serving.

pub mod queue;

use std::path::Path;

use axum::body::Bytes;
use axum::extract::{Path as AxPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use forge_domain::conversation::{ConversationMessage, UserPreferences, COMPLETE_MARKER};
use forge_domain::tool::{Message, MessageContent, Role};
use forge_hitl::HitlStore;
use forge_registry::Store;
use serde_json::{json, Value};

use crate::executor::{execute_tool_call, to_tool_definition};
use crate::react::{resume_react_loop, run_react_loop, ReactContext, ReactEvent, ReactInput};
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/enqueue", post(enqueue))
        .route("/next", get(next))
        .route("/complete", post(complete))
        .route("/shutdown", delete(shutdown))
        .route("/mcp", post(mcp))
        .route("/agent-api/chat", post(chat))
        .route("/agent-api/chat/resume", post(chat_resume))
        .route(
            "/agent-api/user/preferences",
            get(get_preferences).put(put_preferences),
        )
        .route(
            "/forge-admin/config",
            get(get_admin_config).put(put_admin_config),
        )
        .route("/widget/*path", get(widget));

    public
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

// ── /health ──────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<Value> {
    let (queue_length, working, waiting) = state.queue.status();
    Json(json!({
        "status": "ok",
        "queueLength": queue_length,
        "working": working,
        "waiting": waiting,
        "uptime": state.uptime_seconds(),
    }))
}

// ── internal work queue ──────────────────────────────────────────────

async fn enqueue(State(state): State<AppState>, Json(payload): Json<Value>) -> Json<Value> {
    let (id, position) = state.queue.enqueue(payload);
    Json(json!({"queued": true, "id": id, "position": position}))
}

async fn next(State(state): State<AppState>) -> Response {
    match state.queue.next().await {
        Some(item) => Json(item).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn complete(State(state): State<AppState>) -> Json<Value> {
    let remaining = state.queue.complete();
    Json(json!({"ok": true, "remaining": remaining}))
}

async fn shutdown(State(state): State<AppState>) -> Json<Value> {
    state.shutdown.notify_waiters();
    Json(json!({"ok": true}))
}

// ── /mcp ─────────────────────────────────────────────────────────────

async fn mcp(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !crate::auth::check_bearer(bearer_header(&headers), state.mcp_key.as_ref()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response();
    }

    let id = body.get("id").cloned().unwrap_or(Value::Null);
    let method = body.get("method").and_then(Value::as_str).unwrap_or("");

    let result = match method {
        "tools/list" => {
            let tools = state.store.promoted_tools().await.unwrap_or_default();
            let tools_json: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.tool_name,
                        "description": t.description,
                        "inputSchema": crate::executor::input_schema(t),
                    })
                })
                .collect();
            json!({"tools": tools_json})
        }
        "tools/call" => {
            let name = body
                .pointer("/params/name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let arguments = body
                .pointer("/params/arguments")
                .cloned()
                .unwrap_or_else(|| json!({}));
            let jwt = extract_jwt(&headers);
            let base_url = state.config.read().api.base_url.clone();
            let result = execute_tool_call(
                &state.http,
                state.store.as_ref(),
                &base_url,
                name,
                &arguments,
                jwt.as_deref(),
            )
            .await;
            let is_error = result.error.is_some();
            json!({
                "content": [{"type": "text", "text": result.body.to_string()}],
                "structuredContent": result.body,
                "isError": is_error,
            })
        }
        other => {
            return Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": format!("Method not found: {other}")},
            }))
            .into_response()
        }
    };

    Json(json!({"jsonrpc": "2.0", "id": id, "result": result})).into_response()
}

// ── /agent-api/chat and /resume ──────────────────────────────────────

#[derive(serde::Deserialize)]
struct ChatBody {
    session_id: String,
    message: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    hitl_level: Option<forge_domain::hitl::HitlLevel>,
}

async fn chat(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<ChatBody>) -> Response {
    let config = state.config.read().clone();
    let user = match authenticate(&headers, &config) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let jwt = extract_jwt(&headers);

    let prefs = state.store.get_preferences(&user.user_id).await.unwrap_or(None);
    let model = resolve_model(&config, &prefs, body.model.as_deref());
    let hitl_level = resolve_hitl_level(&config, &prefs, body.hitl_level);

    let history = state
        .store
        .list_history(&body.session_id, Some(config.conversation.window))
        .await
        .unwrap_or_default();
    let mut conversation: Vec<Message> = history.iter().map(conversation_message_to_message).collect();
    conversation.push(Message::user(body.message.clone()));

    if let Err(e) = state
        .store
        .append_message(ConversationMessage {
            session_id: body.session_id.clone(),
            role: forge_domain::tool::Role::User,
            content: body.message.clone(),
            stage: None,
            created_at: Utc::now(),
        })
        .await
    {
        tracing::warn!(error = %e, "failed to persist user message");
    }

    let provider = match forge_providers::factory::provider_for_model(&model) {
        Ok(provider) => provider,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()}))).into_response()
        }
    };

    let tools = state
        .store
        .promoted_tools()
        .await
        .unwrap_or_default()
        .iter()
        .map(to_tool_definition)
        .collect();

    let mut input = ReactInput::new(body.session_id.clone(), provider, conversation, config.api.base_url.clone());
    input.model = Some(model);
    input.tools = tools;
    input.hitl_level = hitl_level;
    input.stream = true;
    input.user_jwt = jwt;

    let ctx = react_context(&state);
    let session_id = body.session_id.clone();
    let permit_map = state.session_locks.clone();
    let store = state.store.clone();

    let _permit = permit_map.acquire(&session_id).await;
    let rx = run_react_loop(ctx, input);
    stream_events(rx, store, session_id, _permit)
}

#[derive(serde::Deserialize)]
struct ResumeBody {
    resume_token: String,
    decision: ResumeDecision,
}

#[derive(serde::Deserialize)]
struct ResumeDecision {
    approved: bool,
}

async fn chat_resume(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<ResumeBody>) -> Response {
    let config = state.config.read().clone();
    if let Err(resp) = authenticate(&headers, &config) {
        return resp;
    }
    let jwt = extract_jwt(&headers);

    let pending = match state.hitl.resume(&body.resume_token).await {
        Ok(Some(pending)) => pending,
        Ok(None) => {
            return (
                StatusCode::GONE,
                Json(json!({"error": "resume token missing or expired"})),
            )
                .into_response()
        }
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response(),
    };

    let provider = match forge_providers::factory::provider_for_model(&config.default_model) {
        Ok(provider) => provider,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()}))).into_response(),
    };

    let tools = state
        .store
        .promoted_tools()
        .await
        .unwrap_or_default()
        .iter()
        .map(to_tool_definition)
        .collect();

    let mut input = ReactInput::new(
        pending.session_id.clone(),
        provider,
        pending.conversation_messages.clone(),
        config.api.base_url.clone(),
    );
    input.model = Some(config.default_model.clone());
    input.tools = tools;
    input.hitl_level = config.default_hitl_level;
    input.stream = true;
    input.user_jwt = jwt;

    let ctx = react_context(&state);
    let session_id = pending.session_id.clone();
    let store = state.store.clone();
    let _permit = state.session_locks.acquire(&session_id).await;

    let rx = resume_react_loop(ctx, input, pending, body.decision.approved);
    stream_events(rx, store, session_id, _permit)
}

fn react_context(state: &AppState) -> ReactContext {
    ReactContext {
        store: state.store.clone(),
        hitl: state.hitl.clone(),
        verifiers: state.verifiers.clone(),
        http: state.http.clone(),
    }
}

fn stream_events(
    mut rx: tokio::sync::mpsc::Receiver<ReactEvent>,
    store: std::sync::Arc<dyn forge_registry::Store>,
    session_id: String,
    permit: tokio::sync::OwnedSemaphorePermit,
) -> Response {
    let stream = async_stream::stream! {
        let _permit = permit;
        while let Some(event) = rx.recv().await {
            if let ReactEvent::Done { .. } = &event {
                let _ = store
                    .append_message(ConversationMessage {
                        session_id: session_id.clone(),
                        role: forge_domain::tool::Role::System,
                        content: COMPLETE_MARKER.to_string(),
                        stage: None,
                        created_at: Utc::now(),
                    })
                    .await;
            }
            yield Ok::<_, std::convert::Infallible>(to_sse(&event));
        }
    };

    let sse = Sse::new(stream).keep_alive(crate::sse::keep_alive());
    (crate::sse::EXTRA_HEADERS, sse).into_response()
}

fn to_sse(event: &ReactEvent) -> axum::response::sse::Event {
    match event {
        ReactEvent::Text { text } => crate::sse::encode_event("text", &json!({"text": text})),
        ReactEvent::TextDelta { text } => crate::sse::encode_event("text_delta", &json!({"text": text})),
        ReactEvent::ToolCall { tool, args, id } => {
            crate::sse::encode_event("tool_call", &json!({"tool": tool, "args": args, "id": id}))
        }
        ReactEvent::ToolResult { tool, result, id } => {
            crate::sse::encode_event("tool_result", &json!({"tool": tool, "result": result, "id": id}))
        }
        ReactEvent::ToolWarning { tool, message, verifier } => crate::sse::encode_event(
            "tool_warning",
            &json!({"tool": tool, "message": message, "verifier": verifier}),
        ),
        ReactEvent::Hitl {
            tool,
            args,
            message,
            resume_token,
            pending_tool_calls,
            conversation_messages,
            turn_index,
            verifier,
        } => crate::sse::encode_event(
            "hitl",
            &json!({
                "tool": tool,
                "args": args,
                "message": message,
                "resumeToken": resume_token,
                "pendingToolCalls": pending_tool_calls,
                "conversationMessages": conversation_messages,
                "turnIndex": turn_index,
                "verifier": verifier,
            }),
        ),
        ReactEvent::Done { usage } => crate::sse::encode_event(
            "done",
            &json!({"usage": {"inputTokens": usage.input_tokens, "outputTokens": usage.output_tokens}}),
        ),
        ReactEvent::Error { message } => crate::sse::encode_event("error", &json!({"message": message})),
    }
}

fn conversation_message_to_message(msg: &ConversationMessage) -> Message {
    match msg.role {
        Role::System => Message::system(msg.content.clone()),
        Role::User => Message::user(msg.content.clone()),
        Role::Assistant => Message::assistant(msg.content.clone()),
        Role::Tool => Message {
            role: Role::Tool,
            content: MessageContent::Text(msg.content.clone()),
        },
    }
}

fn resolve_model(
    config: &forge_domain::config::Config,
    prefs: &Option<UserPreferences>,
    requested: Option<&str>,
) -> String {
    if config.allow_user_model_select {
        if let Some(model) = requested {
            return model.to_string();
        }
    }
    prefs
        .as_ref()
        .and_then(|p| p.model.clone())
        .unwrap_or_else(|| config.default_model.clone())
}

fn resolve_hitl_level(
    config: &forge_domain::config::Config,
    prefs: &Option<UserPreferences>,
    requested: Option<forge_domain::hitl::HitlLevel>,
) -> forge_domain::hitl::HitlLevel {
    if config.allow_user_hitl_config {
        if let Some(level) = requested {
            return level;
        }
    }
    prefs
        .as_ref()
        .and_then(|p| p.hitl_level)
        .unwrap_or(config.default_hitl_level)
}

// ── /agent-api/user/preferences ───────────────────────────────────────

async fn get_preferences(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let config = state.config.read().clone();
    let user = match authenticate(&headers, &config) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.store.get_preferences(&user.user_id).await {
        Ok(prefs) => Json(json!({"preferences": prefs})).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response(),
    }
}

#[derive(serde::Deserialize)]
struct PutPreferencesBody {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    hitl_level: Option<forge_domain::hitl::HitlLevel>,
}

async fn put_preferences(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PutPreferencesBody>,
) -> Response {
    let config = state.config.read().clone();
    let user = match authenticate(&headers, &config) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let prefs = UserPreferences {
        user_id: user.user_id,
        model: body.model,
        hitl_level: body.hitl_level,
        updated_at: Utc::now(),
    };
    match state.store.upsert_preferences(prefs.clone()).await {
        Ok(()) => Json(json!({"preferences": prefs})).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response(),
    }
}

// ── /forge-admin/config ───────────────────────────────────────────────

async fn get_admin_config(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !crate::auth::check_bearer(bearer_header(&headers), state.admin_key.as_ref()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response();
    }
    let config = state.config.read().clone();
    Json(redact(&config)).into_response()
}

async fn put_admin_config(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !crate::auth::check_bearer(bearer_header(&headers), state.admin_key.as_ref()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response();
    }
    let raw = body.to_string();
    match forge_domain::config::Config::load(&raw) {
        Ok(new_config) => {
            *state.config.write() = new_config.clone();
            Json(redact(&new_config)).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()}))).into_response(),
    }
}

fn redact(config: &forge_domain::config::Config) -> Value {
    let mut value = serde_json::to_value(config).unwrap_or(Value::Null);
    if let Some(obj) = value.as_object_mut() {
        obj.insert("adminKey".to_string(), json!(config.admin_key.is_some()));
        if let Some(auth) = obj.get_mut("auth").and_then(Value::as_object_mut) {
            auth.insert("signingKey".to_string(), json!(config.auth.signing_key.is_some()));
        }
    }
    value
}

// ── /widget/* ──────────────────────────────────────────────────────────

async fn widget(State(state): State<AppState>, AxPath(path): AxPath<String>) -> Response {
    let requested = state.widget_dir.join(&path);

    let Ok(widget_root) = std::fs::canonicalize(&state.widget_dir) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Ok(resolved) = std::fs::canonicalize(&requested) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !resolved.starts_with(&widget_root) {
        return StatusCode::NOT_FOUND.into_response();
    }

    match tokio::fs::read(&resolved).await {
        Ok(bytes) => {
            let mime = mime_guess_from_path(&resolved);
            (
                [
                    ("Content-Type", mime),
                    ("Cache-Control", "public, max-age=3600".to_string()),
                ],
                Bytes::from(bytes),
            )
                .into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

fn mime_guess_from_path(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html".to_string(),
        Some("js") => "application/javascript".to_string(),
        Some("css") => "text/css".to_string(),
        Some("json") => "application/json".to_string(),
        Some("svg") => "image/svg+xml".to_string(),
        Some("png") => "image/png".to_string(),
        _ => "application/octet-stream".to_string(),
    }
}

// ── shared auth helpers ──────────────────────────────────────────────

struct AuthenticatedUser {
    user_id: String,
}

fn authenticate(headers: &HeaderMap, config: &forge_domain::config::Config) -> Result<AuthenticatedUser, Response> {
    let Some(token) = extract_jwt(headers) else {
        return Err((StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response());
    };
    match crate::auth::authenticate(&token, &config.auth) {
        Ok(user) => Ok(AuthenticatedUser { user_id: user.user_id }),
        Err(_) => Err((StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response()),
    }
}

fn bearer_header(headers: &HeaderMap) -> Option<&str> {
    headers.get("authorization").and_then(|v| v.to_str().ok())
}

fn extract_jwt(headers: &HeaderMap) -> Option<String> {
    crate::auth::extract_bearer(bearer_header(headers)).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_guess_covers_common_web_assets() {
        assert_eq!(mime_guess_from_path(Path::new("a.html")), "text/html");
        assert_eq!(mime_guess_from_path(Path::new("a.js")), "application/javascript");
        assert_eq!(mime_guess_from_path(Path::new("a.unknown")), "application/octet-stream");
    }
}
