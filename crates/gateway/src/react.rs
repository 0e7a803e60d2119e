//! The ReAct loop: the agent's execution core. An asynchronous producer of
//! typed events consumed by the HTTP handler (SSE) or a terminal viewer.
//!
//! Scheduling model: cooperative, single task per request. No shared
//! mutation crosses requests — each request owns its loop state exclusively.

use std::sync::Arc;

use forge_domain::hitl::{decide_pause, HitlLevel, HitlPendingState};
use forge_domain::registry::ToolSpec;
use forge_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
use forge_domain::verifier::Outcome;
use forge_hitl::{HitlStore, DEFAULT_TTL};
use forge_providers::traits::{ChatRequest, LlmProvider};
use forge_registry::Store;
use forge_verifiers::custom::CustomVerifierRegistry;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::executor::execute_tool_call;

pub const DEFAULT_MAX_TURNS: usize = 10;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct UsageTotals {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Typed events emitted by the loop, matching the documented SSE wire
/// vocabulary one-for-one.
#[derive(Debug, Clone)]
pub enum ReactEvent {
    Text {
        text: String,
    },
    TextDelta {
        text: String,
    },
    ToolCall {
        tool: String,
        args: Value,
        id: String,
    },
    ToolResult {
        tool: String,
        result: Value,
        id: String,
    },
    ToolWarning {
        tool: String,
        message: String,
        verifier: Option<String>,
    },
    Hitl {
        tool: Option<String>,
        args: Option<Value>,
        message: String,
        resume_token: String,
        pending_tool_calls: Vec<ToolCall>,
        conversation_messages: Vec<Message>,
        turn_index: usize,
        verifier: Option<String>,
    },
    Done {
        usage: UsageTotals,
    },
    Error {
        message: String,
    },
}

pub struct ReactInput {
    pub session_id: String,
    pub provider: Box<dyn LlmProvider>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub tools: Vec<ToolDefinition>,
    pub messages: Vec<Message>,
    pub max_turns: usize,
    pub max_tokens: u32,
    pub stream: bool,
    pub hitl_level: HitlLevel,
    pub api_base_url: String,
    pub user_jwt: Option<String>,
}

impl ReactInput {
    pub fn new(
        session_id: impl Into<String>,
        provider: Box<dyn LlmProvider>,
        messages: Vec<Message>,
        api_base_url: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            provider,
            model: None,
            system_prompt: None,
            tools: Vec::new(),
            messages,
            max_turns: DEFAULT_MAX_TURNS,
            max_tokens: DEFAULT_MAX_TOKENS,
            stream: false,
            hitl_level: HitlLevel::default(),
            api_base_url: api_base_url.into(),
            user_jwt: None,
        }
    }
}

#[derive(Clone)]
pub struct ReactContext {
    pub store: Arc<dyn Store>,
    pub hitl: Arc<dyn HitlStore>,
    pub verifiers: Arc<CustomVerifierRegistry>,
    pub http: reqwest::Client,
}

/// Spawn the loop as a background task, returning the receiving half of its
/// event channel. The loop terminates with exactly one of `done`, `hitl`, or
/// `error`, then closes the channel.
pub fn run_react_loop(ctx: ReactContext, input: ReactInput) -> mpsc::Receiver<ReactEvent> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let conversation = input.messages.clone();
        run_turns(ctx, input, conversation, 0, UsageTotals::default(), tx).await;
    });
    rx
}

/// Resume a loop that previously paused for HITL confirmation. `approved`
/// decides the fate of the tool call that triggered the pause; every other
/// pending call in the same turn is evaluated normally.
pub fn resume_react_loop(
    ctx: ReactContext,
    input: ReactInput,
    pending: HitlPendingState,
    approved: bool,
) -> mpsc::Receiver<ReactEvent> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let outcome = run_tool_calls(
            &ctx,
            &tx,
            input.hitl_level,
            &input.session_id,
            &input.api_base_url,
            input.user_jwt.as_deref(),
            pending.conversation_messages,
            pending.turn_index,
            &pending.pending_tool_calls,
            Some(approved),
        )
        .await;

        if let TurnOutcome::Continue(conversation) = outcome {
            run_turns(
                ctx,
                input,
                conversation,
                pending.turn_index + 1,
                UsageTotals::default(),
                tx,
            )
            .await;
        }
    });
    rx
}

enum TurnOutcome {
    Continue(Vec<Message>),
    Stopped,
}

async fn run_turns(
    ctx: ReactContext,
    input: ReactInput,
    mut conversation: Vec<Message>,
    start_turn: usize,
    mut total_usage: UsageTotals,
    tx: mpsc::Sender<ReactEvent>,
) {
    for turn_index in start_turn..input.max_turns {
        let request = ChatRequest {
            system: input.system_prompt.clone(),
            messages: conversation.clone(),
            tools: input.tools.clone(),
            temperature: None,
            max_tokens: Some(input.max_tokens),
            json_mode: false,
            model: input.model.clone(),
            timeout_ms: None,
        };

        let response = if input.stream {
            match stream_turn(&input, request, &tx).await {
                Ok(response) => response,
                Err(e) => {
                    let _ = tx.send(ReactEvent::Error { message: e.to_string() }).await;
                    return;
                }
            }
        } else {
            match input.provider.chat(request).await {
                Ok(response) => {
                    if !response.content.is_empty() {
                        let _ = tx
                            .send(ReactEvent::Text {
                                text: response.content.clone(),
                            })
                            .await;
                    }
                    response
                }
                Err(e) => {
                    let _ = tx.send(ReactEvent::Error { message: e.to_string() }).await;
                    return;
                }
            }
        };

        if let Some(usage) = &response.usage {
            total_usage.input_tokens += usage.prompt_tokens;
            total_usage.output_tokens += usage.completion_tokens;
        }

        if response.tool_calls.is_empty() {
            let _ = tx
                .send(ReactEvent::Done {
                    usage: total_usage.clone(),
                })
                .await;
            return;
        }

        let mut tool_use_parts = Vec::new();
        if !response.content.is_empty() {
            tool_use_parts.push(ContentPart::Text {
                text: response.content.clone(),
            });
        }
        for tc in &response.tool_calls {
            tool_use_parts.push(ContentPart::ToolUse {
                id: tc.call_id.clone(),
                name: tc.tool_name.clone(),
                input: tc.arguments.clone(),
            });
        }
        conversation.push(Message {
            role: Role::Assistant,
            content: MessageContent::Parts(tool_use_parts),
        });

        match run_tool_calls(
            &ctx,
            &tx,
            input.hitl_level,
            &input.session_id,
            &input.api_base_url,
            input.user_jwt.as_deref(),
            conversation,
            turn_index,
            &response.tool_calls,
            None,
        )
        .await
        {
            TurnOutcome::Continue(next) => conversation = next,
            TurnOutcome::Stopped => return,
        }
    }

    let _ = tx
        .send(ReactEvent::Error {
            message: "reached maxTurns".to_string(),
        })
        .await;
}

/// Execute `calls` in order against `conversation`, appending tool-result
/// messages as they complete. `bypass_first_pause` is `Some(approved)` when
/// resuming a previously paused call: that decision is honored directly
/// instead of being re-evaluated through `decide_pause`.
#[allow(clippy::too_many_arguments)]
async fn run_tool_calls(
    ctx: &ReactContext,
    tx: &mpsc::Sender<ReactEvent>,
    hitl_level: HitlLevel,
    session_id: &str,
    api_base_url: &str,
    user_jwt: Option<&str>,
    mut conversation: Vec<Message>,
    turn_index: usize,
    calls: &[ToolCall],
    bypass_first_pause: Option<bool>,
) -> TurnOutcome {
    for (call_index, tc) in calls.iter().enumerate() {
        let _ = tx
            .send(ReactEvent::ToolCall {
                tool: tc.tool_name.clone(),
                args: tc.arguments.clone(),
                id: tc.call_id.clone(),
            })
            .await;

        let tool_spec = match ctx.store.get_tool(&tc.tool_name).await {
            Ok(Some(spec)) => spec,
            Ok(None) => {
                let _ = tx
                    .send(ReactEvent::Error {
                        message: format!("Tool not found: {}", tc.tool_name),
                    })
                    .await;
                return TurnOutcome::Stopped;
            }
            Err(e) => {
                let _ = tx.send(ReactEvent::Error { message: e.to_string() }).await;
                return TurnOutcome::Stopped;
            }
        };

        if call_index == 0 && bypass_first_pause == Some(false) {
            conversation.push(rejected_tool_result(tc));
            let _ = tx
                .send(ReactEvent::ToolResult {
                    tool: tc.tool_name.clone(),
                    result: serde_json::json!({"error": "rejected by user"}),
                    id: tc.call_id.clone(),
                })
                .await;
            continue;
        }

        let already_approved = call_index == 0 && bypass_first_pause == Some(true);
        if !already_approved && decide_pause(hitl_level, &tool_spec).pause {
            let pending = calls[call_index..].to_vec();
            if emit_hitl(
                ctx,
                tx,
                session_id,
                Some(tc.tool_name.clone()),
                Some(tc.arguments.clone()),
                "Tool call requires confirmation".to_string(),
                pending,
                conversation,
                turn_index,
                None,
            )
            .await
            .is_err()
            {
                let _ = tx
                    .send(ReactEvent::Error {
                        message: "failed to persist HITL pause state".to_string(),
                    })
                    .await;
            }
            return TurnOutcome::Stopped;
        }

        let result = execute_tool_call(
            &ctx.http,
            ctx.store.as_ref(),
            api_base_url,
            &tc.tool_name,
            &tc.arguments,
            user_jwt,
        )
        .await;

        let _ = tx
            .send(ReactEvent::ToolResult {
                tool: tc.tool_name.clone(),
                result: result.body.clone(),
                id: tc.call_id.clone(),
            })
            .await;

        let verdict = verify_result(ctx, &tool_spec, &tc.arguments, &result.body).await;

        if verdict.outcome == Outcome::Warn {
            let _ = tx
                .send(ReactEvent::ToolWarning {
                    tool: tc.tool_name.clone(),
                    message: verdict.message.clone().unwrap_or_default(),
                    verifier: verdict.verifier_name.clone(),
                })
                .await;
        }

        if verdict.outcome == Outcome::Block {
            let pending = calls[call_index + 1..].to_vec();
            if emit_hitl(
                ctx,
                tx,
                session_id,
                Some(tc.tool_name.clone()),
                Some(tc.arguments.clone()),
                verdict
                    .message
                    .unwrap_or_else(|| "Tool output blocked by verifier".to_string()),
                pending,
                conversation,
                turn_index,
                verdict.verifier_name,
            )
            .await
            .is_err()
            {
                let _ = tx
                    .send(ReactEvent::Error {
                        message: "failed to persist HITL pause state".to_string(),
                    })
                    .await;
            }
            return TurnOutcome::Stopped;
        }

        conversation.push(Message {
            role: Role::Tool,
            content: MessageContent::Parts(vec![ContentPart::ToolResult {
                tool_use_id: tc.call_id.clone(),
                content: result.body.to_string(),
                is_error: result.error.is_some(),
            }]),
        });
    }

    TurnOutcome::Continue(conversation)
}

fn rejected_tool_result(tc: &ToolCall) -> Message {
    Message {
        role: Role::Tool,
        content: MessageContent::Parts(vec![ContentPart::ToolResult {
            tool_use_id: tc.call_id.clone(),
            content: serde_json::json!({"error": "rejected by user"}).to_string(),
            is_error: true,
        }]),
    }
}

/// Stream a single turn, forwarding `text_delta` events as they arrive, and
/// return the authoritative final response assembled from the stream.
async fn stream_turn(
    input: &ReactInput,
    request: ChatRequest,
    tx: &mpsc::Sender<ReactEvent>,
) -> forge_domain::error::Result<forge_providers::traits::ChatResponse> {
    use forge_domain::stream::StreamEvent;
    use futures_util::StreamExt;

    let mut stream = input.provider.chat_stream(request).await?;
    let mut text = String::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();
    let mut usage = None;
    let mut finish_reason = None;
    let mut model = input.model.clone().unwrap_or_default();

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Token { text: delta } => {
                text.push_str(&delta);
                let _ = tx.send(ReactEvent::TextDelta { text: delta }).await;
            }
            StreamEvent::ToolCallStarted { .. } | StreamEvent::ToolCallDelta { .. } => {}
            StreamEvent::ToolCallFinished {
                call_id,
                tool_name,
                arguments,
            } => {
                tool_calls.push(ToolCall {
                    call_id,
                    tool_name,
                    arguments,
                });
            }
            StreamEvent::Done {
                usage: u,
                finish_reason: fr,
            } => {
                usage = u;
                finish_reason = fr;
            }
            StreamEvent::Error { message } => {
                return Err(forge_domain::error::Error::Provider {
                    provider: model.clone(),
                    message,
                });
            }
        }
    }
    if model.is_empty() {
        model = "unknown".to_string();
    }

    Ok(forge_providers::traits::ChatResponse {
        content: text,
        tool_calls,
        usage,
        model,
        finish_reason,
    })
}

async fn verify_result(
    ctx: &ReactContext,
    tool_spec: &ToolSpec,
    args: &Value,
    result: &Value,
) -> forge_domain::verifier::VerifierVerdict {
    let tool_specific = ctx
        .store
        .verifiers_for_tool(&tool_spec.tool_name)
        .await
        .unwrap_or_default();
    let wildcard = ctx.store.verifiers_for_tool("*").await.unwrap_or_default();
    let ordered = forge_verifiers::compose(tool_specific, wildcard);
    forge_verifiers::run(&ctx.verifiers, &ordered, &tool_spec.tool_name, args, result)
}

#[allow(clippy::too_many_arguments)]
async fn emit_hitl(
    ctx: &ReactContext,
    tx: &mpsc::Sender<ReactEvent>,
    session_id: &str,
    tool: Option<String>,
    args: Option<Value>,
    message: String,
    pending_tool_calls: Vec<ToolCall>,
    conversation_messages: Vec<Message>,
    turn_index: usize,
    verifier: Option<String>,
) -> Result<(), ()> {
    let state = HitlPendingState {
        session_id: session_id.to_string(),
        conversation_messages: conversation_messages.clone(),
        pending_tool_calls: pending_tool_calls.clone(),
        turn_index,
    };
    let resume_token = ctx.hitl.pause(state, DEFAULT_TTL).await.map_err(|_| ())?;

    let _ = tx
        .send(ReactEvent::Hitl {
            tool,
            args,
            message,
            resume_token,
            pending_tool_calls,
            conversation_messages,
            turn_index,
            verifier,
        })
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_totals_default_to_zero() {
        let usage = UsageTotals::default();
        assert_eq!(usage.input_tokens, 0);
        assert_eq!(usage.output_tokens, 0);
    }
}
