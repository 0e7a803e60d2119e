//! Server-sent event encoding for `/agent-api/chat` and
//! `/agent-api/chat/resume`.

use axum::response::sse::{Event, KeepAlive};
use std::time::Duration;

/// Replace characters that would break SSE framing (`\n`, `\r`, `:`) with
/// `_` in an event name.
pub fn sanitize_event_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\n' | '\r' | ':' => '_',
            other => other,
        })
        .collect()
}

/// Build an `axum` SSE event carrying `data` serialized as JSON under the
/// sanitized event name.
pub fn encode_event(name: &str, data: &serde_json::Value) -> Event {
    Event::default()
        .event(sanitize_event_name(name))
        .data(data.to_string())
}

/// Standard keep-alive used by every SSE stream this service emits.
pub fn keep_alive() -> KeepAlive {
    KeepAlive::new().interval(Duration::from_secs(15)).text("")
}

/// Headers required in addition to axum's default SSE content type, per the
/// documented response contract (disables proxy buffering).
pub const EXTRA_HEADERS: [(&str, &str); 3] = [
    ("Cache-Control", "no-cache"),
    ("Connection", "keep-alive"),
    ("X-Accel-Buffering", "no"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_newlines_and_colons() {
        assert_eq!(sanitize_event_name("tool:call\n\r"), "tool_call__");
    }

    #[test]
    fn leaves_plain_names_untouched() {
        assert_eq!(sanitize_event_name("text_delta"), "text_delta");
    }
}
