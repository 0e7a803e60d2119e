use serde::{Deserialize, Serialize};

use crate::hitl::HitlLevel;
use crate::tool::Role;

/// A persisted conversation turn, as stored and replayed by the conversation
/// store. Distinct from [`crate::tool::Message`], which is the shape handed
/// to a provider — this carries storage metadata (`stage`, `created_at`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub session_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub stage: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Marker appended as a system message when a session is considered finished.
pub const COMPLETE_MARKER: &str = "[COMPLETE]";

/// `true` when the most recent system message in `history` is the completion marker.
pub fn is_complete(history: &[ConversationMessage]) -> bool {
    history
        .iter()
        .rev()
        .find(|m| m.role == Role::System)
        .map(|m| m.content == COMPLETE_MARKER)
        .unwrap_or(false)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub hitl_level: Option<HitlLevel>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: Role, content: &str) -> ConversationMessage {
        ConversationMessage {
            session_id: "s1".into(),
            role,
            content: content.into(),
            stage: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn incomplete_by_default() {
        let history = vec![msg(Role::User, "hi"), msg(Role::Assistant, "hello")];
        assert!(!is_complete(&history));
    }

    #[test]
    fn complete_when_last_system_message_is_marker() {
        let history = vec![
            msg(Role::User, "hi"),
            msg(Role::System, COMPLETE_MARKER),
        ];
        assert!(is_complete(&history));
    }
}
