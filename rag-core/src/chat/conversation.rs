//! Bounded in-memory transcript of the current session

use crate::constants::defaults;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Who produced a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub text: String,
}

/// Ordered, bounded transcript. Session-scoped: its lifetime equals the
/// owning orchestrator's. Not synchronized itself; the orchestrator guards
/// it with a mutex.
#[derive(Debug)]
pub struct ConversationLog {
    entries: VecDeque<ConversationEntry>,
    max_entries: usize,
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new(defaults::MAX_CONVERSATION_ENTRIES)
    }
}

impl ConversationLog {
    /// Create a log keeping at most `max_entries` recent turns.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries.min(64)),
            max_entries: max_entries.max(1),
        }
    }

    /// Append one turn, evicting the oldest when the cap is reached.
    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        while self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(ConversationEntry {
            role,
            text: text.into(),
        });
    }

    /// Number of turns currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no turns are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the held turns in order.
    #[must_use]
    pub fn entries(&self) -> Vec<ConversationEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Render the transcript for prompt assembly.
    ///
    /// Roles are rendered as `[user]`/`[assistant]` labels rather than the
    /// literal `Assistant:` tag: the worker's output parser keys on the
    /// first occurrence of that tag, which must not appear earlier in an
    /// echoed prompt.
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|entry| match entry.role {
                Role::User => format!("[user] {}", entry.text),
                Role::Assistant => format!("[assistant] {}", entry.text),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_order() {
        let mut log = ConversationLog::new(10);
        log.push(Role::User, "first");
        log.push(Role::Assistant, "second");
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[1].role, Role::Assistant);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut log = ConversationLog::new(3);
        for i in 0..5 {
            log.push(Role::User, format!("turn {i}"));
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].text, "turn 2");
        assert_eq!(entries[2].text, "turn 4");
    }

    #[test]
    fn test_render_uses_bracket_labels() {
        let mut log = ConversationLog::new(10);
        log.push(Role::User, "How do I attack?");
        log.push(Role::Assistant, "Roll 2d6.");
        let rendered = log.render();
        assert_eq!(rendered, "[user] How do I attack?\n[assistant] Roll 2d6.");
        assert!(!rendered.contains("Assistant:"));
    }
}
