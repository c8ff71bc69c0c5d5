use serde::{Deserialize, Serialize};

use crate::models::ConversationEntry;

/// Chronological, append-only transcript owned by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationLog {
    entries: Vec<ConversationEntry>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: ConversationEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&ConversationEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(q: &str) -> ConversationEntry {
        ConversationEntry {
            question: q.to_string(),
            answer: format!("answer to {q}"),
            category: "other".to_string(),
        }
    }

    #[test]
    fn test_append_keeps_order() {
        let mut log = ConversationLog::new();
        assert!(log.is_empty());
        assert!(log.latest().is_none());

        log.append(entry("first"));
        log.append(entry("second"));

        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].question, "first");
        assert_eq!(log.latest().map(|e| e.question.as_str()), Some("second"));
    }

    #[test]
    fn test_log_serialises_for_persistence() {
        let mut log = ConversationLog::new();
        log.append(entry("loan"));
        let json = serde_json::to_string(&log).unwrap();
        let back: ConversationLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, log);
    }
}
