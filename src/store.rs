//! Conversation store - ordered history plus feedback annotations
//!
//! The single source of truth for what the front-end displays. History is
//! append-only and always starts with the welcome message.

use std::collections::HashMap;

use crate::message::{Feedback, Message};

#[derive(Debug, Clone)]
pub struct ConversationStore {
    messages: Vec<Message>,
    feedback: HashMap<String, Feedback>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    /// New history seeded with the welcome message
    pub fn new() -> Self {
        Self::with_seed(Message::welcome())
    }

    pub fn with_seed(seed: Message) -> Self {
        Self {
            messages: vec![seed],
            feedback: HashMap::new(),
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages in display order
    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Never true: the seed message is always present
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Toggle an annotation and return what is now recorded.
    ///
    /// Selecting the current value clears it; selecting the other value
    /// replaces it. The id is not checked against the history.
    pub fn set_feedback(&mut self, message_id: &str, kind: Feedback) -> Option<Feedback> {
        match self.feedback.get(message_id) {
            Some(current) if *current == kind => {
                self.feedback.remove(message_id);
                None
            }
            _ => {
                self.feedback.insert(message_id.to_string(), kind);
                Some(kind)
            }
        }
    }

    pub fn get_feedback(&self, message_id: &str) -> Option<Feedback> {
        self.feedback.get(message_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Role, WELCOME_ID};

    #[test]
    fn test_seeded_history() {
        let store = ConversationStore::new();
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
        assert_eq!(store.all()[0].id, WELCOME_ID);
    }

    #[test]
    fn test_append_preserves_order() {
        let mut store = ConversationStore::new();
        store.append(Message::user("Hola"));
        store.append(Message::assistant("Buenas"));

        let contents: Vec<_> = store.all().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents[1..], ["Hola", "Buenas"]);
        assert_eq!(store.last().map(|m| m.role), Some(Role::Assistant));
    }

    #[test]
    fn test_same_feedback_twice_clears() {
        let mut store = ConversationStore::new();
        assert_eq!(store.set_feedback("m1", Feedback::Like), Some(Feedback::Like));
        assert_eq!(store.set_feedback("m1", Feedback::Like), None);
        assert_eq!(store.get_feedback("m1"), None);
    }

    #[test]
    fn test_other_feedback_replaces() {
        let mut store = ConversationStore::new();
        store.set_feedback("m1", Feedback::Like);
        store.set_feedback("m1", Feedback::Dislike);
        assert_eq!(store.get_feedback("m1"), Some(Feedback::Dislike));
    }

    #[test]
    fn test_feedback_is_per_message() {
        let mut store = ConversationStore::new();
        store.set_feedback("a", Feedback::Like);
        store.set_feedback("b", Feedback::Dislike);
        assert_eq!(store.get_feedback("a"), Some(Feedback::Like));
        assert_eq!(store.get_feedback("b"), Some(Feedback::Dislike));
    }

    #[test]
    fn test_feedback_on_unknown_id_is_recorded() {
        let mut store = ConversationStore::new();
        assert!(store.get("missing").is_none());
        store.set_feedback("missing", Feedback::Dislike);
        assert_eq!(store.get_feedback("missing"), Some(Feedback::Dislike));
        assert_eq!(store.len(), 1);
    }
}
