//! Conversation value types
//!
//! Messages are immutable once created; the store only ever appends them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Id of the seeded greeting
pub const WELCOME_ID: &str = "welcome";

/// Greeting every conversation starts with
pub const WELCOME_TEXT: &str =
    "Hola! soy tu Asistente Zoom Virtual. Como te puedo ayudar el día de hoy?";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Like/dislike annotation on a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Like,
    Dislike,
}

impl Feedback {
    /// Wire name used by the feedback endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            Feedback::Like => "like",
            Feedback::Dislike => "dislike",
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message with a fresh random id
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: next_message_id(),
            content: content.into(),
            role,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// The greeting that seeds every history
    pub fn welcome() -> Self {
        Self {
            id: WELCOME_ID.to_string(),
            content: WELCOME_TEXT.to_string(),
            role: Role::Assistant,
            timestamp: Utc::now(),
        }
    }
}

/// Generate a message id. Random, so two ids minted in the same clock tick
/// never collide.
pub fn next_message_id() -> String {
    Uuid::new_v4().to_string()
}
