//! UI-agnostic chat state types
//!
//! These are shared by the terminal front end and the one-shot `send` mode
//! and don't depend on any specific UI framework.

use serde::{Deserialize, Serialize};

/// A rendered chat message in the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

/// Who a transcript entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "You:",
            Sender::Bot => "Bot:",
        }
    }
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
        }
    }
}
