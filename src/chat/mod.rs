//! Conversation state and the per-turn stream controller

mod controller;


pub use controller::{ChatController, TurnOutcome, TurnState};

use crate::extract::ServiceProposal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Shown in place of the reply when streaming fails
pub const APOLOGY_TEXT: &str =
    "Lo siento, tuvimos un problema al procesar tu consulta. Por favor, inténtalo de nuevo.";

/// Stored as the user message text for voice-only submissions
pub const AUDIO_MESSAGE_TEXT: &str = "🎤 Mensaje de voz";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of the visible conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub text: String,
    pub is_error: bool,
    pub proposal: Option<ServiceProposal>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: generate_message_id(),
            role: ChatRole::User,
            text: text.into(),
            is_error: false,
            proposal: None,
        }
    }

    /// Empty assistant message filled in while the reply streams
    pub fn placeholder() -> Self {
        Self {
            id: generate_message_id(),
            role: ChatRole::Assistant,
            text: String::new(),
            is_error: false,
            proposal: None,
        }
    }
}

static MESSAGE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Unique within the process: creation time plus a sequence number
pub fn generate_message_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let seq = MESSAGE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("msg_{millis:x}_{seq:x}")
}

/// Reasons a submission is rejected before anything is sent
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Nothing to send: the message is empty and has no audio")]
    EmptySubmission,
    #[error("Daily limit reached, available again at {retry_at}")]
    DailyLimitReached { retry_at: DateTime<Utc> },
}
