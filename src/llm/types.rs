use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One entry of the conversation history sent to the model
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl Message {
    /// Build the user turn for a submission, optionally carrying a voice note
    pub fn user_turn(text: &str, audio: Option<&AudioAttachment>) -> Self {
        let content = match audio {
            None => MessageContent::Text(text.to_string()),
            Some(audio) => {
                let mut blocks = Vec::new();
                if !text.is_empty() {
                    blocks.push(ContentBlock::Text {
                        text: text.to_string(),
                    });
                }
                blocks.push(ContentBlock::Audio {
                    media_type: audio.media_type.clone(),
                    data: audio.data.clone(),
                });
                MessageContent::Structured(blocks)
            }
        };

        Self {
            role: MessageRole::User,
            content,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Structured(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    /// Base64 encoded audio recording
    #[serde(rename = "audio")]
    Audio { media_type: String, data: String },
}

/// Voice note attached to a submission, already base64 encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAttachment {
    pub media_type: String,
    pub data: String,
}

impl AudioAttachment {
    pub fn from_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            media_type: media_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Read an audio file, guessing the media type from its extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read audio file {}", path.display()))?;
        Ok(Self::from_bytes(media_type_for(path), &bytes))
    }
}

fn media_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mp3",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("aac") => "audio/aac",
        Some("m4a") => "audio/mp4",
        // Browser recordings are webm/opus
        _ => "audio/webm",
    }
}

/// Conversation state owned by the caller and handed to the provider on every turn
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    system_instruction: String,
    history: Vec<Message>,
}

impl ChatSession {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            history: Vec::new(),
        }
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// Turns committed so far, oldest first
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Append a finished turn. The reply is stored raw, fenced blocks included.
    pub fn commit_turn(&mut self, user: Message, reply: impl Into<String>) {
        self.history.push(user);
        self.history.push(Message::assistant(reply));
    }
}

/// Common error types for completion providers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Malformed stream data: {0}")]
    StreamDecode(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
