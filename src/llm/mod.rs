//! Completion provider abstraction for the advisor chat
//!
//! This module implements:
//! - The `CompletionProvider` trait used by the chat controller
//! - A streaming Gemini client speaking server-sent events
//! - Recording of streamed sessions and their playback through the same decoder
//! - Shared message and error types


mod utils;

pub mod gemini;
pub mod recording;
pub mod streaming;
pub mod types;

pub use gemini::{GeminiClient, PlaybackProvider};
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;

/// Ordered sequence of text chunks produced by one streamed reply
#[async_trait]
pub trait TextStream: Send {
    /// Next chunk of reply text. `Ok(None)` marks the end of the stream.
    async fn next_text(&mut self) -> Result<Option<String>>;
}

/// Remote generative model able to stream a reply for a conversation
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Create a session bound to a fixed system instruction.
    /// Fails when the provider is missing credentials or configuration.
    fn start_session(&self, system_instruction: &str) -> Result<ChatSession>;

    /// Send the session history plus the new user turn and stream the reply
    async fn send_and_stream(
        &self,
        session: &ChatSession,
        turn: &Message,
    ) -> Result<Box<dyn TextStream>>;
}
