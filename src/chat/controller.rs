use super::{ChatError, ChatMessage, APOLOGY_TEXT, AUDIO_MESSAGE_TEXT};
use crate::extract::ReplyExtractor;
use crate::llm::{AudioAttachment, ChatSession, CompletionProvider, Message};
use crate::ui::ConversationObserver;
use crate::usage::DailyUsage;
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle of the current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Streaming,
    Completed,
    Failed,
}

/// How an accepted submission ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    /// The reply was replaced by the apology; carries the underlying error text
    Failed { reason: String },
}

/// Drives one conversation: accepts submissions, streams replies through
/// the extractor and keeps the message log up to date.
pub struct ChatController {
    provider: Box<dyn CompletionProvider>,
    session: Option<ChatSession>,
    messages: Vec<ChatMessage>,
    state: TurnState,
    usage: DailyUsage,
    observer: Arc<dyn ConversationObserver>,
}

impl ChatController {
    /// Open a session with the provider. When that fails the controller is
    /// still usable, but every turn fails until the process restarts.
    pub fn new(
        provider: Box<dyn CompletionProvider>,
        system_instruction: &str,
        usage: DailyUsage,
        observer: Arc<dyn ConversationObserver>,
    ) -> Self {
        let session = match provider.start_session(system_instruction) {
            Ok(session) => Some(session),
            Err(e) => {
                error!("Failed to initialize chat session: {:#}", e);
                None
            }
        };

        Self {
            provider,
            session,
            messages: Vec::new(),
            state: TurnState::Idle,
            usage,
            observer,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn session(&self) -> Option<&ChatSession> {
        self.session.as_ref()
    }

    pub fn usage(&self) -> &DailyUsage {
        &self.usage
    }

    /// Submit a user turn and stream the reply to completion.
    ///
    /// Rejections leave the log untouched. Stream failures are not errors of
    /// this call: they end the turn with [`TurnOutcome::Failed`].
    pub async fn send(
        &mut self,
        text: &str,
        audio: Option<AudioAttachment>,
    ) -> Result<TurnOutcome, ChatError> {
        let text = text.trim();
        if text.is_empty() && audio.is_none() {
            return Err(ChatError::EmptySubmission);
        }
        if let Some(retry_at) = self.usage.exhausted_until(Utc::now()) {
            info!("Daily limit reached until {}", retry_at);
            return Err(ChatError::DailyLimitReached { retry_at });
        }

        self.abandon_unfinished_turn();

        let display_text = if text.is_empty() {
            AUDIO_MESSAGE_TEXT
        } else {
            text
        };
        self.messages.push(ChatMessage::user(display_text));
        self.notify();

        self.messages.push(ChatMessage::placeholder());
        let reply_index = self.messages.len() - 1;
        self.state = TurnState::Streaming;
        self.notify();

        let turn = Message::user_turn(text, audio.as_ref());
        match self.stream_reply(&turn, reply_index).await {
            Ok(raw_reply) => {
                debug!("Reply complete, {} bytes", raw_reply.len());
                self.usage.record_completion(Utc::now());
                if let Some(session) = self.session.as_mut() {
                    session.commit_turn(turn, raw_reply);
                }
                self.state = TurnState::Completed;
                self.notify();
                Ok(TurnOutcome::Completed)
            }
            Err(e) => {
                warn!("Reply stream failed: {:#}", e);
                self.fail_message(reply_index);
                self.state = TurnState::Failed;
                self.notify();
                Ok(TurnOutcome::Failed {
                    reason: format!("{e:#}"),
                })
            }
        }
    }

    /// Stream the reply into the message at `reply_index`, returning the raw text
    async fn stream_reply(&mut self, turn: &Message, reply_index: usize) -> Result<String> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| anyhow!("Chat session was never initialized"))?;
        let mut stream = self.provider.send_and_stream(session, turn).await?;

        let mut extractor = ReplyExtractor::new();
        while let Some(chunk) = stream.next_text().await? {
            debug!("Received reply chunk of {} bytes", chunk.len());
            let projection = extractor.push(&chunk);

            let reply = &mut self.messages[reply_index];
            reply.text = projection.visible_text;
            reply.proposal = projection.proposal;
            self.notify();
        }

        Ok(extractor.into_buffer())
    }

    fn fail_message(&mut self, index: usize) {
        let reply = &mut self.messages[index];
        reply.is_error = true;
        reply.text = APOLOGY_TEXT.to_string();
        reply.proposal = None;
    }

    /// A `send` future dropped mid-stream leaves its placeholder behind
    fn abandon_unfinished_turn(&mut self) {
        if self.state != TurnState::Streaming {
            return;
        }
        warn!("Previous turn was abandoned while streaming");
        if let Some(index) = self.messages.len().checked_sub(1) {
            self.fail_message(index);
        }
        self.state = TurnState::Failed;
        self.notify();
    }

    fn notify(&self) {
        self.observer.messages_changed(&self.messages);
    }
}
