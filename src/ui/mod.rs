pub mod terminal;

use crate::chat::ChatMessage;

pub use terminal::TerminalRenderer;

/// Receives the whole message log every time it changes
pub trait ConversationObserver: Send + Sync {
    fn messages_changed(&self, messages: &[ChatMessage]);
}

impl<F> ConversationObserver for F
where
    F: Fn(&[ChatMessage]) + Send + Sync,
{
    fn messages_changed(&self, messages: &[ChatMessage]) {
        self(messages)
    }
}

#[cfg(test)]
mod terminal_tests;
