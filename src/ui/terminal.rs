use super::ConversationObserver;
use crate::chat::{ChatMessage, ChatRole};
use crate::extract::ServiceProposal;
use crossterm::{
    cursor::MoveToPreviousLine,
    queue,
    terminal::{self, Clear, ClearType},
};
use std::io::{self, Write};
use std::sync::Mutex;
use tracing::warn;

// ANSI color codes for terminal formatting
struct Colors {
    reset: &'static str,
    dim: &'static str,
    bold: &'static str,
    green: &'static str,
    red: &'static str,
    cyan: &'static str,
    gray: &'static str,
}

impl Colors {
    fn new() -> Self {
        Colors {
            reset: "\x1b[0m",
            dim: "\x1b[2m",
            bold: "\x1b[1m",
            green: "\x1b[32m",
            red: "\x1b[31m",
            cyan: "\x1b[36m",
            gray: "\x1b[90m",
        }
    }
}

struct RenderState {
    out: Box<dyn Write + Send>,
    /// Messages before this index are final on screen
    printed: usize,
    /// Index of the message currently redrawn in place
    live_index: Option<usize>,
    /// Terminal rows taken by the live message
    live_rows: u16,
}

/// Prints the conversation to a terminal, redrawing the streaming reply in place
pub struct TerminalRenderer {
    colors: Colors,
    echo_user: bool,
    /// Fixed width for tests; otherwise queried from the terminal
    width: Option<u16>,
    state: Mutex<RenderState>,
}

impl TerminalRenderer {
    /// Render to stdout. With `echo_user` the user's own messages are printed too.
    pub fn new(echo_user: bool) -> Self {
        Self::with_writer(Box::new(io::stdout()), echo_user, None)
    }

    pub fn with_writer(out: Box<dyn Write + Send>, echo_user: bool, width: Option<u16>) -> Self {
        Self {
            colors: Colors::new(),
            echo_user,
            width,
            state: Mutex::new(RenderState {
                out,
                printed: 0,
                live_index: None,
                live_rows: 0,
            }),
        }
    }

    /// Freeze the live message after a turn ended
    pub fn finish_turn(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if let Some(index) = state.live_index.take() {
            state.printed = index + 1;
            state.live_rows = 0;
        }
    }

    /// Print a notice line outside the conversation log
    pub fn notice(&self, text: &str) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let line = format!("{}{}{}", self.colors.gray, text, self.colors.reset);
        if let Err(e) = writeln!(state.out, "{}", line).and_then(|_| state.out.flush()) {
            warn!("Failed to write to terminal: {}", e);
        }
    }

    fn terminal_width(&self) -> u16 {
        self.width
            .or_else(|| terminal::size().ok().map(|(cols, _)| cols))
            .filter(|cols| *cols > 0)
            .unwrap_or(80)
    }

    fn render(&self, messages: &[ChatMessage]) -> io::Result<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "renderer state poisoned"))?;
        let state = &mut *guard;
        let width = self.terminal_width();

        for (index, message) in messages.iter().enumerate().skip(state.printed) {
            let streaming = index + 1 == messages.len() && message.role == ChatRole::Assistant;

            if state.live_index == Some(index) {
                if !streaming {
                    // Superseded by a newer message, its last drawing is final
                    state.live_index = None;
                    state.live_rows = 0;
                    state.printed = index + 1;
                    continue;
                }
                if state.live_rows > 0 {
                    queue!(
                        state.out,
                        MoveToPreviousLine(state.live_rows),
                        Clear(ClearType::FromCursorDown)
                    )?;
                }
            }

            if streaming {
                let block = self.format_message(message);
                write!(state.out, "{}", block)?;
                state.live_index = Some(index);
                state.live_rows = count_rows(&block, width);
            } else {
                if message.role == ChatRole::Assistant || self.echo_user {
                    write!(state.out, "{}", self.format_message(message))?;
                }
                state.printed = index + 1;
            }
        }

        state.out.flush()
    }

    fn format_message(&self, message: &ChatMessage) -> String {
        let c = &self.colors;
        let mut block = match message.role {
            ChatRole::User => format!("{}{}Tú:{} {}\n", c.green, c.bold, c.reset, message.text),
            ChatRole::Assistant if message.is_error => format!(
                "{}{}Asesor:{} {}{}{}\n",
                c.cyan, c.bold, c.reset, c.red, message.text, c.reset
            ),
            ChatRole::Assistant if message.text.is_empty() => format!(
                "{}{}Asesor:{} {}…{}\n",
                c.cyan, c.bold, c.reset, c.dim, c.reset
            ),
            ChatRole::Assistant => {
                format!("{}{}Asesor:{} {}\n", c.cyan, c.bold, c.reset, message.text)
            }
        };

        if let Some(proposal) = &message.proposal {
            block.push_str(&self.format_proposal(proposal));
        }
        block
    }

    fn format_proposal(&self, proposal: &ServiceProposal) -> String {
        let c = &self.colors;
        let rows = [
            ("Vehículo", proposal.vehicle.as_str()),
            ("Ciudad", proposal.city.as_str()),
            ("Reparación", proposal.repair_summary.as_str()),
            ("Zona", proposal.affected_area.label()),
            ("Costo estimado", proposal.estimated_cost_range.as_str()),
        ];

        let mut card = format!("{}┌ {}Propuesta de servicio{}\n", c.gray, c.bold, c.reset);
        for (label, value) in rows {
            card.push_str(&format!(
                "{}│{} {}{}:{} {}\n",
                c.gray, c.reset, c.dim, label, c.reset, value
            ));
        }
        card.push_str(&format!("{}└{}\n", c.gray, c.reset));
        card
    }
}

impl ConversationObserver for TerminalRenderer {
    fn messages_changed(&self, messages: &[ChatMessage]) {
        if let Err(e) = self.render(messages) {
            warn!("Failed to render conversation: {}", e);
        }
    }
}

/// Number of characters that take up screen space, skipping ANSI escapes
fn visible_width(line: &str) -> usize {
    let mut width = 0;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // CSI sequence ends with a letter
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

/// Rows a block ending in a newline occupies when wrapped at `width` columns
fn count_rows(block: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = block
        .strip_suffix('\n')
        .unwrap_or(block)
        .split('\n')
        .map(|line| visible_width(line).div_ceil(width).max(1))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_width_skips_escapes() {
        assert_eq!(visible_width("\x1b[36m\x1b[1mAsesor:\x1b[0m hola"), 12);
        assert_eq!(visible_width("Carrocería"), 10);
    }

    #[test]
    fn test_count_rows_wraps_long_lines() {
        assert_eq!(count_rows("corto\n", 10), 1);
        assert_eq!(count_rows("0123456789\n", 10), 1);
        assert_eq!(count_rows("0123456789a\n", 10), 2);
        assert_eq!(count_rows("uno\n\ndos\n", 10), 3);
    }
}
