//! Tests for the terminal conversation renderer

use super::terminal::TerminalRenderer;
use super::ConversationObserver;
use crate::chat::{ChatMessage, APOLOGY_TEXT};
use crate::extract::{AffectedArea, ServiceProposal};
use std::io::Write;
use std::sync::{Arc, Mutex};

// Back to the start of the previous row, then clear to end of screen
const ERASE_ONE_ROW: &str = "\x1b[1F\x1b[J";

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn output(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }

    fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn renderer(echo_user: bool) -> (TerminalRenderer, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let renderer = TerminalRenderer::with_writer(Box::new(buffer.clone()), echo_user, Some(80));
    (renderer, buffer)
}

/// Feed the renderer the same notifications the controller would send for one turn
fn play_turn(
    renderer: &TerminalRenderer,
    log: &mut Vec<ChatMessage>,
    user_text: &str,
    reply_states: &[ChatMessage],
) {
    log.push(ChatMessage::user(user_text));
    renderer.messages_changed(log);
    log.push(ChatMessage::placeholder());
    renderer.messages_changed(log);
    for state in reply_states {
        *log.last_mut().unwrap() = state.clone();
        renderer.messages_changed(log);
    }
    renderer.finish_turn();
}

fn reply(text: &str) -> ChatMessage {
    let mut message = ChatMessage::placeholder();
    message.text = text.to_string();
    message
}

#[test]
fn test_streaming_reply_is_redrawn_in_place() {
    let (renderer, buffer) = renderer(false);
    let mut log = Vec::new();
    play_turn(
        &renderer,
        &mut log,
        "hola",
        &[reply("Parece"), reply("Parece un problema")],
    );

    let output = buffer.output();
    // Placeholder, then two redraws of a one-row message
    assert_eq!(output.matches(ERASE_ONE_ROW).count(), 2);
    assert!(output.ends_with("Parece un problema\n"));
    assert!(!output.contains("hola"));
}

#[test]
fn test_user_messages_are_echoed_when_enabled() {
    let (renderer, buffer) = renderer(true);
    let mut log = Vec::new();
    play_turn(&renderer, &mut log, "se apaga el carro", &[reply("Entiendo")]);

    let output = buffer.output();
    let user_at = output.find("se apaga el carro").unwrap();
    let reply_at = output.rfind("Entiendo").unwrap();
    assert!(user_at < reply_at);
}

#[test]
fn test_proposal_card_is_printed() {
    let (renderer, buffer) = renderer(false);
    let mut with_card = reply("Parece un problema de frenos.");
    with_card.proposal = Some(ServiceProposal {
        vehicle: "2019 Kia Rio".to_string(),
        city: "Bogotá".to_string(),
        repair_summary: "Revisión de frenos".to_string(),
        estimated_cost_range: "$100.000 - $150.000".to_string(),
        affected_area: AffectedArea::FrontWheels,
    });

    let mut log = Vec::new();
    play_turn(&renderer, &mut log, "frenos", &[with_card]);

    let output = buffer.output();
    assert!(output.contains("Propuesta de servicio"));
    assert!(output.contains("Ruedas delanteras"));
    assert!(output.contains("$100.000 - $150.000"));
}

#[test]
fn test_failed_reply_shows_apology() {
    let (renderer, buffer) = renderer(false);
    let mut failed = reply(APOLOGY_TEXT);
    failed.is_error = true;

    let mut log = Vec::new();
    play_turn(&renderer, &mut log, "hola", &[reply("Par"), failed]);

    assert!(buffer.output().contains(&format!("\x1b[31m{}", APOLOGY_TEXT)));
}

#[test]
fn test_finished_turn_is_never_erased() {
    let (renderer, buffer) = renderer(false);
    let mut log = Vec::new();
    play_turn(&renderer, &mut log, "hola", &[reply("Hola, ¿qué vehículo tienes?")]);

    let first_turn_end = buffer.len();
    log.push(ChatMessage::user("un Kia"));
    renderer.messages_changed(&log);
    log.push(ChatMessage::placeholder());
    renderer.messages_changed(&log);

    let output = buffer.output();
    let second_turn = &output[first_turn_end..];
    assert!(!second_turn.contains("\x1b[J"));
    assert!(output.contains("Hola, ¿qué vehículo tienes?"));
}

#[test]
fn test_wrapped_reply_erases_all_rows() {
    let buffer = SharedBuffer::default();
    let renderer = TerminalRenderer::with_writer(Box::new(buffer.clone()), false, Some(20));

    let mut log = vec![ChatMessage::user("hola"), reply(&"x".repeat(50))];
    renderer.messages_changed(&log);
    *log.last_mut().unwrap() = reply("corto");
    renderer.messages_changed(&log);

    // "Asesor: " plus 50 characters wraps to three rows at 20 columns
    assert!(buffer.output().contains("\x1b[3F\x1b[J"));
}
