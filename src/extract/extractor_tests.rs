use super::*;

const BRAKE_REPLY: &str = "Parece un problema de frenos.\n\n```json:service_proposal\n{\"vehicle\":\"2019 Kia Rio\",\"city\":\"Bogotá\",\"repair_summary\":\"Revisión de frenos\",\"estimated_cost_range\":\"$100.000 - $150.000\",\"affected_area\":\"front_wheels\"}\n```";

/// Split a string into pieces of at most `size` characters
fn chunk_str(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|piece| piece.iter().collect())
        .collect()
}

fn brake_proposal() -> ServiceProposal {
    ServiceProposal {
        vehicle: "2019 Kia Rio".to_string(),
        city: "Bogotá".to_string(),
        repair_summary: "Revisión de frenos".to_string(),
        estimated_cost_range: "$100.000 - $150.000".to_string(),
        affected_area: AffectedArea::FrontWheels,
    }
}

#[test]
fn test_accumulate_appends() {
    let buffer = accumulate(String::new(), "Parece ");
    let buffer = accumulate(buffer, "");
    let buffer = accumulate(buffer, "un problema");
    assert_eq!(buffer, "Parece un problema");
}

#[test]
fn test_happy_path_brake_reply() {
    let mut extractor = ReplyExtractor::new();
    let projection = extractor.push(BRAKE_REPLY);

    assert_eq!(projection.visible_text, "Parece un problema de frenos.");
    assert_eq!(projection.proposal, Some(brake_proposal()));
    assert_eq!(extractor.buffer(), BRAKE_REPLY);
}

#[test]
fn test_projection_is_idempotent() {
    let buffers = [
        "",
        "Solo texto",
        BRAKE_REPLY,
        "Texto\n```json:service_proposal\n{\"vehicle\":",
        "```json:service_proposal\n{no json}\n```",
    ];

    for buffer in buffers {
        let detection = detect_block(buffer);
        let parsed = detection
            .as_ref()
            .and_then(|block| try_parse(block.payload(buffer)));

        let first = project(buffer, detection.as_ref(), parsed.as_ref());
        let second = project(buffer, detection.as_ref(), parsed.as_ref());
        assert_eq!(first, second, "buffer: {buffer:?}");
    }
}

#[test]
fn test_no_card_before_closing_fence() {
    // Every strict prefix that lacks the closing fence must show raw text
    let close_at = BRAKE_REPLY.rfind(FENCE_CLOSE).unwrap();
    let mut extractor = ReplyExtractor::new();

    for piece in chunk_str(&BRAKE_REPLY[..close_at], 1) {
        let projection = extractor.push(&piece);
        assert_eq!(projection.proposal, None);
        assert_eq!(projection.visible_text, extractor.buffer());
    }
}

#[test]
fn test_round_trip_under_any_chunk_size() {
    let expected = {
        let mut extractor = ReplyExtractor::new();
        extractor.push(BRAKE_REPLY)
    };
    let total = BRAKE_REPLY.chars().count();

    for size in 1..=total {
        let mut extractor = ReplyExtractor::new();
        let mut last = Projection::default();
        for piece in chunk_str(BRAKE_REPLY, size) {
            last = extractor.push(&piece);
        }
        assert_eq!(last, expected, "chunk size {size}");
        assert_eq!(extractor.into_buffer(), BRAKE_REPLY);
    }
}

#[test]
fn test_malformed_payload_keeps_raw_text() {
    let buffer = "Texto\n```json:service_proposal\n{\"vehicle\": 2019,}\n```";
    let mut extractor = ReplyExtractor::new();
    let projection = extractor.push(buffer);

    assert_eq!(projection.visible_text, buffer);
    assert_eq!(projection.proposal, None);
}

#[test]
fn test_detected_but_unparsed_is_not_stripped() {
    let buffer = "Intro ```json:service_proposal\n{\"vehicle\":\"x\"}\n``` fin";
    let detection = detect_block(buffer);
    assert!(detection.is_some());

    let projection = project(buffer, detection.as_ref(), None);
    assert_eq!(projection.visible_text, buffer);
    assert_eq!(projection.proposal, None);
}

#[test]
fn test_text_after_block_is_kept() {
    let reply = format!("{BRAKE_REPLY}\n\n¿Quieres agendar una cita?");
    let mut extractor = ReplyExtractor::new();
    let projection = extractor.push(&reply);

    assert_eq!(
        projection.visible_text,
        "Parece un problema de frenos.\n\n\n\n¿Quieres agendar una cita?"
    );
    assert_eq!(projection.proposal, Some(brake_proposal()));
}

#[test]
fn test_proposal_stays_once_block_closes() {
    let mut extractor = ReplyExtractor::new();
    extractor.push(BRAKE_REPLY);

    // Later text never reopens the first block
    for piece in ["\nMás ", "detalles ", "```json:service_proposal\n{"] {
        let projection = extractor.push(piece);
        assert_eq!(projection.proposal, Some(brake_proposal()));
        assert!(!projection.visible_text.contains("front_wheels"));
    }
}

#[test]
fn test_payload_with_triple_backtick_stays_raw() {
    let buffer = "```json:service_proposal\n{\"vehicle\":\"a ``` b\",\"city\":\"c\",\"repair_summary\":\"d\",\"estimated_cost_range\":\"e\",\"affected_area\":\"body\"}\n```";
    let mut extractor = ReplyExtractor::new();
    let projection = extractor.push(buffer);

    assert_eq!(projection.proposal, None);
    assert_eq!(projection.visible_text, buffer);
}
