//! Extraction of structured service proposals from streamed reply text
//!
//! Every chunk of a reply is appended to a buffer, the buffer is scanned for
//! a complete ```` ```json:service_proposal ```` block, the block is decoded
//! when present, and the visible text plus optional proposal is recomputed
//! from scratch.

mod fence;
mod proposal;

#[cfg(test)]
mod extractor_tests;

pub use fence::{detect_block, BlockMatch, FENCE_CLOSE, PROPOSAL_FENCE_OPEN};
pub use proposal::{try_parse, AffectedArea, ServiceProposal};

/// What the user should see for the current buffer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Projection {
    pub visible_text: String,
    pub proposal: Option<ServiceProposal>,
}

/// Append a chunk to the reply buffer
pub fn accumulate(mut buffer: String, chunk: &str) -> String {
    buffer.push_str(chunk);
    buffer
}

/// Derive the visible text and proposal for a buffer.
///
/// Only a detected block that also decoded is cut out of the text; in every
/// other case the raw buffer is shown as is, fences included.
pub fn project(
    buffer: &str,
    detection: Option<&BlockMatch>,
    parsed: Option<&ServiceProposal>,
) -> Projection {
    match (detection, parsed) {
        (Some(block), Some(proposal)) => {
            let span = block.span();
            let mut visible = String::with_capacity(buffer.len() - span.len());
            visible.push_str(&buffer[..span.start]);
            visible.push_str(&buffer[span.end..]);

            Projection {
                visible_text: visible.trim().to_string(),
                proposal: Some(proposal.clone()),
            }
        }
        _ => Projection {
            visible_text: buffer.to_string(),
            proposal: None,
        },
    }
}

/// Per-turn extraction state
#[derive(Debug, Default)]
pub struct ReplyExtractor {
    buffer: String,
}

impl ReplyExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk and return the projection of everything received so far
    pub fn push(&mut self, chunk: &str) -> Projection {
        self.buffer = accumulate(std::mem::take(&mut self.buffer), chunk);
        self.projection()
    }

    pub fn projection(&self) -> Projection {
        let detection = detect_block(&self.buffer);
        let parsed = detection
            .as_ref()
            .and_then(|block| try_parse(block.payload(&self.buffer)));
        project(&self.buffer, detection.as_ref(), parsed.as_ref())
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn into_buffer(self) -> String {
        self.buffer
    }
}
