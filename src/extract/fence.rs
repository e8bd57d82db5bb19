//! Locating the fenced proposal block inside reply text

use std::ops::Range;

/// Opening marker of the structured block, including the code fence
pub const PROPOSAL_FENCE_OPEN: &str = "```json:service_proposal";
/// Closing code fence
pub const FENCE_CLOSE: &str = "```";

/// Byte ranges of a complete fenced block within a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMatch {
    span: Range<usize>,
    payload: Range<usize>,
}

impl BlockMatch {
    /// Range of the whole block, from the opening marker through the closing fence
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    /// Range of the captured payload with surrounding whitespace excluded
    pub fn payload_range(&self) -> Range<usize> {
        self.payload.clone()
    }

    pub fn full<'a>(&self, buffer: &'a str) -> &'a str {
        &buffer[self.span()]
    }

    pub fn payload<'a>(&self, buffer: &'a str) -> &'a str {
        &buffer[self.payload_range()]
    }
}

/// Find the first complete proposal block.
///
/// Returns `None` until both the opening marker and a closing fence after it
/// are present. The payload ends at the first closing fence, so a payload
/// that itself contains three backticks is cut short there.
pub fn detect_block(buffer: &str) -> Option<BlockMatch> {
    let open = buffer.find(PROPOSAL_FENCE_OPEN)?;
    let body_start = open + PROPOSAL_FENCE_OPEN.len();
    let close = body_start + buffer[body_start..].find(FENCE_CLOSE)?;

    let body = &buffer[body_start..close];
    let payload_start = body_start + (body.len() - body.trim_start().len());
    let payload_end = payload_start + body.trim().len();

    Some(BlockMatch {
        span: open..close + FENCE_CLOSE.len(),
        payload: payload_start..payload_end,
    })
}
