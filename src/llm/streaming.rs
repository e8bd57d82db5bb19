//! Common streaming infrastructure
//!
//! Chunk sources are either a live HTTP response or a recorded session. Both
//! feed the same SSE line decoder so playback behaves exactly like the network.

use crate::llm::recording::RecordedChunk;
use crate::llm::ApiError;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Response;
use std::time::{Duration, Instant};

/// Source of raw response bytes
#[async_trait]
pub trait ChunkStream: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Real HTTP response chunk stream
pub struct HttpChunkStream {
    response: Response,
}

impl HttpChunkStream {
    pub fn new(response: Response) -> Self {
        Self { response }
    }
}

#[async_trait]
impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.response.chunk().await {
            Ok(Some(chunk)) => Ok(Some(chunk.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(ApiError::NetworkError(format!("HTTP chunk error: {e}")).into()),
        }
    }
}

/// Recorded chunk stream for playback
pub struct PlaybackChunkStream {
    chunks: Vec<RecordedChunk>,
    current_index: usize,
    start_time: Instant,
    fast_mode: bool,
}

impl PlaybackChunkStream {
    pub fn new(chunks: Vec<RecordedChunk>, fast_mode: bool) -> Self {
        Self {
            chunks,
            current_index: 0,
            start_time: Instant::now(),
            fast_mode,
        }
    }
}

#[async_trait]
impl ChunkStream for PlaybackChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(chunk) = self.chunks.get(self.current_index) else {
            return Ok(None);
        };

        if self.fast_mode {
            tokio::time::sleep(Duration::from_millis(5)).await;
        } else {
            let expected_time = Duration::from_millis(chunk.timestamp_ms);
            let elapsed = self.start_time.elapsed();
            if elapsed < expected_time {
                tokio::time::sleep(expected_time - elapsed).await;
            }
        }

        let sse_line = format!("data: {}\n", chunk.data);
        self.current_index += 1;

        Ok(Some(sse_line.into_bytes()))
    }
}

/// Splits a byte stream into SSE lines.
///
/// Network chunks may end in the middle of a line or of a multi-byte UTF-8
/// sequence, so bytes are held back until a newline arrives.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every non-empty line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=newline).collect();
            if let Some(line) = decode_line(&raw[..raw.len() - 1])? {
                lines.push(line);
            }
        }
        Ok(lines)
    }

    /// Return the unterminated tail left at end of stream, if any
    pub fn finish(&mut self) -> Result<Option<String>> {
        let raw = std::mem::take(&mut self.pending);
        decode_line(&raw)
    }
}

fn decode_line(raw: &[u8]) -> Result<Option<String>> {
    let line = std::str::from_utf8(raw)?.trim_end_matches('\r');
    if line.is_empty() {
        Ok(None)
    } else {
        Ok(Some(line.to_string()))
    }
}
