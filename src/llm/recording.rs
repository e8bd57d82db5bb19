use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::debug;

/// Recording session that contains the original request and all chunks
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecordingSession {
    /// The request body that was sent
    pub request: serde_json::Value,
    /// Timestamp of when the recording was started
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Data parts of the SSE lines as received from the API
    pub chunks: Vec<RecordedChunk>,
}

/// Single recorded chunk with timing info
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RecordedChunk {
    /// Raw content of the data part of the SSE line
    pub data: String,
    /// Milliseconds since recording start
    pub timestamp_ms: u64,
}

struct ActiveRecording {
    session: RecordingSession,
    started: Instant,
}

/// Records streamed responses into a JSON array file, one entry per reply
#[derive(Clone)]
pub struct APIRecorder {
    file_path: PathBuf,
    active: Arc<Mutex<Option<ActiveRecording>>>,
}

impl APIRecorder {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            file_path: path.as_ref().to_path_buf(),
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Start a new recording session, dropping any unfinished one
    pub fn start_recording(&self, request: serde_json::Value) -> Result<()> {
        let mut active = self.lock()?;
        *active = Some(ActiveRecording {
            session: RecordingSession {
                request,
                timestamp: chrono::Utc::now(),
                chunks: Vec::new(),
            },
            started: Instant::now(),
        });
        Ok(())
    }

    pub fn record_chunk(&self, data: &str) -> Result<()> {
        let mut active = self.lock()?;
        if let Some(recording) = active.as_mut() {
            let timestamp_ms = recording.started.elapsed().as_millis() as u64;
            recording.session.chunks.push(RecordedChunk {
                data: data.to_string(),
                timestamp_ms,
            });
        }
        Ok(())
    }

    /// Finish the current session and append it to the recording file
    pub fn end_recording(&self) -> Result<()> {
        let Some(recording) = self.lock()?.take() else {
            return Ok(());
        };

        let mut sessions = if self.file_path.exists() {
            read_sessions(&self.file_path)?
        } else {
            Vec::new()
        };
        sessions.push(recording.session);

        let json = serde_json::to_string_pretty(&sessions)?;
        std::fs::write(&self.file_path, json).with_context(|| {
            format!(
                "Failed to write recording file {}",
                self.file_path.display()
            )
        })?;
        debug!(
            "Recorded session #{} to {}",
            sessions.len(),
            self.file_path.display()
        );
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<ActiveRecording>>> {
        self.active
            .lock()
            .map_err(|_| anyhow!("Recorder state lock poisoned"))
    }
}

fn read_sessions(path: &Path) -> Result<Vec<RecordingSession>> {
    let contents = std::fs::read_to_string(path).context("Failed to read recording file")?;
    serde_json::from_str(&contents).context("Failed to parse recording file")
}

/// Recorded sessions handed out in order, one per streamed reply
#[derive(Clone)]
pub struct PlaybackState {
    sessions: Arc<Vec<RecordingSession>>,
    index: Arc<Mutex<usize>>,
    pub fast: bool,
}

impl PlaybackState {
    pub fn from_file<P: AsRef<Path>>(path: P, fast: bool) -> Result<Self> {
        let sessions = read_sessions(path.as_ref())?;
        Ok(Self {
            sessions: Arc::new(sessions),
            index: Arc::new(Mutex::new(0)),
            fast,
        })
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Take the next session, or None if exhausted
    pub fn next_session(&self) -> Option<RecordingSession> {
        let mut index = self.index.lock().unwrap_or_else(|e| e.into_inner());
        let session = self.sessions.get(*index).cloned()?;
        *index += 1;
        Some(session)
    }
}
