use crate::llm::{
    recording::{APIRecorder, PlaybackState},
    streaming::{ChunkStream, HttpChunkStream, PlaybackChunkStream, SseLineBuffer},
    types::*,
    utils, CompletionProvider, TextStream,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use tracing::{debug, trace, warn};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Serialize)]
struct GeminiRequest {
    system_instruction: SystemInstruction,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Parts,
}

#[derive(Debug, Serialize)]
struct Parts {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsageMetadata>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    code: Option<i32>,
}

/// Sampling parameters sent with every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_output_tokens: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 8192,
        }
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    generation: GenerationSettings,
    recorder: Option<APIRecorder>,
}

impl GeminiClient {
    pub fn default_base_url() -> String {
        "https://generativelanguage.googleapis.com/v1beta".to_string()
    }

    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url,
            generation: GenerationSettings::default(),
            recorder: None,
        }
    }

    pub fn with_generation(mut self, generation: GenerationSettings) -> Self {
        self.generation = generation;
        self
    }

    /// Record every streamed reply to the given file
    pub fn with_recorder<P: AsRef<Path>>(mut self, recording_path: P) -> Self {
        self.recorder = Some(APIRecorder::new(recording_path));
        self
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent",
            self.base_url, self.model
        )
    }

    fn convert_message(message: &Message) -> GeminiContent {
        let role = Some(match message.role {
            MessageRole::User => "user".to_string(),
            MessageRole::Assistant => "model".to_string(),
        });

        let parts = match &message.content {
            MessageContent::Text(text) => vec![text_part(text)],
            MessageContent::Structured(blocks) => blocks
                .iter()
                .map(|block| match block {
                    ContentBlock::Text { text } => text_part(text),
                    ContentBlock::Audio { media_type, data } => GeminiPart {
                        text: None,
                        inline_data: Some(GeminiInlineData {
                            mime_type: media_type.clone(),
                            data: data.clone(),
                        }),
                        thought: None,
                    },
                })
                .collect(),
        };

        GeminiContent { role, parts }
    }

    fn build_request(&self, session: &ChatSession, turn: &Message) -> GeminiRequest {
        let contents = session
            .history()
            .iter()
            .chain(std::iter::once(turn))
            .map(Self::convert_message)
            .collect();

        GeminiRequest {
            system_instruction: SystemInstruction {
                parts: Parts {
                    text: session.system_instruction().to_string(),
                },
            },
            contents,
            generation_config: GenerationConfig {
                temperature: self.generation.temperature,
                max_output_tokens: self.generation.max_output_tokens,
            },
        }
    }
}

fn text_part(text: &str) -> GeminiPart {
    GeminiPart {
        text: Some(text.to_string()),
        inline_data: None,
        thought: None,
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    fn start_session(&self, system_instruction: &str) -> Result<ChatSession> {
        if self.api_key.trim().is_empty() {
            return Err(ApiError::Authentication("no Gemini API key configured".to_string()).into());
        }
        debug!("Starting Gemini chat session with model {}", self.model);
        Ok(ChatSession::new(system_instruction))
    }

    async fn send_and_stream(
        &self,
        session: &ChatSession,
        turn: &Message,
    ) -> Result<Box<dyn TextStream>> {
        let request = self.build_request(session, turn);

        trace!(
            "Sending Gemini request to {}:\n{}",
            self.model,
            serde_json::to_string_pretty(&request)?
        );

        if let Some(recorder) = &self.recorder {
            recorder.start_recording(serde_json::to_value(&request)?)?;
        }

        let response = self
            .client
            .post(self.stream_url())
            .query(&[("key", self.api_key.as_str()), ("alt", "sse")])
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        let response = utils::check_response_error(response).await?;
        trace!("Response headers: {:?}", response.headers());

        Ok(Box::new(GeminiTextStream::new(
            Box::new(HttpChunkStream::new(response)),
            self.recorder.clone(),
        )))
    }
}

/// Replays recorded Gemini sessions instead of calling the API
pub struct PlaybackProvider {
    state: PlaybackState,
}

impl PlaybackProvider {
    pub fn new(state: PlaybackState) -> Self {
        Self { state }
    }

    pub fn from_file<P: AsRef<Path>>(path: P, fast: bool) -> Result<Self> {
        Ok(Self::new(PlaybackState::from_file(path, fast)?))
    }

    pub fn session_count(&self) -> usize {
        self.state.session_count()
    }
}

#[async_trait]
impl CompletionProvider for PlaybackProvider {
    fn start_session(&self, system_instruction: &str) -> Result<ChatSession> {
        debug!(
            "Starting playback session with {} recorded replies",
            self.state.session_count()
        );
        Ok(ChatSession::new(system_instruction))
    }

    async fn send_and_stream(
        &self,
        _session: &ChatSession,
        _turn: &Message,
    ) -> Result<Box<dyn TextStream>> {
        let session = self
            .state
            .next_session()
            .ok_or_else(|| anyhow!("No more recorded sessions to play back"))?;

        Ok(Box::new(GeminiTextStream::new(
            Box::new(PlaybackChunkStream::new(session.chunks, self.state.fast)),
            None,
        )))
    }
}

/// Decodes `streamGenerateContent` SSE output into reply text chunks
pub struct GeminiTextStream {
    source: Box<dyn ChunkStream>,
    lines: SseLineBuffer,
    ready_lines: VecDeque<String>,
    pending: VecDeque<String>,
    recorder: Option<APIRecorder>,
    usage: Option<GeminiUsageMetadata>,
    finished: bool,
}

impl GeminiTextStream {
    fn new(source: Box<dyn ChunkStream>, recorder: Option<APIRecorder>) -> Self {
        Self {
            source,
            lines: SseLineBuffer::new(),
            ready_lines: VecDeque::new(),
            pending: VecDeque::new(),
            recorder,
            usage: None,
            finished: false,
        }
    }

    fn process_sse_line(&mut self, line: &str) -> Result<()> {
        let Some(data) = line.strip_prefix("data:") else {
            // Comments and other SSE fields carry nothing we use
            if !line.starts_with(':') && !line.starts_with("event:") {
                warn!("Received line without 'data' prefix: {}", line);
            }
            return Ok(());
        };
        let data = data.trim_start();
        debug!("Received data line: {}", data);

        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.record_chunk(data) {
                warn!("Failed to record stream chunk: {:#}", e);
            }
        }

        let response: GeminiResponse = serde_json::from_str(data)
            .map_err(|e| ApiError::StreamDecode(format!("{e}: {data}")))?;

        if let Some(error) = response.error {
            return Err(utils::error_for_code(error.code, error.message).into());
        }

        if let Some(usage) = response.usage_metadata {
            self.usage = Some(usage);
        }

        if let Some(candidate) = response.candidates.into_iter().next() {
            if let Some(reason) = &candidate.finish_reason {
                trace!("Candidate finished: {}", reason);
            }
            for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
                if part.thought == Some(true) {
                    continue;
                }
                if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                    self.pending.push_back(text);
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(line) = self.lines.finish()? {
            self.process_sse_line(&line)?;
        }
        self.finished = true;

        // A recording failure never fails a delivered reply
        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.end_recording() {
                warn!("Failed to save recording: {:#}", e);
            }
        }
        if let Some(usage) = &self.usage {
            debug!(
                "Gemini usage - prompt tokens: {}, reply tokens: {}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }
        Ok(())
    }
}

#[async_trait]
impl TextStream for GeminiTextStream {
    async fn next_text(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(text) = self.pending.pop_front() {
                return Ok(Some(text));
            }
            // One line at a time so text decoded before a failing line is still delivered
            if let Some(line) = self.ready_lines.pop_front() {
                self.process_sse_line(&line)?;
                continue;
            }
            if self.finished {
                return Ok(None);
            }

            match self.source.next_chunk().await? {
                Some(bytes) => self.ready_lines.extend(self.lines.push(&bytes)?),
                None => self.finish()?,
            }
        }
    }
}
