//! OpenAI-compatible chat-completions client
//!
//! Supports both a plain JSON completion and SSE streaming (`data: `
//! lines, `[DONE]` terminator). Streamed chunks are yielded in arrival
//! order, one at a time; undecodable stream lines are skipped, not fatal.

use anyhow::{Context, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageBody,
}

#[derive(Deserialize)]
struct MessageBody {
    content: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// A finished non-streaming completion.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: Option<Usage>,
}

pub struct LlmClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl LlmClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, config })
    }

    fn request(&self, messages: &[ChatMessage], stream: bool) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut builder = self.http.post(url).json(&ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream,
        });
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    /// Single non-streaming completion.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        let response = self
            .request(messages, false)
            .send()
            .await
            .context("Failed to send chat request")?
            .error_for_status()
            .context("Chat request was rejected")?;

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to decode chat response")?;
        let text = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(Completion {
            text,
            usage: body.usage,
        })
    }

    /// Streaming completion; the returned stream yields content deltas in
    /// order as they arrive.
    pub async fn complete_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<BoxStream<'static, Result<String>>> {
        let response = self
            .request(messages, true)
            .send()
            .await
            .context("Failed to send streaming chat request")?
            .error_for_status()
            .context("Streaming chat request was rejected")?;

        let mut body = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut lines = SseLineBuffer::default();
            while let Some(piece) = body.next().await {
                let piece = match piece {
                    Ok(p) => p,
                    Err(e) => {
                        yield Err(anyhow::Error::new(e).context("Stream read failed"));
                        return;
                    }
                };
                for decoded in lines.push_bytes(&piece) {
                    match decoded {
                        SseLine::Content(text) => yield Ok(text),
                        SseLine::Done => return,
                        SseLine::Skip => {}
                    }
                }
            }
        };
        Ok(stream.boxed())
    }
}

/// Reassembles SSE lines from raw network reads. Lines are split on the
/// byte level before any UTF-8 decoding, so a multi-byte character that
/// straddles two reads stays buffered until its remaining bytes arrive.
#[derive(Default)]
pub(crate) struct SseLineBuffer {
    buf: Vec<u8>,
}

impl SseLineBuffer {
    pub(crate) fn push_bytes(&mut self, bytes: &[u8]) -> Vec<SseLine> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let decoded = decode_sse_line(line.trim());
            if !matches!(decoded, SseLine::Skip) {
                lines.push(decoded);
            }
        }
        lines
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum SseLine {
    Content(String),
    Done,
    Skip,
}

pub(crate) fn decode_sse_line(line: &str) -> SseLine {
    let Some(payload) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let payload = payload.trim_start();
    if payload == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => {
            match chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
            {
                Some(text) if !text.is_empty() => SseLine::Content(text),
                _ => SseLine::Skip,
            }
        }
        Err(e) => {
            log::debug!("skipping undecodable stream line: {}", e);
            SseLine::Skip
        }
    }
}
