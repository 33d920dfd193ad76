//! Streaming pipelines feeding the rendering core
//!
//! The lesson pipeline pushes model chunks through the incremental
//! formatter and hands flushed HTML to a sink; the quiz pipeline
//! accumulates the raw buffer and surfaces each question as soon as it
//! parses. On a broken stream both fall back to one non-streaming retry;
//! usage accounting is log-and-continue and never blocks a response.

use anyhow::{Context, Result};
use futures::StreamExt;

use lernex_core::{
    extract_questions, FlushChunk, FormatConfig, QuizFeed, QuizQuestion, StreamingFormatter,
};

use crate::client::{ChatMessage, LlmClient, Usage};
use crate::retry::{retry, RetryConfig};

/// Events handed to a lesson sink.
pub enum LessonEvent<'a> {
    /// Freshly flushed HTML, append to the document
    Chunk(&'a FlushChunk),
    /// The stream broke and the content was re-rendered from a
    /// non-streaming retry; previously appended HTML is stale
    Restarted,
}

/// Final result of a lesson render.
pub struct LessonRender {
    pub html: String,
    pub chunks: usize,
}

/// Stream a lesson completion through the incremental formatter.
pub async fn stream_lesson(
    client: &LlmClient,
    retry_config: &RetryConfig,
    messages: &[ChatMessage],
    config: &FormatConfig,
    mut sink: impl FnMut(LessonEvent<'_>),
) -> Result<LessonRender> {
    let mut formatter = StreamingFormatter::new(config.clone());
    let mut chunks = 0usize;

    let broken = match client.complete_stream(messages).await {
        Ok(mut stream) => {
            let mut broken = false;
            while let Some(item) = stream.next().await {
                match item {
                    Ok(token) => {
                        for chunk in formatter.append(&token) {
                            chunks += 1;
                            sink(LessonEvent::Chunk(&chunk));
                        }
                    }
                    Err(e) => {
                        log::warn!("lesson stream aborted, falling back to non-streaming: {e:#}");
                        broken = true;
                        break;
                    }
                }
            }
            broken
        }
        Err(e) => {
            log::warn!("lesson stream setup failed, falling back to non-streaming: {e:#}");
            true
        }
    };

    if broken {
        let completion = retry(retry_config, || client.complete(messages))
            .await
            .context("Non-streaming fallback failed")?;
        note_usage(completion.usage.as_ref());
        sink(LessonEvent::Restarted);
        chunks = 0;
        for chunk in formatter.replace(&completion.text) {
            chunks += 1;
            sink(LessonEvent::Chunk(&chunk));
        }
    }

    if let Some(chunk) = formatter.finalize() {
        chunks += 1;
        sink(LessonEvent::Chunk(&chunk));
    }

    Ok(LessonRender {
        html: formatter.rendered_html().to_string(),
        chunks,
    })
}

/// Stream a quiz completion, yielding each question once it is complete.
pub async fn stream_quiz(
    client: &LlmClient,
    retry_config: &RetryConfig,
    messages: &[ChatMessage],
    mut sink: impl FnMut(&QuizQuestion),
) -> Result<Vec<QuizQuestion>> {
    let mut feed = QuizFeed::new();
    let mut buffer = String::new();
    let mut collected = Vec::new();

    let broken = match client.complete_stream(messages).await {
        Ok(mut stream) => {
            let mut broken = false;
            while let Some(item) = stream.next().await {
                match item {
                    Ok(token) => {
                        buffer.push_str(&token);
                        for question in feed.poll(&buffer) {
                            sink(&question);
                            collected.push(question);
                        }
                    }
                    Err(e) => {
                        log::warn!("quiz stream aborted, falling back to non-streaming: {e:#}");
                        broken = true;
                        break;
                    }
                }
            }
            broken
        }
        Err(e) => {
            log::warn!("quiz stream setup failed, falling back to non-streaming: {e:#}");
            true
        }
    };

    if broken {
        let completion = retry(retry_config, || client.complete(messages))
            .await
            .context("Non-streaming quiz fallback failed")?;
        note_usage(completion.usage.as_ref());
        buffer = completion.text;
        for question in feed.poll(&buffer) {
            sink(&question);
            collected.push(question);
        }
    }

    if collected.is_empty() && extract_questions(&buffer).is_none() {
        anyhow::bail!("model response contained no parseable questions");
    }
    Ok(collected)
}

fn note_usage(usage: Option<&Usage>) {
    match usage {
        Some(u) => log::info!(
            "llm usage: prompt={} completion={} total={}",
            u.prompt_tokens,
            u.completion_tokens,
            u.total_tokens
        ),
        None => log::debug!("no usage block in response"),
    }
}
