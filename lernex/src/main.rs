//! Lernex - AI micro-lesson rendering toolkit

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lernex_core::{extract_questions, format_html, FormatConfig, StreamingFormatter};
use lernex_stream::{
    stream_lesson, stream_quiz, ChatMessage, ClientConfig, LessonEvent, LlmClient, RetryConfig,
};
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;

/// Render AI lesson content to HTML
#[derive(Parser, Debug)]
#[command(name = "lernex")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a Markdown/LaTeX lesson to document HTML
    Format {
        /// Input file; stdin when omitted
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
    /// Incrementally render stdin, emitting HTML chunks as they flush
    Stream,
    /// Extract quiz questions from possibly-truncated JSON
    Quiz {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Generate and render content with a hosted model
    Generate {
        /// User prompt for the lesson or quiz
        #[arg(long)]
        prompt: String,
        /// Ask for quiz questions instead of a lesson
        #[arg(long)]
        quiz: bool,
        /// OpenAI-compatible endpoint base URL
        #[arg(long, default_value = "https://api.openai.com/v1")]
        base_url: String,
        /// Model identifier
        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Load configuration
    let config = FormatConfig::load().context("Failed to load configuration")?;

    match args.command {
        Command::Format { file } => run_format(file, &config),
        Command::Stream => run_stream(&config),
        Command::Quiz { file } => run_quiz(&file),
        Command::Generate {
            prompt,
            quiz,
            base_url,
            model,
        } => {
            let runtime =
                tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            runtime.block_on(run_generate(prompt, quiz, base_url, model, &config))
        }
    }
}

fn read_input(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn run_format(file: Option<PathBuf>, config: &FormatConfig) -> Result<()> {
    let input = read_input(file.as_ref())?;
    print!("{}", format_html(&input, config));
    Ok(())
}

fn run_stream(config: &FormatConfig) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut formatter = StreamingFormatter::new(config.clone());
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        for chunk in formatter.append(&format!("{line}\n")) {
            writeln!(stdout, "{}", chunk.html)?;
        }
    }
    if let Some(chunk) = formatter.finalize() {
        writeln!(stdout, "{}", chunk.html)?;
    }
    Ok(())
}

fn run_quiz(file: &PathBuf) -> Result<()> {
    let input = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read input file: {}", file.display()))?;
    let questions =
        extract_questions(&input).context("No complete questions could be extracted")?;
    let mut stdout = std::io::stdout();
    for question in &questions {
        let json = serde_json::to_string(question).context("Failed to serialize question")?;
        writeln!(stdout, "{json}")?;
    }
    Ok(())
}

async fn run_generate(
    prompt: String,
    quiz: bool,
    base_url: String,
    model: String,
    config: &FormatConfig,
) -> Result<()> {
    let client = LlmClient::new(ClientConfig {
        base_url,
        model,
        api_key: std::env::var("LERNEX_API_KEY").ok(),
        ..Default::default()
    })?;
    let retry_config = RetryConfig::default();
    let mut stdout = std::io::stdout();

    if quiz {
        let messages = [
            ChatMessage::system(
                "Return a JSON object {\"questions\": [...]} of multiple-choice questions \
                 with prompt, choices, correctIndex and explanation fields.",
            ),
            ChatMessage::user(prompt),
        ];
        stream_quiz(&client, &retry_config, &messages, |question| {
            if let Ok(json) = serde_json::to_string(question) {
                let _ = writeln!(stdout, "{json}");
            }
        })
        .await?;
    } else {
        let messages = [
            ChatMessage::system(
                "Write a concise micro-lesson in Markdown with LaTeX math in \\( \\) and \
                 \\[ \\] delimiters.",
            ),
            ChatMessage::user(prompt),
        ];
        stream_lesson(&client, &retry_config, &messages, config, |event| match event {
            LessonEvent::Chunk(chunk) => {
                let _ = writeln!(stdout, "{}", chunk.html);
            }
            LessonEvent::Restarted => {
                log::warn!("stream restarted; earlier output was replaced");
            }
        })
        .await?;
    }
    Ok(())
}
