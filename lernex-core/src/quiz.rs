//! Streaming quiz-question extraction from partially-received JSON
//!
//! A quiz response is a JSON document `{ "questions": [...] }` that
//! arrives incrementally. Completed questions should surface before the
//! document is fully received, so each call rescans the whole buffer:
//! a whole-document parse first, then a fallback that cuts the
//! `questions` array at the last fully-balanced object. No state is kept
//! between calls.

use serde::{Deserialize, Serialize};

/// One extracted multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub prompt: String,
    pub choices: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
}

#[derive(Deserialize)]
struct QuizDocument {
    questions: Vec<QuizQuestion>,
}

/// Extract every fully-received question from `buffer`.
///
/// Returns `None` when no complete question can be recovered yet; the
/// caller simply retries on the next chunk. A complete document with an
/// empty `questions` array yields `Some(empty)`, never `None`.
pub fn extract_questions(buffer: &str) -> Option<Vec<QuizQuestion>> {
    if let Ok(doc) = serde_json::from_str::<QuizDocument>(buffer) {
        return Some(doc.questions);
    }
    extract_partial(buffer)
}

/// Cut the `questions` array at the last balanced top-level object and
/// parse that prefix. Braces inside strings are skipped via quote and
/// escape tracking.
fn extract_partial(buffer: &str) -> Option<Vec<QuizQuestion>> {
    let marker = buffer.find("\"questions\"")?;
    let bracket = marker + buffer[marker..].find('[')?;

    let bytes = buffer.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut last_end: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate().skip(bracket + 1) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    last_end = Some(i);
                }
                if depth < 0 {
                    break;
                }
            }
            b']' if depth == 0 => break,
            _ => {}
        }
    }

    let end = last_end?;
    let mut candidate = String::with_capacity(end - bracket + 2);
    candidate.push('[');
    candidate.push_str(&buffer[bracket + 1..=end]);
    candidate.push(']');
    serde_json::from_str::<Vec<QuizQuestion>>(&candidate).ok()
}

/// Cursor over [`extract_questions`] so each completed question is
/// yielded exactly once as the buffer grows.
#[derive(Debug, Default)]
pub struct QuizFeed {
    emitted: usize,
}

impl QuizFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Questions completed since the previous poll.
    pub fn poll(&mut self, buffer: &str) -> Vec<QuizQuestion> {
        let questions = extract_questions(buffer).unwrap_or_default();
        if questions.len() > self.emitted {
            let fresh = questions[self.emitted..].to_vec();
            self.emitted = questions.len();
            fresh
        } else {
            Vec::new()
        }
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }
}
