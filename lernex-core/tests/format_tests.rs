//! End-to-end tests over the public rendering API

use std::io::Write;
use std::time::Duration;

use lernex_core::{
    extract_questions, format_fragment, format_html, FlushReason, FormatConfig, QuizFeed,
    StreamingFormatter, TypesetScheduler,
};

fn config() -> FormatConfig {
    FormatConfig::default()
}

#[test]
fn formatting_twice_is_byte_identical() {
    let input = "# Quadratics\n\nThe roots of \\(ax^2+bx+c\\) are $x = \\frac{-b \\pm \\sqrt{b^2-4ac}}{2a}$.\n\n| case | roots |\n|---|---|\n| b^2-4ac > 0 | two |\n\nIt costs $5.00 to run `solve()`.\n";
    let once = format_html(input, &config());
    let twice = format_html(input, &config());
    assert_eq!(once, twice);
}

#[test]
fn unbalanced_openers_are_closed_at_end() {
    let html = format_html("consider \\(x^2 + 1", &config());
    assert!(html.contains("\\(x^2 + 1\\)"));

    let html = format_html("consider \\[\\sum_i a_i", &config());
    assert!(html.contains("\\[\\sum_i a_i\\]"));

    let html = format_html("consider $e^x", &config());
    assert!(html.contains("\\(e^x\\)"));
}

#[test]
fn currency_amounts_never_open_math() {
    let html = format_html("Lunch was $5.00 and dinner $12, between $5-$10 each.", &config());
    assert!(html.contains("$5.00"));
    assert!(html.contains("$12"));
    assert!(html.contains("$5-$10"));
    assert!(!html.contains("\\("));
}

#[test]
fn pipe_table_renders_escaped_header_and_data_row() {
    let html = format_html("| a<b | c |\n|---|---|\n| 1 | 2 |", &config());
    assert!(html.contains("<th>a&lt;b</th><th>c</th>"));
    assert!(html.contains("<tbody><tr><td>1</td><td>2</td></tr></tbody>"));
}

#[test]
fn incremental_two_appends_equal_one_shot() {
    let mut formatter = StreamingFormatter::new(config());
    let mut html = String::new();
    for chunk in formatter.append("The answer is \\(x") {
        html.push_str(&chunk.html);
    }
    for chunk in formatter.append("^2\\) done.") {
        html.push_str(&chunk.html);
    }
    if let Some(chunk) = formatter.finalize() {
        html.push_str(&chunk.html);
    }
    assert_eq!(html, format_fragment("The answer is \\(x^2\\) done.", &config()));
}

#[test]
fn incremental_token_by_token_equals_one_shot() {
    let full = "## Derivatives\nThe slope of \\(f(x) = x^2\\) is $2x$. Try it! Costs $0 to check.\n- point one\n- point two\n";
    let mut formatter = StreamingFormatter::new(config());
    let mut html = String::new();
    let mut rest = full;
    // Simulate ragged token arrival
    for size in [3usize, 7, 2, 11, 5].iter().cycle() {
        if rest.is_empty() {
            break;
        }
        let take = (*size).min(rest.len());
        let mut cut = take;
        while !rest.is_char_boundary(cut) {
            cut += 1;
        }
        let (chunk, tail) = rest.split_at(cut);
        rest = tail;
        for flushed in formatter.append(chunk) {
            html.push_str(&flushed.html);
        }
    }
    if let Some(chunk) = formatter.finalize() {
        html.push_str(&chunk.html);
    }
    assert_eq!(html, format_fragment(full, &config()));
}

#[test]
fn incremental_table_rows_equal_one_shot() {
    let mut formatter = StreamingFormatter::new(config());
    let mut html = String::new();
    for chunk in ["Scores below.\n", "| name | pts. |\n|---|---|\n", "| ada | 3 |\n", "Done.\n"] {
        for flushed in formatter.append(chunk) {
            html.push_str(&flushed.html);
        }
    }
    if let Some(chunk) = formatter.finalize() {
        html.push_str(&chunk.html);
    }
    let full = "Scores below.\n| name | pts. |\n|---|---|\n| ada | 3 |\nDone.\n";
    assert_eq!(html, format_fragment(full, &config()));
    assert_eq!(html.matches("<table>").count(), 1);
    assert!(html.contains("<td>ada</td>"));
}

#[test]
fn open_formula_is_held_until_it_closes() {
    let mut formatter = StreamingFormatter::new(config());
    assert!(formatter.append("Bernoulli says \\(p(1-p)").is_empty());
    let chunks = formatter.append("\\) bounds variance. More text");
    assert!(!chunks.is_empty());
    assert_eq!(chunks[0].reason, FlushReason::MathClosed);
    assert!(chunks[0].html.contains("\\(p(1-p)\\)"));
}

#[test]
fn quiz_partial_buffer_yields_first_question_only() {
    let buffer = "{\"questions\": [{\"prompt\":\"2+2?\",\"choices\":[\"3\",\"4\"],\"correctIndex\":1,\"explanation\":\"Basic addition.\"},{\"prompt\":\"3+3?\",\"choices\"";
    let questions = extract_questions(buffer).expect("first question is complete");
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].prompt, "2+2?");
    assert_eq!(questions[0].correct_index, 1);
}

#[test]
fn quiz_complete_and_empty_documents() {
    let complete = "{\"questions\": [{\"prompt\":\"2+2?\",\"choices\":[\"3\",\"4\"],\"correctIndex\":1,\"explanation\":\"Basic addition.\"}]}";
    assert_eq!(extract_questions(complete).map(|q| q.len()), Some(1));
    assert_eq!(extract_questions("{\"questions\": []}"), Some(Vec::new()));
    assert_eq!(extract_questions("{\"quest"), None);
}

#[test]
fn quiz_feed_over_chunked_arrival() {
    let full = "{\"questions\": [{\"prompt\":\"2+2?\",\"choices\":[\"3\",\"4\"],\"correctIndex\":1,\"explanation\":\"Basic addition.\"},{\"prompt\":\"3+3?\",\"choices\":[\"5\",\"6\"],\"correctIndex\":1,\"explanation\":\"More addition.\"}]}";
    let mut feed = QuizFeed::new();
    let mut buffer = String::new();
    let mut seen = Vec::new();
    for chunk in full.as_bytes().chunks(9) {
        buffer.push_str(std::str::from_utf8(chunk).expect("ascii fixture"));
        for question in feed.poll(&buffer) {
            seen.push(question.prompt.clone());
        }
    }
    assert_eq!(seen, vec!["2+2?", "3+3?"]);
}

#[test]
fn flushed_chunks_drive_a_coalesced_typeset() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let scheduler = TypesetScheduler::spawn(Duration::from_millis(20), move |req| {
        let _ = tx.send(req);
    });

    let mut formatter = StreamingFormatter::new(config());
    let mut last_generation = 0;
    for sentence in ["One done. ", "Two done. ", "Three done. "] {
        for chunk in formatter.append(sentence) {
            last_generation = scheduler.schedule(chunk.html);
        }
    }

    std::thread::sleep(Duration::from_millis(150));
    let mut fired = Vec::new();
    while let Ok(req) = rx.try_recv() {
        fired.push(req);
    }
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].generation, last_generation);
}

#[test]
fn config_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(b"[stream]\nflush_threshold = 96\n")
        .expect("write config");
    let loaded = FormatConfig::load_from(file.path()).expect("parse config");
    assert_eq!(loaded.stream.flush_threshold, 96);
    assert_eq!(loaded.stream.typeset_debounce_ms, 40);
}
