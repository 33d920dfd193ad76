//! Lesson text rendering pipeline
//!
//! Shared protection pipeline: strip sentinels, protect code, protect
//! tables, normalize macros, split math segments into escaped placeholder
//! keys, run the prose heuristics, render the prose, restore placeholders.
//! Two render modes sit on top:
//!
//! - [`format_html`] renders prose as a Markdown document (paragraphs,
//!   block structure) for one-shot rendering of a complete lesson.
//! - [`format_fragment`] renders prose as composable inline HTML, so that
//!   concatenating the renders of consecutive slices equals the render of
//!   the whole. The streaming formatter flushes through this mode.
//!
//! Both are pure: same input, same output, no side effects.

use once_cell::sync::Lazy;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;

use crate::config::FormatConfig;
use crate::escape::escape_html_text;
use crate::math::{self, split_segments};
use crate::placeholder::{strip_sentinels, PlaceholderMap};
use crate::table::{protect_code, protect_tables};

/// Render lesson text to document HTML, math left as delimited LaTeX.
pub fn format_html(text: &str, config: &FormatConfig) -> String {
    let (work, placeholders) = prepare(text, config);
    let html = render_document(&work);
    placeholders.restore(&html)
}

/// Render lesson text to composable inline HTML.
pub fn format_fragment(text: &str, config: &FormatConfig) -> String {
    format_fragment_at(text, true, config)
}

/// Fragment render for a slice that may start mid-line.
pub(crate) fn format_fragment_at(text: &str, at_line_start: bool, config: &FormatConfig) -> String {
    let (work, placeholders) = prepare(text, config);
    let html = render_fragment_lines(&work, at_line_start);
    placeholders.restore(&html)
}

/// Run the protection pipeline, returning the working text (prose plus
/// placeholder keys) and the map needed to restore it after rendering.
fn prepare(text: &str, config: &FormatConfig) -> (String, PlaceholderMap) {
    let mut placeholders = PlaceholderMap::new();
    let text = strip_sentinels(text);
    let text = protect_code(&text, &mut placeholders);
    let text = protect_tables(&text, &config.tables, &mut placeholders);
    let text = math::normalize_macros(&text, &config.heuristics);

    let mut work = String::with_capacity(text.len());
    for segment in split_segments(&text) {
        if segment.is_math {
            work.push_str(&placeholders.insert(escape_html_text(&segment.text)));
        } else {
            let mut prose = segment.text;
            if config.heuristics.promote_scripts {
                prose = math::promote_scripts(&prose, &mut placeholders);
            }
            if config.heuristics.wrap_bare_macros {
                prose = math::wrap_bare_macros(&prose, &mut placeholders);
            }
            work.push_str(&prose);
        }
    }
    (work, placeholders)
}

fn render_document(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(text, options);
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

fn render_fragment_lines(text: &str, at_line_start: bool) -> String {
    let mut out = String::with_capacity(text.len() * 3 / 2);
    let mut line_start = at_line_start;
    for piece in text.split_inclusive('\n') {
        let (line, had_newline) = match piece.strip_suffix('\n') {
            Some(l) => (l.strip_suffix('\r').unwrap_or(l), true),
            None => (piece, false),
        };
        let starts_line = line_start;
        line_start = had_newline;

        if starts_line {
            if let Some((level, rest)) = parse_heading(line) {
                out.push_str(&format!("<h{level}>{}</h{level}>", render_inline(rest)));
                continue;
            }
            if let Some(item) = parse_list_item(line) {
                out.push_str(&format!("<li>{}</li>", render_inline(item)));
                continue;
            }
        }
        if line.is_empty() {
            if had_newline {
                out.push_str("<br>");
            }
            continue;
        }
        out.push_str(&render_inline(line));
        if had_newline {
            out.push_str("<br>");
        }
    }
    out
}

fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = line[hashes..].strip_prefix(' ')?;
    Some((hashes, rest.trim_start()))
}

fn parse_list_item(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    for marker in ["- ", "* ", "+ "] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return Some(rest);
        }
    }
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = trimmed[digits..].strip_prefix(". ") {
            return Some(rest);
        }
    }
    None
}

static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("bold pattern"));
static ITALIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\s][^*]*)\*").expect("italic pattern"));
static STRIKE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~([^~]+)~~").expect("strike pattern"));

fn render_inline(text: &str) -> String {
    let escaped = escape_html_text(text);
    let bold = BOLD_RE.replace_all(&escaped, "<strong>$1</strong>");
    let italic = ITALIC_RE.replace_all(&bold, "<em>$1</em>");
    STRIKE_RE.replace_all(&italic, "<del>$1</del>").into_owned()
}
