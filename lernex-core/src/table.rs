//! Table and code protection
//!
//! Pipe tables, LaTeX `tabular` blocks, fenced code and inline code are
//! rendered to HTML and swapped for placeholder keys before the math scan
//! runs, so `$`, `|` and backslashes inside cells or code cannot confuse
//! the top-level delimiter tracking. Cell and code contents are escaped.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::TableConfig;
use crate::escape::{escape_html_text, push_escaped};
use crate::placeholder::PlaceholderMap;

/// Replace fenced code blocks and inline code spans with placeholders.
pub fn protect_code(text: &str, placeholders: &mut PlaceholderMap) -> String {
    struct Fence {
        ch: char,
        len: usize,
        lang: String,
        body: String,
    }

    let mut out = String::with_capacity(text.len());
    let mut fence: Option<Fence> = None;

    for piece in text.split_inclusive('\n') {
        let (line, newline) = match piece.strip_suffix('\n') {
            Some(l) => (l, "\n"),
            None => (piece, ""),
        };

        match fence.take() {
            Some(mut state) => {
                if is_closing_fence(line, state.ch, state.len) {
                    out.push_str(&placeholders.insert(render_code_block(&state.lang, &state.body)));
                    out.push_str(newline);
                } else {
                    state.body.push_str(line);
                    state.body.push('\n');
                    fence = Some(state);
                }
            }
            None => match parse_fence(line) {
                Some((ch, len, lang)) => {
                    fence = Some(Fence {
                        ch,
                        len,
                        lang,
                        body: String::new(),
                    });
                }
                None => {
                    out.push_str(&protect_inline_code(line, placeholders));
                    out.push_str(newline);
                }
            },
        }
    }

    // A fence still open at end-of-input protects everything it swallowed
    if let Some(state) = fence {
        out.push_str(&placeholders.insert(render_code_block(&state.lang, &state.body)));
    }

    out
}

pub(crate) fn parse_fence(line: &str) -> Option<(char, usize, String)> {
    let trimmed = line.trim_start();
    let ch = trimmed.chars().next()?;
    if ch != '`' && ch != '~' {
        return None;
    }
    let len = trimmed.chars().take_while(|&c| c == ch).count();
    if len < 3 {
        return None;
    }
    let info = trimmed[len..].trim();
    if info.contains(ch) {
        return None;
    }
    Some((ch, len, info.to_string()))
}

pub(crate) fn is_closing_fence(line: &str, ch: char, len: usize) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= len && trimmed.chars().all(|c| c == ch)
}

fn render_code_block(lang: &str, body: &str) -> String {
    let mut html = String::with_capacity(body.len() + 40);
    if lang.is_empty() {
        html.push_str("<pre><code>");
    } else {
        html.push_str("<pre><code class=\"language-");
        push_escaped(&mut html, lang);
        html.push_str("\">");
    }
    push_escaped(&mut html, body);
    html.push_str("</code></pre>");
    html
}

pub(crate) static INLINE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`\n]+)`").expect("inline code pattern"));

fn protect_inline_code(line: &str, placeholders: &mut PlaceholderMap) -> String {
    INLINE_CODE_RE
        .replace_all(line, |caps: &Captures| {
            placeholders.insert(format!("<code>{}</code>", escape_html_text(&caps[1])))
        })
        .into_owned()
}

/// Replace pipe tables and `tabular` environments with placeholders.
pub fn protect_tables(
    text: &str,
    tables: &TableConfig,
    placeholders: &mut PlaceholderMap,
) -> String {
    let mut out = if tables.latex_tabular {
        protect_tabular(text, placeholders)
    } else {
        text.to_string()
    };
    if tables.pipe_tables {
        out = protect_pipe_tables(&out, placeholders);
    }
    out
}

static TABULAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\\begin\{tabular\}(?:\{[^{}]*\})?(.*?)\\end\{tabular\}")
        .expect("tabular pattern")
});

fn protect_tabular(text: &str, placeholders: &mut PlaceholderMap) -> String {
    TABULAR_RE
        .replace_all(text, |caps: &Captures| {
            let rows: Vec<Vec<String>> = caps[1]
                .split("\\\\")
                .map(|row| row.replace("\\hline", ""))
                .filter(|row| !row.trim().is_empty())
                .map(|row| row.split('&').map(|cell| cell.trim().to_string()).collect())
                .collect();
            placeholders.insert(render_table(None, &rows))
        })
        .into_owned()
}

fn protect_pipe_tables(text: &str, placeholders: &mut PlaceholderMap) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if looks_like_row(lines[i]) && i + 1 < lines.len() && is_separator(lines[i + 1]) {
            let header = split_cells(lines[i]);
            let mut rows = Vec::new();
            let mut j = i + 2;
            while j < lines.len() && looks_like_row(lines[j]) {
                rows.push(split_cells(lines[j]));
                j += 1;
            }
            out.push(placeholders.insert(render_table(Some(&header), &rows)));
            i = j;
        } else {
            out.push(lines[i].to_string());
            i += 1;
        }
    }
    out.join("\n")
}

pub(crate) fn looks_like_row(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.contains('|')
}

pub(crate) fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty()
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);
    trimmed.split('|').map(|cell| cell.trim().to_string()).collect()
}

fn render_table(header: Option<&[String]>, rows: &[Vec<String>]) -> String {
    let mut html = String::from("<table>");
    if let Some(cells) = header {
        html.push_str("<thead><tr>");
        for cell in cells {
            html.push_str("<th>");
            push_escaped(&mut html, cell);
            html.push_str("</th>");
        }
        html.push_str("</tr></thead>");
    }
    html.push_str("<tbody>");
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str("<td>");
            push_escaped(&mut html, cell);
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_table_renders_header_and_data_row() {
        let mut map = PlaceholderMap::new();
        let out = protect_tables(
            "| a | b |\n|---|---|\n| 1 | 2 |",
            &TableConfig::default(),
            &mut map,
        );
        assert_eq!(map.len(), 1);
        let html = map.restore(&out);
        assert!(html.contains("<th>a</th><th>b</th>"));
        assert!(html.contains("<tbody><tr><td>1</td><td>2</td></tr></tbody>"));
    }

    #[test]
    fn pipe_table_cells_are_escaped() {
        let mut map = PlaceholderMap::new();
        let out = protect_tables(
            "| <b>x</b> | y |\n|---|---|\n| a & b | c |",
            &TableConfig::default(),
            &mut map,
        );
        let html = map.restore(&out);
        assert!(html.contains("<th>&lt;b&gt;x&lt;/b&gt;</th>"));
        assert!(html.contains("<td>a &amp; b</td>"));
    }

    #[test]
    fn surrounding_prose_is_preserved() {
        let mut map = PlaceholderMap::new();
        let out = protect_tables(
            "before\n| a | b |\n|---|---|\n| 1 | 2 |\nafter",
            &TableConfig::default(),
            &mut map,
        );
        assert!(out.starts_with("before\n"));
        assert!(out.ends_with("\nafter"));
    }

    #[test]
    fn tabular_environment_becomes_table() {
        let mut map = PlaceholderMap::new();
        let out = protect_tables(
            "\\begin{tabular}{cc} a & b \\\\ c & d \\end{tabular}",
            &TableConfig::default(),
            &mut map,
        );
        let html = map.restore(&out);
        assert!(html.contains("<tr><td>a</td><td>b</td></tr>"));
        assert!(html.contains("<tr><td>c</td><td>d</td></tr>"));
    }

    #[test]
    fn fenced_code_is_protected_and_escaped() {
        let mut map = PlaceholderMap::new();
        let out = protect_code("```rust\nlet x = a < b;\n```\n", &mut map);
        assert_eq!(map.len(), 1);
        let html = map.restore(&out);
        assert!(html.contains("<pre><code class=\"language-rust\">"));
        assert!(html.contains("let x = a &lt; b;"));
    }

    #[test]
    fn unclosed_fence_protects_the_tail() {
        let mut map = PlaceholderMap::new();
        let out = protect_code("```\nstill | $open\n", &mut map);
        assert_eq!(map.len(), 1);
        assert!(!out.contains('$'));
        assert!(map.restore(&out).contains("still | $open"));
    }

    #[test]
    fn inline_code_spans_are_protected() {
        let mut map = PlaceholderMap::new();
        let out = protect_code("use `a | b` here", &mut map);
        assert_eq!(map.len(), 1);
        assert_eq!(map.restore(&out), "use <code>a | b</code> here");
    }

    #[test]
    fn table_passes_can_be_disabled() {
        let mut map = PlaceholderMap::new();
        let config = TableConfig {
            pipe_tables: false,
            latex_tabular: false,
        };
        let input = "| a | b |\n|---|---|";
        assert_eq!(protect_tables(input, &config, &mut map), input);
        assert!(map.is_empty());
    }
}
