//! Math segmentation and LaTeX prose heuristics
//!
//! A single left-to-right scan splits lesson text into prose and math
//! segments over four delimiter families: `\( \)`, `\[ \]`, `$...$` and
//! `$$...$$`. Model output is messy, so the scan is deliberately
//! forgiving: currency dollars never open math, escaped `\$` is literal,
//! and unbalanced openers at end-of-input are auto-closed instead of
//! swallowing the rest of the document.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::HeuristicsConfig;
use crate::escape::escape_html_text;
use crate::placeholder::PlaceholderMap;

/// One prose or math run produced by [`split_segments`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub is_math: bool,
    pub text: String,
}

/// Open-delimiter counters over a scanned prefix.
///
/// `$$` regions count into `display_depth` alongside `\[ \]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MathBoundaryState {
    pub inline_depth: u32,
    pub display_depth: u32,
    pub single_dollar_open: bool,
}

impl MathBoundaryState {
    pub fn in_math(&self) -> bool {
        self.inline_depth > 0 || self.display_depth > 0 || self.single_dollar_open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MathKind {
    Inline,
    Display,
    Dollar,
    DoubleDollar,
}

/// Source span of one segment, before re-wrapping.
#[derive(Debug, Clone)]
pub(crate) struct RawSegment {
    pub start: usize,
    pub end: usize,
    /// `None` for prose
    pub kind: Option<MathKind>,
    pub body_start: usize,
    pub body_end: usize,
    /// Unmatched nested openers when the segment was cut by end-of-input
    pub depth: u32,
    /// False when the closer was never seen and auto-close applies
    pub closed: bool,
}

fn push_prose(segments: &mut Vec<RawSegment>, start: usize, end: usize) {
    if end > start {
        segments.push(RawSegment {
            start,
            end,
            kind: None,
            body_start: start,
            body_end: end,
            depth: 0,
            closed: true,
        });
    }
}

#[allow(clippy::too_many_arguments)]
fn push_math(
    segments: &mut Vec<RawSegment>,
    kind: MathKind,
    start: usize,
    end: usize,
    body_start: usize,
    body_end: usize,
    depth: u32,
    closed: bool,
) {
    segments.push(RawSegment {
        start,
        end,
        kind: Some(kind),
        body_start,
        body_end,
        depth,
        closed,
    });
}

/// Scan `text` into raw prose/math spans. Byte positions in the result
/// always sit on delimiter boundaries, which are ASCII.
pub(crate) fn scan_raw(text: &str) -> Vec<RawSegment> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut segments = Vec::new();
    let mut seg_start = 0usize;
    // (kind, opener position, body start); depth tracks nested openers
    let mut open: Option<(MathKind, usize, usize)> = None;
    let mut depth = 0u32;
    let mut i = 0usize;

    while i < len {
        match open {
            None => {
                if bytes[i] == b'\\' && i + 1 < len {
                    match bytes[i + 1] {
                        b'(' => {
                            push_prose(&mut segments, seg_start, i);
                            open = Some((MathKind::Inline, i, i + 2));
                            depth = 1;
                            i += 2;
                        }
                        b'[' => {
                            push_prose(&mut segments, seg_start, i);
                            open = Some((MathKind::Display, i, i + 2));
                            depth = 1;
                            i += 2;
                        }
                        // Escaped dollar and any other escape stay literal
                        _ => i += 2,
                    }
                    continue;
                }
                if bytes[i] == b'$' {
                    if i + 1 < len && bytes[i + 1] == b'$' {
                        if i + 2 < len && bytes[i + 2].is_ascii_digit() {
                            // Looks like adjacent currency ("$5-$10"), not display math
                            i += 1;
                            continue;
                        }
                        push_prose(&mut segments, seg_start, i);
                        open = Some((MathKind::DoubleDollar, i, i + 2));
                        depth = 1;
                        i += 2;
                        continue;
                    }
                    if i + 1 >= len || bytes[i + 1].is_ascii_digit() {
                        // Currency or a stray trailing dollar
                        i += 1;
                        continue;
                    }
                    push_prose(&mut segments, seg_start, i);
                    open = Some((MathKind::Dollar, i, i + 1));
                    depth = 1;
                    i += 1;
                    continue;
                }
                i += 1;
            }
            Some((kind, open_pos, body_start)) => match kind {
                MathKind::Inline => {
                    if bytes[i] == b'\\' && i + 1 < len {
                        match bytes[i + 1] {
                            b'(' => depth += 1,
                            b')' => {
                                depth -= 1;
                                if depth == 0 {
                                    push_math(
                                        &mut segments,
                                        kind,
                                        open_pos,
                                        i + 2,
                                        body_start,
                                        i,
                                        0,
                                        true,
                                    );
                                    open = None;
                                    seg_start = i + 2;
                                }
                            }
                            _ => {}
                        }
                        i += 2;
                        continue;
                    }
                    i += 1;
                }
                MathKind::Display => {
                    if bytes[i] == b'\\' && i + 1 < len {
                        match bytes[i + 1] {
                            b'[' => depth += 1,
                            b']' => {
                                depth -= 1;
                                if depth == 0 {
                                    push_math(
                                        &mut segments,
                                        kind,
                                        open_pos,
                                        i + 2,
                                        body_start,
                                        i,
                                        0,
                                        true,
                                    );
                                    open = None;
                                    seg_start = i + 2;
                                }
                            }
                            _ => {}
                        }
                        i += 2;
                        continue;
                    }
                    i += 1;
                }
                MathKind::Dollar => {
                    if bytes[i] == b'\\' && i + 1 < len {
                        i += 2;
                        continue;
                    }
                    if bytes[i] == b'\n' {
                        // A single-dollar formula never spans lines; the
                        // opener was plain text after all
                        open = None;
                        seg_start = open_pos;
                        i += 1;
                        continue;
                    }
                    if bytes[i] == b'$' {
                        push_math(&mut segments, kind, open_pos, i + 1, body_start, i, 0, true);
                        open = None;
                        seg_start = i + 1;
                        i += 1;
                        continue;
                    }
                    i += 1;
                }
                MathKind::DoubleDollar => {
                    if bytes[i] == b'\\' && i + 1 < len {
                        i += 2;
                        continue;
                    }
                    if bytes[i] == b'$' && i + 1 < len && bytes[i + 1] == b'$' {
                        push_math(&mut segments, kind, open_pos, i + 2, body_start, i, 0, true);
                        open = None;
                        seg_start = i + 2;
                        i += 2;
                        continue;
                    }
                    i += 1;
                }
            },
        }
    }

    match open {
        Some((kind, open_pos, body_start)) => {
            push_math(&mut segments, kind, open_pos, len, body_start, len, depth, false);
        }
        None => push_prose(&mut segments, seg_start, len),
    }

    segments
}

/// Re-wrap a math span in standard `\( \)` / `\[ \]` delimiters,
/// appending closers for any openers still unmatched at the cut.
pub(crate) fn rewrap(kind: MathKind, raw: &RawSegment, source: &str) -> String {
    let mut body = source[raw.body_start..raw.body_end].trim().to_string();
    if !raw.closed && raw.depth > 1 {
        let closer = match kind {
            MathKind::Display => "\\]",
            _ => "\\)",
        };
        for _ in 1..raw.depth {
            body.push_str(closer);
        }
    }
    match kind {
        MathKind::Inline | MathKind::Dollar => format!("\\({}\\)", body),
        MathKind::Display | MathKind::DoubleDollar => format!("\\[{}\\]", body),
    }
}

/// Split `text` into prose and normalized math segments.
pub fn split_segments(text: &str) -> Vec<Segment> {
    scan_raw(text)
        .iter()
        .map(|raw| match raw.kind {
            None => Segment {
                is_math: false,
                text: text[raw.start..raw.end].to_string(),
            },
            Some(kind) => Segment {
                is_math: true,
                text: rewrap(kind, raw, text),
            },
        })
        .collect()
}

/// Boundary counters after scanning all of `text` from a closed state.
pub fn boundary_state(text: &str) -> MathBoundaryState {
    let mut state = MathBoundaryState::default();
    if let Some(last) = scan_raw(text).last() {
        if !last.closed {
            match last.kind {
                Some(MathKind::Inline) => state.inline_depth = last.depth,
                Some(MathKind::Display) | Some(MathKind::DoubleDollar) => {
                    state.display_depth = last.depth
                }
                Some(MathKind::Dollar) => state.single_dollar_open = true,
                None => {}
            }
        }
    }
    state
}

static SCRIPT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Za-z][A-Za-z0-9]{0,3})([_^])(\{[^{}\s]{1,16}\}|[A-Za-z0-9]{1,2})([^A-Za-z0-9_{]|$)")
        .expect("script pattern")
});

/// Promote bare `x_2` / `x^2` shorthand in prose to inline math.
///
/// The base is capped at a few characters and scripts must be short, so
/// identifiers like `snake_case` pass through untouched. Promoted runs are
/// swapped for placeholder keys so later passes cannot touch them.
pub fn promote_scripts(prose: &str, placeholders: &mut PlaceholderMap) -> String {
    SCRIPT_RE
        .replace_all(prose, |caps: &Captures| {
            let latex = format!("\\({}{}{}\\)", &caps[1], &caps[2], &caps[3]);
            let key = placeholders.insert(escape_html_text(&latex));
            format!("{}{}", key, &caps[4])
        })
        .into_owned()
}

/// Commands worth rendering as math even when the model forgot delimiters.
const MATH_MACROS: &[&str] = &[
    "Delta", "Gamma", "Lambda", "Omega", "Phi", "Pi", "Psi", "Sigma", "Theta", "alpha", "approx",
    "bar", "beta", "binom", "cdot", "chi", "cos", "cot", "csc", "delta", "div", "epsilon", "equiv",
    "eta", "frac", "gamma", "geq", "hat", "infty", "int", "kappa", "lambda", "leq", "lim", "ln",
    "log", "mu", "nabla", "neq", "nu", "omega", "overline", "partial", "phi", "pi", "pm", "prod",
    "psi", "rho", "sec", "sigma", "sin", "sqrt", "sum", "tan", "tau", "theta", "times", "vec",
    "xi", "zeta",
];

static MACRO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\([A-Za-z]+)((?:\s*\{[^{}]*\})*)").expect("macro pattern"));

/// Wrap known LaTeX command runs found in prose in inline math.
pub fn wrap_bare_macros(prose: &str, placeholders: &mut PlaceholderMap) -> String {
    MACRO_RE
        .replace_all(prose, |caps: &Captures| {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            if MATH_MACROS.contains(&name) {
                let latex = format!("\\({}\\)", &caps[0]);
                placeholders.insert(escape_html_text(&latex))
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Normalize display-style fraction variants to plain `\frac`.
pub fn normalize_macros(text: &str, heuristics: &HeuristicsConfig) -> String {
    if !heuristics.normalize_fractions {
        return text.to_string();
    }
    text.replace("\\dfrac", "\\frac").replace("\\tfrac", "\\frac")
}
