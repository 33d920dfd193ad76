//! Incremental streaming renderer
//!
//! Model output arrives in small chunks. The formatter accumulates the
//! full source in a rope, tracks a committed-prefix cursor, and emits
//! rendered HTML only at safe flush points: a math region closing, a
//! sentence boundary outside math, an oversized pending tail, or
//! finalize. A formula, fenced code block, pipe table or inline code
//! span is never flushed in pieces, so already-emitted HTML never needs
//! re-typesetting. Because every flush point sits outside math, the
//! uncommitted tail always rescans from a closed delimiter state.

use ropey::Rope;

use crate::config::FormatConfig;
use crate::format::format_fragment_at;
use crate::math::{boundary_state, scan_raw, MathBoundaryState};
use crate::table::{is_closing_fence, is_separator, looks_like_row, parse_fence, INLINE_CODE_RE};

/// Why a chunk was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// A math region closed with no other math region open
    MathClosed,
    /// Sentence punctuation followed by whitespace, outside math
    SentenceBoundary,
    /// Pending tail exceeded the flush threshold
    Overflow,
    /// End of stream
    Finalized,
}

/// One rendered delta, ready to append to the output document.
#[derive(Debug, Clone)]
pub struct FlushChunk {
    pub html: String,
    pub reason: FlushReason,
}

/// Incremental renderer over a growing source buffer.
pub struct StreamingFormatter {
    config: FormatConfig,
    buffer: Rope,
    committed_chars: usize,
    rendered: String,
}

impl StreamingFormatter {
    pub fn new(config: FormatConfig) -> Self {
        Self {
            config,
            buffer: Rope::new(),
            committed_chars: 0,
            rendered: String::new(),
        }
    }

    /// Full source text received so far.
    pub fn source(&self) -> String {
        self.buffer.to_string()
    }

    /// HTML emitted so far, the concatenation of all flushed chunks.
    pub fn rendered_html(&self) -> &str {
        &self.rendered
    }

    /// Delimiter counters over the uncommitted tail.
    pub fn boundary_state(&self) -> MathBoundaryState {
        boundary_state(&self.pending())
    }

    /// Append a chunk of source text, returning any newly flushed HTML.
    pub fn append(&mut self, chunk: &str) -> Vec<FlushChunk> {
        if !chunk.is_empty() {
            let end = self.buffer.len_chars();
            self.buffer.insert(end, chunk);
        }
        self.drain_ready()
    }

    /// Replace the whole source, discarding all incremental state.
    pub fn replace(&mut self, text: &str) -> Vec<FlushChunk> {
        self.buffer = Rope::from_str(text);
        self.committed_chars = 0;
        self.rendered.clear();
        self.drain_ready()
    }

    /// Flush whatever remains, auto-closing any open math region.
    pub fn finalize(&mut self) -> Option<FlushChunk> {
        let pending = self.pending();
        if pending.is_empty() {
            return None;
        }
        let html = format_fragment_at(&pending, self.at_line_start(), &self.config);
        self.committed_chars = self.buffer.len_chars();
        self.rendered.push_str(&html);
        Some(FlushChunk {
            html,
            reason: FlushReason::Finalized,
        })
    }

    fn pending(&self) -> String {
        self.buffer.slice(self.committed_chars..).to_string()
    }

    fn at_line_start(&self) -> bool {
        self.committed_chars == 0 || self.buffer.char(self.committed_chars - 1) == '\n'
    }

    fn drain_ready(&mut self) -> Vec<FlushChunk> {
        let mut chunks = Vec::new();
        loop {
            let pending = self.pending();
            if pending.is_empty() {
                break;
            }
            let Some((end, reason)) =
                choose_flush_point(&pending, self.config.stream.flush_threshold)
            else {
                break;
            };
            let slice = &pending[..end];
            let html = format_fragment_at(slice, self.at_line_start(), &self.config);
            log::debug!(
                "flush {:?}: {} source bytes -> {} html bytes",
                reason,
                slice.len(),
                html.len()
            );
            self.committed_chars += slice.chars().count();
            self.rendered.push_str(&html);
            chunks.push(FlushChunk { html, reason });
        }
        chunks
    }
}

/// Byte ranges of `pending` where no flush point may land: fenced code
/// blocks, pipe-table blocks and complete inline code spans. Also returns
/// the start of a fence or table still open at end-of-input; more lines
/// may belong to it, so any flush is capped there until a line that ends
/// the block arrives.
fn protected_spans(pending: &str) -> (Vec<(usize, usize)>, Option<usize>) {
    let mut spans = Vec::new();
    let mut fence: Option<(char, usize, usize)> = None;
    let mut table_start: Option<usize> = None;
    let mut table_has_separator = false;
    let mut offset = 0;

    fn close_table(
        start: Option<usize>,
        has_separator: &mut bool,
        end: usize,
        spans: &mut Vec<(usize, usize)>,
    ) {
        // A row run without its separator line never became a table
        if let Some(start) = start {
            if *has_separator {
                spans.push((start, end));
            }
        }
        *has_separator = false;
    }

    for piece in pending.split_inclusive('\n') {
        let line_end = offset + piece.len();
        let line = piece.strip_suffix('\n').unwrap_or(piece);

        if let Some((ch, len, start)) = fence {
            if is_closing_fence(line, ch, len) {
                spans.push((start, line_end));
                fence = None;
            }
        } else if let Some((ch, len, _)) = parse_fence(line) {
            close_table(table_start.take(), &mut table_has_separator, offset, &mut spans);
            fence = Some((ch, len, offset));
        } else if looks_like_row(line) || is_separator(line) {
            if table_start.is_none() {
                table_start = Some(offset);
            }
            if is_separator(line) {
                table_has_separator = true;
            }
        } else {
            close_table(table_start.take(), &mut table_has_separator, offset, &mut spans);
            for m in INLINE_CODE_RE.find_iter(line) {
                spans.push((offset + m.start(), offset + m.end()));
            }
        }
        offset = line_end;
    }

    let open_block = match (fence, table_start) {
        (Some((_, _, start)), _) => Some(start),
        (None, Some(start)) => Some(start),
        (None, None) => None,
    };
    (spans, open_block)
}

/// Copy of `pending` with protected ranges blanked to spaces, so their
/// punctuation and delimiters never produce candidates. Same byte length,
/// so candidate positions map straight back.
fn mask_protected(pending: &str, spans: &[(usize, usize)], open_from: Option<usize>) -> String {
    let mut bytes = pending.as_bytes().to_vec();
    for &(from, to) in spans {
        for b in &mut bytes[from..to] {
            *b = b' ';
        }
    }
    if let Some(from) = open_from {
        for b in &mut bytes[from..] {
            *b = b' ';
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Pick the furthest safe flush position in `pending`, if any.
fn choose_flush_point(pending: &str, threshold: usize) -> Option<(usize, FlushReason)> {
    let (spans, open_block) = protected_spans(pending);
    let masked = if spans.is_empty() && open_block.is_none() {
        None
    } else {
        Some(mask_protected(pending, &spans, open_block))
    };
    let scanned = masked.as_deref().unwrap_or(pending);

    let raws = scan_raw(scanned);
    let mut best: Option<(usize, FlushReason)> = None;

    for raw in &raws {
        match raw.kind {
            Some(_) if raw.closed => {
                best = Some((raw.end, FlushReason::MathClosed));
            }
            None => {
                let bytes = scanned.as_bytes();
                let real = pending.as_bytes();
                for i in raw.start..raw.end {
                    // Punctuation check on the masked copy, whitespace on
                    // the real bytes, so the cut never enters a protected
                    // range
                    if matches!(bytes[i], b'.' | b'!' | b'?')
                        && real
                            .get(i + 1)
                            .is_some_and(|b| b.is_ascii_whitespace() && i + 1 < raw.end)
                    {
                        best = Some((i + 2, FlushReason::SentenceBoundary));
                    }
                }
            }
            _ => {}
        }
    }

    if best.is_none() && pending.len() > threshold {
        let cap = open_block.unwrap_or(pending.len());
        if let Some(last) = raws.last() {
            // Never flush mid-formula; commit up to where it opened
            let end = if last.kind.is_some() && !last.closed {
                last.start
            } else {
                pending.len()
            };
            let end = end.min(cap);
            if end > 0 {
                best = Some((end, FlushReason::Overflow));
            }
        }
    }

    best.filter(|(end, _)| *end > 0)
}
