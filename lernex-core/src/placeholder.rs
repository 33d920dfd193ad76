//! Placeholder substitution for protected HTML fragments
//!
//! Protected regions (math, tables, code) are rendered to their final HTML
//! early and swapped for opaque keys so the prose pass cannot touch them.
//! Keys are delimited by a private-use sentinel character plus a numeric
//! index, so they cannot collide with anything a user (or model) can type:
//! pre-existing sentinels are stripped from input before processing.

/// Private-use delimiter for placeholder keys.
pub const SENTINEL: char = '\u{E000}';

/// Remove any sentinel characters already present in untrusted input.
pub fn strip_sentinels(text: &str) -> String {
    if text.contains(SENTINEL) {
        text.replace(SENTINEL, "")
    } else {
        text.to_string()
    }
}

/// Maps opaque keys to pre-rendered HTML for one render pass.
#[derive(Debug, Default)]
pub struct PlaceholderMap {
    entries: Vec<String>,
}

impl PlaceholderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a rendered HTML fragment and return the key that stands in
    /// for it until [`restore`](Self::restore).
    pub fn insert(&mut self, html: String) -> String {
        let key = format!("{}{}{}", SENTINEL, self.entries.len(), SENTINEL);
        self.entries.push(html);
        key
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace every key in `text` with its stored HTML in a single
    /// left-to-right pass. Malformed or unknown keys are dropped.
    pub fn restore(&self, text: &str) -> String {
        if self.entries.is_empty() || !text.contains(SENTINEL) {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(SENTINEL) {
            out.push_str(&rest[..start]);
            let after = &rest[start + SENTINEL.len_utf8()..];
            match after.find(SENTINEL) {
                Some(end) => {
                    let index = &after[..end];
                    if let Ok(i) = index.parse::<usize>() {
                        if let Some(html) = self.entries.get(i) {
                            out.push_str(html);
                        }
                    }
                    rest = &after[end + SENTINEL.len_utf8()..];
                }
                None => {
                    // Unterminated key, drop the sentinel and stop scanning
                    rest = after;
                    break;
                }
            }
        }
        out.push_str(rest);
        out
    }
}
