//! HTML escaping helpers

use pulldown_cmark_escape::escape_html;

/// Escape `<`, `>`, `&` and `"` for safe inclusion in HTML output.
pub fn escape_html_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a String is infallible
    let _ = escape_html(&mut out, text);
    out
}

/// Escape and append to an existing buffer.
pub fn push_escaped(out: &mut String, text: &str) {
    let _ = escape_html(&mut *out, text);
}
