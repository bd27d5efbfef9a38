//! Live-reload client injection into HTML responses.

use crate::embed::serve::script_tag;
use crate::utils::mime;

/// Inject the client if the response is HTML and live reload is on.
pub fn maybe_inject_livereload(body: Vec<u8>, content_type: &str, livereload: bool) -> Vec<u8> {
    if livereload && mime::is_html(content_type) {
        inject_livereload_script(&body)
    } else {
        body
    }
}

/// Inject the script tag before the last `</body>`, or append it.
fn inject_livereload_script(content: &[u8]) -> Vec<u8> {
    let script = script_tag();
    let script_bytes = script.as_bytes();

    const PATTERN: &[u8] = b"</body>";

    let pos = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
        .unwrap_or(content.len());

    let mut result = Vec::with_capacity(content.len() + script_bytes.len());
    result.extend_from_slice(&content[..pos]);
    result.extend_from_slice(script_bytes);
    result.extend_from_slice(&content[pos..]);
    result
}
