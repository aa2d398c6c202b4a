/// Fence marker models sometimes wrap file contents in.
const FENCE: &str = "```";

/// Normalizes a file payload by removing a wrapping fenced code block.
///
/// The payload is trimmed, a leading line that starts with a fence marker is
/// dropped, a trailing line that is only a fence marker is dropped, and the
/// remainder is trimmed again. Everything in between is kept verbatim.
pub fn strip_code_fence(payload: &str) -> String {
    let mut body = payload.trim();

    if body.starts_with(FENCE) {
        body = match body.split_once('\n') {
            Some((_, rest)) => rest,
            None => "",
        };
    }

    let body = body.trim_end();
    let body = match body.rsplit_once('\n') {
        Some((head, last)) if last.trim() == FENCE => head,
        None if body.trim() == FENCE => "",
        _ => body,
    };

    body.trim().to_string()
}

/// Drops an opening fence line from content that is still streaming.
///
/// Until the first line is complete nothing is shown, since it may turn out
/// to be a fence marker.
pub(crate) fn strip_open_fence(partial: &str) -> &str {
    let partial = partial.trim_start();
    if !partial.starts_with(FENCE) {
        return partial;
    }

    match partial.split_once('\n') {
        Some((_, rest)) => rest,
        None => "",
    }
}
