/// Default base URL for backend requests.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";

pub const TEMPLATE_PATH: &str = "/template";
pub const CHAT_PATH: &str = "/chat";

/// Normalize a base URL: blank input falls back to the default and trailing
/// slashes are dropped.
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BACKEND_URL
    } else {
        input.trim()
    };

    base.trim_end_matches('/').to_string()
}

/// Template classification endpoint for `base`.
pub fn template_url(base: &str) -> String {
    endpoint(base, TEMPLATE_PATH)
}

/// Streamed chat endpoint for `base`.
pub fn chat_url(base: &str) -> String {
    endpoint(base, CHAT_PATH)
}

fn endpoint(base: &str, path: &str) -> String {
    let base = normalize_base_url(base);
    if base.ends_with(path) {
        return base;
    }
    format!("{base}{path}")
}
