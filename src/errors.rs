// User-friendly error messages
//
// Turns startup and CLI failures into actionable text.

use std::fmt;

/// Format a config parse error with helpful suggestions
pub fn config_parse_error(error: impl fmt::Display) -> String {
    format!(
        "Failed to load configuration\n\n\
        \x1b[1;33mError:\x1b[0m {:#}\n\n\
        \x1b[1;32mTry:\x1b[0m\n\
        1. Check config file syntax:\n\
           \x1b[36mcat ~/.mindcare/config.toml\x1b[0m\n\n\
        2. Regenerate a default config:\n\
           \x1b[36mmindcare init-config --force\x1b[0m\n\n\
        3. Check MINDCARE__* environment variables for typos\n\
           (nesting uses a double underscore, e.g. MINDCARE__NOTIFICATIONS__ADMIN_EMAIL)",
        error
    )
}

/// Format a generative service key error with helpful suggestions
pub fn api_key_invalid_error(provider: &str) -> String {
    format!(
        "{} API key is invalid or missing\n\n\
        \x1b[1;33mPossible causes:\x1b[0m\n\
        • API key not set in config or environment\n\
        • API key still holds the placeholder value\n\
        • API key has been revoked\n\n\
        \x1b[1;32mTry:\x1b[0m\n\
        1. Set the key:\n\
           \x1b[36mexport MINDCARE__GENERATIVE__API_KEY=...\x1b[0m\n\n\
        2. Get a new API key:\n\
           https://aistudio.google.com/app/apikey\n\n\
        Replies fall back to the offline engine until a key is configured.",
        provider
    )
}

/// Format a storage directory error with helpful suggestions
pub fn storage_open_error(path: &str, error: impl fmt::Display) -> String {
    format!(
        "Could not open data directory {}\n\n\
        \x1b[1;33mError:\x1b[0m {}\n\n\
        \x1b[1;32mTry:\x1b[0m\n\
        1. Check directory permissions:\n\
           \x1b[36mls -la {}\x1b[0m\n\n\
        2. Unset storage.data_dir to run with the in-memory store",
        path, error, path
    )
}

/// Wrap a generic error with suggestions
pub fn wrap_error_with_suggestion(error: impl fmt::Display, suggestion: &str) -> String {
    format!(
        "{}\n\n\
        \x1b[1;33mSuggestion:\x1b[0m {}",
        error, suggestion
    )
}
