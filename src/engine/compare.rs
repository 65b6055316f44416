/// Fold case and drop line breaks so replies compare independent of how the
/// channel wrapped them.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().replace(['\r', '\n'], "")
}

/// Whether an actual bot reply satisfies the resolved expected text.
pub fn replies_match(expected: &str, actual: &str) -> bool {
    normalize(expected) == normalize(actual)
}
