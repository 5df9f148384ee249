//! Multiple-choice question detection

use regex::Regex;
use std::sync::LazyLock;

/// An option marker such as `A) ` or `C. ` that is not the tail of a longer word.
static OPTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-D][.)]\s").expect("option marker pattern is valid"));

/// Whether a question's text carries multiple-choice option markers
pub fn looks_like_multiple_choice(text: &str) -> bool {
    OPTION_MARKER.is_match(text)
}
