//! Title normalization for subtitle clustering.

use once_cell::sync::Lazy;
use regex::Regex;

static MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(forced|sdh|cc|hi|dubtitles?)\b").expect("valid regex")
});

static BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\[\]\(\)\{\}]").expect("valid regex"));

static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Lower-case the title and strip category markers, brackets and
/// surrounding separators.
///
/// `"English [SDH]"`, `"english (sdh)"` and `"English"` all normalize to
/// `"english"`.
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = MARKERS.replace_all(&lowered, " ");
    let stripped = BRACKETS.replace_all(&stripped, " ");
    let collapsed = SPACES.replace_all(stripped.trim(), " ");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | '.' | ',' | ':' | '|'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markers_and_brackets() {
        assert_eq!(normalize_title("English [SDH]"), "english");
        assert_eq!(normalize_title("english (sdh)"), "english");
        assert_eq!(normalize_title("English - Forced"), "english");
        assert_eq!(normalize_title("Français  Dubtitles"), "français");
        assert_eq!(normalize_title("  "), "");
    }

    #[test]
    fn keeps_words_containing_markers() {
        assert_eq!(normalize_title("Chinese"), "chinese");
        assert_eq!(normalize_title("Director's Cut"), "director's cut");
    }
}
