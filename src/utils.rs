use std::sync::OnceLock;

use regex::Regex;

pub fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

static WHITESPACE_RUN: OnceLock<Regex> = OnceLock::new();
const WHITESPACE_PATTERN: &str = r"\s+";

/// Turns a map title into a file stem by replacing each whitespace run with `_`.
pub fn file_stem(title: &str) -> String {
    let pattern = WHITESPACE_RUN.get_or_init(|| Regex::new(WHITESPACE_PATTERN).expect("static pattern"));
    let stem = pattern.replace_all(title.trim(), "_");
    if stem.is_empty() {
        "mindmap".to_string()
    } else {
        stem.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape_xml("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
        assert_eq!(escape_xml("plain"), "plain");
    }

    #[test]
    fn file_stem_collapses_whitespace() {
        assert_eq!(file_stem("My First  Mind\tMap"), "My_First_Mind_Map");
        assert_eq!(file_stem("   "), "mindmap");
    }
}
