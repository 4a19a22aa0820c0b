//! Markdown to speech-ready plain text.

use std::sync::LazyLock;

use regex::Regex;

// Compiled once; the patterns are constants.
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid code fence pattern"));
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]*)`").expect("valid inline code pattern"));
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#+\s*").expect("valid heading pattern"));
static LIST_OR_QUOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[>-]\s*").expect("valid list pattern"));
static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[((?:[^\]]|\\\])+)\]\([^)]+\)").expect("valid link pattern"));
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline pattern"));

/// Remove light Markdown syntax so the text reads naturally when spoken.
///
/// Passes run in a fixed order, each on the output of the previous one:
/// fenced code blocks are dropped, inline code and links keep their text,
/// heading/list/quote markers are stripped from line starts, and runs of
/// blank lines collapse to a single paragraph break.
///
/// This is not a Markdown parser. Emphasis markers, tables and other syntax
/// are left as they are.
pub fn normalize(markdown: &str) -> String {
    let text = CODE_FENCE.replace_all(markdown, "");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "");
    let text = LIST_OR_QUOTE.replace_all(&text, "");
    let text = LINK.replace_all(&text, "$1");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}
