//! Size-bounded chunking at paragraph and sentence boundaries.

use std::sync::LazyLock;

use regex::Regex;

/// Default chunk size in characters, under the provider's 4096 character input cap.
pub const DEFAULT_MAX_CHARS: usize = 4000;

/// Separator between paragraphs, counted against the chunk limit.
const PARAGRAPH_SEPARATOR: &str = "\n\n";

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("valid sentence pattern"));

/// Split normalized text into chunks of at most `max_chars` characters.
///
/// Paragraphs (separated by a blank line) are packed greedily into chunks.
/// A paragraph longer than the limit is split into sentences, which are packed
/// the same way. A single sentence longer than the limit is emitted as-is.
/// A zero limit falls back to [`DEFAULT_MAX_CHARS`].
///
/// Chunks come back in input order and are never empty.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = if max_chars == 0 { DEFAULT_MAX_CHARS } else { max_chars };

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for para in text.split(PARAGRAPH_SEPARATOR) {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        let para_len = char_len(para);
        if para_len > max_chars {
            // Keep order: whatever is buffered precedes this paragraph.
            flush(&mut chunks, &mut current, &mut current_len);
            split_sentences(para, max_chars, &mut chunks);
            continue;
        }

        if current_len + para_len + PARAGRAPH_SEPARATOR.len() <= max_chars {
            current.push(para);
            current_len += para_len + PARAGRAPH_SEPARATOR.len();
        } else {
            flush(&mut chunks, &mut current, &mut current_len);
            current.push(para);
            current_len = para_len;
        }
    }

    flush(&mut chunks, &mut current, &mut current_len);
    chunks.retain(|c| !c.trim().is_empty());
    chunks
}

fn flush(chunks: &mut Vec<String>, current: &mut Vec<&str>, current_len: &mut usize) {
    if current.is_empty() {
        return;
    }
    chunks.push(current.join(PARAGRAPH_SEPARATOR).trim().to_string());
    current.clear();
    *current_len = 0;
}

/// Pack the sentences of one over-long paragraph into chunks, appended directly to `chunks`.
fn split_sentences(para: &str, max_chars: usize, chunks: &mut Vec<String>) {
    let mut buf: Vec<&str> = Vec::new();
    let mut buf_len = 0;

    for sentence in sentences(para) {
        let sentence_len = char_len(sentence);
        if buf_len + sentence_len + 1 > max_chars {
            if !buf.is_empty() {
                chunks.push(buf.join(" "));
            }
            buf.clear();
            buf.push(sentence);
            buf_len = sentence_len;
        } else {
            buf.push(sentence);
            buf_len += sentence_len + 1;
        }
    }

    if !buf.is_empty() {
        chunks.push(buf.join(" "));
    }
}

/// Sentences of a paragraph, trimmed, each keeping its closing punctuation.
fn sentences(para: &str) -> impl Iterator<Item = &str> {
    let mut start = 0;
    let mut parts = Vec::new();
    for m in SENTENCE_END.find_iter(para) {
        // Punctuation is a single ASCII byte.
        parts.push(&para[start..m.start() + 1]);
        start = m.end();
    }
    parts.push(&para[start..]);
    parts.into_iter().map(str::trim).filter(|s| !s.is_empty())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
