//! Paragraph-boundary text chunker.
//!
//! Paragraphs (`\n\n`-separated) are packed into chunks up to a character
//! budget of `max_tokens × 4`. A paragraph larger than the budget is broken
//! at whitespace; a single word larger than the budget is broken at a char
//! boundary. Blank input yields no chunks.

use sha2::{Digest, Sha256};

/// Rough characters-per-token ratio used to size chunks.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
    /// Hex SHA-256 of `text`.
    pub hash: String,
}

pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<TextChunk> {
    let budget = max_tokens.max(1) * CHARS_PER_TOKEN;
    let mut pieces: Vec<String> = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if para.len() > budget {
            flush(&mut buf, &mut pieces);
            split_long(para, budget, &mut pieces);
            continue;
        }
        if !buf.is_empty() && buf.len() + 2 + para.len() > budget {
            flush(&mut buf, &mut pieces);
        }
        if !buf.is_empty() {
            buf.push_str("\n\n");
        }
        buf.push_str(para);
    }
    flush(&mut buf, &mut pieces);

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, text)| TextChunk {
            index,
            hash: sha256_hex(&text),
            text,
        })
        .collect()
}

fn flush(buf: &mut String, pieces: &mut Vec<String>) {
    if !buf.is_empty() {
        pieces.push(std::mem::take(buf));
    }
}

/// Break an oversized paragraph into whitespace-separated pieces.
fn split_long(para: &str, budget: usize, pieces: &mut Vec<String>) {
    let mut buf = String::new();
    for word in para.split_whitespace() {
        if word.len() > budget {
            flush(&mut buf, pieces);
            let mut rest = word;
            while !rest.is_empty() {
                let cut = floor_char_boundary(rest, budget);
                pieces.push(rest[..cut].to_string());
                rest = &rest[cut..];
            }
            continue;
        }
        if !buf.is_empty() && buf.len() + 1 + word.len() > budget {
            flush(&mut buf, pieces);
        }
        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(word);
    }
    flush(&mut buf, pieces);
}

/// Largest char boundary `<= index`, but always at least one char in.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    if i == 0 {
        s.char_indices().nth(1).map(|(i, _)| i).unwrap_or(s.len())
    } else {
        i
    }
}

pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_is_one_chunk() {
        let chunks = chunk_text("First paragraph.\n\nSecond paragraph.", 700);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert!(chunks[0].text.contains("Second paragraph."));
    }

    #[test]
    fn test_blank_text_has_no_chunks() {
        assert!(chunk_text("", 700).is_empty());
        assert!(chunk_text("  \n\n \n\n", 700).is_empty());
    }

    #[test]
    fn test_indices_are_contiguous_and_respect_budget() {
        let text = (0..40)
            .map(|i| format!("Paragraph number {}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_text(&text, 10);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert!(c.text.len() <= 40, "chunk {} too long", i);
        }
    }

    #[test]
    fn test_oversized_word_splits_on_char_boundaries() {
        let word = "é".repeat(50);
        let chunks = chunk_text(&word, 2);
        assert!(chunks.len() > 1);
        assert_eq!(
            chunks.iter().map(|c| c.text.as_str()).collect::<String>(),
            word
        );
    }

    #[test]
    fn test_hashes_are_deterministic() {
        let a = chunk_text("Alpha\n\nBeta", 700);
        let b = chunk_text("Alpha\n\nBeta", 700);
        assert_eq!(a[0].hash, b[0].hash);
    }
}
