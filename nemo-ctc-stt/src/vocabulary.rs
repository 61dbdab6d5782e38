//! Token vocabulary for CTC models
//!
//! One token per line, line number = token id. sherpa-onnx style
//! `"<token> <id>"` lines are accepted as well.

use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{Result, SttError};

/// SentencePiece word-boundary marker (U+2581)
pub const WORD_BOUNDARY: char = '\u{2581}';

/// Token strings that mark the blank symbol when it is part of the file
const BLANK_TOKENS: [&str; 2] = ["<blk>", "<blank>"];

#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    tokens: Vec<String>,
    blank_id: usize,
}

impl Vocabulary {
    /// Load tokens from a vocabulary file
    ///
    /// `blank_id` overrides the blank position. Without it, a `<blk>` /
    /// `<blank>` entry is used if present, otherwise the blank is one past
    /// the last token (NeMo CTC exports).
    pub fn from_file<P: AsRef<Path>>(path: P, blank_id: Option<usize>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            SttError::vocabulary(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let vocab = Self::parse(&contents, blank_id)?;
        info!(
            "Loaded {} tokens (blank_id: {}) from {}",
            vocab.len(),
            vocab.blank_id,
            path.display()
        );
        Ok(vocab)
    }

    /// Parse newline-delimited vocabulary contents
    pub fn parse(contents: &str, blank_id: Option<usize>) -> Result<Self> {
        let tokens = contents
            .lines()
            .enumerate()
            .map(|(id, line)| parse_line(line, id))
            .collect();
        Self::from_tokens(tokens, blank_id)
    }

    pub fn from_tokens(tokens: Vec<String>, blank_id: Option<usize>) -> Result<Self> {
        if tokens.is_empty() {
            return Err(SttError::vocabulary("Vocabulary is empty"));
        }

        let blank_id = match blank_id {
            Some(id) if id > tokens.len() => {
                return Err(SttError::config(format!(
                    "blank_id {} is outside the vocabulary (size {})",
                    id,
                    tokens.len()
                )));
            }
            Some(id) => id,
            None => tokens
                .iter()
                .position(|t| BLANK_TOKENS.contains(&t.as_str()))
                .unwrap_or(tokens.len()),
        };

        Ok(Self { tokens, blank_id })
    }

    /// Number of tokens in the file (excluding an appended blank)
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn blank_id(&self) -> usize {
        self.blank_id
    }

    /// Width of the engine's output distribution: tokens plus a trailing
    /// blank when the blank is not part of the file
    pub fn output_width(&self) -> usize {
        self.tokens.len().max(self.blank_id + 1)
    }

    pub fn token(&self, id: usize) -> Option<&str> {
        self.tokens.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: usize) -> bool {
        id < self.tokens.len()
    }

    /// Whether a token starts a new word
    pub fn is_word_start(&self, id: usize) -> bool {
        self.token(id)
            .map(|t| t.starts_with(WORD_BOUNDARY))
            .unwrap_or(false)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

/// Token text of one line; `"<token> <id>"` collapses to `<token>` when the id
/// matches the line number
fn parse_line(line: &str, line_number: usize) -> String {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut fields = line.split_whitespace();
    if let (Some(token), Some(id), None) = (fields.next(), fields.next(), fields.next()) {
        if id.parse::<usize>().map(|id| id == line_number).unwrap_or(false) {
            return token.to_string();
        }
    }
    line.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_vocabulary_blank_is_appended() {
        let vocab = Vocabulary::parse("<unk>\n\u{2581}the\ns\n\u{2581}a\n", None).unwrap();
        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab.blank_id(), 4);
        assert_eq!(vocab.output_width(), 5);
        assert_eq!(vocab.token(1), Some("\u{2581}the"));
        assert_eq!(vocab.token(4), None);
        assert!(vocab.is_word_start(1));
        assert!(!vocab.is_word_start(2));
    }

    #[test]
    fn test_sherpa_token_file() {
        let vocab = Vocabulary::parse("<unk> 0\n\u{2581}hi 1\nya 2\n<blk> 3\n", None).unwrap();
        assert_eq!(vocab.tokens(), &["<unk>", "\u{2581}hi", "ya", "<blk>"]);
        assert_eq!(vocab.blank_id(), 3);
        assert_eq!(vocab.output_width(), 4);
    }

    #[test]
    fn test_line_with_non_matching_number_is_kept() {
        let vocab = Vocabulary::parse("a 7\nb\n", None).unwrap();
        assert_eq!(vocab.token(0), Some("a 7"));
    }

    #[test]
    fn test_crlf_lines() {
        let vocab = Vocabulary::parse("a\r\nb\r\n", None).unwrap();
        assert_eq!(vocab.tokens(), &["a", "b"]);
    }

    #[test]
    fn test_explicit_blank_id() {
        let vocab = Vocabulary::parse("a\nb\nc\n", Some(0)).unwrap();
        assert_eq!(vocab.blank_id(), 0);
        assert!(Vocabulary::parse("a\nb\n", Some(5)).is_err());
    }

    #[test]
    fn test_empty_vocabulary_is_rejected() {
        assert!(Vocabulary::parse("", None).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        std::fs::write(&path, "\u{2581}hello\n\u{2581}world\n").unwrap();
        let vocab = Vocabulary::from_file(&path, None).unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.blank_id(), 2);
    }
}
