//! Text analysis for match queries.

/// Tokens longer than this are dropped; they are usually encoded blobs
/// rather than words.
const MAX_TOKEN_LENGTH: usize = 128;

/// Words dropped by [`StandardAnalyzer`].
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// One analyzed term with its 1-based position and byte span in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub position: u32,
    pub start: usize,
    pub end: usize,
}

pub trait Analyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Vec<Token>;
}

/// The whole input as a single token.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordAnalyzer;

impl Analyzer for KeywordAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        if text.is_empty() {
            return Vec::new();
        }
        vec![Token {
            term: text.to_string(),
            position: 1,
            start: 0,
            end: text.len(),
        }]
    }
}

/// Lowercased runs of alphanumeric characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleAnalyzer;

impl Analyzer for SimpleAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut token_start: Option<usize> = None;
        let mut position = 0;

        for (i, ch) in text.char_indices() {
            match classify_char(ch) {
                CharType::Word => {
                    if token_start.is_none() {
                        token_start = Some(i);
                    }
                }
                CharType::Other => {
                    if let Some(start) = token_start.take() {
                        position += 1;
                        push_token(&mut tokens, text, start, i, position);
                    }
                }
            }
        }
        if let Some(start) = token_start {
            push_token(&mut tokens, text, start, text.len(), position + 1);
        }

        tokens
    }
}

/// [`SimpleAnalyzer`] without common English stop words. Removed words
/// still take up a position.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardAnalyzer;

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        SimpleAnalyzer
            .analyze(text)
            .into_iter()
            .filter(|token| !STOP_WORDS.contains(&token.term.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CharType {
    Word,
    Other,
}

fn classify_char(ch: char) -> CharType {
    if ch.is_alphanumeric() {
        CharType::Word
    } else {
        CharType::Other
    }
}

/// Oversized tokens are dropped but keep their position.
fn push_token(tokens: &mut Vec<Token>, text: &str, start: usize, end: usize, position: u32) {
    let slice = &text[start..end];
    if slice.len() > MAX_TOKEN_LENGTH {
        return;
    }
    tokens.push(Token {
        term: slice.to_lowercase(),
        position,
        start,
        end,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.term.as_str()).collect()
    }

    #[test]
    fn test_simple_lowercases_and_splits() {
        let tokens = SimpleAnalyzer.analyze("Hello, World! rust_2024");
        assert_eq!(terms(&tokens), vec!["hello", "world", "rust", "2024"]);
        assert_eq!(tokens[1].position, 2);
        assert_eq!((tokens[1].start, tokens[1].end), (7, 12));
    }

    #[test]
    fn test_simple_handles_unicode() {
        let tokens = SimpleAnalyzer.analyze("Über café");
        assert_eq!(terms(&tokens), vec!["über", "café"]);
    }

    #[test]
    fn test_keyword_keeps_input() {
        let tokens = KeywordAnalyzer.analyze("New York");
        assert_eq!(terms(&tokens), vec!["New York"]);
        assert!(KeywordAnalyzer.analyze("").is_empty());
    }

    #[test]
    fn test_standard_keeps_position_gaps() {
        let tokens = StandardAnalyzer.analyze("the quick fox");
        assert_eq!(terms(&tokens), vec!["quick", "fox"]);
        assert_eq!(tokens[0].position, 2);
        assert_eq!(tokens[1].position, 3);
    }
}
