//! Splits a token stream into speakable sentences.

const TERMINALS: [char; 4] = ['.', '!', '?', '\n'];

/// Accumulates tokens and yields a sentence whenever a token ends with
/// sentence-terminal punctuation or a newline.
#[derive(Debug, Default)]
pub struct SentenceChunker {
    buffer: String,
}

impl SentenceChunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token. Returns a trimmed, non-empty sentence when the token
    /// closes one.
    pub fn push(&mut self, token: &str) -> Option<String> {
        self.buffer.push_str(token);
        if is_terminal(token) {
            self.take()
        } else {
            None
        }
    }

    /// Flush whatever is left at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        self.take()
    }

    fn take(&mut self) -> Option<String> {
        let sentence = self.buffer.trim().to_string();
        self.buffer.clear();
        (!sentence.is_empty()).then_some(sentence)
    }
}

fn is_terminal(token: &str) -> bool {
    token
        .trim_end_matches([' ', '\t'])
        .ends_with(TERMINALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(tokens: &[&str]) -> (Vec<String>, Option<String>) {
        let mut chunker = SentenceChunker::new();
        let sentences = tokens.iter().filter_map(|t| chunker.push(t)).collect();
        (sentences, chunker.finish())
    }

    #[test]
    fn test_terminated_sentence() {
        let (sentences, rest) = chunk(&["Hi", " there", "."]);
        assert_eq!(sentences, vec!["Hi there."]);
        assert_eq!(rest, None);
    }

    #[test]
    fn test_unterminated_flushes_at_end() {
        let mut chunker = SentenceChunker::new();
        assert_eq!(chunker.push("Hi"), None);
        assert_eq!(chunker.push(" there"), None);
        assert_eq!(chunker.finish(), Some("Hi there".to_string()));
        assert_eq!(chunker.finish(), None);
    }

    #[test]
    fn test_two_sentences() {
        let (sentences, rest) = chunk(&["It", " is", " warm", ".", " Stay", " cool", "!"]);
        assert_eq!(sentences, vec!["It is warm.", "Stay cool!"]);
        assert_eq!(rest, None);
    }

    #[test]
    fn test_token_ending_with_terminal_and_space() {
        let (sentences, _) = chunk(&["Really? ", "Yes"]);
        assert_eq!(sentences, vec!["Really?"]);
    }

    #[test]
    fn test_newline_is_boundary_and_blank_units_dropped() {
        let (sentences, rest) = chunk(&["\n", "Okay", "\n", "  "]);
        assert_eq!(sentences, vec!["Okay"]);
        assert_eq!(rest, None);
    }

    #[test]
    fn test_terminal_mid_token_does_not_split() {
        let (sentences, rest) = chunk(&["Mr.Smith", " says"]);
        assert!(sentences.is_empty());
        assert_eq!(rest, Some("Mr.Smith says".to_string()));
    }
}
