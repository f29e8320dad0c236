//! Word/punctuation tokenizer used by the Context Window Service
//! (spec.md §4.4). Ported from the teacher's `tokenize.rs`, minus the napi
//! boundary.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenWithPosition {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Maps every char-boundary byte offset in `text` to its char offset, the
/// same retargeting `char_offsets()` does in the detector modules. `start`/
/// `end` everywhere else in this crate (`Span::character_start/_end`) are
/// char offsets, not byte offsets, so this tokenizer's positions must be
/// translated before leaving the function.
fn char_index_table(text: &str) -> Vec<usize> {
    let mut table = vec![0usize; text.len() + 1];
    let mut count = 0usize;
    for (byte_idx, _) in text.char_indices() {
        table[byte_idx] = count;
        count += 1;
    }
    table[text.len()] = count;
    table
}

pub fn tokenize_with_positions(text: &str, include_punctuation: bool) -> Vec<TokenWithPosition> {
    let bytes = text.as_bytes();
    let char_index = char_index_table(text);
    let mut out: Vec<TokenWithPosition> = Vec::new();

    let mut i: usize = 0;
    while i < bytes.len() {
        let b = bytes[i];

        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if is_word_byte(b) {
            let start = i;
            i += 1;
            while i < bytes.len() && is_word_byte(bytes[i]) {
                i += 1;
            }
            out.push(TokenWithPosition {
                text: text[start..i].to_string(),
                start: char_index[start],
                end: char_index[i],
            });
            continue;
        }

        if include_punctuation {
            let start = i;
            i += 1;
            out.push(TokenWithPosition {
                text: text[start..i].to_string(),
                start: char_index[start],
                end: char_index[i],
            });
            continue;
        }

        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_words_and_skips_whitespace() {
        let toks = tokenize_with_positions("John Smith, MD", false);
        let words: Vec<&str> = toks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["John", "Smith", "MD"]);
    }

    #[test]
    fn positions_are_char_offsets_not_byte_offsets_for_multibyte_text() {
        let text = "José Smith";
        let toks = tokenize_with_positions(text, false);
        assert_eq!(toks[0].text, "Jos");
        assert_eq!(toks[1].text, "Smith");
        let smith_start = toks[1].start;
        let char_count_before_smith: String = text.chars().skip(smith_start).collect();
        assert!(char_count_before_smith.starts_with("Smith"), "char offset {smith_start} does not land on \"Smith\": {char_count_before_smith:?}");
    }

    #[test]
    fn includes_punctuation_when_requested() {
        let toks = tokenize_with_positions("a, b.", true);
        let words: Vec<&str> = toks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["a", ",", "b", "."]);
    }
}
