//! Running-text front end: tokenization, span annotation and sentence
//! segmentation.
//!
//! The reader understands XML-like `<ne class="X"> … </ne>` annotations and
//! converts them into token-level labels under the BIO or BILOU scheme.

use crate::token::TokenWithTag;

/// Span-annotation scheme for token-level labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationScheme {
    /// `X_B` for the first token of a span, `X_I` for the rest.
    Bio,
    /// Additionally `X_L` for span ends and `X_U` for single-token spans.
    Bilou,
}

impl std::str::FromStr for AnnotationScheme {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bio" => Ok(Self::Bio),
            "bilou" => Ok(Self::Bilou),
            _ => Err("AnnotationScheme must be either 'bio' or 'bilou'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RawTokenKind {
    Word,
    Number,
    Punct,
    LeftQuote,
    RightQuote,
    LeftBracket,
    RightBracket,
    Symbol,
    NeOpen(String),
    NeClose,
}

#[derive(Debug, Clone)]
struct RawToken {
    text: String,
    kind: RawTokenKind,
    offset: usize,
    length: usize,
}

impl RawTokenKind {
    fn class(&self) -> &'static str {
        match self {
            Self::Word => "WORD",
            Self::Number => "NUMBER",
            Self::Punct => "PUNCT",
            Self::LeftQuote => "L_QUOTE",
            Self::RightQuote => "R_QUOTE",
            Self::LeftBracket => "L_BRACKET",
            Self::RightBracket => "R_BRACKET",
            Self::Symbol => "SYMBOL",
            Self::NeOpen(_) | Self::NeClose => "XML",
        }
    }
}

const PUNCT_CHARS: &[char] = &['.', ',', ';', ':', '!', '?'];
const LEFT_BRACKETS: &[char] = &['(', '[', '{'];
const RIGHT_BRACKETS: &[char] = &[')', ']', '}'];

// The external tokenizer contract: tokens with a class and a byte
// offset/length. Annotation markup is delivered as pseudo-tokens.
fn lex(text: &str) -> Vec<RawToken> {
    let mut tokens = vec![];
    let bytes = text.as_bytes();
    let mut chars = text.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '<' {
            if let Some((markup, len)) = match_ne_markup(&text[i..]) {
                tokens.push(RawToken {
                    text: text[i..i + len].to_string(),
                    kind: markup,
                    offset: i,
                    length: len,
                });
                while chars.peek().is_some_and(|&(j, _)| j < i + len) {
                    chars.next();
                }
                continue;
            }
        }

        let kind = if c == '"' || c == '\'' {
            // Straight quotes are closing when glued to the previous token.
            if i > 0 && !bytes[i - 1].is_ascii_whitespace() {
                RawTokenKind::RightQuote
            } else {
                RawTokenKind::LeftQuote
            }
        } else if c == '\u{201c}' || c == '\u{2018}' || c == '\u{00ab}' {
            RawTokenKind::LeftQuote
        } else if c == '\u{201d}' || c == '\u{2019}' || c == '\u{00bb}' {
            RawTokenKind::RightQuote
        } else if LEFT_BRACKETS.contains(&c) {
            RawTokenKind::LeftBracket
        } else if RIGHT_BRACKETS.contains(&c) {
            RawTokenKind::RightBracket
        } else if PUNCT_CHARS.contains(&c) {
            RawTokenKind::Punct
        } else if is_word_char(c) {
            // A maximal run of word characters.
            let start = i;
            let mut end = i;
            while let Some(&(j, d)) = chars.peek() {
                if is_word_char(d) {
                    end = j + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let word = &text[start..end];
            let kind = if word.chars().all(|d| d.is_numeric() || d == '.' || d == ',') {
                RawTokenKind::Number
            } else {
                RawTokenKind::Word
            };
            tokens.push(RawToken {
                text: word.to_string(),
                kind,
                offset: start,
                length: end - start,
            });
            continue;
        } else {
            RawTokenKind::Symbol
        };

        tokens.push(RawToken {
            text: c.to_string(),
            kind,
            offset: i,
            length: c.len_utf8(),
        });
        chars.next();
    }
    tokens
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace()
        && c != '<'
        && c != '"'
        && c != '\''
        && !PUNCT_CHARS.contains(&c)
        && !LEFT_BRACKETS.contains(&c)
        && !RIGHT_BRACKETS.contains(&c)
        && !matches!(
            c,
            '\u{201c}' | '\u{201d}' | '\u{2018}' | '\u{2019}' | '\u{00ab}' | '\u{00bb}'
        )
}

// Recognizes `<ne class="X">` (optionally with escaped quotes) and `</ne>`.
fn match_ne_markup(rest: &str) -> Option<(RawTokenKind, usize)> {
    if rest.starts_with("</ne>") {
        return Some((RawTokenKind::NeClose, "</ne>".len()));
    }
    let after = rest.strip_prefix("<ne class=")?;
    let end = after.find('>')?;
    let class = after[..end].trim_matches(&['"', '\\'][..]).to_string();
    if class.is_empty() {
        return None;
    }
    Some((RawTokenKind::NeOpen(class), "<ne class=".len() + end + 1))
}

/// Splits annotated running text into sentences of labeled tokens.
///
/// Sentences end at `.`, `!` or `?`; a closing quote adjacent in byte offset
/// is absorbed into the ending sentence.
pub struct SentenceReader {
    tokens: Vec<RawToken>,
    pos: usize,
    scheme: AnnotationScheme,
    default_label: String,
    current_class: String,
    ne_seq_begin: bool,
}

impl SentenceReader {
    pub fn new(text: &str, scheme: AnnotationScheme, default_label: &str) -> Self {
        Self {
            tokens: lex(text),
            pos: 0,
            scheme,
            default_label: default_label.to_string(),
            current_class: default_label.to_string(),
            ne_seq_begin: false,
        }
    }

    // The next markup or real token after `pos`, used for the BILOU
    // lookahead.
    fn lookahead_is_close(&self, pos: usize) -> bool {
        self.tokens
            .get(pos + 1)
            .is_some_and(|t| t.kind == RawTokenKind::NeClose)
    }

    fn build_label(&mut self, pos: usize) -> String {
        if self.current_class == self.default_label {
            return self.default_label.clone();
        }
        let suffix = if self.ne_seq_begin {
            self.ne_seq_begin = false;
            match self.scheme {
                AnnotationScheme::Bilou if self.lookahead_is_close(pos) => "_U",
                _ => "_B",
            }
        } else {
            match self.scheme {
                AnnotationScheme::Bilou if self.lookahead_is_close(pos) => "_L",
                _ => "_I",
            }
        };
        format!("{}{}", self.current_class, suffix)
    }
}

impl Iterator for SentenceReader {
    type Item = Vec<TokenWithTag>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut sentence: Vec<TokenWithTag> = vec![];
        while self.pos < self.tokens.len() {
            let pos = self.pos;
            self.pos += 1;
            match self.tokens[pos].kind.clone() {
                RawTokenKind::NeOpen(class) => {
                    self.current_class = class;
                    self.ne_seq_begin = true;
                }
                RawTokenKind::NeClose => {
                    self.current_class = self.default_label.clone();
                    self.ne_seq_begin = false;
                }
                kind => {
                    let label = self.build_label(pos);
                    let raw = &self.tokens[pos];
                    let mut tok =
                        TokenWithTag::with_class(&raw.text, kind.class(), raw.offset, raw.length);
                    tok.assign_label(label);
                    let terminal = kind == RawTokenKind::Punct
                        && matches!(raw.text.as_str(), "." | "!" | "?");
                    let end_offset = raw.offset + raw.length;
                    sentence.push(tok);

                    if terminal {
                        // An adjacent closing quote still belongs to the
                        // ending sentence.
                        if let Some(next) = self.tokens.get(self.pos) {
                            if next.kind == RawTokenKind::RightQuote && next.offset == end_offset {
                                let mut quote = TokenWithTag::with_class(
                                    &next.text,
                                    next.kind.class(),
                                    next.offset,
                                    next.length,
                                );
                                quote.assign_label(self.default_label.clone());
                                sentence.push(quote);
                                self.pos += 1;
                            }
                        }
                        return Some(sentence);
                    }
                }
            }
        }
        if sentence.is_empty() {
            None
        } else {
            Some(sentence)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(sentence: &[TokenWithTag]) -> Vec<&str> {
        sentence.iter().map(|t| t.label.as_str()).collect()
    }

    fn texts(sentence: &[TokenWithTag]) -> Vec<&str> {
        sentence.iter().map(|t| t.token.as_str()).collect()
    }

    const ANNOTATED: &str =
        "<ne class=\"PER\">Angela Merkel</ne> met <ne class=\"PER\">Obama</ne> .";

    #[test]
    fn test_bio_conversion() {
        let mut reader = SentenceReader::new(ANNOTATED, AnnotationScheme::Bio, "OTHER");
        let sentence = reader.next().unwrap();
        assert_eq!(
            vec!["Angela", "Merkel", "met", "Obama", "."],
            texts(&sentence)
        );
        assert_eq!(
            vec!["PER_B", "PER_I", "OTHER", "PER_B", "OTHER"],
            labels(&sentence)
        );
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_bilou_conversion() {
        let mut reader = SentenceReader::new(ANNOTATED, AnnotationScheme::Bilou, "OTHER");
        let sentence = reader.next().unwrap();
        assert_eq!(
            vec!["PER_B", "PER_L", "OTHER", "PER_U", "OTHER"],
            labels(&sentence)
        );
    }

    #[test]
    fn test_sentence_split_absorbs_adjacent_quote() {
        let mut reader =
            SentenceReader::new("He said \"Go.\" Then he left.", AnnotationScheme::Bio, "OTHER");
        let first = reader.next().unwrap();
        assert_eq!(vec!["He", "said", "\"", "Go", ".", "\""], texts(&first));
        let second = reader.next().unwrap();
        assert_eq!(vec!["Then", "he", "left", "."], texts(&second));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_quote_classes() {
        let reader = SentenceReader::new("He said \"Go.\"", AnnotationScheme::Bio, "OTHER");
        let sentence = reader.into_iter().next().unwrap();
        assert_eq!("L_QUOTE", sentence[2].token_class);
        assert_eq!("R_QUOTE", sentence[5].token_class);
    }

    #[test]
    fn test_offsets_and_lengths() {
        let mut reader = SentenceReader::new("Ab cd.", AnnotationScheme::Bio, "OTHER");
        let sentence = reader.next().unwrap();
        assert_eq!(0, sentence[0].offset);
        assert_eq!(2, sentence[0].length);
        assert_eq!(3, sentence[1].offset);
        assert_eq!(5, sentence[2].offset);
        assert_eq!(1, sentence[2].length);
    }

    #[test]
    fn test_three_token_span_bilou() {
        let text = "<ne class=\"ORG\">Deutsche Bahn AG</ne> streikt .";
        let mut reader = SentenceReader::new(text, AnnotationScheme::Bilou, "OTHER");
        let sentence = reader.next().unwrap();
        assert_eq!(
            vec!["ORG_B", "ORG_I", "ORG_L", "OTHER", "OTHER"],
            labels(&sentence)
        );
    }

    #[test]
    fn test_sentences_span_lines() {
        let text = "One two\nthree . Four\nfive !";
        let sentences: Vec<_> =
            SentenceReader::new(text, AnnotationScheme::Bio, "OTHER").collect();
        assert_eq!(2, sentences.len());
        assert_eq!(vec!["One", "two", "three", "."], texts(&sentences[0]));
        assert_eq!(vec!["Four", "five", "!"], texts(&sentences[1]));
    }

    #[test]
    fn test_numbers_and_brackets() {
        let mut reader =
            SentenceReader::new("( 42 ) apples .", AnnotationScheme::Bio, "OTHER");
        let sentence = reader.next().unwrap();
        assert_eq!("L_BRACKET", sentence[0].token_class);
        assert_eq!("NUMBER", sentence[1].token_class);
        assert_eq!("R_BRACKET", sentence[2].token_class);
        assert_eq!("WORD", sentence[3].token_class);
    }
}
