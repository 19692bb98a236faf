//! Token representations shared by the readers, the extractor and the
//! outputters.

use std::fmt;

/// A text token together with its tokenizer class, optional tag/lemma/label
/// and its byte position in the source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenWithTag {
    /// The token text.
    pub token: String,
    /// The tokenizer class, e.g. `WORD`, `NUMBER`, `PUNCT`, `R_QUOTE`.
    pub token_class: String,
    /// Optional POS tag.
    pub tag: String,
    /// Optional lemma.
    pub lemma: String,
    /// Label assigned by annotation or by the model.
    pub label: String,
    /// Byte offset of the token in the input text.
    pub offset: usize,
    /// Byte length of the token.
    pub length: usize,
}

impl TokenWithTag {
    pub fn new<S>(token: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn with_class<S, C>(token: S, token_class: C, offset: usize, length: usize) -> Self
    where
        S: Into<String>,
        C: Into<String>,
    {
        Self {
            token: token.into(),
            token_class: token_class.into(),
            offset,
            length,
            ..Self::default()
        }
    }

    pub fn assign_label<S>(&mut self, label: S)
    where
        S: Into<String>,
    {
        self.label = label.into();
    }

    pub fn assign_tag<S>(&mut self, tag: S)
    where
        S: Into<String>,
    {
        self.tag = tag.into();
    }
}

impl fmt::Display for TokenWithTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.label.is_empty() {
            write!(f, "{}\t", self.label)?;
        }
        write!(f, "{}", self.token)?;
        if !self.token_class.is_empty() {
            write!(f, "\t{}", self.token_class)?;
        }
        if self.length > 0 {
            write!(f, "\t({},{})", self.offset, self.length)?;
        }
        Ok(())
    }
}

/// A token with the attribute strings the extractor assigned to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordWithAttributes {
    pub token: String,
    pub attributes: Vec<String>,
}

impl WordWithAttributes {
    pub fn new<S>(token: S, attributes: Vec<String>) -> Self
    where
        S: Into<String>,
    {
        Self {
            token: token.into(),
            attributes,
        }
    }

    /// Renders the tab-separated training-file form, optionally with the
    /// token in front.
    pub fn to_line(&self, label: &str, output_token: bool) -> String {
        let mut line = String::new();
        if output_token {
            line.push_str(&self.token);
            line.push('\t');
        }
        line.push_str(label);
        for a in &self.attributes {
            line.push('\t');
            line.push_str(a);
        }
        line
    }
}
