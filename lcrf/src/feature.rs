//! Turns token sequences into per-position attribute sets.

use std::io::Read;

use regex::Regex;

use crate::dawg::Dawg;
use crate::errors::{LcrfError, Result};
use crate::token::{TokenWithTag, WordWithAttributes};

const NGRAM_SEP: char = '|';

/// The enabled feature categories and their numeric limits.
///
/// Categories are explicit named switches; groups of switches can be turned
/// on by the textual group names understood by [`FeatureSet::enable_group()`]
/// (e.g. `AllWords`, `AllPrefixes`).
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// `W[0]=token`
    pub word: bool,
    /// `lcW[0]=token` lowercased
    pub word_lowercased: bool,
    /// `W[-1]=`, `W[-2]=`
    pub prev_words: bool,
    /// `W[1]=`, `W[2]=`
    pub next_words: bool,
    /// `TokClass=` tokenizer class
    pub token_class: bool,
    /// `Shape=` character shape sketch
    pub shape: bool,
    /// `VC=` vowel/consonant sketch
    pub vc_pattern: bool,
    /// `POS[0]=` and neighbors within two positions
    pub pos_tags: bool,
    /// `L[0]=` and neighbors within two positions
    pub lemmas: bool,
    /// `W|POS=` word-tag pair
    pub word_pos: bool,
    /// `Pref=` prefixes up to `max_prefix_len`
    pub prefixes: bool,
    /// `Suff=` suffixes up to `max_suffix_len`
    pub suffixes: bool,
    /// Unary token classification bits (AllUpper, InitUpper, ...)
    pub token_types: bool,
    /// Left-/right-anchored token n-grams `W[a..b]=w1|w2`
    pub word_ngrams: bool,
    /// Also emit the overlapping inner n-grams
    pub inner_word_ngrams: bool,
    /// Tag n-grams `POS=t1|t2`
    pub tag_ngrams: bool,
    /// `CharNgram[i..j]=` character n-grams of the token
    pub char_ngrams: bool,
    /// `<BOS>` / `<EOS>` boundary features
    pub delimiters: bool,
    /// `InLC[-N..0]=` / `InRC[0..N]=` contains-in-window features
    pub context_contains: bool,
    /// `PatternClass[lo..hi]=` DAWG pattern matches
    pub patterns: bool,
    /// `LC-Clue=` features delivered by left-context matches
    pub left_context_clues: bool,
    /// `RC-Clue=` features delivered by right-context matches
    pub right_context_clues: bool,
    /// `Regex=` named regex matches
    pub regexes: bool,

    /// Maximum width of token/tag n-grams.
    pub max_ngram_width: usize,
    /// Maximum width of character n-grams.
    pub max_char_ngram_width: usize,
    /// Window size of the contains-in-window features.
    pub context_window: usize,
    pub max_prefix_len: usize,
    pub max_suffix_len: usize,
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self {
            word: false,
            word_lowercased: false,
            prev_words: false,
            next_words: false,
            token_class: false,
            shape: false,
            vc_pattern: false,
            pos_tags: false,
            lemmas: false,
            word_pos: false,
            prefixes: false,
            suffixes: false,
            token_types: false,
            word_ngrams: false,
            inner_word_ngrams: false,
            tag_ngrams: false,
            char_ngrams: false,
            delimiters: false,
            context_contains: false,
            patterns: false,
            left_context_clues: false,
            right_context_clues: false,
            regexes: false,
            max_ngram_width: 3,
            max_char_ngram_width: 4,
            context_window: 4,
            max_prefix_len: 4,
            max_suffix_len: 4,
        }
    }
}

impl FeatureSet {
    /// Every category enabled.
    pub fn all() -> Self {
        Self {
            word: true,
            word_lowercased: true,
            prev_words: true,
            next_words: true,
            token_class: true,
            shape: true,
            vc_pattern: true,
            pos_tags: true,
            lemmas: true,
            word_pos: true,
            prefixes: true,
            suffixes: true,
            token_types: true,
            word_ngrams: true,
            inner_word_ngrams: false,
            tag_ngrams: true,
            char_ngrams: true,
            delimiters: true,
            context_contains: true,
            patterns: true,
            left_context_clues: true,
            right_context_clues: true,
            regexes: true,
            ..Self::default()
        }
    }

    /// Enables the switches behind a textual feature group name. Returns
    /// `false` for unknown names.
    pub fn enable_group(&mut self, name: &str) -> bool {
        match name {
            "HeadWord" => self.word = true,
            "HeadWordLowercased" => self.word_lowercased = true,
            "AllWords" => {
                self.word = true;
                self.prev_words = true;
                self.next_words = true;
            }
            "AllPrevWords" => self.prev_words = true,
            "AllNextWords" => self.next_words = true,
            "AllPrefixes" => self.prefixes = true,
            "AllSuffixes" => self.suffixes = true,
            "AllPosTags" => self.pos_tags = true,
            "AllLemmas" => self.lemmas = true,
            "AllDelim" => self.delimiters = true,
            "AllWBigrams" => {
                self.word_ngrams = true;
                self.max_ngram_width = self.max_ngram_width.max(2);
            }
            "AllWTrigrams" | "AllWNgrams" => {
                self.word_ngrams = true;
                self.max_ngram_width = self.max_ngram_width.max(3);
            }
            "AllPOSBigrams" | "AllPOSTrigrams" | "AllPOSNgrams" => self.tag_ngrams = true,
            "AllTokenTypes" => self.token_types = true,
            "AllShapes" => self.shape = true,
            "TokenClass" => self.token_class = true,
            "VCPattern" => self.vc_pattern = true,
            "WordPOS" => self.word_pos = true,
            "AllCharNgrams" => self.char_ngrams = true,
            "LeftContextContains" | "RightContextContains" | "AllContextContains" => {
                self.context_contains = true
            }
            "AllContextClues" => {
                self.left_context_clues = true;
                self.right_context_clues = true;
            }
            "AllPatterns" | "AllNamedEntities" => self.patterns = true,
            "AllListFeatures" => {
                self.patterns = true;
                self.left_context_clues = true;
                self.right_context_clues = true;
            }
            "AllRegexes" => self.regexes = true,
            "AllFeatures" => *self = Self::all(),
            _ => return false,
        }
        true
    }

    /// Enables a `+|,; `-separated list of group names, reporting unknown
    /// ones on stderr.
    pub fn enable_groups(&mut self, groups: &str) {
        for name in groups.split(['+', '|', ',', ';', ' ']) {
            if name.is_empty() {
                continue;
            }
            if !self.enable_group(name) {
                eprintln!("  Error: Unknown feature group '{name}'");
            }
        }
    }
}

// Token classification bits, computed once per token.
const ALL_UPPER: usize = 0;
const ALL_DIGIT: usize = 1;
const ALL_SYMBOL: usize = 2;
const ALL_UPPER_OR_DIGIT: usize = 3;
const ALL_UPPER_OR_SYMBOL: usize = 4;
const ALL_DIGIT_OR_SYMBOL: usize = 5;
const ALL_UPPER_OR_DIGIT_OR_SYMBOL: usize = 6;
const INIT_UPPER: usize = 7;
const ALL_LETTER: usize = 8;
const ALL_ALNUM: usize = 9;

const TOKEN_TYPE_NAMES: [&str; 10] = [
    "AllUpper",
    "AllDigit",
    "AllSymbol",
    "AllUpperOrDigit",
    "AllUpperOrSymbol",
    "AllDigitOrSymbol",
    "AllUpperOrDigitOrSymbol",
    "InitUpper",
    "AllLetter",
    "AllAlnum",
];

/// Annotates token sequences with attribute strings.
///
/// Two invocations over identical input produce identical attribute lists;
/// all emission orders are fixed.
pub struct FeatureExtractor {
    opts: FeatureSet,
    data_contains_tags: bool,
    patterns_dawg: Option<Dawg>,
    left_context_dawg: Option<Dawg>,
    right_context_dawg: Option<Dawg>,
    regexes: Vec<(String, Regex)>,
}

impl FeatureExtractor {
    pub fn new(opts: FeatureSet) -> Self {
        Self {
            opts,
            data_contains_tags: false,
            patterns_dawg: None,
            left_context_dawg: None,
            right_context_dawg: None,
            regexes: vec![],
        }
    }

    /// Tells the extractor whether the input carries POS tag information.
    pub fn have_pos_tags(&mut self, v: bool) {
        self.data_contains_tags = v;
    }

    pub fn set_context_window_size(&mut self, n: usize) {
        if n > 0 {
            self.opts.context_window = n;
        }
    }

    pub fn set_inner_word_ngrams(&mut self, v: bool) {
        self.opts.inner_word_ngrams = v;
    }

    pub fn add_patterns(&mut self, dawg: Dawg) {
        self.patterns_dawg = Some(dawg);
    }

    pub fn add_left_contexts(&mut self, dawg: Dawg) {
        self.left_context_dawg = Some(dawg);
    }

    pub fn add_right_contexts(&mut self, dawg: Dawg) {
        self.right_context_dawg = Some(dawg);
    }

    /// Loads a binary pattern DAWG.
    pub fn add_patterns_from<R>(&mut self, rdr: R) -> Result<()>
    where
        R: Read,
    {
        self.patterns_dawg = Some(Dawg::read(rdr)?);
        Ok(())
    }

    pub fn add_left_contexts_from<R>(&mut self, rdr: R) -> Result<()>
    where
        R: Read,
    {
        self.left_context_dawg = Some(Dawg::read(rdr)?);
        Ok(())
    }

    pub fn add_right_contexts_from<R>(&mut self, rdr: R) -> Result<()>
    where
        R: Read,
    {
        self.right_context_dawg = Some(Dawg::read(rdr)?);
        Ok(())
    }

    /// Loads named regexes from a two-column text file: `name<TAB>pattern`.
    /// Comment lines starting with `#` and short lines are skipped.
    pub fn add_regexes_from<R>(&mut self, rdr: R) -> Result<()>
    where
        R: std::io::BufRead,
    {
        for line in rdr.lines() {
            let line = line?;
            let mut fields = line.split_whitespace();
            let (Some(name), Some(pattern)) = (fields.next(), fields.next()) else {
                continue;
            };
            if name.starts_with('#') {
                continue;
            }
            self.add_regex(name, pattern)?;
        }
        Ok(())
    }

    /// Registers a named regex matched against whole tokens.
    pub fn add_regex(&mut self, name: &str, pattern: &str) -> Result<()> {
        let re = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|e| LcrfError::invalid_argument("pattern", e.to_string()))?;
        self.regexes.push((name.to_string(), re));
        Ok(())
    }

    /// Adds features to a sequence, producing one attribute list per token.
    pub fn add_features(&self, seq: &[TokenWithTag]) -> Vec<WordWithAttributes> {
        let mut iseq: Vec<WordWithAttributes> = seq
            .iter()
            .enumerate()
            .map(|(t, tok)| {
                let mut attrs = vec![];
                self.token_features(seq, t, &mut attrs);
                WordWithAttributes::new(tok.token.clone(), attrs)
            })
            .collect();

        // Positional features indexed over the whole sequence come last.
        for t in 0..seq.len() {
            self.window_features(seq, t, &mut iseq);
        }
        if self.opts.patterns {
            if let Some(dawg) = &self.patterns_dawg {
                add_pattern_features(seq, dawg, &mut iseq);
            }
        }
        if self.opts.left_context_clues {
            if let Some(dawg) = &self.left_context_dawg {
                add_context_clues(seq, dawg, true, &mut iseq);
            }
        }
        if self.opts.right_context_clues {
            if let Some(dawg) = &self.right_context_dawg {
                add_context_clues(seq, dawg, false, &mut iseq);
            }
        }
        iseq
    }

    // Per-token features in their fixed emission order.
    fn token_features(&self, x: &[TokenWithTag], t: usize, as_: &mut Vec<String>) {
        let tok = &x[t];
        let opts = &self.opts;

        if opts.word {
            add_feature("W[0]", &mask(&tok.token), false, as_);
        }
        if opts.word_lowercased {
            add_feature("lcW[0]", &mask(&tok.token.to_lowercase()), false, as_);
        }
        if opts.shape {
            add_feature("Shape", &shape(&tok.token), false, as_);
        }
        if opts.token_class {
            add_feature("TokClass", &tok.token_class, false, as_);
        }
        if opts.vc_pattern {
            add_feature("VC", &sound_pattern(&tok.token), false, as_);
        }
        if opts.prev_words {
            if t > 0 {
                add_feature("W[-1]", &mask(&x[t - 1].token), false, as_);
            }
            if t > 1 {
                add_feature("W[-2]", &mask(&x[t - 2].token), false, as_);
            }
        }
        if opts.next_words {
            if t + 1 < x.len() {
                add_feature("W[1]", &mask(&x[t + 1].token), false, as_);
            }
            if t + 2 < x.len() {
                add_feature("W[2]", &mask(&x[t + 2].token), false, as_);
            }
        }

        if self.data_contains_tags && opts.pos_tags {
            add_feature("POS[0]", &tok.tag, false, as_);
            if t > 0 {
                add_feature("POS[-1]", &x[t - 1].tag, false, as_);
            }
            if t > 1 {
                add_feature("POS[-2]", &x[t - 2].tag, false, as_);
            }
            if t + 1 < x.len() {
                add_feature("POS[1]", &x[t + 1].tag, false, as_);
            }
            if t + 2 < x.len() {
                add_feature("POS[2]", &x[t + 2].tag, false, as_);
            }
        }
        if opts.lemmas {
            add_feature("L[0]", &tok.lemma, false, as_);
            if t > 0 {
                add_feature("L[-1]", &x[t - 1].lemma, false, as_);
            }
            if t > 1 {
                add_feature("L[-2]", &x[t - 2].lemma, false, as_);
            }
            if t + 1 < x.len() {
                add_feature("L[1]", &x[t + 1].lemma, false, as_);
            }
            if t + 2 < x.len() {
                add_feature("L[2]", &x[t + 2].lemma, false, as_);
            }
        }

        if opts.word_ngrams {
            for width in 2..=opts.max_ngram_width {
                self.token_ngrams(x, t, width, NgramDir::Left, as_);
                if width > 2 && opts.inner_word_ngrams {
                    self.token_ngrams(x, t, width, NgramDir::Center, as_);
                }
                self.token_ngrams(x, t, width, NgramDir::Right, as_);
            }
        }

        if self.data_contains_tags && opts.tag_ngrams {
            self.tag_ngrams(x, t, 2, NgramDir::Left, as_);
            self.tag_ngrams(x, t, 2, NgramDir::Right, as_);
            self.tag_ngrams(x, t, 3, NgramDir::Left, as_);
            self.tag_ngrams(x, t, 3, NgramDir::Center, as_);
            self.tag_ngrams(x, t, 3, NgramDir::Right, as_);
        }

        if self.data_contains_tags && opts.word_pos {
            let val = format!("{}{}{}", mask(&tok.token), NGRAM_SEP, tok.tag);
            add_feature("W|POS", &val, false, as_);
        }

        if opts.prefixes {
            for l in 1..=opts.max_prefix_len {
                add_feature("Pref", &mask(&prefix(&tok.token, l)), false, as_);
            }
        }
        if opts.suffixes {
            for l in 1..=opts.max_suffix_len {
                add_feature("Suff", &mask(&suffix(&tok.token, l)), false, as_);
            }
        }

        if opts.token_types {
            let tt = token_type(&tok.token);
            for (bit, name) in TOKEN_TYPE_NAMES.iter().enumerate() {
                if tt[bit] {
                    add_feature(name, "", true, as_);
                }
            }
        }

        if opts.regexes {
            for (name, re) in &self.regexes {
                if re.is_match(&tok.token) {
                    add_feature("Regex", name, false, as_);
                }
            }
        }

        if opts.char_ngrams && tok.token.chars().count() > 1 {
            self.char_ngram_features(&tok.token, as_);
        }
    }

    // Features referring to sequence positions: contains-in-window and the
    // boundary delimiters.
    fn window_features(&self, x: &[TokenWithTag], t: usize, iseq: &mut [WordWithAttributes]) {
        let opts = &self.opts;
        let as_ = &mut iseq[t].attributes;
        if opts.context_contains {
            let window = opts.context_window;
            let left_feat = format!("InLC[-{window}..0]");
            for n in 1..=window {
                if t < n {
                    break;
                }
                add_feature(&left_feat, &mask(&x[t - n].token), false, as_);
            }
            let right_feat = format!("InRC[0..{window}]");
            for n in 1..=window {
                if t + n >= x.len() {
                    break;
                }
                add_feature(&right_feat, &mask(&x[t + n].token), false, as_);
            }
        }
        if opts.delimiters {
            if t == 0 {
                add_feature("<BOS>", "", true, as_);
            }
            if t == x.len() - 1 {
                add_feature("<EOS>", "", true, as_);
            }
        }
    }

    fn token_ngrams(
        &self,
        x: &[TokenWithTag],
        t: usize,
        width: usize,
        dir: NgramDir,
        as_: &mut Vec<String>,
    ) {
        match dir {
            NgramDir::Left => {
                if t + 1 >= width {
                    let start = t + 1 - width;
                    add_feature(
                        &ngram_feat_name("W", t, start, width),
                        &token_ngram(x, start, t),
                        false,
                        as_,
                    );
                }
            }
            NgramDir::Right => {
                if t + width <= x.len() {
                    add_feature(
                        &ngram_feat_name("W", t, t, width),
                        &token_ngram(x, t, t + width - 1),
                        false,
                        as_,
                    );
                }
            }
            NgramDir::Center => {
                if width > 2 && t + 2 >= width && t + width - 1 <= x.len() {
                    for start in (t + 2 - width)..t {
                        add_feature(
                            &ngram_feat_name("W", t, start, width),
                            &token_ngram(x, start, start + width - 1),
                            false,
                            as_,
                        );
                    }
                }
            }
        }
    }

    fn tag_ngrams(
        &self,
        x: &[TokenWithTag],
        t: usize,
        width: usize,
        dir: NgramDir,
        as_: &mut Vec<String>,
    ) {
        let val = match dir {
            NgramDir::Left if t + 1 >= width => tag_ngram(x, t + 1 - width, t),
            NgramDir::Right if t + width <= x.len() => tag_ngram(x, t, t + width - 1),
            NgramDir::Center if width == 3 && t > 0 && t + 1 < x.len() => {
                tag_ngram(x, t - 1, t + 1)
            }
            _ => return,
        };
        add_feature("POS", &val, false, as_);
    }

    fn char_ngram_features(&self, token: &str, as_: &mut Vec<String>) {
        let chars: Vec<char> = token.chars().collect();
        let max_n = self.opts.max_char_ngram_width.min(chars.len());
        for n in 2..=max_n {
            for i in 0..=chars.len() - n {
                let feat = format!("CharNgram[{}..{}]", i, i + n - 1);
                let ngram: String = chars[i..i + n].iter().collect();
                add_feature(&feat, &mask(&ngram), false, as_);
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum NgramDir {
    Left,
    Center,
    Right,
}

// Pattern matches contribute a feature to every covered position, with the
// span rendered relative to that position.
fn add_pattern_features(x: &[TokenWithTag], dawg: &Dawg, iseq: &mut [WordWithAttributes]) {
    for t in 0..x.len() {
        let mut q = dawg.start_state();
        for t1 in t..x.len() {
            let Some(p) = dawg.next(q, &x[t1].token) else {
                break;
            };
            if dawg.is_final(p) {
                if let Some(infos) = dawg.final_infos(p) {
                    for info in infos {
                        for k in t..=t1 {
                            let feat = format!(
                                "PatternClass[{}..{}]",
                                t as isize - k as isize,
                                t1 as isize - k as isize
                            );
                            iseq[k].attributes.push(format!("{feat}={info}"));
                        }
                    }
                }
            }
            // Longer matches may still follow.
            q = p;
        }
    }
}

// A matched left-context span delivers its clue to the token immediately to
// the right; right-context spans symmetrically to the left.
fn add_context_clues(
    x: &[TokenWithTag],
    dawg: &Dawg,
    to_the_right: bool,
    iseq: &mut [WordWithAttributes],
) {
    let feat = if to_the_right { "LC-Clue" } else { "RC-Clue" };
    for t in 0..x.len() {
        let mut q = dawg.start_state();
        for t1 in t..x.len() {
            let Some(p) = dawg.next(q, &x[t1].token) else {
                break;
            };
            if dawg.is_final(p) {
                if let Some(infos) = dawg.final_infos(p) {
                    if to_the_right && t1 + 1 < iseq.len() {
                        for info in infos {
                            add_feature(feat, info, false, &mut iseq[t1 + 1].attributes);
                        }
                    } else if !to_the_right && t > 0 {
                        for info in infos {
                            add_feature(feat, info, false, &mut iseq[t - 1].attributes);
                        }
                    }
                }
            }
            q = p;
        }
    }
}

fn add_feature(feat: &str, val: &str, unary: bool, as_: &mut Vec<String>) {
    if !val.is_empty() {
        as_.push(format!("{feat}={val}"));
    } else if unary {
        as_.push(feat.to_string());
    }
}

fn token_ngram(x: &[TokenWithTag], from: usize, to: usize) -> String {
    let mut result = mask(&x[from].token);
    for tok in &x[from + 1..=to] {
        result.push(NGRAM_SEP);
        result.push_str(&mask(&tok.token));
    }
    result
}

fn tag_ngram(x: &[TokenWithTag], from: usize, to: usize) -> String {
    let mut result = x[from].tag.clone();
    for tok in &x[from + 1..=to] {
        result.push(NGRAM_SEP);
        result.push_str(&tok.tag);
    }
    result
}

fn ngram_feat_name(pref: &str, t: usize, start: usize, width: usize) -> String {
    let from = start as isize - t as isize;
    format!("{pref}[{}..{}]", from, from + width as isize - 1)
}

fn prefix(w: &str, n: usize) -> String {
    if w.chars().count() >= n {
        w.chars().take(n).collect()
    } else {
        String::new()
    }
}

fn suffix(w: &str, n: usize) -> String {
    let len = w.chars().count();
    if len >= n {
        w.chars().skip(len - n).collect()
    } else {
        String::new()
    }
}

fn token_type(token: &str) -> [bool; 10] {
    let mut r = [false; 10];
    if token.is_empty() {
        return r;
    }
    r = [true; 10];
    if !token.chars().next().is_some_and(char::is_uppercase) {
        r[INIT_UPPER] = false;
    }
    for c in token.chars() {
        if c.is_uppercase() {
            r[ALL_DIGIT] = false;
            r[ALL_SYMBOL] = false;
            r[ALL_DIGIT_OR_SYMBOL] = false;
        } else if c.is_numeric() || c == ',' || c == '.' {
            r[ALL_UPPER] = false;
            r[ALL_SYMBOL] = false;
            r[ALL_UPPER_OR_SYMBOL] = false;
            r[ALL_LETTER] = false;
        } else if c.is_lowercase() {
            r[ALL_UPPER] = false;
            r[ALL_DIGIT] = false;
            r[ALL_SYMBOL] = false;
            r[ALL_UPPER_OR_DIGIT] = false;
            r[ALL_UPPER_OR_SYMBOL] = false;
            r[ALL_DIGIT_OR_SYMBOL] = false;
            r[ALL_UPPER_OR_DIGIT_OR_SYMBOL] = false;
        } else {
            r[ALL_UPPER] = false;
            r[ALL_DIGIT] = false;
            r[ALL_UPPER_OR_DIGIT] = false;
            r[ALL_LETTER] = false;
            r[ALL_ALNUM] = false;
        }
    }
    r
}

/// Character shape sketch: `X` for uppercase, `x` for lowercase, `9` for
/// digits, `-` and `.` verbatim, `#` otherwise.
fn shape(tok: &str) -> String {
    tok.chars()
        .map(|c| {
            if c.is_alphabetic() && c.is_uppercase() {
                'X'
            } else if c.is_alphabetic() && c.is_lowercase() {
                'x'
            } else if c.is_numeric() {
                '9'
            } else if c == '-' || c == '.' {
                c
            } else {
                '#'
            }
        })
        .collect()
}

fn sound_pattern(tok: &str) -> String {
    tok.chars()
        .map(|c| {
            if c.is_alphabetic() {
                if is_vowel(c) {
                    'V'
                } else {
                    'C'
                }
            } else if c.is_numeric() {
                '9'
            } else if c == '-' || c == '.' {
                c
            } else {
                '#'
            }
        })
        .collect()
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'A' | 'E' | 'I' | 'O' | 'U')
}

// A colon would clash with downstream label syntax.
fn mask(tok: &str) -> String {
    if tok.contains(':') {
        tok.replace(':', "__COLON__")
    } else {
        tok.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<TokenWithTag> {
        words.iter().map(|w| TokenWithTag::new(*w)).collect()
    }

    fn attrs_of(iseq: &[WordWithAttributes], t: usize) -> &[String] {
        &iseq[t].attributes
    }

    #[test]
    fn test_head_word_and_neighbors() {
        let mut opts = FeatureSet::default();
        opts.word = true;
        opts.prev_words = true;
        opts.next_words = true;
        let fe = FeatureExtractor::new(opts);
        let iseq = fe.add_features(&tokens(&["a", "b", "c"]));

        assert_eq!(vec!["W[0]=a", "W[1]=b", "W[2]=c"], attrs_of(&iseq, 0));
        assert_eq!(vec!["W[0]=b", "W[-1]=a", "W[1]=c"], attrs_of(&iseq, 1));
        assert_eq!(vec!["W[0]=c", "W[-1]=b", "W[-2]=a"], attrs_of(&iseq, 2));
    }

    #[test]
    fn test_shape_and_vc() {
        let mut opts = FeatureSet::default();
        opts.shape = true;
        opts.vc_pattern = true;
        let fe = FeatureExtractor::new(opts);
        let iseq = fe.add_features(&tokens(&["Abc-12.x!"]));
        assert_eq!(
            vec!["Shape=Xxx-99.x#", "VC=VCC-99.C#"],
            attrs_of(&iseq, 0)
        );
    }

    #[test]
    fn test_colon_is_masked() {
        let mut opts = FeatureSet::default();
        opts.word = true;
        let fe = FeatureExtractor::new(opts);
        let iseq = fe.add_features(&tokens(&["a:b"]));
        assert_eq!(vec!["W[0]=a__COLON__b"], attrs_of(&iseq, 0));
    }

    #[test]
    fn test_affixes() {
        let mut opts = FeatureSet::default();
        opts.prefixes = true;
        opts.suffixes = true;
        let fe = FeatureExtractor::new(opts);
        let iseq = fe.add_features(&tokens(&["Berlin"]));
        assert_eq!(
            vec![
                "Pref=B", "Pref=Be", "Pref=Ber", "Pref=Berl", "Suff=n", "Suff=in", "Suff=lin",
                "Suff=rlin",
            ],
            attrs_of(&iseq, 0)
        );
    }

    #[test]
    fn test_affixes_skip_short_tokens() {
        let mut opts = FeatureSet::default();
        opts.prefixes = true;
        let fe = FeatureExtractor::new(opts);
        let iseq = fe.add_features(&tokens(&["ab"]));
        assert_eq!(vec!["Pref=a", "Pref=ab"], attrs_of(&iseq, 0));
    }

    #[test]
    fn test_token_types() {
        let mut opts = FeatureSet::default();
        opts.token_types = true;
        let fe = FeatureExtractor::new(opts);

        let iseq = fe.add_features(&tokens(&["USA"]));
        assert_eq!(
            vec![
                "AllUpper",
                "AllUpperOrDigit",
                "AllUpperOrSymbol",
                "AllUpperOrDigitOrSymbol",
                "InitUpper",
                "AllLetter",
                "AllAlnum",
            ],
            attrs_of(&iseq, 0)
        );

        let iseq = fe.add_features(&tokens(&["2024"]));
        assert_eq!(
            vec![
                "AllDigit",
                "AllUpperOrDigit",
                "AllDigitOrSymbol",
                "AllUpperOrDigitOrSymbol",
                "AllAlnum",
            ],
            attrs_of(&iseq, 0)
        );

        let iseq = fe.add_features(&tokens(&["Haus"]));
        assert_eq!(
            vec!["InitUpper", "AllLetter", "AllAlnum"],
            attrs_of(&iseq, 0)
        );
    }

    #[test]
    fn test_word_ngrams() {
        let mut opts = FeatureSet::default();
        opts.word_ngrams = true;
        opts.max_ngram_width = 3;
        let fe = FeatureExtractor::new(opts);
        let iseq = fe.add_features(&tokens(&["a", "b", "c", "d"]));
        assert_eq!(
            vec!["W[0..1]=a|b", "W[0..2]=a|b|c"],
            attrs_of(&iseq, 0)
        );
        assert_eq!(
            vec![
                "W[-1..0]=b|c",
                "W[0..1]=c|d",
                "W[-2..0]=a|b|c",
            ],
            attrs_of(&iseq, 2)
        );
    }

    #[test]
    fn test_inner_word_ngrams() {
        let mut opts = FeatureSet::default();
        opts.word_ngrams = true;
        opts.inner_word_ngrams = true;
        opts.max_ngram_width = 3;
        let fe = FeatureExtractor::new(opts);
        let iseq = fe.add_features(&tokens(&["a", "b", "c", "d"]));
        assert_eq!(
            vec![
                "W[-1..0]=b|c",
                "W[0..1]=c|d",
                "W[-2..0]=a|b|c",
                "W[-1..1]=b|c|d",
            ],
            attrs_of(&iseq, 2)
        );
    }

    #[test]
    fn test_tag_ngrams_and_word_pos() {
        let mut opts = FeatureSet::default();
        opts.tag_ngrams = true;
        opts.word_pos = true;
        let mut fe = FeatureExtractor::new(opts);
        fe.have_pos_tags(true);
        let mut seq = tokens(&["the", "cat", "sat"]);
        seq[0].assign_tag("DT");
        seq[1].assign_tag("NN");
        seq[2].assign_tag("VB");
        let iseq = fe.add_features(&seq);
        assert_eq!(
            vec![
                "POS=DT|NN",
                "POS=NN|VB",
                "POS=DT|NN|VB",
                "W|POS=cat|NN",
            ],
            attrs_of(&iseq, 1)
        );
    }

    #[test]
    fn test_char_ngrams() {
        let mut opts = FeatureSet::default();
        opts.char_ngrams = true;
        opts.max_char_ngram_width = 3;
        let fe = FeatureExtractor::new(opts);
        let iseq = fe.add_features(&tokens(&["abc"]));
        assert_eq!(
            vec![
                "CharNgram[0..1]=ab",
                "CharNgram[1..2]=bc",
                "CharNgram[0..2]=abc",
            ],
            attrs_of(&iseq, 0)
        );
    }

    #[test]
    fn test_delimiters_and_context_contains() {
        let mut opts = FeatureSet::default();
        opts.delimiters = true;
        opts.context_contains = true;
        opts.context_window = 2;
        let fe = FeatureExtractor::new(opts);
        let iseq = fe.add_features(&tokens(&["a", "b", "c"]));
        assert_eq!(
            vec!["InRC[0..2]=b", "InRC[0..2]=c", "<BOS>"],
            attrs_of(&iseq, 0)
        );
        assert_eq!(
            vec!["InLC[-2..0]=b", "InLC[-2..0]=a", "<EOS>"],
            attrs_of(&iseq, 2)
        );
    }

    #[test]
    fn test_pattern_features() {
        let mut opts = FeatureSet::default();
        opts.patterns = true;
        let mut fe = FeatureExtractor::new(opts);
        fe.add_patterns(Dawg::from_entries(vec![
            (
                vec!["New".to_string(), "York".to_string()],
                "City".to_string(),
            ),
            (vec!["York".to_string()], "Surname".to_string()),
        ]));
        let iseq = fe.add_features(&tokens(&["I", "visited", "New", "York"]));
        assert!(attrs_of(&iseq, 0).is_empty());
        assert!(attrs_of(&iseq, 1).is_empty());
        assert_eq!(vec!["PatternClass[0..1]=City"], attrs_of(&iseq, 2));
        assert_eq!(
            vec!["PatternClass[-1..0]=City", "PatternClass[0..0]=Surname"],
            attrs_of(&iseq, 3)
        );
    }

    #[test]
    fn test_context_clues() {
        let mut opts = FeatureSet::default();
        opts.left_context_clues = true;
        opts.right_context_clues = true;
        let mut fe = FeatureExtractor::new(opts);
        fe.add_left_contexts(Dawg::from_entries(vec![(
            vec!["Dr".to_string(), ".".to_string()],
            "TitleLeft".to_string(),
        )]));
        fe.add_right_contexts(Dawg::from_entries(vec![(
            vec!["GmbH".to_string()],
            "CompanyRight".to_string(),
        )]));
        let iseq = fe.add_features(&tokens(&["Dr", ".", "Braun", "GmbH"]));
        // The title span delivers its clue to the right, the company suffix
        // to the left; both land on "Braun".
        assert_eq!(
            vec!["LC-Clue=TitleLeft", "RC-Clue=CompanyRight"],
            attrs_of(&iseq, 2)
        );
        let iseq2 = fe.add_features(&tokens(&["Braun", "GmbH"]));
        assert_eq!(vec!["RC-Clue=CompanyRight"], attrs_of(&iseq2, 0));
    }

    #[test]
    fn test_regex_features() {
        let mut opts = FeatureSet::default();
        opts.regexes = true;
        let mut fe = FeatureExtractor::new(opts);
        fe.add_regex("Year", r"[12][0-9]{3}").unwrap();
        let iseq = fe.add_features(&tokens(&["1984", "apples"]));
        assert_eq!(vec!["Regex=Year"], attrs_of(&iseq, 0));
        assert!(attrs_of(&iseq, 1).is_empty());
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let mut opts = FeatureSet::all();
        opts.regexes = false;
        let fe = FeatureExtractor::new(opts);
        let seq = tokens(&["Angela", "Merkel", "met", "Obama", "."]);
        assert_eq!(fe.add_features(&seq), fe.add_features(&seq));
    }

    #[test]
    fn test_group_names() {
        let mut opts = FeatureSet::default();
        opts.enable_groups("AllWords|AllPrefixes,AllDelim");
        assert!(opts.word && opts.prev_words && opts.next_words);
        assert!(opts.prefixes);
        assert!(opts.delimiters);
        assert!(!opts.suffixes);
        assert!(!opts.enable_group("NoSuchGroup"));
    }
}
