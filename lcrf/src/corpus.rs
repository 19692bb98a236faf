//! Translated training corpora: id sequences ready for decoding and
//! parameter estimation.

use std::io::BufRead;

use hashbrown::HashMap;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::errors::Result;
use crate::mapper::StringIdMapper;
use crate::model::AttributeId;
use crate::state::{LabelId, BOS_LABEL};

/// A training pair after translation: per-position attribute ids and the
/// label id sequence, both of equal length.
#[derive(Debug, Clone, Default)]
pub struct TranslatedPair {
    pub x: Vec<Vec<AttributeId>>,
    pub y: Vec<LabelId>,
}

/// An ordered set of translated training pairs together with the label and
/// attribute mappers built while reading them.
///
/// The pairs themselves never move; shuffling permutes an indirection vector
/// of pair indices.
#[derive(Debug)]
pub struct TrainingCorpus {
    pairs: Vec<TranslatedPair>,
    indices: Vec<usize>,
    labels: StringIdMapper,
    attributes: StringIdMapper,
    attr_counts: HashMap<AttributeId, u32>,
    max_len: usize,
    token_count: usize,
    label_counter: u32,
    attr_counter: u32,
}

impl TrainingCorpus {
    pub fn new() -> Self {
        let mut labels = StringIdMapper::new();
        // The <BOS> sentinel must own label id 0 before any real label is
        // registered.
        labels.add("<BOS>", u32::from(BOS_LABEL));
        Self {
            pairs: vec![],
            indices: vec![],
            labels,
            attributes: StringIdMapper::new(),
            attr_counts: HashMap::new(),
            max_len: 0,
            token_count: 0,
            label_counter: 1,
            attr_counter: 0,
        }
    }

    /// Reads a tab-separated training corpus: one token per line as
    /// `token<TAB>label<TAB>attr…`, sequences separated by empty lines.
    /// Malformed lines are reported on stderr and skipped.
    pub fn from_reader<R>(rdr: R) -> Result<Self>
    where
        R: BufRead,
    {
        let mut corpus = Self::new();
        let mut seq_labels: Vec<String> = vec![];
        let mut seq_attrs: Vec<Vec<String>> = vec![];
        for (line_no, line) in rdr.lines().enumerate() {
            let mut line = line?;
            if line.ends_with('\r') {
                line.pop();
            }
            if line.is_empty() {
                if !seq_labels.is_empty() {
                    corpus.add(&seq_attrs, &seq_labels);
                    seq_labels.clear();
                    seq_attrs.clear();
                }
                continue;
            }
            let mut fields = line.split_whitespace();
            let (_token, label) = match (fields.next(), fields.next()) {
                (Some(t), Some(l)) => (t, l),
                _ => {
                    eprintln!("Invalid line {}: {}", line_no + 1, line);
                    continue;
                }
            };
            seq_labels.push(label.to_string());
            seq_attrs.push(fields.map(str::to_string).collect());
        }
        if !seq_labels.is_empty() {
            corpus.add(&seq_attrs, &seq_labels);
        }
        Ok(corpus)
    }

    /// Translates and appends a training pair. Pairs with differing lengths
    /// are reported and dropped.
    pub fn add(&mut self, attrs: &[Vec<String>], labels: &[String]) {
        if attrs.len() != labels.len() {
            eprintln!("Error: input and output sequences are of different lengths.");
            return;
        }
        let mut pair = TranslatedPair::default();
        for (token_attrs, label) in attrs.iter().zip(labels) {
            pair.y.push(self.map_label(label));
            let a_ids = token_attrs.iter().map(|a| self.map_attr(a)).collect();
            pair.x.push(a_ids);
        }
        self.max_len = self.max_len.max(pair.y.len());
        self.token_count += pair.y.len();
        self.indices.push(self.pairs.len());
        self.pairs.push(pair);
    }

    fn map_label(&mut self, l: &str) -> LabelId {
        let id = match self.labels.id_of(l) {
            Some(id) => id,
            None => {
                let id = self.label_counter;
                self.labels.add(l, id);
                self.label_counter += 1;
                id
            }
        };
        LabelId::try_from(id).unwrap()
    }

    fn map_attr(&mut self, a: &str) -> AttributeId {
        let id = match self.attributes.id_of(a) {
            Some(id) => id,
            None => {
                let id = self.attr_counter;
                self.attributes.add(a, id);
                self.attr_counter += 1;
                id
            }
        };
        *self.attr_counts.entry(id).or_insert(0) += 1;
        id
    }

    /// The training pair at position `index` of the current shuffle order.
    pub fn get(&self, index: usize) -> &TranslatedPair {
        &self.pairs[self.indices[index]]
    }

    /// Iterates the pairs in insertion order, ignoring the shuffle.
    pub fn pairs(&self) -> impl Iterator<Item = &TranslatedPair> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn max_input_len(&self) -> usize {
        self.max_len
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn labels_count(&self) -> usize {
        self.labels.len()
    }

    pub fn attributes_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn bos_label(&self) -> LabelId {
        BOS_LABEL
    }

    /// Randomly permutes the pair order in place.
    pub fn shuffle<R>(&mut self, rng: &mut R)
    where
        R: Rng,
    {
        self.indices.shuffle(rng);
    }

    /// Drops all attribute ids whose corpus frequency is below `threshold`.
    /// Returns the number of removed attribute occurrences.
    pub fn prune(&mut self, threshold: u32) -> usize {
        let mut removed = 0;
        for pair in &mut self.pairs {
            for attrs in &mut pair.x {
                let before = attrs.len();
                attrs.retain(|a| {
                    self.attr_counts.get(a).copied().unwrap_or(0) >= threshold
                });
                removed += before - attrs.len();
            }
        }
        removed
    }

    pub fn labels_mapper(&self) -> &StringIdMapper {
        &self.labels
    }

    pub fn attributes_mapper(&self) -> &StringIdMapper {
        &self.attributes
    }
}

impl Default for TrainingCorpus {
    fn default() -> Self {
        Self::new()
    }
}
