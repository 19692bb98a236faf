//! Applies a trained model to running text or column data: read, extract,
//! translate, decode, output.

use std::io::BufRead;

use crate::config::CrfConfiguration;
use crate::decoder::Decoder;
use crate::errors::Result;
use crate::feature::FeatureExtractor;
use crate::model::{AttributeId, CrfModel};
use crate::output::Outputter;
use crate::state::LabelId;
use crate::text::SentenceReader;
use crate::token::{TokenWithTag, WordWithAttributes};

/// Token-level accuracy and, against a default label, entity
/// precision/recall.
#[derive(Debug, Default, Clone)]
pub struct EvaluationInfo {
    zero_hypothesis: String,
    total_labels: usize,
    correct_labels: usize,
    true_positives: usize,
    true_negatives: usize,
    false_positives: usize,
    false_negatives: usize,
}

impl EvaluationInfo {
    /// `zero_hypothesis` is the default label counted as a negative; leave
    /// it empty for plain accuracy.
    pub fn new(zero_hypothesis: &str) -> Self {
        Self {
            zero_hypothesis: zero_hypothesis.to_string(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, inferred: &str, gold: &str) {
        self.total_labels += 1;
        if self.zero_hypothesis.is_empty() {
            if inferred == gold {
                self.correct_labels += 1;
            }
        } else if gold == self.zero_hypothesis {
            if inferred == gold {
                self.true_negatives += 1;
                self.correct_labels += 1;
            } else {
                self.false_positives += 1;
            }
        } else if inferred == gold {
            self.true_positives += 1;
            self.correct_labels += 1;
        } else {
            self.false_negatives += 1;
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total_labels == 0 {
            return 0.0;
        }
        self.correct_labels as f64 / self.total_labels as f64
    }

    pub fn precision(&self) -> f64 {
        let denom = self.true_positives + self.false_positives;
        if self.zero_hypothesis.is_empty() || denom == 0 {
            return 0.0;
        }
        self.true_positives as f64 / denom as f64
    }

    pub fn recall(&self) -> f64 {
        let denom = self.true_positives + self.false_negatives;
        if self.zero_hypothesis.is_empty() || denom == 0 {
            return 0.0;
        }
        self.true_positives as f64 / denom as f64
    }

    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            return 0.0;
        }
        2.0 * p * r / (p + r)
    }
}

/// Pipeline glue holding a model, its decoder and a feature extractor.
pub struct Applier<'a> {
    model: &'a CrfModel,
    config: &'a CrfConfiguration,
    extractor: FeatureExtractor,
    decoder: Decoder,
    token_count: usize,
    seq_count: usize,
}

impl<'a> Applier<'a> {
    pub fn new(
        model: &'a CrfModel,
        config: &'a CrfConfiguration,
        extractor: FeatureExtractor,
    ) -> Self {
        Self {
            model,
            config,
            extractor,
            decoder: Decoder::new(),
            token_count: 0,
            seq_count: 0,
        }
    }

    pub fn processed_tokens(&self) -> usize {
        self.token_count
    }

    pub fn processed_sequences(&self) -> usize {
        self.seq_count
    }

    pub fn reset(&mut self) {
        self.token_count = 0;
        self.seq_count = 0;
    }

    /// Labels all sequences of `input` and hands them to the outputter.
    pub fn apply_to<R, O>(&mut self, input: R, outputter: &mut O) -> Result<()>
    where
        R: BufRead,
        O: Outputter + ?Sized,
    {
        let mut eval = EvaluationInfo::default();
        if self.config.input_is_running_text() {
            self.run_running_text(input, outputter, false, &mut eval)
        } else {
            self.run_column_data(input, outputter, false, &mut eval)
        }
    }

    /// Evaluation mode: the input carries gold labels; predicted labels are
    /// compared against them and both are handed to the outputter.
    pub fn evaluation_of<R, O>(&mut self, input: R, outputter: &mut O) -> Result<EvaluationInfo>
    where
        R: BufRead,
        O: Outputter + ?Sized,
    {
        let mut eval = EvaluationInfo::new(self.config.default_label());
        if self.config.input_is_running_text() {
            self.run_running_text(input, outputter, true, &mut eval)?;
        } else {
            self.run_column_data(input, outputter, true, &mut eval)?;
        }
        Ok(eval)
    }

    fn run_running_text<R, O>(
        &mut self,
        mut input: R,
        outputter: &mut O,
        eval_mode: bool,
        eval: &mut EvaluationInfo,
    ) -> Result<()>
    where
        R: BufRead,
        O: Outputter + ?Sized,
    {
        let mut text = String::new();
        input.read_to_string(&mut text)?;
        let reader = SentenceReader::new(
            &text,
            self.config.annotation_scheme(),
            self.config.default_label(),
        );
        for mut sentence in reader {
            self.process_sentence(&mut sentence, outputter, eval_mode, eval)?;
        }
        Ok(())
    }

    fn run_column_data<R, O>(
        &mut self,
        input: R,
        outputter: &mut O,
        eval_mode: bool,
        eval: &mut EvaluationInfo,
    ) -> Result<()>
    where
        R: BufRead,
        O: Outputter + ?Sized,
    {
        let col_count = self.config.columns_count();
        let token_column = self.config.column_of("Token");
        let label_column = self.config.column_of("Label");
        let tag_column = self.config.column_of("Tag");
        let lemma_column = self.config.column_of("Lemma");
        if token_column.is_none() {
            eprintln!("Missing token column");
        }
        if eval_mode && label_column.is_none() {
            eprintln!("Missing label column, but evaluation mode specified");
        }

        let mut sentence: Vec<TokenWithTag> = vec![];
        for line in input.lines() {
            let mut line = line?;
            if line.ends_with('\r') {
                line.pop();
            }
            if line.is_empty() {
                if !sentence.is_empty() {
                    self.process_sentence(&mut sentence, outputter, eval_mode, eval)?;
                    sentence.clear();
                }
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != col_count {
                eprintln!("Invalid line: {line}");
                continue;
            }
            let Some(token_column) = token_column else {
                continue;
            };
            let mut t = TokenWithTag::new(fields[token_column]);
            if let Some(c) = label_column {
                t.assign_label(fields[c]);
            }
            if let Some(c) = tag_column {
                t.assign_tag(fields[c]);
            }
            if let Some(c) = lemma_column {
                t.lemma = fields[c].to_string();
            }
            sentence.push(t);
        }
        if !sentence.is_empty() {
            self.process_sentence(&mut sentence, outputter, eval_mode, eval)?;
        }
        Ok(())
    }

    fn process_sentence<O>(
        &mut self,
        sentence: &mut [TokenWithTag],
        outputter: &mut O,
        eval_mode: bool,
        eval: &mut EvaluationInfo,
    ) -> Result<()>
    where
        O: Outputter + ?Sized,
    {
        let inferred = self.apply_model(sentence);
        if eval_mode {
            for (t, label) in sentence.iter().zip(&inferred) {
                eval.record(label, &t.label);
            }
            outputter.emit_with_gold(sentence, &inferred)?;
        } else {
            for (t, label) in sentence.iter_mut().zip(&inferred) {
                t.assign_label(label.clone());
            }
            outputter.emit(sentence)?;
        }
        self.seq_count += 1;
        self.token_count += sentence.len();
        Ok(())
    }

    /// Extracts, translates and decodes a sentence, returning the inferred
    /// label strings.
    pub fn apply_model(&mut self, sentence: &[TokenWithTag]) -> Vec<String> {
        let seq = self.extractor.add_features(sentence);
        let translated = self.translate(&seq);
        let mut label_ids: Vec<LabelId> = vec![];
        self.decoder
            .best_sequence(self.model, &translated, &mut label_ids);
        label_ids
            .iter()
            .map(|&id| self.model.label_of(id).to_string())
            .collect()
    }

    // Attributes not present in the model are dropped; that is the expected
    // open-vocabulary behavior at inference time.
    fn translate(&self, seq: &[WordWithAttributes]) -> Vec<Vec<AttributeId>> {
        seq.iter()
            .map(|w| {
                w.attributes
                    .iter()
                    .filter_map(|a| self.model.attr_id_of(a))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::TrainingCorpus;
    use crate::feature::FeatureSet;
    use crate::output::ColumnOutputter;
    use crate::trainer::{PerceptronTrainer, TrainerOptions};

    const ANNOTATED: &str =
        "<ne class=\"PER\">Angela Merkel</ne> met <ne class=\"PER\">Obama</ne> .";

    fn extractor() -> FeatureExtractor {
        let mut opts = FeatureSet::default();
        opts.word = true;
        opts.prev_words = true;
        opts.next_words = true;
        opts.token_types = true;
        opts.delimiters = true;
        FeatureExtractor::new(opts)
    }

    // Annotate the sample text, train on it, then apply the model to the
    // unannotated text and expect the training labels back.
    fn trained_model() -> CrfModel {
        let config = CrfConfiguration::new();
        let fe = extractor();
        let mut corpus_text = String::new();
        for sentence in SentenceReader::new(
            ANNOTATED,
            config.annotation_scheme(),
            config.default_label(),
        ) {
            let words = fe.add_features(&sentence);
            for (w, t) in words.iter().zip(&sentence) {
                corpus_text.push_str(&w.to_line(&t.label, true));
                corpus_text.push('\n');
            }
            corpus_text.push('\n');
        }
        let mut corpus = TrainingCorpus::from_reader(corpus_text.as_bytes()).unwrap();
        let options = TrainerOptions {
            max_iterations: 10,
            shuffle_seed: Some(1),
            ..TrainerOptions::default()
        };
        let mut trainer = PerceptronTrainer::new(&corpus, 1, options).unwrap();
        trainer.train(&mut corpus).unwrap();
        trainer.into_model()
    }

    #[test]
    fn test_running_text_round_trip() {
        let model = trained_model();
        let mut config = CrfConfiguration::new();
        config.set_running_text(true);
        let mut applier = Applier::new(&model, &config, extractor());

        let mut buf = vec![];
        let mut outputter = ColumnOutputter::new(&mut buf);
        applier
            .apply_to("Angela Merkel met Obama .".as_bytes(), &mut outputter)
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        let labels: Vec<&str> = text
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| l.split('\t').next().unwrap())
            .collect();
        assert_eq!(vec!["PER_B", "PER_I", "OTHER", "PER_B", "OTHER"], labels);
        assert_eq!(5, applier.processed_tokens());
        assert_eq!(1, applier.processed_sequences());
    }

    #[test]
    fn test_running_text_evaluation() {
        let model = trained_model();
        let mut config = CrfConfiguration::new();
        config.set_running_text(true);
        let mut applier = Applier::new(&model, &config, extractor());

        let mut buf = vec![];
        let mut outputter = ColumnOutputter::new(&mut buf);
        let eval = applier
            .evaluation_of(ANNOTATED.as_bytes(), &mut outputter)
            .unwrap();
        assert_eq!(1.0, eval.accuracy());
        assert_eq!(1.0, eval.precision());
        assert_eq!(1.0, eval.recall());
    }

    #[test]
    fn test_column_data() {
        let model = trained_model();
        let mut config = CrfConfiguration::new();
        config
            .read("Columns = Token;Label".as_bytes())
            .unwrap();
        let mut applier = Applier::new(&model, &config, extractor());

        let input = "Angela\tX\nMerkel\tX\nmet\tX\nObama\tX\n.\tX\n";
        let mut buf = vec![];
        let mut outputter = ColumnOutputter::new(&mut buf);
        applier.apply_to(input.as_bytes(), &mut outputter).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let labels: Vec<&str> = text
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| l.split('\t').next().unwrap())
            .collect();
        assert_eq!(vec!["PER_B", "PER_I", "OTHER", "PER_B", "OTHER"], labels);
    }

    #[test]
    fn test_evaluation_info_counts() {
        let mut eval = EvaluationInfo::new("OTHER");
        eval.record("PER_B", "PER_B");
        eval.record("OTHER", "PER_I");
        eval.record("OTHER", "OTHER");
        eval.record("LOC_B", "OTHER");
        assert_eq!(0.5, eval.accuracy());
        assert_eq!(0.5, eval.precision());
        assert_eq!(0.5, eval.recall());
        assert_eq!(0.5, eval.f1_score());
    }
}
