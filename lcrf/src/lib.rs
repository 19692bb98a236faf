//! # lcrf
//!
//! A toolkit for supervised sequence labeling with first- and higher-order
//! linear-chain Conditional Random Fields: Viterbi decoding, averaged
//! perceptron training, feature extraction with DAWG-based multi-word
//! pattern lookup, and a binary model codec.
//!
//! ## Examples
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! use lcrf::{Decoder, CrfModel};
//!
//! let mut f = BufReader::new(File::open("model.crf").unwrap());
//! let model = CrfModel::read(&mut f).unwrap();
//! let mut decoder = Decoder::new();
//!
//! // Attribute ids of a three-token input, e.g. from a FeatureExtractor.
//! let input = vec![vec![0, 4], vec![1], vec![2, 3]];
//! let mut labels = vec![];
//! let score = decoder.best_sequence(&model, &input, &mut labels);
//! for id in labels {
//!     println!("{} ({score})", model.label_of(id));
//! }
//! ```
//!
//! Training reads a tab-separated corpus into a [`TrainingCorpus`] and runs
//! the [`PerceptronTrainer`]; see the `train` command for the full pipeline.

mod applier;
mod config;
mod corpus;
mod dawg;
mod decoder;
pub mod dump;
mod errors;
mod feature;
mod mapper;
mod model;
mod output;
mod state;
mod text;
mod token;
mod trainer;

pub use applier::{Applier, EvaluationInfo};
pub use config::CrfConfiguration;
pub use corpus::{TrainingCorpus, TranslatedPair};
pub use dawg::{Dawg, DawgEntry, DawgState};
pub use decoder::Decoder;
pub use errors::{LcrfError, Result};
pub use feature::{FeatureExtractor, FeatureSet};
pub use mapper::StringIdMapper;
pub use model::{AttributeId, CrfModel, ModelMetaData, ParamIndex, MODEL_MAGIC};
pub use output::{
    AnnotationOutputter, ColumnOutputter, JsonOutputter, MorphOutputter, Outputter,
};
pub use state::{CrfState, LabelId, StateId, StateMapper, BOS_LABEL, MAX_ORDER};
pub use text::{AnnotationScheme, SentenceReader};
pub use token::{TokenWithTag, WordWithAttributes};
pub use trainer::{PerceptronTrainer, TrainerOptions};
