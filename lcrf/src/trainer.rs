//! Averaged-perceptron parameter estimation (Collins 2002).

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::corpus::TrainingCorpus;
use crate::decoder::Decoder;
use crate::errors::Result;
use crate::model::{AttributeId, CrfModel};
use crate::state::{CrfState, LabelId, StateId};

const AMPLIFY: f64 = 0.2;
const DAMP: f64 = -AMPLIFY;
const TRANSITION_MULTIPLIER: f64 = 2.0;

/// Hyperparameters of a training run.
#[derive(Debug, Clone)]
pub struct TrainerOptions {
    /// Maximum number of passes over the corpus.
    pub max_iterations: u32,
    /// Stop early once the per-iteration loss drops to this value.
    pub loss_threshold: Option<f64>,
    /// Seed for the inter-iteration corpus shuffle. A fixed seed makes the
    /// whole run reproducible bit for bit.
    pub shuffle_seed: Option<u64>,
    /// Create and update the lower-order transition structure of
    /// higher-order models.
    pub backoff_transitions: bool,
}

impl Default for TrainerOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            loss_threshold: None,
            shuffle_seed: None,
            backoff_transitions: false,
        }
    }
}

// Updater for the averaged parameter vector.
//
// The perceptron touches only a handful of parameters per training pair, but
// plain averaging would add the complete parameter vector into an
// accumulator after every pair. Instead, two side vectors remember for each
// parameter the step of its last update and its value back then; the omitted
// summations are caught up on the next touch, and once more when training
// ends. Repeated summations become rare multiplications.
struct ParamUpdater {
    summed: Vec<f64>,
    last_value: Vec<f64>,
    last_step: Vec<usize>,
}

impl ParamUpdater {
    fn new(num_params: usize) -> Self {
        Self {
            summed: vec![0.0; num_params],
            last_value: vec![0.0; num_params],
            last_step: vec![0; num_params],
        }
    }

    fn update(&mut self, params: &mut [f64], p: usize, step: usize, w: f64) {
        params[p] += w;
        if step == self.last_step[p] {
            self.summed[p] += w;
        } else {
            // The just-updated value counts once; the untouched steps in
            // between are credited with the pre-update value.
            let n = step - self.last_step[p] - 1;
            self.summed[p] += params[p] + n as f64 * self.last_value[p];
            self.last_step[p] = step;
        }
        self.last_value[p] = params[p];
    }

    // Flushes all pending summations and divides by the total step count.
    fn into_average(mut self, total_steps: usize) -> Vec<f64> {
        for p in 0..self.summed.len() {
            if total_steps != self.last_step[p] {
                let n = total_steps - self.last_step[p] - 1;
                self.summed[p] += n as f64 * self.last_value[p];
            }
            self.summed[p] /= total_steps as f64;
        }
        self.summed
    }
}

/// Trains a CRF with the structured averaged perceptron.
pub struct PerceptronTrainer {
    model: CrfModel,
    decoder: Decoder,
    options: TrainerOptions,
}

impl PerceptronTrainer {
    /// Builds the initial model from the corpus and sizes the decoder for
    /// its longest sequence.
    pub fn new(corpus: &TrainingCorpus, order: usize, options: TrainerOptions) -> Result<Self> {
        let model = CrfModel::initial_from_corpus(corpus, order, options.backoff_transitions)?;
        let mut decoder = Decoder::new();
        decoder.resize_matrices(&model, corpus.max_input_len());
        Ok(Self {
            model,
            decoder,
            options,
        })
    }

    pub fn model(&self) -> &CrfModel {
        &self.model
    }

    /// Consumes the trainer and hands out the trained model.
    pub fn into_model(self) -> CrfModel {
        self.model
    }

    /// Runs the training loop and installs the averaged parameters in the
    /// model. Returns the per-iteration losses.
    pub fn train(&mut self, corpus: &mut TrainingCorpus) -> Result<Vec<f64>> {
        let mut updater = ParamUpdater::new(self.model.parameters_count());
        let mut rng = match self.options.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut z: Vec<LabelId> = vec![];
        let mut losses = vec![];
        let mut step = 0;

        for _ in 0..self.options.max_iterations {
            let mut loss = 0.0;
            for i in 0..corpus.len() {
                let pair = corpus.get(i);
                self.decoder.best_sequence(&self.model, &pair.x, &mut z);
                let mut num_diffs = 0;
                if z != pair.y {
                    num_diffs = if self.model.order() == 1 {
                        self.first_order_update(&pair.x, &pair.y, &z, step, &mut updater)
                    } else {
                        self.higher_order_update(&pair.x, &pair.y, &z, step, &mut updater)
                    };
                }
                loss += f64::from(num_diffs) / pair.y.len() as f64;
                step += 1;
            }
            losses.push(loss);
            corpus.shuffle(&mut rng);
            if self.options.loss_threshold.is_some_and(|th| loss <= th) {
                break;
            }
        }

        if step > 0 {
            let averaged = updater.into_average(step);
            self.model.set_parameters(averaged)?;
        }
        Ok(losses)
    }

    fn first_order_update(
        &mut self,
        x: &[Vec<AttributeId>],
        y: &[LabelId],
        z: &[LabelId],
        step: usize,
        updater: &mut ParamUpdater,
    ) -> u32 {
        let mut num_diffs = 0;
        let mut prev_y: Option<LabelId> = None;
        let mut prev_z: Option<LabelId> = None;
        for j in 0..y.len() {
            if y[j] != z[j] {
                // A differing label: update the state features of both labels
                // and the transitions leading to them.
                self.state_feature_updates(&x[j], y[j], step, AMPLIFY, updater);
                self.state_feature_updates(&x[j], z[j], step, DAMP, updater);
                if j > 0 {
                    self.label_transition_update(prev_y, y[j], step, AMPLIFY, updater);
                    self.label_transition_update(prev_z, z[j], step, DAMP, updater);
                }
                num_diffs += 1;
            } else if prev_y != prev_z {
                // Equal labels after a differing pair still teach the
                // boundary transition.
                self.label_transition_update(prev_y, y[j], step, AMPLIFY, updater);
                self.label_transition_update(prev_z, z[j], step, DAMP, updater);
            }
            prev_y = Some(y[j]);
            prev_z = Some(z[j]);
        }
        num_diffs
    }

    fn higher_order_update(
        &mut self,
        x: &[Vec<AttributeId>],
        y: &[LabelId],
        z: &[LabelId],
        step: usize,
        updater: &mut ParamUpdater,
    ) -> u32 {
        let order = self.model.order();
        let mut num_diffs = 0;
        let mut last_diff = -(order as isize);
        for j in 0..y.len() {
            if y[j] != z[j] {
                self.state_feature_updates(&x[j], y[j], step, AMPLIFY, updater);
                self.state_feature_updates(&x[j], z[j], step, DAMP, updater);
                last_diff = j as isize;
                num_diffs += 1;
            }
            // Transitions are only affected within a window of the model
            // order around a differing position; outside it both paths agree.
            if y[j] != z[j] || (j as isize) < last_diff + order as isize {
                let lo = j.saturating_sub(order);
                let from_y = CrfState::from_window(&y[lo..j], order);
                let from_z = CrfState::from_window(&z[lo..j], order);
                self.state_transition_updates(from_y, y[j], step, AMPLIFY, updater);
                self.state_transition_updates(from_z, z[j], step, DAMP, updater);
            }
        }
        num_diffs
    }

    fn state_feature_updates(
        &mut self,
        attrs: &[AttributeId],
        label: LabelId,
        step: usize,
        w: f64,
        updater: &mut ParamUpdater,
    ) {
        for &a in attrs {
            if let Some(p) = self.model.feature_param_index(a, label) {
                updater.update(self.model.parameters_mut(), p as usize, step, w);
            }
        }
    }

    fn label_transition_update(
        &mut self,
        from: Option<LabelId>,
        to: LabelId,
        step: usize,
        w: f64,
        updater: &mut ParamUpdater,
    ) {
        let Some(from) = from else { return };
        self.transition_update(
            Some(StateId::from(from)),
            Some(StateId::from(to)),
            step,
            w * TRANSITION_MULTIPLIER,
            updater,
        );
    }

    // Updates the main transition of a higher-order "from" state and, with
    // back-off enabled, the lower-order transitions around it.
    fn state_transition_updates(
        &mut self,
        mut from: CrfState,
        c: LabelId,
        step: usize,
        w: f64,
        updater: &mut ParamUpdater,
    ) {
        let order = self.model.order();
        let w = w * TRANSITION_MULTIPLIER;
        if from.history_length() < order {
            if self.options.backoff_transitions {
                for _ in 0..from.history_length() {
                    let from_id = self.model.crf_state_id(&from);
                    let inc_id = self.model.crf_state_id(&from.increase_history(c));
                    self.transition_update(from_id, inc_id, step, w, updater);
                    let wrap_id = self.model.crf_state_id(&from.wrap(c));
                    self.transition_update(from_id, wrap_id, step, w, updater);
                    from.shorten_history();
                }
            } else {
                let from_id = self.model.crf_state_id(&from);
                let to_id = self.model.crf_state_id(&from.increase_history(c));
                self.transition_update(from_id, to_id, step, w, updater);
            }
        } else {
            let to = from.wrap(c);
            let from_id = self.model.crf_state_id(&from);
            let to_id = self.model.crf_state_id(&to);
            self.transition_update(from_id, to_id, step, w, updater);
            if self.options.backoff_transitions {
                let mut to_copy = to;
                for _ in 0..order - 1 {
                    let from_copy = from;
                    from.shorten_history();
                    let lower_from = self.model.crf_state_id(&from);
                    let higher_to = self.model.crf_state_id(&to_copy);
                    self.transition_update(lower_from, higher_to, step, w, updater);
                    to_copy.shorten_history();
                    let lower_to = self.model.crf_state_id(&to_copy);
                    self.transition_update(lower_from, lower_to, step, w, updater);
                    let higher_from = self.model.crf_state_id(&from_copy);
                    self.transition_update(higher_from, lower_to, step, w, updater);
                }
            }
        }
    }

    // Parameter indexes that do not exist in the model are silently dropped.
    fn transition_update(
        &mut self,
        from: Option<StateId>,
        to: Option<StateId>,
        step: usize,
        w: f64,
        updater: &mut ParamUpdater,
    ) {
        let (Some(from), Some(to)) = (from, to) else {
            return;
        };
        if let Some(p) = self.model.transition_param_index(from, to) {
            updater.update(self.model.parameters_mut(), p as usize, step, w);
        }
    }
}
