//! Viterbi decoding over first- and higher-order trellises.

use crate::model::{AttributeId, CrfModel};
use crate::state::{LabelId, StateId};

const MINIMUM_WEIGHT: f64 = f64::NEG_INFINITY;

/// Computes argmax label sequences for translated inputs.
///
/// The trellis, back-pointer and precomputed-weight matrices are cached and
/// only grow when a longer input arrives, so a decoder should be reused
/// across calls.
#[derive(Debug, Default)]
pub struct Decoder {
    trellis: Vec<Vec<f64>>,
    back_pointers: Vec<Vec<StateId>>,
    precomputed_weights: Vec<Vec<f64>>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-sizes all matrices for inputs up to `max_input_len`.
    pub fn resize_matrices(&mut self, model: &CrfModel, max_input_len: usize) {
        self.prepare_matrices(model, max_input_len);
    }

    /// Fills `output` with the argmax label sequence for `input` and returns
    /// its score. An empty input yields an empty output with score 0.
    pub fn best_sequence(
        &mut self,
        model: &CrfModel,
        input: &[Vec<AttributeId>],
        output: &mut Vec<LabelId>,
    ) -> f64 {
        output.clear();
        if input.is_empty() {
            return 0.0;
        }
        output.resize(input.len(), 0);
        self.prepare_matrices(model, input.len());
        self.precompute_weights(model, input);
        if model.order() == 1 {
            self.first_order_best_sequence(model, input.len(), output)
        } else {
            self.higher_order_best_sequence(model, input.len(), output)
        }
    }

    fn prepare_matrices(&mut self, model: &CrfModel, n: usize) {
        let num_states = model.states_count();
        let num_labels = model.labels_count();
        if n > self.trellis.len() {
            self.trellis.resize(n, vec![]);
            self.back_pointers.resize(n, vec![]);
            self.precomputed_weights.resize(n, vec![]);
        }
        for t in 0..n {
            self.trellis[t].clear();
            self.trellis[t].resize(num_states, MINIMUM_WEIGHT);
            self.back_pointers[t].clear();
            self.back_pointers[t].resize(num_states, 0);
            self.precomputed_weights[t].clear();
            self.precomputed_weights[t].resize(num_labels, 0.0);
        }
    }

    // Sums the feature weights of every label at every position once, so the
    // inner Viterbi loops only read a T x L matrix. Attributes unknown to
    // the model contribute nothing.
    fn precompute_weights(&mut self, model: &CrfModel, input: &[Vec<AttributeId>]) {
        for (t, attrs) in input.iter().enumerate() {
            let row = &mut self.precomputed_weights[t];
            for &a in attrs {
                for &(label, p) in model.labels_for_attribute(a) {
                    row[usize::from(label)] += model.weight(p);
                }
            }
        }
    }

    fn label_psi(&self, label: LabelId, t: usize) -> f64 {
        self.precomputed_weights[t][usize::from(label)]
    }

    fn first_order_best_sequence(
        &mut self,
        model: &CrfModel,
        n: usize,
        output: &mut [LabelId],
    ) -> f64 {
        let num_states = model.states_count();

        // Column 0 carries state features only.
        for q in 0..num_states {
            self.trellis[0][q] = self.label_psi(LabelId::try_from(q).unwrap(), 0);
        }

        for t in 1..n {
            for qj in 0..num_states {
                let mut max_score = MINIMUM_WEIGHT;
                let mut best_src = 0;
                for &(src, p) in model.adjacency_of(StateId::try_from(qj).unwrap()) {
                    let w = self.trellis[t - 1][usize::try_from(src).unwrap()] + model.weight(p);
                    if w > max_score {
                        max_score = w;
                        best_src = src;
                    }
                }
                self.back_pointers[t][qj] = best_src;
                let psi = self.label_psi(LabelId::try_from(qj).unwrap(), t);
                self.trellis[t][qj] = max_score + psi;
            }
        }

        let (score, global_bp) = self.best_last_cell(n);
        match global_bp {
            Some(mut bp) => {
                for k in (0..n).rev() {
                    output[k] = LabelId::try_from(bp).unwrap();
                    bp = self.back_pointers[k][usize::try_from(bp).unwrap()];
                }
                score
            }
            None => {
                output.fill(0);
                score
            }
        }
    }

    fn higher_order_best_sequence(
        &mut self,
        model: &CrfModel,
        n: usize,
        output: &mut [LabelId],
    ) -> f64 {
        let num_states = model.states_count();

        // Column 0 is seeded from the outgoing transitions of (<BOS>).
        for &(to, p) in model.adjacency_of(model.start_state()) {
            self.trellis[0][usize::try_from(to).unwrap()] = model.weight(p);
            self.back_pointers[0][usize::try_from(to).unwrap()] = model.start_state();
        }

        for t in 0..n - 1 {
            for from in 1..num_states {
                if self.trellis[t][from] == MINIMUM_WEIGHT {
                    continue;
                }
                // The state-feature contribution is a self-update; it does
                // not touch any back pointer.
                let from_id = StateId::try_from(from).unwrap();
                let psi = self.label_psi(model.label_of_state(from_id), t);
                self.trellis[t][from] += psi;
                let score_from = self.trellis[t][from];
                for &(to, p) in model.adjacency_of(from_id) {
                    let w = score_from + model.weight(p);
                    let cell = &mut self.trellis[t + 1][usize::try_from(to).unwrap()];
                    if w > *cell {
                        *cell = w;
                        self.back_pointers[t + 1][usize::try_from(to).unwrap()] = from_id;
                    }
                }
            }
        }

        for q in 1..num_states {
            if self.trellis[n - 1][q] != MINIMUM_WEIGHT {
                let q_id = StateId::try_from(q).unwrap();
                let psi = self.label_psi(model.label_of_state(q_id), n - 1);
                self.trellis[n - 1][q] += psi;
            }
        }

        let (score, global_bp) = self.best_last_cell(n);
        match global_bp {
            Some(mut bp) => {
                for k in (0..n).rev() {
                    output[k] = model.label_of_state(bp);
                    bp = self.back_pointers[k][usize::try_from(bp).unwrap()];
                }
                score
            }
            None => {
                output.fill(0);
                score
            }
        }
    }

    // Cells still at the fill sentinel must never win the global argmax.
    fn best_last_cell(&self, n: usize) -> (f64, Option<StateId>) {
        let mut score = MINIMUM_WEIGHT;
        let mut best = None;
        for (q, &w) in self.trellis[n - 1].iter().enumerate() {
            if w > score {
                score = w;
                best = Some(StateId::try_from(q).unwrap());
            }
        }
        (score, best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::StringIdMapper;
    use crate::state::{CrfState, BOS_LABEL};

    fn first_order_toy() -> CrfModel {
        // Labels: <BOS>=0, A=1, B=2. One attribute "bias" firing at every
        // position with weight +1 for A and 0 for B. Transitions:
        // A->A +0.1, A->B -1, B->A 0, B->B 0.
        let mut labels = StringIdMapper::new();
        labels.add("<BOS>", 0);
        labels.add("A", 1);
        labels.add("B", 2);
        let mut attrs = StringIdMapper::new();
        attrs.add("bias", 0);
        let mut model = CrfModel::new(labels, attrs, 1).unwrap();
        model.add_transition(1, 1);
        model.add_transition(1, 2);
        model.add_transition(2, 1);
        model.add_transition(2, 2);
        model.add_feature(1, 0);
        model.add_feature(2, 0);
        model.finalise();
        let t_aa = model.transition_param_index(1, 1).unwrap() as usize;
        let t_ab = model.transition_param_index(1, 2).unwrap() as usize;
        let f_a = model.feature_param_index(0, 1).unwrap() as usize;
        let params = model.parameters_mut();
        params[t_aa] = 0.1;
        params[t_ab] = -1.0;
        params[f_a] = 1.0;
        model
    }

    #[test]
    fn test_first_order_toy_argmax() {
        let model = first_order_toy();
        let mut decoder = Decoder::new();
        let input = vec![vec![0], vec![0], vec![0]];
        let mut output = vec![];
        let score = decoder.best_sequence(&model, &input, &mut output);
        assert_eq!(vec![1, 1, 1], output);
        assert!((score - 3.2).abs() < 1e-9);
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let model = first_order_toy();
        let mut decoder = Decoder::new();
        let input = vec![vec![0], vec![0], vec![0], vec![0], vec![0]];
        let mut out1 = vec![];
        let mut out2 = vec![];
        let s1 = decoder.best_sequence(&model, &input, &mut out1);
        let s2 = decoder.best_sequence(&model, &input, &mut out2);
        assert_eq!(out1, out2);
        assert!((s1 - s2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_input() {
        let model = first_order_toy();
        let mut decoder = Decoder::new();
        let mut output = vec![7];
        let score = decoder.best_sequence(&model, &[], &mut output);
        assert!(output.is_empty());
        assert_eq!(0.0, score);
    }

    #[test]
    fn test_unknown_attributes_are_skipped() {
        let model = first_order_toy();
        let mut decoder = Decoder::new();
        let mut with_unknown = vec![];
        let mut without = vec![];
        let s1 = decoder.best_sequence(&model, &[vec![0, 99], vec![0]], &mut with_unknown);
        let s2 = decoder.best_sequence(&model, &[vec![0], vec![0]], &mut without);
        assert_eq!(with_unknown, without);
        assert!((s1 - s2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_matrices_grow_with_input() {
        let model = first_order_toy();
        let mut decoder = Decoder::new();
        let mut output = vec![];
        decoder.best_sequence(&model, &vec![vec![0]; 2], &mut output);
        assert_eq!(vec![1, 1], output);
        decoder.best_sequence(&model, &vec![vec![0]; 6], &mut output);
        assert_eq!(vec![1; 6], output);
    }

    fn higher_order_toy() -> CrfModel {
        // Order-2 model over labels A=1, B=2 with hand-placed transition
        // weights; states are assigned in insertion order with (<BOS>) = 0.
        let mut labels = StringIdMapper::new();
        labels.add("<BOS>", 0);
        labels.add("A", 1);
        labels.add("B", 2);
        let mut attrs = StringIdMapper::new();
        attrs.add("bias", 0);
        let mut model = CrfModel::new(labels, attrs, 2).unwrap();
        let bos = CrfState::new(BOS_LABEL);
        let bos_a = bos.increase_history(1);
        let bos_b = bos.increase_history(2);
        let aa = bos_a.wrap(1);
        let ab = bos_a.wrap(2);
        model.add_transition_states(&bos, &bos_a); // p0
        model.add_transition_states(&bos, &bos_b); // p1
        model.add_transition_states(&bos_a, &aa); // p2
        model.add_transition_states(&bos_a, &ab); // p3
        model.add_transition_states(&aa, &aa); // p4
        model.finalise();
        let params = model.parameters_mut();
        params[0] = 1.0;
        params[1] = 0.0;
        params[2] = 0.5;
        params[3] = 0.0;
        params[4] = 0.5;
        model
    }

    #[test]
    fn test_higher_order_argmax() {
        let model = higher_order_toy();
        assert_eq!(0, model.start_state());
        let mut decoder = Decoder::new();
        let input = vec![vec![], vec![], vec![]];
        let mut output = vec![];
        let score = decoder.best_sequence(&model, &input, &mut output);
        assert_eq!(vec![1, 1, 1], output);
        assert!((score - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_higher_order_single_position() {
        let model = higher_order_toy();
        let mut decoder = Decoder::new();
        let mut output = vec![];
        let score = decoder.best_sequence(&model, &[vec![]], &mut output);
        // Only the <BOS> transitions apply; A wins with weight 1.
        assert_eq!(vec![1], output);
        assert!((score - 1.0).abs() < 1e-9);
    }
}
