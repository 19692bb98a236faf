//! The CRF model: labels, states, transitions, features, parameters, and the
//! binary model codec.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use hashbrown::HashMap;

use crate::corpus::TrainingCorpus;
use crate::errors::{LcrfError, Result};
use crate::mapper::StringIdMapper;
use crate::state::{CrfState, LabelId, StateId, StateMapper, BOS_LABEL, MAX_ORDER};

/// Magic string at the start of a binary model file.
pub const MODEL_MAGIC: &[u8] = b"LCRF Binary Model File version 1.0\0";

/// Index into the flat parameter vector.
pub type ParamIndex = u32;

/// Dense id of an attribute.
pub type AttributeId = u32;

/// Basic counts describing a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelMetaData {
    pub order: u32,
    pub num_labels: u32,
    pub num_states: u32,
    pub num_transitions: u32,
    pub num_attributes: u32,
    pub num_features: u32,
    pub num_parameters: u32,
    pub num_non_null_parameters: u32,
}

impl ModelMetaData {
    fn write<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        for v in [
            self.order,
            self.num_labels,
            self.num_states,
            self.num_transitions,
            self.num_attributes,
            self.num_features,
            self.num_parameters,
            self.num_non_null_parameters,
        ] {
            wtr.write_u32::<LittleEndian>(v)?;
        }
        Ok(())
    }

    fn read<R>(mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        Ok(Self {
            order: rdr.read_u32::<LittleEndian>()?,
            num_labels: rdr.read_u32::<LittleEndian>()?,
            num_states: rdr.read_u32::<LittleEndian>()?,
            num_transitions: rdr.read_u32::<LittleEndian>()?,
            num_attributes: rdr.read_u32::<LittleEndian>()?,
            num_features: rdr.read_u32::<LittleEndian>()?,
            num_parameters: rdr.read_u32::<LittleEndian>()?,
            num_non_null_parameters: rdr.read_u32::<LittleEndian>()?,
        })
    }
}

/// A first- or higher-order linear-chain CRF.
///
/// For order 1, states coincide with labels and the adjacency table holds the
/// *incoming* transitions of each destination label. For order ≥ 2, states
/// are label tuples (see [`CrfState`]) and the adjacency table holds the
/// *outgoing* transitions of each source state, rooted at `(<BOS>)` with
/// state id 0. The `(from, to)` index map agrees with the adjacency table in
/// both layouts.
#[derive(Debug, Clone)]
pub struct CrfModel {
    labels: StringIdMapper,
    attributes: StringIdMapper,
    states: StateMapper,
    order: usize,

    adjacency: Vec<Vec<(StateId, ParamIndex)>>,
    transition_index: HashMap<(StateId, StateId), ParamIndex>,
    label_attributes: Vec<HashMap<AttributeId, ParamIndex>>,
    labels_at_attributes: Vec<Vec<(LabelId, ParamIndex)>>,
    params: Vec<f64>,

    num_transitions: u32,
    num_features: u32,
}

impl CrfModel {
    /// Creates an empty model over frozen label and attribute mappers.
    pub fn new(labels: StringIdMapper, attributes: StringIdMapper, order: usize) -> Result<Self> {
        if order == 0 || order > MAX_ORDER {
            return Err(LcrfError::invalid_argument(
                "order",
                format!("must be in 1..={MAX_ORDER}"),
            ));
        }
        let num_labels = labels.len();
        let num_attrs = attributes.len();
        Ok(Self {
            labels,
            attributes,
            states: StateMapper::new(),
            order,
            adjacency: vec![vec![]; num_labels],
            transition_index: HashMap::new(),
            label_attributes: vec![HashMap::new(); num_labels],
            labels_at_attributes: vec![vec![]; num_attrs],
            params: vec![],
            num_transitions: 0,
            num_features: 0,
        })
    }

    /// Builds the initial model from a translated corpus: transitions between
    /// observed label (tuples) and one feature per observed (attribute,
    /// label) pair, all with zero weight. `backoff` additionally creates the
    /// lower-order transition structure of higher-order models.
    pub fn initial_from_corpus(
        corpus: &TrainingCorpus,
        order: usize,
        backoff: bool,
    ) -> Result<Self> {
        let mut model = Self::new(
            corpus.labels_mapper().clone(),
            corpus.attributes_mapper().clone(),
            order,
        )?;
        if order == 1 {
            model.collect_first_order(corpus);
        } else {
            model.collect_higher_order(corpus, backoff);
        }
        model.finalise();
        Ok(model)
    }

    fn collect_first_order(&mut self, corpus: &TrainingCorpus) {
        for pair in corpus.pairs() {
            let mut prev = None;
            for (attrs, &label) in pair.x.iter().zip(&pair.y) {
                if let Some(prev) = prev {
                    self.add_transition(StateId::from(prev), StateId::from(label));
                }
                for &a in attrs {
                    self.add_feature(label, a);
                }
                prev = Some(label);
            }
        }
    }

    fn collect_higher_order(&mut self, corpus: &TrainingCorpus, backoff: bool) {
        for pair in corpus.pairs() {
            // Every sequence starts in state (<BOS>); the very first
            // add_transition_states call makes it state id 0.
            let mut from = CrfState::new(BOS_LABEL);
            for (attrs, &label) in pair.x.iter().zip(&pair.y) {
                for &a in attrs {
                    self.add_feature(label, a);
                }
                if from.history_length() < self.order {
                    let to = from.increase_history(label);
                    if backoff {
                        let hl = from.history_length();
                        for _ in 0..hl {
                            self.add_transition_states(&from, &from.increase_history(label));
                            self.add_transition_states(&from, &from.wrap(label));
                            from.shorten_history();
                        }
                    } else {
                        self.add_transition_states(&from, &to);
                    }
                    from = to;
                } else {
                    let to = from.wrap(label);
                    self.add_transition_states(&from, &to);
                    if backoff {
                        let mut to_copy = to;
                        for _ in 0..self.order - 1 {
                            let from_copy = from;
                            from.shorten_history();
                            self.add_transition_states(&from, &to_copy);
                            to_copy.shorten_history();
                            self.add_transition_states(&from, &to_copy);
                            self.add_transition_states(&from_copy, &to_copy);
                        }
                    }
                    from = to;
                }
            }
        }
    }

    /// Adds a transition `from --> to` with zero weight; returns `true` if
    /// newly created. For order 1 the state ids are label ids.
    pub fn add_transition(&mut self, from: StateId, to: StateId) -> bool {
        self.add_transition_weighted(from, to, 0.0)
    }

    pub(crate) fn add_transition_weighted(&mut self, from: StateId, to: StateId, w: f64) -> bool {
        if self.transition_index.contains_key(&(from, to)) {
            return false;
        }
        let p = ParamIndex::try_from(self.params.len()).unwrap();
        // Order 1 stores incoming edges per destination, higher orders
        // outgoing edges per source.
        let slot = if self.order == 1 { to } else { from };
        let neighbor = if self.order == 1 { from } else { to };
        let slot = usize::try_from(slot).unwrap();
        if slot >= self.adjacency.len() {
            self.adjacency.resize(slot * 2 + 1, vec![]);
        }
        self.adjacency[slot].push((neighbor, p));
        self.transition_index.insert((from, to), p);
        self.params.push(w);
        self.num_transitions += 1;
        true
    }

    /// Adds a transition between state tuples of a higher-order model,
    /// assigning state ids on first encounter.
    pub fn add_transition_states(&mut self, from: &CrfState, to: &CrfState) -> bool {
        let from_id = self.states.get_or_insert(from);
        let to_id = self.states.get_or_insert(to);
        self.add_transition_weighted(from_id, to_id, 0.0)
    }

    /// Associates an attribute with a label, i.e. creates a feature. No-op
    /// when the pair already exists.
    pub fn add_feature(&mut self, label: LabelId, attr: AttributeId) -> bool {
        self.add_feature_weighted(label, attr, 0.0)
    }

    pub(crate) fn add_feature_weighted(&mut self, label: LabelId, attr: AttributeId, w: f64) -> bool {
        let la = &mut self.labels_at_attributes[usize::try_from(attr).unwrap()];
        let pos = la.partition_point(|&(l, _)| l < label);
        if la.get(pos).is_some_and(|&(l, _)| l == label) {
            return false;
        }
        let p = ParamIndex::try_from(self.params.len()).unwrap();
        la.insert(pos, (label, p));
        self.label_attributes[usize::from(label)].insert(attr, p);
        self.params.push(w);
        self.num_features += 1;
        true
    }

    /// Iterates over the incoming transitions of a destination label as
    /// `(source, weight)`. First-order layout.
    pub fn ingoing_transitions_of(&self, to: StateId) -> impl Iterator<Item = (StateId, f64)> + '_ {
        self.neighbors_of(to)
    }

    /// Iterates over the outgoing transitions of a source state as
    /// `(destination, weight)`. Higher-order layout.
    pub fn outgoing_transitions_of(
        &self,
        from: StateId,
    ) -> impl Iterator<Item = (StateId, f64)> + '_ {
        self.neighbors_of(from)
    }

    fn neighbors_of(&self, q: StateId) -> impl Iterator<Item = (StateId, f64)> + '_ {
        self.adjacency
            .get(usize::try_from(q).unwrap())
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&(n, p)| (n, self.params[usize::try_from(p).unwrap()]))
    }

    pub(crate) fn adjacency_of(&self, q: StateId) -> &[(StateId, ParamIndex)] {
        self.adjacency
            .get(usize::try_from(q).unwrap())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The `(label, parameter)` pairs of all labels the attribute fires on,
    /// sorted by label id.
    pub fn labels_for_attribute(&self, attr: AttributeId) -> &[(LabelId, ParamIndex)] {
        self.labels_at_attributes
            .get(usize::try_from(attr).unwrap())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn feature_param_index(&self, attr: AttributeId, label: LabelId) -> Option<ParamIndex> {
        self.label_attributes
            .get(usize::from(label))?
            .get(&attr)
            .copied()
    }

    pub fn transition_param_index(&self, from: StateId, to: StateId) -> Option<ParamIndex> {
        self.transition_index.get(&(from, to)).copied()
    }

    pub fn transition_weight(&self, from: StateId, to: StateId) -> f64 {
        self.transition_param_index(from, to)
            .map_or(0.0, |p| self.params[usize::try_from(p).unwrap()])
    }

    /// The weight at parameter index `p`, or 0 for out-of-range indexes.
    pub fn weight(&self, p: ParamIndex) -> f64 {
        self.params.get(usize::try_from(p).unwrap()).copied().unwrap_or(0.0)
    }

    pub fn parameters(&self) -> &[f64] {
        &self.params
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut [f64] {
        &mut self.params
    }

    /// Replaces the parameter vector by an externally computed one of the
    /// same length.
    pub(crate) fn set_parameters(&mut self, new_params: Vec<f64>) -> Result<()> {
        if new_params.len() != self.params.len() {
            return Err(LcrfError::invalid_argument(
                "new_params",
                "length differs from the model's parameter count",
            ));
        }
        self.params = new_params;
        Ok(())
    }

    pub fn label_of(&self, id: LabelId) -> &str {
        self.labels.string_of(u32::from(id))
    }

    pub fn label_id_of(&self, label: &str) -> Option<LabelId> {
        self.labels.id_of(label).map(|id| LabelId::try_from(id).unwrap())
    }

    pub fn attr_id_of(&self, attr: &str) -> Option<AttributeId> {
        self.attributes.id_of(attr)
    }

    pub fn attr_of(&self, id: AttributeId) -> &str {
        self.attributes.string_of(id)
    }

    pub fn bos_label(&self) -> LabelId {
        BOS_LABEL
    }

    /// The start state of a higher-order model: `(<BOS>)` with id 0.
    pub fn start_state(&self) -> StateId {
        0
    }

    /// The state tuple behind a state id of a higher-order model.
    pub fn crf_state(&self, id: StateId) -> &CrfState {
        self.states.state(id)
    }

    pub fn crf_state_id(&self, q: &CrfState) -> Option<StateId> {
        self.states.id(q)
    }

    /// The emission label of a state: itself for order 1, the rightmost
    /// tuple component otherwise.
    pub fn label_of_state(&self, id: StateId) -> LabelId {
        if self.order == 1 {
            LabelId::try_from(id).unwrap()
        } else {
            self.states.state(id).label_id()
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn labels_count(&self) -> usize {
        self.labels.len()
    }

    pub fn attributes_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn states_count(&self) -> usize {
        if self.order == 1 {
            self.labels_count()
        } else {
            self.states.len()
        }
    }

    pub fn transitions_count(&self) -> usize {
        usize::try_from(self.num_transitions).unwrap()
    }

    pub fn features_count(&self) -> usize {
        usize::try_from(self.num_features).unwrap()
    }

    pub fn parameters_count(&self) -> usize {
        self.params.len()
    }

    pub(crate) fn labels_mapper(&self) -> &StringIdMapper {
        &self.labels
    }

    pub(crate) fn attributes_mapper(&self) -> &StringIdMapper {
        &self.attributes
    }

    /// Freezes the model after construction: trims spare capacity and sorts
    /// the adjacency vectors by neighbor id so that decoding iterates
    /// transitions in a deterministic order.
    pub fn finalise(&mut self) {
        self.params.shrink_to_fit();
        for slot in &mut self.adjacency {
            slot.sort_unstable_by_key(|&(n, _)| n);
            slot.shrink_to_fit();
        }
        for la in &mut self.labels_at_attributes {
            la.shrink_to_fit();
        }
    }

    pub fn meta_data(&self) -> ModelMetaData {
        let non_null = self.params.iter().filter(|&&w| w != 0.0).count();
        ModelMetaData {
            order: u32::try_from(self.order).unwrap(),
            num_labels: u32::try_from(self.labels_count()).unwrap(),
            num_states: u32::try_from(self.states_count()).unwrap(),
            num_transitions: self.num_transitions,
            num_attributes: u32::try_from(self.attributes_count()).unwrap(),
            num_features: self.num_features,
            num_parameters: u32::try_from(self.params.len()).unwrap(),
            num_non_null_parameters: u32::try_from(non_null).unwrap(),
        }
    }

    /// Writes the model in its binary format.
    pub fn write<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        wtr.write_all(MODEL_MAGIC)?;
        self.meta_data().write(&mut wtr)?;

        // The sections are buffered first so that the offset table can be
        // written in one pass.
        let mut labels_buf = vec![];
        self.labels.write(&mut labels_buf)?;
        if self.order > 1 {
            self.states.write(&mut labels_buf, self.order)?;
        }

        let mut attrs_buf = vec![];
        self.attributes.write(&mut attrs_buf)?;

        let mut trans_buf = vec![];
        for slot in 0..self.states_count() {
            let trans = self.adjacency_of(StateId::try_from(slot)?);
            trans_buf.write_u64::<LittleEndian>(u64::try_from(trans.len())?)?;
            for &(neighbor, p) in trans {
                trans_buf.write_u32::<LittleEndian>(neighbor)?;
                trans_buf.write_u32::<LittleEndian>(p)?;
            }
        }

        let mut label_attrs_buf = vec![];
        for la in &self.labels_at_attributes {
            label_attrs_buf.write_u64::<LittleEndian>(u64::try_from(la.len())?)?;
            for &(label, p) in la {
                label_attrs_buf.write_u16::<LittleEndian>(label)?;
                label_attrs_buf.write_u32::<LittleEndian>(p)?;
            }
        }

        let mut params_buf = vec![];
        let compressed: Vec<(u32, f64)> = self
            .params
            .iter()
            .enumerate()
            .filter(|(_, &w)| w != 0.0)
            .map(|(k, &w)| (u32::try_from(k).unwrap(), w))
            .collect();
        params_buf.write_u32::<LittleEndian>(u32::try_from(compressed.len())?)?;
        for (k, w) in compressed {
            params_buf.write_u32::<LittleEndian>(k)?;
            params_buf.write_f64::<LittleEndian>(w)?;
        }

        let mut offset = u64::try_from(MODEL_MAGIC.len() + 8 * 4 + 5 * 8)?;
        for buf in [&labels_buf, &attrs_buf, &trans_buf, &label_attrs_buf, &params_buf] {
            wtr.write_u64::<LittleEndian>(offset)?;
            offset += u64::try_from(buf.len())?;
        }
        for buf in [&labels_buf, &attrs_buf, &trans_buf, &label_attrs_buf, &params_buf] {
            wtr.write_all(buf)?;
        }
        Ok(())
    }

    /// Reads a model written by [`CrfModel::write()`]. Fails without partial
    /// state when the magic, the metadata or any section is inconsistent.
    pub fn read<R>(mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let mut magic = [0; MODEL_MAGIC.len()];
        rdr.read_exact(&mut magic)?;
        if magic != MODEL_MAGIC {
            return Err(LcrfError::invalid_model("invalid binary model file"));
        }
        let meta = ModelMetaData::read(&mut rdr)?;
        if meta.order == 0
            || usize::try_from(meta.order)? > MAX_ORDER
            || meta.num_parameters != meta.num_transitions + meta.num_features
            || meta.num_attributes >= meta.num_features
            || u64::from(meta.num_transitions)
                > u64::from(meta.num_states) * u64::from(meta.num_states)
        {
            return Err(LcrfError::invalid_model("inconsistent model meta data"));
        }
        let order = usize::try_from(meta.order)?;

        // Offsets are informational; the sections follow in order.
        for _ in 0..5 {
            rdr.read_u64::<LittleEndian>()?;
        }

        let labels = StringIdMapper::read(&mut rdr)?;
        let states = if order > 1 {
            StateMapper::read(&mut rdr, order)?
        } else {
            StateMapper::new()
        };
        let attributes = StringIdMapper::read(&mut rdr)?;

        let num_states = usize::try_from(meta.num_states)?;
        let mut adjacency = vec![vec![]; num_states];
        let mut transition_index = HashMap::new();
        for (slot, adj) in adjacency.iter_mut().enumerate() {
            let n = usize::try_from(rdr.read_u64::<LittleEndian>()?)?;
            adj.reserve_exact(n);
            for _ in 0..n {
                let neighbor = rdr.read_u32::<LittleEndian>()?;
                let p = rdr.read_u32::<LittleEndian>()?;
                adj.push((neighbor, p));
                let slot = StateId::try_from(slot)?;
                let key = if order == 1 {
                    (neighbor, slot)
                } else {
                    (slot, neighbor)
                };
                transition_index.insert(key, p);
            }
        }

        let mut label_attributes = vec![HashMap::new(); usize::try_from(meta.num_labels)?];
        let mut labels_at_attributes = vec![vec![]; usize::try_from(meta.num_attributes)?];
        for (a_id, la) in labels_at_attributes.iter_mut().enumerate() {
            let n = usize::try_from(rdr.read_u64::<LittleEndian>()?)?;
            la.reserve_exact(n);
            for _ in 0..n {
                let label = rdr.read_u16::<LittleEndian>()?;
                let p = rdr.read_u32::<LittleEndian>()?;
                la.push((label, p));
                label_attributes
                    .get_mut(usize::from(label))
                    .ok_or_else(|| LcrfError::invalid_model("label id out of range"))?
                    .insert(AttributeId::try_from(a_id)?, p);
            }
        }

        let compressed_len = rdr.read_u32::<LittleEndian>()?;
        if compressed_len > meta.num_parameters {
            return Err(LcrfError::invalid_model("inconsistent model meta data"));
        }
        let mut params = vec![0.0; usize::try_from(meta.num_parameters)?];
        for _ in 0..compressed_len {
            let k = usize::try_from(rdr.read_u32::<LittleEndian>()?)?;
            let w = rdr.read_f64::<LittleEndian>()?;
            *params
                .get_mut(k)
                .ok_or_else(|| LcrfError::invalid_model("parameter index out of range"))? = w;
        }

        Ok(Self {
            labels,
            attributes,
            states,
            order,
            adjacency,
            transition_index,
            label_attributes,
            labels_at_attributes,
            params,
            num_transitions: meta.num_transitions,
            num_features: meta.num_features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mappers() -> (StringIdMapper, StringIdMapper) {
        let mut labels = StringIdMapper::new();
        labels.add("<BOS>", 0);
        labels.add("A", 1);
        labels.add("B", 2);
        let mut attrs = StringIdMapper::new();
        attrs.add("W[0]=a", 0);
        attrs.add("W[0]=b", 1);
        attrs.add("<EOS>", 2);
        (labels, attrs)
    }

    #[test]
    fn test_feature_tables_agree() {
        let (labels, attrs) = mappers();
        let mut model = CrfModel::new(labels, attrs, 1).unwrap();
        assert!(model.add_feature(1, 0));
        assert!(model.add_feature(2, 0));
        assert!(model.add_feature(1, 2));
        assert!(!model.add_feature(1, 0));

        // Every pair must appear in both lookup tables with the same index.
        for (attr, la) in [(0, model.labels_for_attribute(0))] {
            for &(label, p) in la {
                assert_eq!(Some(p), model.feature_param_index(attr, label));
            }
        }
        assert_eq!(3, model.features_count());
        assert_eq!(
            model.parameters_count(),
            model.transitions_count() + model.features_count()
        );

        let la = model.labels_for_attribute(0);
        assert!(la.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_transition_table_agrees() {
        let (labels, attrs) = mappers();
        let mut model = CrfModel::new(labels, attrs, 1).unwrap();
        assert!(model.add_transition(1, 2));
        assert!(model.add_transition(2, 2));
        assert!(!model.add_transition(1, 2));
        model.finalise();

        let p = model.transition_param_index(1, 2).unwrap();
        let incoming: Vec<_> = model.adjacency_of(2).to_vec();
        assert!(incoming.contains(&(1, p)));
        assert_eq!(2, model.transitions_count());
        assert_eq!(None, model.transition_param_index(2, 1));
        assert_eq!(0.0, model.transition_weight(2, 1));
    }

    #[test]
    fn test_higher_order_bos_gets_state_zero() {
        let (labels, attrs) = mappers();
        let mut model = CrfModel::new(labels, attrs, 2).unwrap();
        let bos = CrfState::new(BOS_LABEL);
        let q1 = bos.increase_history(1);
        model.add_transition_states(&bos, &q1);
        model.add_transition_states(&q1, &q1.wrap(2));

        assert_eq!(Some(0), model.crf_state_id(&bos));
        assert_eq!(3, model.states_count());
        assert_eq!(1, model.label_of_state(1));
        assert_eq!(2, model.label_of_state(2));
        // Outgoing adjacency: state 0 leads to state 1.
        let out: Vec<_> = model.outgoing_transitions_of(0).collect();
        assert_eq!(1, out.len());
        assert_eq!(1, out[0].0);
    }

    #[test]
    fn test_binary_round_trip() {
        let (labels, attrs) = mappers();
        let mut model = CrfModel::new(labels, attrs, 1).unwrap();
        model.add_transition(1, 1);
        model.add_transition(1, 2);
        model.add_feature(1, 0);
        model.add_feature(2, 0);
        model.add_feature(2, 1);
        model.add_feature(1, 2);
        model.finalise();
        {
            let params = model.parameters_mut();
            params[0] = 0.25;
            params[2] = -1.5;
            params[4] = 3.0;
        }

        let mut buf = vec![];
        model.write(&mut buf).unwrap();
        let reloaded = CrfModel::read(buf.as_slice()).unwrap();

        assert_eq!(model.meta_data(), reloaded.meta_data());
        assert_eq!(model.parameters(), reloaded.parameters());
        assert_eq!(
            model.transition_param_index(1, 2),
            reloaded.transition_param_index(1, 2)
        );
        assert_eq!(
            model.feature_param_index(2, 1),
            reloaded.feature_param_index(2, 1)
        );
        assert_eq!(Some(1), reloaded.label_id_of("A"));
        assert_eq!("W[0]=b", reloaded.attr_of(1));
    }

    #[test]
    fn test_read_rejects_wrong_magic() {
        let mut buf = vec![];
        let (labels, attrs) = mappers();
        let mut model = CrfModel::new(labels, attrs, 1).unwrap();
        model.add_feature(1, 0);
        model.write(&mut buf).unwrap();
        buf[0] ^= 0xff;
        assert!(CrfModel::read(buf.as_slice()).is_err());
    }

    #[test]
    fn test_read_rejects_inconsistent_metadata() {
        let (labels, attrs) = mappers();
        let mut model = CrfModel::new(labels, attrs, 1).unwrap();
        model.add_transition(1, 2);
        model.add_feature(1, 0);
        model.add_feature(2, 0);
        model.add_feature(2, 1);
        model.add_feature(1, 2);
        let mut buf = vec![];
        model.write(&mut buf).unwrap();
        // Corrupt num_parameters in the metadata record.
        let pos = MODEL_MAGIC.len() + 6 * 4;
        buf[pos..pos + 4].copy_from_slice(&999u32.to_le_bytes());
        assert!(CrfModel::read(buf.as_slice()).is_err());
    }
}
