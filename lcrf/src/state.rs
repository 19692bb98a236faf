//! States of higher-order models: label tuples with an explicit history.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use hashbrown::HashMap;

use crate::errors::{LcrfError, Result};

/// Dense id of a label.
pub type LabelId = u16;

/// Dense id of a (possibly higher-order) CRF state.
pub type StateId = u32;

/// Label id reserved for the `<BOS>` sentinel.
pub const BOS_LABEL: LabelId = 0;

/// Upper bound on the model order supported by the fixed-width state tuple.
pub const MAX_ORDER: usize = 8;

const NO_LABEL: LabelId = LabelId::MAX;

/// A state of a higher-order CRF: the last `history_length` labels, stored
/// right-aligned in a fixed-width tuple. The most recent label sits in the
/// last slot.
///
/// Equality and hashing cover the full tuple together with the history
/// length, so `(A,B)` and `(<BOS>,A,B)` are distinct states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CrfState {
    labels: [LabelId; MAX_ORDER],
    hist_len: u16,
}

impl CrfState {
    /// Creates a state with history length 1. Most often this is `(<BOS>)`.
    pub fn new(l: LabelId) -> Self {
        let mut labels = [NO_LABEL; MAX_ORDER];
        labels[MAX_ORDER - 1] = l;
        Self { labels, hist_len: 1 }
    }

    /// Builds the state for a window of preceding labels.
    ///
    /// A full window of `order` labels yields a state with history `order`.
    /// A shorter window is implicitly rooted at `<BOS>`, growing the history
    /// by one. This is the sliding-window constructor used by the trainer.
    pub fn from_window(window: &[LabelId], order: usize) -> Self {
        let mut labels = [NO_LABEL; MAX_ORDER];
        let hist_len = if window.len() == order {
            labels[MAX_ORDER - window.len()..].copy_from_slice(window);
            window.len()
        } else {
            labels[MAX_ORDER - window.len()..].copy_from_slice(window);
            labels[MAX_ORDER - window.len() - 1] = BOS_LABEL;
            window.len() + 1
        };
        Self {
            labels,
            hist_len: u16::try_from(hist_len).unwrap(),
        }
    }

    /// The emission label of this state: the rightmost tuple component.
    pub fn label_id(&self) -> LabelId {
        self.labels[MAX_ORDER - 1]
    }

    pub fn history_length(&self) -> usize {
        usize::from(self.hist_len)
    }

    pub fn is_bos_state(&self) -> bool {
        self.labels[MAX_ORDER - self.history_length()] == BOS_LABEL
    }

    /// Shifts the history left and appends `r`; the history length stays.
    /// Used once the history is full.
    pub fn wrap(&self, r: LabelId) -> Self {
        let mut n = *self;
        let lo = MAX_ORDER - self.history_length();
        for i in lo..MAX_ORDER - 1 {
            n.labels[i] = n.labels[i + 1];
        }
        n.labels[MAX_ORDER - 1] = r;
        n
    }

    /// Appends `r` to a state whose history is not yet full.
    pub fn increase_history(&self, r: LabelId) -> Self {
        debug_assert!(self.history_length() < MAX_ORDER);
        let mut n = *self;
        for i in 0..MAX_ORDER - 1 {
            n.labels[i] = n.labels[i + 1];
        }
        n.labels[MAX_ORDER - 1] = r;
        n.hist_len += 1;
        n
    }

    /// Drops the leftmost label of the history.
    pub fn shorten_history(&mut self) {
        if self.hist_len == 0 {
            return;
        }
        self.labels[MAX_ORDER - self.history_length()] = NO_LABEL;
        self.hist_len -= 1;
    }

    /// Renders the tuple through a label naming function, e.g. `(PER_B,OTHER)`.
    pub fn display<'a, F>(&'a self, name: F) -> String
    where
        F: Fn(LabelId) -> &'a str,
    {
        let mut s = String::from("(");
        let lo = MAX_ORDER - self.history_length();
        for (i, &l) in self.labels[lo..].iter().enumerate() {
            if i > 0 {
                s.push(',');
            }
            s.push_str(name(l));
        }
        s.push(')');
        s
    }
}

/// Bijection between state tuples and dense state ids.
///
/// Ids are assigned lazily in first-encounter order; the training algorithm
/// guarantees that `(<BOS>)` is encountered first and becomes state 0.
#[derive(Debug, Default, Clone)]
pub struct StateMapper {
    states: Vec<CrfState>,
    ids: HashMap<CrfState, StateId>,
}

impl StateMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a state tuple to its id, assigning a fresh id on first encounter.
    pub fn get_or_insert(&mut self, q: &CrfState) -> StateId {
        if let Some(&id) = self.ids.get(q) {
            return id;
        }
        let id = StateId::try_from(self.states.len()).unwrap();
        self.states.push(*q);
        self.ids.insert(*q, id);
        id
    }

    /// Maps a state tuple to its id without inserting.
    pub fn id(&self, q: &CrfState) -> Option<StateId> {
        self.ids.get(q).copied()
    }

    /// The state tuple registered under `id`.
    pub fn state(&self, id: StateId) -> &CrfState {
        &self.states[usize::try_from(id).unwrap()]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Serializes the mapper: order, state count, then for each state the
    /// rightmost `order` tuple slots followed by the history length.
    pub fn write<W>(&self, mut wtr: W, order: usize) -> Result<()>
    where
        W: Write,
    {
        wtr.write_u32::<LittleEndian>(u32::try_from(order)?)?;
        wtr.write_u32::<LittleEndian>(u32::try_from(self.states.len())?)?;
        for q in &self.states {
            for &l in &q.labels[MAX_ORDER - order..] {
                wtr.write_u16::<LittleEndian>(l)?;
            }
            wtr.write_u16::<LittleEndian>(q.hist_len)?;
        }
        Ok(())
    }

    /// Reconstructs a mapper written by [`StateMapper::write()`]. The stored
    /// order must match the expected one.
    pub fn read<R>(mut rdr: R, expected_order: usize) -> Result<Self>
    where
        R: Read,
    {
        let order = usize::try_from(rdr.read_u32::<LittleEndian>()?)?;
        if order != expected_order {
            return Err(LcrfError::invalid_model(format!(
                "incompatible model orders: expected {expected_order}, found {order}"
            )));
        }
        let n = usize::try_from(rdr.read_u32::<LittleEndian>()?)?;
        let mut mapper = Self::new();
        for _ in 0..n {
            let mut labels = [NO_LABEL; MAX_ORDER];
            for l in &mut labels[MAX_ORDER - order..] {
                *l = rdr.read_u16::<LittleEndian>()?;
            }
            let hist_len = rdr.read_u16::<LittleEndian>()?;
            mapper.get_or_insert(&CrfState { labels, hist_len });
        }
        Ok(mapper)
    }
}
