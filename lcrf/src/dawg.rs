//! Minimal acyclic transducer over token symbols (a DAWG).
//!
//! Built with the incremental minimization of Daciuk et al. (2000) from a
//! sorted entry list. Used by the feature extractor to spot multi-word
//! patterns and context clues.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use hashbrown::HashMap;

use crate::errors::{LcrfError, Result};

const DAWG_MAGIC: &[u8] = b"Binary wdawg file\0";

/// State id within a [`Dawg`].
pub type DawgState = u32;

/// An input entry: a token sequence and the info string attached to it.
pub type DawgEntry = (Vec<String>, String);

/// A state's identity for the minimization register: its finality infos and
/// its outgoing transition map. Two states are equivalent iff these agree.
#[derive(PartialEq, Eq, Hash)]
struct StateSignature {
    finals: Option<BTreeSet<String>>,
    transitions: Vec<(String, DawgState)>,
}

/// Deterministic minimal acyclic word graph with per-final-state info sets.
#[derive(Debug, Default)]
pub struct Dawg {
    delta: Vec<BTreeMap<String, DawgState>>,
    final_infos: HashMap<DawgState, BTreeSet<String>>,
    register: HashMap<StateSignature, DawgState>,
    free_list: Vec<DawgState>,
}

impl std::fmt::Debug for StateSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("StateSignature").finish_non_exhaustive()
    }
}

impl Dawg {
    /// Builds a DAWG from entries; the entries are sorted first.
    pub fn from_entries(mut entries: Vec<DawgEntry>) -> Self {
        entries.sort();
        let mut dawg = Self::with_start_state();
        dawg.process(&entries);
        dawg
    }

    fn with_start_state() -> Self {
        let mut dawg = Self::default();
        dawg.new_state();
        dawg
    }

    pub fn start_state(&self) -> DawgState {
        0
    }

    /// Follows the transition `q --symbol--> p`, if present.
    pub fn next(&self, q: DawgState, symbol: &str) -> Option<DawgState> {
        self.delta[q as usize].get(symbol).copied()
    }

    pub fn is_final(&self, q: DawgState) -> bool {
        self.final_infos.contains_key(&q)
    }

    /// The info strings attached to a final state.
    pub fn final_infos(&self, q: DawgState) -> Option<&BTreeSet<String>> {
        self.final_infos.get(&q)
    }

    /// Number of allocated states, recycled slots included.
    pub fn states_count(&self) -> usize {
        self.delta.len()
    }

    pub fn final_states_count(&self) -> usize {
        self.final_infos.len()
    }

    pub fn transitions_count(&self) -> usize {
        self.delta.iter().map(BTreeMap::len).sum()
    }

    /// Checks whether the DAWG accepts the exact token sequence.
    pub fn contains<S>(&self, seq: &[S]) -> bool
    where
        S: AsRef<str>,
    {
        let mut q = self.start_state();
        for sym in seq {
            match self.next(q, sym.as_ref()) {
                Some(p) => q = p,
                None => return false,
            }
        }
        self.is_final(q)
    }

    // Algorithm 1 of Daciuk et al.: walk the common prefix, minimize the
    // diverging branch of the previous entry, then append the new suffix.
    fn process(&mut self, entries: &[DawgEntry]) {
        for (seq, info) in entries {
            let (state, index) = self.common_prefix(seq);
            if self.has_children(state) {
                self.replace_or_register(state);
            }
            self.add_suffix(state, &seq[index..], info);
        }
        self.replace_or_register(0);
    }

    fn common_prefix(&self, seq: &[String]) -> (DawgState, usize) {
        let mut current = self.start_state();
        for (i, sym) in seq.iter().enumerate() {
            match self.next(current, sym) {
                Some(p) => current = p,
                None => return (current, i),
            }
        }
        (current, seq.len())
    }

    fn has_children(&self, q: DawgState) -> bool {
        !self.delta[q as usize].is_empty()
    }

    fn last_child(&self, q: DawgState) -> DawgState {
        *self.delta[q as usize]
            .last_key_value()
            .map(|(_, p)| p)
            .unwrap()
    }

    fn replace_or_register(&mut self, p: DawgState) {
        let child = self.last_child(p);
        if self.has_children(child) {
            self.replace_or_register(child);
        }
        let sig = self.signature(child);
        if let Some(&q) = self.register.get(&sig) {
            if q != child {
                self.replace_state(p, q);
                self.delete_state(child);
            }
        } else {
            self.register.insert(sig, child);
        }
    }

    fn signature(&self, q: DawgState) -> StateSignature {
        StateSignature {
            finals: self.final_infos.get(&q).cloned(),
            transitions: self.delta[q as usize]
                .iter()
                .map(|(s, &p)| (s.clone(), p))
                .collect(),
        }
    }

    fn add_suffix(&mut self, mut q: DawgState, suffix: &[String], info: &str) {
        for sym in suffix {
            let r = self.new_state();
            self.delta[q as usize].insert(sym.clone(), r);
            q = r;
        }
        self.final_infos.entry(q).or_default().insert(info.to_string());
    }

    fn new_state(&mut self) -> DawgState {
        if let Some(n) = self.free_list.pop() {
            n
        } else {
            self.delta.push(BTreeMap::new());
            DawgState::try_from(self.delta.len() - 1).unwrap()
        }
    }

    // Redirects the lexicographically last transition of p to q.
    fn replace_state(&mut self, p: DawgState, q: DawgState) {
        if let Some((sym, _)) = self.delta[p as usize].last_key_value() {
            let sym = sym.clone();
            self.delta[p as usize].insert(sym, q);
        }
    }

    fn delete_state(&mut self, q: DawgState) {
        self.delta[q as usize].clear();
        self.final_infos.remove(&q);
        self.free_list.push(q);
    }

    /// Writes the DAWG in its binary format: magic, state and final-state
    /// counts, per-state transition lists, then per-final-state info sets.
    pub fn write<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        wtr.write_all(DAWG_MAGIC)?;
        wtr.write_u32::<LittleEndian>(u32::try_from(self.delta.len())?)?;
        wtr.write_u32::<LittleEndian>(u32::try_from(self.final_infos.len())?)?;
        for transitions in &self.delta {
            wtr.write_u32::<LittleEndian>(u32::try_from(transitions.len())?)?;
            for (sym, &target) in transitions {
                write_symbol(&mut wtr, sym)?;
                wtr.write_u32::<LittleEndian>(target)?;
            }
        }
        let mut finals: Vec<_> = self.final_infos.iter().collect();
        finals.sort_by_key(|(&q, _)| q);
        for (&q, infos) in finals {
            wtr.write_u32::<LittleEndian>(q)?;
            wtr.write_u16::<LittleEndian>(u16::try_from(infos.len())?)?;
            for info in infos {
                write_symbol(&mut wtr, info)?;
            }
        }
        Ok(())
    }

    /// Reads a DAWG written by [`Dawg::write()`]. The result supports
    /// lookups only; further construction is not possible.
    pub fn read<R>(mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let mut magic = [0; DAWG_MAGIC.len()];
        rdr.read_exact(&mut magic)?;
        if magic != DAWG_MAGIC {
            return Err(LcrfError::invalid_model("invalid wdawg file header"));
        }
        let n_states = usize::try_from(rdr.read_u32::<LittleEndian>()?)?;
        let n_finals = usize::try_from(rdr.read_u32::<LittleEndian>()?)?;
        let mut dawg = Self::default();
        for _ in 0..n_states {
            let n_trans = rdr.read_u32::<LittleEndian>()?;
            let mut transitions = BTreeMap::new();
            for _ in 0..n_trans {
                let sym = read_symbol(&mut rdr)?;
                let target = rdr.read_u32::<LittleEndian>()?;
                transitions.insert(sym, target);
            }
            dawg.delta.push(transitions);
        }
        for _ in 0..n_finals {
            let q = rdr.read_u32::<LittleEndian>()?;
            let n_infos = rdr.read_u16::<LittleEndian>()?;
            let mut infos = BTreeSet::new();
            for _ in 0..n_infos {
                infos.insert(read_symbol(&mut rdr)?);
            }
            dawg.final_infos.insert(q, infos);
        }
        Ok(dawg)
    }
}

// Length-prefixed NUL-terminated string: one length byte covering the
// terminator, then the bytes.
fn write_symbol<W>(mut wtr: W, s: &str) -> Result<()>
where
    W: Write,
{
    let len = u8::try_from(s.len() + 1)
        .map_err(|_| LcrfError::invalid_argument("symbol", "longer than 254 bytes"))?;
    wtr.write_u8(len)?;
    wtr.write_all(s.as_bytes())?;
    wtr.write_u8(0)?;
    Ok(())
}

fn read_symbol<R>(mut rdr: R) -> Result<String>
where
    R: Read,
{
    let len = usize::from(rdr.read_u8()?);
    if len == 0 {
        return Err(LcrfError::invalid_model("empty symbol length"));
    }
    let mut buf = vec![0; len];
    rdr.read_exact(&mut buf)?;
    buf.pop();
    Ok(String::from_utf8(buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn sample_entries() -> Vec<DawgEntry> {
        vec![
            (seq(&["New", "York"]), "City".to_string()),
            (seq(&["New", "York", "Times"]), "Newspaper".to_string()),
            (seq(&["York"]), "Surname".to_string()),
            (seq(&["Los", "Angeles"]), "City".to_string()),
        ]
    }

    #[test]
    fn test_recognizes_exactly_the_entries() {
        let dawg = Dawg::from_entries(sample_entries());

        assert!(dawg.contains(&["New", "York"]));
        assert!(dawg.contains(&["New", "York", "Times"]));
        assert!(dawg.contains(&["York"]));
        assert!(dawg.contains(&["Los", "Angeles"]));

        assert!(!dawg.contains(&["New"]));
        assert!(!dawg.contains(&["Angeles"]));
        assert!(!dawg.contains(&["York", "Times"]));
        assert!(!dawg.contains(&["New", "York", "Times", "Square"]));
    }

    #[test]
    fn test_final_infos() {
        let dawg = Dawg::from_entries(sample_entries());
        let mut q = dawg.start_state();
        for sym in ["New", "York"] {
            q = dawg.next(q, sym).unwrap();
        }
        let infos = dawg.final_infos(q).unwrap();
        assert_eq!(vec!["City"], infos.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_multiple_infos_per_sequence() {
        let entries = vec![
            (seq(&["Washington"]), "City".to_string()),
            (seq(&["Washington"]), "Surname".to_string()),
        ];
        let dawg = Dawg::from_entries(entries);
        let q = dawg.next(dawg.start_state(), "Washington").unwrap();
        let infos = dawg.final_infos(q).unwrap();
        assert_eq!(vec!["City", "Surname"], infos.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_suffix_sharing_minimizes() {
        // Both sequences end in the same single-token suffix with the same
        // info, so the trailing states must be shared.
        let entries = vec![
            (seq(&["a", "x"]), "I".to_string()),
            (seq(&["b", "x"]), "I".to_string()),
        ];
        let dawg = Dawg::from_entries(entries);
        let qa = dawg.next(dawg.start_state(), "a").unwrap();
        let qb = dawg.next(dawg.start_state(), "b").unwrap();
        assert_eq!(dawg.next(qa, "x"), dawg.next(qb, "x"));
        assert_eq!(1, dawg.final_states_count());
    }

    #[test]
    fn test_builds_are_isomorphic() {
        let a = Dawg::from_entries(sample_entries());
        let mut shuffled = sample_entries();
        shuffled.reverse();
        let b = Dawg::from_entries(shuffled);
        assert_eq!(a.states_count(), b.states_count());
        assert_eq!(a.transitions_count(), b.transitions_count());
        assert_eq!(a.final_states_count(), b.final_states_count());
    }

    #[test]
    fn test_binary_round_trip() {
        let dawg = Dawg::from_entries(sample_entries());
        let mut buf = vec![];
        dawg.write(&mut buf).unwrap();
        let reloaded = Dawg::read(buf.as_slice()).unwrap();

        assert_eq!(dawg.states_count(), reloaded.states_count());
        assert_eq!(dawg.final_states_count(), reloaded.final_states_count());
        for tokens in [
            vec!["New", "York"],
            vec!["New", "York", "Times"],
            vec!["York"],
            vec!["Los", "Angeles"],
            vec!["New"],
            vec!["Boston"],
        ] {
            assert_eq!(dawg.contains(&tokens), reloaded.contains(&tokens));
        }
        let q = reloaded.next(reloaded.start_state(), "York").unwrap();
        assert_eq!(
            vec!["Surname"],
            reloaded.final_infos(q).unwrap().iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_read_rejects_bad_magic() {
        let buf = b"Not a wdawg file\0\0\0\0\0\0\0\0\0".to_vec();
        assert!(Dawg::read(buf.as_slice()).is_err());
    }
}
