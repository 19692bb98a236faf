//! Bidirectional interning of strings and dense unsigned ids.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use hashbrown::HashMap;

use crate::errors::{LcrfError, Result};

/// Maps strings to dense unsigned ids and back.
///
/// Labels and attributes of a CRF model are interned through this structure.
/// Both directions are O(1); the id side is a plain vector, so ids should be
/// dense starting at 0.
#[derive(Debug, Default, Clone)]
pub struct StringIdMapper {
    string_to_id: HashMap<String, u32>,
    id_to_string: Vec<String>,
    total_bytes: u32,
}

impl StringIdMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the mapping `s <-> id`.
    ///
    /// Returns `true` if the string was newly inserted. The id side is grown
    /// as needed; intermediate slots stay empty until assigned.
    pub fn add(&mut self, s: &str, id: u32) -> bool {
        if self.string_to_id.contains_key(s) {
            return false;
        }
        let idx = usize::try_from(id).unwrap();
        if idx >= self.id_to_string.len() {
            self.id_to_string.resize(idx + 1, String::new());
        }
        self.id_to_string[idx] = s.to_string();
        self.string_to_id.insert(s.to_string(), id);
        self.total_bytes += u32::try_from(s.len() + 1).unwrap();
        true
    }

    /// Looks up the id of `s`.
    pub fn id_of(&self, s: &str) -> Option<u32> {
        self.string_to_id.get(s).copied()
    }

    /// Looks up the string with the given id. Returns an empty string for
    /// unassigned ids.
    pub fn string_of(&self, id: u32) -> &str {
        self.id_to_string
            .get(usize::try_from(id).unwrap())
            .map_or("", String::as_str)
    }

    pub fn len(&self) -> usize {
        self.string_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.string_to_id.is_empty()
    }

    /// Iterates over `(id, string)` pairs in increasing id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.id_to_string
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .map(|(i, s)| (u32::try_from(i).unwrap(), s.as_str()))
    }

    /// Serializes the mapper as `count`, `total_bytes`, a packed blob of
    /// NUL-terminated strings and `count` ids, in increasing id order.
    pub fn write<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        wtr.write_u32::<LittleEndian>(u32::try_from(self.len())?)?;
        wtr.write_u32::<LittleEndian>(self.total_bytes)?;
        for (_, s) in self.iter() {
            wtr.write_all(s.as_bytes())?;
            wtr.write_u8(0)?;
        }
        for (id, _) in self.iter() {
            wtr.write_u32::<LittleEndian>(id)?;
        }
        Ok(())
    }

    /// Reconstructs a mapper written by [`StringIdMapper::write()`].
    pub fn read<R>(mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let count = rdr.read_u32::<LittleEndian>()?;
        if count == 0 {
            return Err(LcrfError::invalid_model("string mapper contains no strings"));
        }
        let total_bytes = rdr.read_u32::<LittleEndian>()?;
        let mut blob = vec![0; usize::try_from(total_bytes)?];
        rdr.read_exact(&mut blob)?;

        let mut strings = Vec::with_capacity(usize::try_from(count)?);
        for chunk in blob.split(|&b| b == 0) {
            if strings.len() == usize::try_from(count)? {
                break;
            }
            strings.push(String::from_utf8(chunk.to_vec())?);
        }
        if strings.len() != usize::try_from(count)? {
            return Err(LcrfError::invalid_model("truncated string blob"));
        }

        let mut mapper = Self::new();
        for s in &strings {
            let id = rdr.read_u32::<LittleEndian>()?;
            mapper.add(s, id);
        }
        Ok(mapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_lookup() {
        let mut mapper = StringIdMapper::new();
        assert!(mapper.add("<BOS>", 0));
        assert!(mapper.add("PER_B", 1));
        assert!(mapper.add("OTHER", 2));
        assert!(!mapper.add("PER_B", 7));

        for s in ["<BOS>", "PER_B", "OTHER"] {
            let id = mapper.id_of(s).unwrap();
            assert_eq!(s, mapper.string_of(id));
        }
        for id in 0..3 {
            assert_eq!(Some(id), mapper.id_of(mapper.string_of(id)));
        }
        assert_eq!(None, mapper.id_of("LOC_B"));
        assert_eq!("", mapper.string_of(77));
    }

    #[test]
    fn test_insertion_order_independence() {
        let mut a = StringIdMapper::new();
        a.add("x", 0);
        a.add("yy", 1);
        a.add("zzz", 2);
        let mut b = StringIdMapper::new();
        b.add("zzz", 2);
        b.add("x", 0);
        b.add("yy", 1);
        let ids_a: Vec<_> = a.iter().collect();
        let ids_b: Vec<_> = b.iter().collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut mapper = StringIdMapper::new();
        mapper.add("W[0]=Berlin", 0);
        mapper.add("Pref=Ber", 1);
        mapper.add("<EOS>", 2);
        mapper.add("Suff=lin", 3);

        let mut buf = vec![];
        mapper.write(&mut buf).unwrap();
        let reloaded = StringIdMapper::read(buf.as_slice()).unwrap();

        assert_eq!(mapper.len(), reloaded.len());
        for (id, s) in mapper.iter() {
            assert_eq!(Some(id), reloaded.id_of(s));
            assert_eq!(s, reloaded.string_of(id));
        }
    }

    #[test]
    fn test_read_rejects_empty() {
        let mut buf = vec![];
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        assert!(StringIdMapper::read(buf.as_slice()).is_err());
    }
}
