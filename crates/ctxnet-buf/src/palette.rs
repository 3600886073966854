use std::collections::HashMap;
use std::hash::Hash;

use crate::buf::NetBuf;
use crate::error::{BufError, Result};

/// A dictionary mapping dense integer keys to values.
///
/// Writers call [`Palette::key_for`] for each repeated value, transmit the
/// palette once, then refer to values by key. Keys are assigned in
/// first-seen order starting at zero. A decoded palette may be sparse; new
/// keys then continue above the largest key seen.
#[derive(Debug, Clone)]
pub struct Palette<T> {
    values: Vec<(i32, T)>,
    by_key: HashMap<i32, usize>,
    reverse: HashMap<T, i32>,
    next_key: i32,
}

impl<T: Eq + Hash + Clone> Palette<T> {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            by_key: HashMap::new(),
            reverse: HashMap::new(),
            next_key: 0,
        }
    }

    /// Key for `value`, assigning the next free key if it is unseen.
    pub fn key_for(&mut self, value: &T) -> i32 {
        if let Some(key) = self.reverse.get(value) {
            return *key;
        }
        let key = self.next_key;
        self.insert(key, value.clone());
        key
    }

    /// Value associated with `key`.
    pub fn get(&self, key: i32) -> Result<&T> {
        self.by_key
            .get(&key)
            .map(|&slot| &self.values[slot].1)
            .ok_or(BufError::UnknownPaletteKey(key))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &T)> {
        self.values.iter().map(|(key, value)| (*key, value))
    }

    // Callers guarantee both `key` and `value` are new.
    fn insert(&mut self, key: i32, value: T) {
        self.reverse.insert(value.clone(), key);
        self.by_key.insert(key, self.values.len());
        self.values.push((key, value));
        self.next_key = self.next_key.max(key.saturating_add(1));
    }

    /// Write the size, then each `(key, value)` pair.
    pub fn encode(
        &self,
        buf: &mut NetBuf,
        mut writer: impl FnMut(&mut NetBuf, &T) -> Result<()>,
    ) -> Result<()> {
        buf.write_var_i32(self.values.len() as i32);
        for (key, value) in &self.values {
            buf.write_var_i32(*key);
            writer(buf, value)?;
        }
        Ok(())
    }

    pub fn decode(
        buf: &mut NetBuf,
        mut reader: impl FnMut(&mut NetBuf) -> Result<T>,
    ) -> Result<Self> {
        let len = buf.read_var_i32()?;
        if len < 0 {
            return Err(BufError::invalid_data(format!("negative palette size {len}")));
        }
        // Cap the preallocation; a hostile size still fails on EOF.
        let mut palette = Self {
            values: Vec::with_capacity((len as usize).min(buf.readable_bytes())),
            by_key: HashMap::new(),
            reverse: HashMap::new(),
            next_key: 0,
        };
        for _ in 0..len {
            let key = buf.read_var_i32()?;
            let value = reader(buf)?;
            if key < 0 || key == i32::MAX {
                return Err(BufError::invalid_data(format!("palette key {key} out of range")));
            }
            if palette.by_key.contains_key(&key) {
                return Err(BufError::invalid_data(format!("duplicate palette key {key}")));
            }
            if let Some(existing) = palette.reverse.get(&value) {
                return Err(BufError::invalid_data(format!(
                    "palette keys {existing} and {key} share a value"
                )));
            }
            palette.insert(key, value);
        }
        Ok(palette)
    }
}

impl<T: Eq + Hash + Clone> Default for Palette<T> {
    fn default() -> Self {
        Self::new()
    }
}
