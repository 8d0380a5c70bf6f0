//! Reverse indexes: codomain value → bitmap of domain parts.

use std::collections::HashMap;
use std::hash::Hash;

use ahash::RandomState;
use roaring::RoaringBitmap;

use crate::value::IndexKey;

/// Postings list keyed by codomain value.
///
/// Empty bitmaps are never stored, so two indexes over the same forward data
/// compare equal.
#[derive(Debug, Clone, PartialEq)]
pub struct Postings<K: Eq + Hash> {
    map: HashMap<K, RoaringBitmap, RandomState>,
}

/// `target part -> {source parts}` for one hom.
pub type HomIndex = Postings<u32>;

/// `value -> {parts}` for one attribute.
pub type AttrIndex = Postings<IndexKey>;

impl<K: Eq + Hash> Default for Postings<K> {
    fn default() -> Self {
        Self {
            map: HashMap::default(),
        }
    }
}

impl<K: Eq + Hash> Postings<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: K, part: u32) {
        self.map
            .entry(key)
            .or_insert_with(RoaringBitmap::new)
            .insert(part);
    }

    pub fn remove(&mut self, key: &K, part: u32) {
        let Some(bitmap) = self.map.get_mut(key) else {
            return;
        };
        bitmap.remove(part);
        if bitmap.is_empty() {
            self.map.remove(key);
        }
    }

    pub fn get(&self, key: &K) -> Option<&RoaringBitmap> {
        self.map.get(key)
    }

    /// Number of parts mapping to `key`.
    pub fn count(&self, key: &K) -> u64 {
        self.map.get(key).map(RoaringBitmap::len).unwrap_or(0)
    }

    /// Remove and return the whole posting for `key`.
    pub fn take(&mut self, key: &K) -> RoaringBitmap {
        self.map.remove(key).unwrap_or_default()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &RoaringBitmap)> {
        self.map.iter()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl<K: Eq + Hash> FromIterator<(K, u32)> for Postings<K> {
    fn from_iter<I: IntoIterator<Item = (K, u32)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (key, part) in iter {
            out.insert(key, part);
        }
        out
    }
}
