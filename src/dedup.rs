//! Insertion-ordered value-to-index deduplication.

use core::hash::Hash;

use hashbrown::HashMap;

/// Assigns a stable integer index to each distinct key.
///
/// The first `get` for a key hands out the next sequential index starting at
/// 0; equal keys (full value equality) always return the same index. This is
/// what collapses geometrically identical points and wedges into single file
/// entries, which consumers rely on both for vertex counts and for the
/// 16-bit point index limit.
#[derive(Debug, Default)]
pub struct DedupMap<K> {
    index: HashMap<K, u32>,
    order: Vec<K>,
}

impl<K: Hash + Eq + Clone> DedupMap<K> {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Index for `key`, assigning the next sequential index on first sight.
    pub fn get(&mut self, key: K) -> u32 {
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = self.order.len() as u32;
        self.index.insert(key.clone(), id);
        self.order.push(key);
        id
    }

    /// Keys in ascending index order.
    pub fn items(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
