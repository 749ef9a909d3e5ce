//! ChainTable: separately chained, byte-string keyed table with a
//! hot-swappable hash function.

use crate::bucket_store::{bucket_index, try_vec, BucketStore, NodeKey};
use crate::error::TableError;
use crate::hasher::{ByteSumHasher, KeyHasher};
use core::fmt;
use core::mem;
use log::{debug, trace, warn};
use slotmap::SlotMap;

/// One chain node. The key is the table's private copy.
#[derive(Debug)]
pub(crate) struct Entry<V> {
    key: Box<[u8]>,
    value: V,
    next: Option<NodeKey>,
}

pub struct ChainTable<V> {
    buckets: BucketStore,
    nodes: SlotMap<NodeKey, Entry<V>>, // every chain node, linked through `next`
    hasher: Box<dyn KeyHasher>,
}

impl<V> ChainTable<V> {
    /// Create a table with `bucket_count` buckets and the byte-sum hasher.
    pub fn new(bucket_count: usize) -> Result<Self, TableError> {
        Self::with_hasher(bucket_count, ByteSumHasher)
    }

    /// Create a table hashing with `hasher`. A hasher that carries data is
    /// boxed with the global allocator; zero-sized ones allocate nothing.
    pub fn with_hasher<H>(bucket_count: usize, hasher: H) -> Result<Self, TableError>
    where
        H: KeyHasher + 'static,
    {
        let buckets = BucketStore::try_new(bucket_count)?;
        debug!(
            "created table with {} buckets, hasher {}",
            bucket_count,
            hasher.name()
        );
        Ok(Self {
            buckets,
            nodes: SlotMap::with_key(),
            hasher: Box::new(hasher),
        })
    }

    /// Number of distinct keys stored.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Entries the node storage holds before it has to grow.
    pub fn capacity(&self) -> usize {
        self.nodes.capacity()
    }

    /// Fixed at construction; a hasher swap preserves it.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Name of the installed hasher.
    pub fn hasher_name(&self) -> &'static str {
        self.hasher.name()
    }

    #[inline]
    fn bucket_of(&self, key: &[u8]) -> usize {
        self.buckets.index_of(key, &*self.hasher)
    }

    fn find_node(&self, key: &[u8]) -> Option<NodeKey> {
        let mut cursor = self.buckets.head(self.bucket_of(key));
        while let Some(node) = cursor {
            let entry = &self.nodes[node];
            if *entry.key == *key {
                return Some(node);
            }
            cursor = entry.next;
        }
        None
    }

    /// Insert `value` under `key`. Overwriting an existing key hands the
    /// displaced value back; a new key is copied and appended at the tail
    /// of its chain.
    pub fn insert<K>(&mut self, key: K, value: V) -> Result<Option<V>, TableError>
    where
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(TableError::EmptyKey);
        }
        let index = self.bucket_of(key);

        let mut tail = None;
        let mut cursor = self.buckets.head(index);
        while let Some(node) = cursor {
            let entry = &mut self.nodes[node];
            if *entry.key == *key {
                trace!("overwrote value in bucket {}", index);
                return Ok(Some(mem::replace(&mut entry.value, value)));
            }
            tail = Some(node);
            cursor = entry.next;
        }

        // Reserve the node and copy the key before linking, so either
        // failure leaves the chain untouched.
        self.nodes.try_reserve(1).map_err(|_| {
            let bytes = mem::size_of::<Entry<V>>();
            warn!("insert aborted: could not grow node storage by {} bytes", bytes);
            TableError::AllocationFailed { bytes }
        })?;
        let owned = copy_key(key)?;
        let node = self.nodes.insert(Entry {
            key: owned,
            value,
            next: None,
        });
        match tail {
            Some(t) => self.nodes[t].next = Some(node),
            None => self.buckets.set_head(index, Some(node)),
        }
        trace!("inserted new key into bucket {}", index);
        Ok(None)
    }

    pub fn get<K>(&self, key: K) -> Option<&V>
    where
        K: AsRef<[u8]>,
    {
        self.find_node(key.as_ref()).map(|n| &self.nodes[n].value)
    }

    pub fn get_mut<K>(&mut self, key: K) -> Option<&mut V>
    where
        K: AsRef<[u8]>,
    {
        let node = self.find_node(key.as_ref())?;
        Some(&mut self.nodes[node].value)
    }

    pub fn contains_key<K>(&self, key: K) -> bool
    where
        K: AsRef<[u8]>,
    {
        self.find_node(key.as_ref()).is_some()
    }

    /// Unlink and return the value stored under `key`. The chain tail is
    /// compared like every other node.
    pub fn remove<K>(&mut self, key: K) -> Option<V>
    where
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        let index = self.bucket_of(key);

        let mut prev: Option<NodeKey> = None;
        let mut cursor = self.buckets.head(index);
        while let Some(node) = cursor {
            let entry = &self.nodes[node];
            if *entry.key == *key {
                let next = entry.next;
                match prev {
                    // Sole entry (next is None) or first of several: the
                    // head moves to whatever follows.
                    None => self.buckets.set_head(index, next),
                    Some(p) => self.nodes[p].next = next,
                }
                let removed = self.nodes.remove(node)?;
                trace!("removed key from bucket {}", index);
                return Some(removed.value);
            }
            prev = Some(node);
            cursor = entry.next;
        }
        None
    }

    /// Install `hasher` and rebuild every chain under it.
    ///
    /// On an empty table only the hasher changes. Otherwise all scratch
    /// space is reserved and every node's new bucket computed before any
    /// link is touched; if a reservation fails the table keeps its chains
    /// and its previous hasher. Relocated nodes keep their bucket-then-chain
    /// encounter order.
    ///
    /// Boxing `hasher` is not part of the fallible work: a hasher that
    /// carries data is allocated with the global allocator. Zero-sized
    /// hashers (fn items, non-capturing closures, the built-ins) allocate
    /// nothing.
    pub fn set_hasher<H>(&mut self, hasher: H) -> Result<(), TableError>
    where
        H: KeyHasher + 'static,
    {
        let hasher: Box<dyn KeyHasher> = Box::new(hasher);
        if self.is_empty() {
            debug!(
                "installed hasher {} on empty table (was {})",
                hasher.name(),
                self.hasher.name()
            );
            self.hasher = hasher;
            return Ok(());
        }

        let bucket_count = self.bucket_count();
        let mut scratch = BucketStore::try_new(bucket_count)?;
        let mut tails: Vec<Option<NodeKey>> = try_vec(bucket_count)?;
        tails.resize(bucket_count, None);
        let mut placements: Vec<(NodeKey, usize)> = try_vec(self.len())?;

        for bucket in 0..bucket_count {
            let mut cursor = self.buckets.head(bucket);
            while let Some(node) = cursor {
                let entry = &self.nodes[node];
                placements.push((node, bucket_index(&entry.key, &*hasher, bucket_count)));
                cursor = entry.next;
            }
        }
        debug_assert_eq!(placements.len(), self.len());

        // Nothing below allocates or calls user code.
        for &(node, bucket) in &placements {
            self.nodes[node].next = None;
            match tails[bucket] {
                Some(t) => self.nodes[t].next = Some(node),
                None => scratch.set_head(bucket, Some(node)),
            }
            tails[bucket] = Some(node);
        }
        mem::swap(&mut self.buckets, &mut scratch);

        debug!(
            "rebuilt {} entries across {} buckets: hasher {} -> {}, {} buckets occupied",
            placements.len(),
            bucket_count,
            self.hasher.name(),
            hasher.name(),
            self.buckets.occupied()
        );
        self.hasher = hasher;
        Ok(())
    }

    /// Rough byte count: the table itself plus one entry-sized unit per
    /// bucket. Chains longer than one node and key bytes are not counted,
    /// so populated tables are undercounted.
    pub fn estimated_memory_footprint(&self) -> usize {
        mem::size_of::<Self>() + self.bucket_count() * mem::size_of::<Entry<V>>()
    }

    /// Keys of one bucket's chain, head first.
    #[cfg(test)]
    pub(crate) fn chain_keys(&self, bucket: usize) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut cursor = self.buckets.head(bucket);
        while let Some(node) = cursor {
            let entry = &self.nodes[node];
            out.push(entry.key.to_vec());
            cursor = entry.next;
        }
        out
    }
}

impl<V> fmt::Debug for ChainTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainTable")
            .field("len", &self.len())
            .field("bucket_count", &self.bucket_count())
            .field("hasher", &self.hasher.name())
            .finish_non_exhaustive()
    }
}

/// Owned copy of `key`, reserved fallibly and sized exactly.
fn copy_key(key: &[u8]) -> Result<Box<[u8]>, TableError> {
    let mut owned = try_vec(key.len()).map_err(|e| {
        warn!("insert aborted: could not copy a {}-byte key", key.len());
        e
    })?;
    owned.extend_from_slice(key);
    Ok(owned.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::Fnv1aHasher;
    use std::cell::Cell;
    use std::rc::Rc;

    fn collide(_: &[u8]) -> u64 {
        3
    }

    fn keys(raw: &[&str]) -> Vec<Vec<u8>> {
        raw.iter().map(|k| k.as_bytes().to_vec()).collect()
    }

    /// Invariant: a value inserted under a key is returned by `get`.
    #[test]
    fn lookup_after_insert() {
        let mut t: ChainTable<i32> = ChainTable::new(16).unwrap();
        assert_eq!(t.insert("alpha", 1).unwrap(), None);
        assert_eq!(t.insert("beta", 2).unwrap(), None);
        assert_eq!(t.get("alpha"), Some(&1));
        assert_eq!(t.get("beta"), Some(&2));
        assert_eq!(t.get("gamma"), None);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn zero_buckets_rejected() {
        match ChainTable::<i32>::new(0) {
            Err(TableError::InvalidBucketCount { requested: 0 }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn empty_key_rejected() {
        let mut t: ChainTable<i32> = ChainTable::new(4).unwrap();
        assert_eq!(t.insert("", 1), Err(TableError::EmptyKey));
        assert!(t.is_empty());
        assert_eq!(t.get(""), None);
        assert_eq!(t.remove(""), None);
    }

    /// Invariant: overwriting keeps the size and returns the displaced value.
    #[test]
    fn overwrite_returns_old_value() {
        let mut t: ChainTable<String> = ChainTable::new(4).unwrap();
        t.insert("k", "v1".to_string()).unwrap();
        let old = t.insert("k", "v2".to_string()).unwrap();
        assert_eq!(old.as_deref(), Some("v1"));
        assert_eq!(t.get("k").map(String::as_str), Some("v2"));
        assert_eq!(t.len(), 1);
    }

    /// Invariant: an overwrite of the chain tail is detected, not duplicated.
    #[test]
    fn overwrite_of_chain_tail_does_not_duplicate() {
        let mut t: ChainTable<i32> = ChainTable::with_hasher(4, collide).unwrap();
        t.insert("a", 1).unwrap();
        t.insert("b", 2).unwrap();
        assert_eq!(t.insert("b", 20).unwrap(), Some(2));
        assert_eq!(t.len(), 2);
        assert_eq!(t.chain_keys(3), keys(&["a", "b"]));
        assert_eq!(t.get("b"), Some(&20));
    }

    /// Invariant: removing the sole entry empties the bucket; the next key
    /// hashed there becomes the head instead of growing a stale chain.
    #[test]
    fn remove_sole_entry_then_reuse_head() {
        let mut t: ChainTable<i32> = ChainTable::with_hasher(4, collide).unwrap();
        t.insert("a", 1).unwrap();
        assert_eq!(t.remove("a"), Some(1));
        assert_eq!(t.get("a"), None);
        assert_eq!(t.len(), 0);
        assert!(t.chain_keys(3).is_empty());

        t.insert("b", 2).unwrap();
        assert_eq!(t.chain_keys(3), keys(&["b"]));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn remove_first_of_several_advances_head() {
        let mut t: ChainTable<i32> = ChainTable::with_hasher(4, collide).unwrap();
        for (i, k) in ["a", "b", "c"].iter().enumerate() {
            t.insert(k, i as i32).unwrap();
        }
        assert_eq!(t.remove("a"), Some(0));
        assert_eq!(t.chain_keys(3), keys(&["b", "c"]));
        assert_eq!(t.len(), 2);
    }

    /// Invariant: removing the middle of a three-node chain keeps the other
    /// two retrievable and linked to each other.
    #[test]
    fn remove_middle_of_three() {
        let mut t: ChainTable<i32> = ChainTable::with_hasher(4, collide).unwrap();
        for (i, k) in ["a", "b", "c"].iter().enumerate() {
            t.insert(k, i as i32).unwrap();
        }
        assert_eq!(t.remove("b"), Some(1));
        assert_eq!(t.get("a"), Some(&0));
        assert_eq!(t.get("c"), Some(&2));
        assert_eq!(t.chain_keys(3), keys(&["a", "c"]));
        assert_eq!(t.len(), 2);
    }

    /// Invariant: a key held only by the last node of a chain is visible to
    /// both `get` and `remove`.
    #[test]
    fn chain_tail_is_found_and_removable() {
        let mut t: ChainTable<i32> = ChainTable::with_hasher(4, collide).unwrap();
        for (i, k) in ["a", "b", "c"].iter().enumerate() {
            t.insert(k, i as i32).unwrap();
        }
        assert_eq!(t.get("c"), Some(&2));
        assert_eq!(t.remove("c"), Some(2));
        assert_eq!(t.get("c"), None);
        assert_eq!(t.chain_keys(3), keys(&["a", "b"]));
    }

    #[test]
    fn remove_missing_key_is_noop() {
        let mut t: ChainTable<i32> = ChainTable::with_hasher(4, collide).unwrap();
        assert_eq!(t.remove("x"), None);
        t.insert("a", 1).unwrap();
        // One-entry chain holding a different key.
        assert_eq!(t.remove("x"), None);
        assert_eq!(t.len(), 1);
        assert_eq!(t.chain_keys(3), keys(&["a"]));
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut t: ChainTable<i32> = ChainTable::new(8).unwrap();
        t.insert("k", 10).unwrap();
        *t.get_mut("k").unwrap() += 5;
        assert_eq!(t.get("k"), Some(&15));
        assert!(t.get_mut("missing").is_none());
        assert!(t.contains_key("k"));
        assert!(!t.contains_key("missing"));
    }

    #[test]
    fn byte_keys_compare_exactly() {
        let mut t: ChainTable<u8> = ChainTable::new(2).unwrap();
        t.insert([0u8, 1, 2], 1).unwrap();
        t.insert(vec![0u8, 1], 2).unwrap();
        assert_eq!(t.get(&[0u8, 1, 2][..]), Some(&1));
        assert_eq!(t.get([0u8, 1]), Some(&2));
        assert_eq!(t.get([0u8]), None);
    }

    /// Invariant: a rebuild keeps every key, value and the size.
    #[test]
    fn rehash_preserves_contents() {
        let mut t: ChainTable<usize> = ChainTable::new(7).unwrap();
        let ks: Vec<String> = (0..50).map(|i| format!("key-{i}")).collect();
        for (i, k) in ks.iter().enumerate() {
            t.insert(k, i).unwrap();
        }
        t.set_hasher(Fnv1aHasher).unwrap();
        assert_eq!(t.len(), 50);
        assert_eq!(t.bucket_count(), 7);
        assert_eq!(t.hasher_name(), "fnv-1a");
        for (i, k) in ks.iter().enumerate() {
            assert_eq!(t.get(k), Some(&i));
        }
    }

    /// Invariant: relocated nodes keep bucket-then-chain encounter order.
    #[test]
    fn rehash_relinks_in_encounter_order() {
        let by_first_byte = |k: &[u8]| u64::from(k[0]);
        let mut t: ChainTable<i32> = ChainTable::with_hasher(4, by_first_byte).unwrap();
        // 'a' = 97 -> bucket 1, 'b' -> 2, 'c' -> 3, 'd' -> 0.
        for (i, k) in ["b1", "a1", "b2", "d1", "a2"].iter().enumerate() {
            t.insert(k, i as i32).unwrap();
        }
        assert_eq!(t.chain_keys(1), keys(&["a1", "a2"]));
        assert_eq!(t.chain_keys(2), keys(&["b1", "b2"]));

        t.set_hasher(collide).unwrap();
        // Buckets 0, 1, 2 in order, each chain head first.
        assert_eq!(t.chain_keys(3), keys(&["d1", "a1", "a2", "b1", "b2"]));
        for b in 0..3 {
            assert!(t.chain_keys(b).is_empty());
        }
        assert_eq!(t.get("a2"), Some(&4));
    }

    #[test]
    fn rehash_on_empty_table_only_swaps_hasher() {
        let mut t: ChainTable<i32> = ChainTable::new(5).unwrap();
        t.set_hasher(Fnv1aHasher).unwrap();
        assert_eq!(t.hasher_name(), "fnv-1a");
        assert!(t.is_empty());
        assert_eq!(t.bucket_count(), 5);
        t.insert("k", 1).unwrap();
        let expect = bucket_index(b"k", &Fnv1aHasher, 5);
        assert_eq!(t.chain_keys(expect), keys(&["k"]));
    }

    /// Invariant: stored values are dropped once: on overwrite or remove by
    /// the caller, or by the table when it is dropped.
    #[test]
    fn values_dropped_exactly_once() {
        struct Tracked(Rc<Cell<usize>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let drops = Rc::new(Cell::new(0));
        let mut t: ChainTable<Tracked> = ChainTable::with_hasher(2, collide).unwrap();
        for k in ["a", "b", "c", "d"] {
            t.insert(k, Tracked(drops.clone())).unwrap();
        }
        drop(t.insert("a", Tracked(drops.clone())).unwrap());
        assert_eq!(drops.get(), 1);
        drop(t.remove("c"));
        assert_eq!(drops.get(), 2);
        t.set_hasher(ByteSumHasher).unwrap();
        assert_eq!(drops.get(), 2, "rebuild must not drop values");
        drop(t);
        assert_eq!(drops.get(), 5);
    }

    #[test]
    fn footprint_counts_one_entry_per_bucket() {
        let mut t: ChainTable<u64> = ChainTable::with_hasher(10, collide).unwrap();
        let empty = t.estimated_memory_footprint();
        assert_eq!(
            empty,
            mem::size_of::<ChainTable<u64>>() + 10 * mem::size_of::<Entry<u64>>()
        );
        for k in ["a", "b", "c"] {
            t.insert(k, 0).unwrap();
        }
        assert_eq!(t.estimated_memory_footprint(), empty);
    }

    #[test]
    fn debug_output_names_hasher() {
        let t: ChainTable<i32> = ChainTable::new(3).unwrap();
        let s = format!("{:?}", t);
        assert!(s.contains("ChainTable"));
        assert!(s.contains("byte-sum"));
        assert!(s.contains("bucket_count: 3"));
    }
}
