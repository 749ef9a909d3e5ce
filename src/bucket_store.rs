//! BucketStore: the fixed-length array of chain heads and bucket indexing.
//!
//! A bucket is either empty (`None`) or names the first node of its chain
//! in the owning table's node arena. The store never grows or shrinks;
//! rebuilding under a new hasher swaps in a fresh store of the same length.

use crate::error::TableError;
use crate::hasher::KeyHasher;
use log::warn;

slotmap::new_key_type! {
    /// Arena key of one chain node.
    pub struct NodeKey;
}

#[derive(Debug)]
pub struct BucketStore {
    heads: Vec<Option<NodeKey>>,
}

impl BucketStore {
    /// Build `bucket_count` empty buckets. Fails on a zero count or when the
    /// head array cannot be reserved; nothing is retained on failure.
    pub fn try_new(bucket_count: usize) -> Result<Self, TableError> {
        if bucket_count < 1 {
            warn!("rejected bucket store with {} buckets", bucket_count);
            return Err(TableError::InvalidBucketCount {
                requested: bucket_count,
            });
        }
        let mut heads = try_vec(bucket_count)?;
        heads.resize(bucket_count, None);
        Ok(Self { heads })
    }

    /// Number of buckets.
    #[inline]
    pub fn len(&self) -> usize {
        self.heads.len()
    }

    /// First node of bucket `index`, `None` when the bucket is empty.
    #[inline]
    pub fn head(&self, index: usize) -> Option<NodeKey> {
        self.heads[index]
    }

    /// Point bucket `index` at a new first node, or empty it.
    #[inline]
    pub fn set_head(&mut self, index: usize, head: Option<NodeKey>) {
        self.heads[index] = head;
    }

    /// Number of buckets holding at least one node.
    pub fn occupied(&self) -> usize {
        self.heads.iter().filter(|h| h.is_some()).count()
    }

    /// Bucket selected for `key` under `hasher`.
    #[inline]
    pub fn index_of<H>(&self, key: &[u8], hasher: &H) -> usize
    where
        H: KeyHasher + ?Sized,
    {
        bucket_index(key, hasher, self.len())
    }
}

/// `hasher(key) mod bucket_count`. The reduction happens in `u64`, so hash
/// outputs of any magnitude are accepted.
#[inline]
pub fn bucket_index<H>(key: &[u8], hasher: &H, bucket_count: usize) -> usize
where
    H: KeyHasher + ?Sized,
{
    debug_assert!(bucket_count > 0);
    (hasher.hash_key(key) % bucket_count as u64) as usize
}

/// Empty vector with room for exactly `capacity` elements, reserved
/// fallibly.
pub(crate) fn try_vec<T>(capacity: usize) -> Result<Vec<T>, TableError> {
    let mut v = Vec::new();
    v.try_reserve_exact(capacity).map_err(|_| {
        let bytes = capacity.saturating_mul(core::mem::size_of::<T>());
        warn!("reservation of {} bytes failed", bytes);
        TableError::AllocationFailed { bytes }
    })?;
    Ok(v)
}
