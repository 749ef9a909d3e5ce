//! chain-hashmap: a single-threaded, byte-string keyed hash table with
//! separate chaining and a hash function that can be replaced on a live,
//! populated table.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep chaining, key ownership and the rebuild protocol small
//!   enough to reason about one at a time.
//! - Layers:
//!   - KeyHasher: single-method hashing strategy; closures qualify.
//!   - BucketStore: fixed-length array of nullable chain heads and the
//!     `hash mod bucket_count` index computation.
//!   - ChainTable<V>: public API. Chain nodes live in a generational arena
//!     and link to each other by arena key, so unlinking never leaves a
//!     dangling reference.
//!
//! Constraints
//! - Single-threaded: the installed hasher is a `Box<dyn KeyHasher>`
//!   without `Send`/`Sync` bounds.
//! - Bucket count is fixed at construction (at least 1); there is no
//!   growth or shrinking.
//! - Keys are non-empty byte strings; the table keeps its own copy.
//! - Lookup and removal cost O(chain length).
//!
//! Value ownership
//! - The table owns each value while it is stored. Overwriting or removing
//!   a key hands the displaced value back to the caller; dropping the
//!   table drops the rest. Callers that keep ownership elsewhere store
//!   `&T` or `Rc<T>` as the value type.
//!
//! Rebuild
//! - `set_hasher` on an empty table only installs the hasher. Otherwise it
//!   reserves a scratch bucket array, computes every node's new bucket,
//!   then relinks and swaps arrays. Reservation failure aborts the swap
//!   with the old chains and the old hasher intact.
//!
//! Notes and non-goals
//! - No iteration API, no persistence.
//! - `estimated_memory_footprint` counts one entry per bucket regardless of
//!   chain length and therefore undercounts populated tables.

#[cfg(feature = "bench_internal")]
pub mod bucket_store;
#[cfg(not(feature = "bench_internal"))]
mod bucket_store;
mod chain_table;
mod chain_table_proptest;
mod error;
pub mod hasher;

// Public surface
pub use chain_table::ChainTable;
pub use error::TableError;
pub use hasher::{ByteSumHasher, Fnv1aHasher, KeyHasher};
