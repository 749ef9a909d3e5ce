//! Hash-function strategies for `ChainTable`.
//!
//! A strategy maps key bytes to a `u64`; the table reduces it modulo its
//! bucket count. Nothing here is collision resistant: the table only
//! guarantees correct chaining, not lookup speed under adversarial keys.

/// Single-capability hashing strategy. Implemented for every
/// `Fn(&[u8]) -> u64`, so plain functions and closures can be installed
/// directly.
pub trait KeyHasher {
    fn hash_key(&self, key: &[u8]) -> u64;

    /// Human-readable name used in `Debug` output and logs.
    fn name(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

impl<F> KeyHasher for F
where
    F: Fn(&[u8]) -> u64,
{
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        self(key)
    }
}

/// Default strategy: the sum of the key's byte values.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ByteSumHasher;

impl KeyHasher for ByteSumHasher {
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        key.iter()
            .fold(0u64, |acc, &b| acc.wrapping_add(u64::from(b)))
    }

    fn name(&self) -> &'static str {
        "byte-sum"
    }
}

/// 64-bit FNV-1a.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Fnv1aHasher;

impl Fnv1aHasher {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
}

impl KeyHasher for Fnv1aHasher {
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        key.iter().fold(Self::OFFSET_BASIS, |acc, &b| {
            (acc ^ u64::from(b)).wrapping_mul(Self::PRIME)
        })
    }

    fn name(&self) -> &'static str {
        "fnv-1a"
    }
}
