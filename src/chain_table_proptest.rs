#![cfg(test)]

// Property tests for ChainTable kept inside the crate so they can inspect
// chain shape through test-only helpers.

use crate::bucket_store::bucket_index;
use crate::chain_table::ChainTable;
use crate::error::TableError;
use crate::hasher::{ByteSumHasher, Fnv1aHasher, KeyHasher};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Copy, Debug)]
enum HasherChoice {
    ByteSum,
    Fnv1a,
    Constant,
    Length,
}

fn constant(_: &[u8]) -> u64 {
    0
}

fn length(k: &[u8]) -> u64 {
    k.len() as u64
}

impl HasherChoice {
    fn install(self, t: &mut ChainTable<i32>) -> Result<(), TableError> {
        match self {
            HasherChoice::ByteSum => t.set_hasher(ByteSumHasher),
            HasherChoice::Fnv1a => t.set_hasher(Fnv1aHasher),
            HasherChoice::Constant => t.set_hasher(constant),
            HasherChoice::Length => t.set_hasher(length),
        }
    }

    fn index(self, key: &[u8], bucket_count: usize) -> usize {
        let h: &dyn KeyHasher = match self {
            HasherChoice::ByteSum => &ByteSumHasher,
            HasherChoice::Fnv1a => &Fnv1aHasher,
            HasherChoice::Constant => &constant,
            HasherChoice::Length => &length,
        };
        bucket_index(key, h, bucket_count)
    }
}

fn arb_hasher() -> impl Strategy<Value = HasherChoice> {
    prop_oneof![
        Just(HasherChoice::ByteSum),
        Just(HasherChoice::Fnv1a),
        Just(HasherChoice::Constant),
        Just(HasherChoice::Length),
    ]
}

// Pool-indexed operations so shrinking moves toward earlier keys.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Remove(usize),
    Get(usize),
    Contains(String),
    Mutate(usize, i32),
    SwapHasher(HasherChoice),
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{1,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            3 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => idx.clone().prop_map(Op::Remove),
            2 => idx.clone().prop_map(Op::Get),
            1 => "[a-z]{0,5}".prop_map(Op::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            1 => arb_hasher().prop_map(Op::SwapHasher),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run_scenario(
    bucket_count: usize,
    initial: HasherChoice,
    pool: Vec<String>,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut sut: ChainTable<i32> = ChainTable::new(bucket_count).unwrap();
    initial.install(&mut sut).unwrap();
    let mut current = initial;
    let mut model: HashMap<String, i32> = HashMap::new();

    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = &pool[i];
                let prev = sut.insert(k, v).unwrap();
                prop_assert_eq!(prev, model.insert(k.clone(), v));
            }
            Op::Remove(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.remove(k), model.remove(k));
            }
            Op::Get(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.get(k), model.get(k));
            }
            Op::Contains(s) => {
                prop_assert_eq!(sut.contains_key(&s), model.contains_key(&s));
            }
            Op::Mutate(i, d) => {
                let k = &pool[i];
                if let Some(v) = sut.get_mut(k) {
                    *v = v.saturating_add(d);
                }
                if let Some(v) = model.get_mut(k) {
                    *v = v.saturating_add(d);
                }
            }
            Op::SwapHasher(h) => {
                h.install(&mut sut).unwrap();
                current = h;
                prop_assert_eq!(sut.bucket_count(), bucket_count);
            }
        }

        // Post-conditions after each op
        // 1) Size parity
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        // 2) Every key sits in exactly the bucket the current hasher selects
        let mut seen = BTreeSet::new();
        for b in 0..bucket_count {
            for key in sut.chain_keys(b) {
                prop_assert_eq!(current.index(&key, bucket_count), b);
                prop_assert!(seen.insert(key), "key chained twice");
            }
        }
        let expected: BTreeSet<Vec<u8>> = model.keys().map(|k| k.as_bytes().to_vec()).collect();
        prop_assert_eq!(seen, expected);
    }
    Ok(())
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - insert returns the displaced value exactly when the model had one.
// - get/remove/contains_key parity with the model.
// - hasher swaps never lose, duplicate or misplace a key; bucket count holds.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(
        bucket_count in 1usize..=13,
        initial in arb_hasher(),
        (pool, ops) in arb_scenario(),
    ) {
        run_scenario(bucket_count, initial, pool, ops)?;
    }
}

// Property: same invariants with a single bucket, so every operation walks
// one long chain and removal hits head, middle and tail positions.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_single_chain((pool, ops) in arb_scenario()) {
        run_scenario(1, HasherChoice::Constant, pool, ops)?;
    }
}
