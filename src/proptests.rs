use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

#[derive(Clone, Debug)]
enum IndexOp {
    Insert(Vec<u8>, u64),
    Remove(Vec<u8>),
    Get(Vec<u8>),
    Successor(Vec<u8>),
}

fn byte_key_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    // Small alphabet so that keys share prefixes; 0x00 included since the
    // index itself stores arbitrary bytes.
    prop::collection::vec(0u8..4, 0..=12)
}

fn index_ops_strategy() -> impl Strategy<Value = Vec<IndexOp>> {
    let key = byte_key_strategy();
    let op = prop_oneof![
        45 => (key.clone(), any::<u64>()).prop_map(|(k, v)| IndexOp::Insert(k, v)),
        25 => key.clone().prop_map(IndexOp::Remove),
        15 => key.clone().prop_map(IndexOp::Get),
        15 => key.clone().prop_map(IndexOp::Successor),
    ];
    prop::collection::vec(op, 0..=1000)
}

#[derive(Clone, Debug, Arbitrary)]
enum IntOp {
    #[proptest(weight = 5)]
    Put(#[proptest(strategy = "0u64..64")] u64, i64),
    #[proptest(weight = 3)]
    Delete(#[proptest(strategy = "0u64..64")] u64),
    NextFree,
    Push(i64),
}

#[derive(Clone, Debug, Arbitrary)]
enum CursorOp {
    #[proptest(weight = 2)]
    Put(#[proptest(strategy = "0u64..32")] u64),
    #[proptest(weight = 2)]
    Delete(#[proptest(strategy = "0u64..32")] u64),
    #[proptest(weight = 4)]
    Advance,
    Rewind,
}

fn string_key_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    prop::collection::vec(prop_oneof![Just(0u8), Just(b'a'), Just(b'b')], 0..=9)
}

/// Key as the container stores it with `max_key_len = 6`.
fn stored_key(key: &[u8]) -> Vec<u8> {
    let end = key.iter().position(|&b| b == 0).unwrap_or(key.len());
    key[..end.min(5)].to_vec()
}

fn model_first_empty(m: &BTreeMap<u64, i64>) -> u64 {
    (0u64..).find(|k| !m.contains_key(k)).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_index_equivalence(ops in index_ops_strategy()) {
        let mut t: KeyIndex<u64> = KeyIndex::new();
        let mut m: BTreeMap<Vec<u8>, u64> = BTreeMap::new();

        for op in ops {
            match op {
                IndexOp::Insert(key, value) => {
                    let old_t = t.insert(&key, value).unwrap();
                    let old_m = m.insert(key, value);
                    prop_assert_eq!(old_t, old_m);
                }
                IndexOp::Remove(key) => {
                    prop_assert_eq!(t.remove(&key), m.remove(&key));
                }
                IndexOp::Get(key) => {
                    prop_assert_eq!(t.get(&key).copied(), m.get(&key).copied());
                }
                IndexOp::Successor(key) => {
                    let expected = m
                        .range::<[u8], _>((Bound::Excluded(key.as_slice()), Bound::Unbounded))
                        .next()
                        .map(|(k, v)| (k.clone(), *v));
                    prop_assert_eq!(t.successor(&key).map(|(k, v)| (k, *v)), expected);
                }
            }
            prop_assert_eq!(t.len(), m.len());
        }

        t.check_invariants();
        let got: Vec<(Vec<u8>, u64)> = t.iter().map(|(k, v)| (k, *v)).collect();
        let expected: Vec<(Vec<u8>, u64)> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_int_to_int_matches_model(ops in prop::collection::vec(any::<IntOp>(), 0..=500)) {
        let mut j: Judy<()> = Judy::new(JudyType::IntToInt);
        let mut m: BTreeMap<u64, i64> = BTreeMap::new();

        for op in ops {
            match op {
                IntOp::Put(k, v) => {
                    j.put(k, v).unwrap();
                    m.insert(k, v);
                }
                IntOp::Delete(k) => {
                    prop_assert_eq!(j.delete(k).unwrap(), m.remove(&k).is_some());
                }
                IntOp::NextFree => {
                    prop_assert_eq!(j.next_free_key().unwrap(), model_first_empty(&m));
                }
                IntOp::Push(v) => {
                    let expected = model_first_empty(&m);
                    prop_assert_eq!(j.push(v).unwrap(), expected);
                    m.insert(expected, v);
                }
            }
            prop_assert_eq!(j.count(), m.len());
        }

        let shared = j.into_shared();
        let cursor = Cursor::new(&shared, TraversalMode::ByValue).unwrap();
        let got: Vec<(u64, i64)> = cursor
            .map(|(k, v)| (k.as_int().unwrap(), v.as_int().unwrap()))
            .collect();
        let expected: Vec<(u64, i64)> = m.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_string_keys_bounded(
        entries in prop::collection::vec((string_key_strategy(), any::<i64>()), 0..=200),
        removals in prop::collection::vec(string_key_strategy(), 0..=50),
    ) {
        let config = Config::default().with_max_key_len(6);
        let mut j: Judy<()> = Judy::with_config(JudyType::StringToInt, config).unwrap();
        let mut m: BTreeMap<Vec<u8>, i64> = BTreeMap::new();

        for (key, value) in entries {
            j.put(&key, value).unwrap();
            m.insert(stored_key(&key), value);
            prop_assert_eq!(j.get(&key).unwrap(), Some(Value::Int(value)));
        }
        for key in removals {
            prop_assert_eq!(j.delete(&key).unwrap(), m.remove(&stored_key(&key)).is_some());
        }
        prop_assert_eq!(j.count(), m.len());

        let got: Vec<(Key, i64)> = j.iter().map(|(k, v)| (k, v.as_int().unwrap())).collect();
        let expected: Vec<(Key, i64)> = m.into_iter().map(|(k, v)| (Key::Str(k), v)).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_cursor_follows_live_successor(
        initial in prop::collection::btree_set(0u64..32, 0..=16),
        ops in prop::collection::vec(any::<CursorOp>(), 0..=200),
    ) {
        let mut j: Judy<()> = Judy::new(JudyType::Bitset);
        for &k in &initial {
            j.put(k, true).unwrap();
        }
        let shared = j.into_shared();
        let mut model: BTreeSet<u64> = initial;
        // None before the first rewind; Some(None) once exhausted.
        let mut position: Option<Option<u64>> = None;

        let mut c = Cursor::new(&shared, TraversalMode::ByValue).unwrap();
        for op in ops {
            match op {
                CursorOp::Put(k) => {
                    shared.borrow_mut().put(k, true).unwrap();
                    model.insert(k);
                }
                CursorOp::Delete(k) => {
                    shared.borrow_mut().delete(k).unwrap();
                    model.remove(&k);
                }
                CursorOp::Rewind => {
                    c.rewind().unwrap();
                    position = Some(model.iter().next().copied());
                }
                CursorOp::Advance => {
                    c.advance().unwrap();
                    if let Some(Some(k)) = position {
                        position = Some(
                            model.range((Bound::Excluded(k), Bound::Unbounded)).next().copied(),
                        );
                    }
                }
            }

            match position {
                None => {
                    prop_assert_eq!(c.state(), &CursorState::BeforeStart);
                }
                Some(None) => {
                    prop_assert_eq!(c.state(), &CursorState::Exhausted);
                }
                Some(Some(k)) => {
                    prop_assert_eq!(c.state(), &CursorState::Positioned(Key::Int(k)));
                    prop_assert_eq!(c.valid(), model.contains(&k));
                }
            }
        }
    }
}
