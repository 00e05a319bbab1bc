//! The typed container.
//!
//! A [`Judy`] is created with one of five [`JudyType`]s and keeps it for
//! life. The type selects which [`KeyIndex`] backs the container; every
//! operation dispatches on that store and rejects keys or values of the wrong
//! shape with [`Error::TypeMismatch`] before touching anything.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::KeyIndex;
use crate::key::{bound_str_key, decode_int, encode_int, EncodedKey, Key, KeyRef};
use crate::value::Value;

/// The five container shapes. Discriminants match the raw tags accepted by
/// [`Judy::from_tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum JudyType {
    /// Integer keys, presence only.
    Bitset = 1,
    /// Integer keys, integer values.
    IntToInt = 2,
    /// Integer keys, boxed values.
    IntToValue = 3,
    /// String keys, integer values.
    StringToInt = 4,
    /// String keys, boxed values.
    StringToValue = 5,
}

impl JudyType {
    pub const ALL: [JudyType; 5] = [
        JudyType::Bitset,
        JudyType::IntToInt,
        JudyType::IntToValue,
        JudyType::StringToInt,
        JudyType::StringToValue,
    ];

    pub fn is_string_keyed(self) -> bool {
        matches!(self, JudyType::StringToInt | JudyType::StringToValue)
    }

    pub fn is_integer_keyed(self) -> bool {
        !self.is_string_keyed()
    }

    pub fn tag(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for JudyType {
    type Error = Error;

    fn try_from(tag: i64) -> Result<Self> {
        JudyType::ALL
            .into_iter()
            .find(|t| t.tag() == tag)
            .ok_or(Error::InvalidType(tag))
    }
}

impl fmt::Display for JudyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JudyType::Bitset => "BITSET",
            JudyType::IntToInt => "INT_TO_INT",
            JudyType::IntToValue => "INT_TO_VALUE",
            JudyType::StringToInt => "STRING_TO_INT",
            JudyType::StringToValue => "STRING_TO_VALUE",
        })
    }
}

/// Backing index, one arm per type.
#[derive(Clone)]
enum Store<V> {
    Bitset(KeyIndex<()>),
    IntToInt(KeyIndex<i64>),
    IntToValue(KeyIndex<Arc<V>>),
    StringToInt(KeyIndex<i64>),
    StringToValue(KeyIndex<Arc<V>>),
}

impl<V> Store<V> {
    fn new(judy_type: JudyType) -> Self {
        match judy_type {
            JudyType::Bitset => Store::Bitset(KeyIndex::new()),
            JudyType::IntToInt => Store::IntToInt(KeyIndex::new()),
            JudyType::IntToValue => Store::IntToValue(KeyIndex::new()),
            JudyType::StringToInt => Store::StringToInt(KeyIndex::new()),
            JudyType::StringToValue => Store::StringToValue(KeyIndex::new()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Store::Bitset(ix) => ix.len(),
            Store::IntToInt(ix) | Store::StringToInt(ix) => ix.len(),
            Store::IntToValue(ix) | Store::StringToValue(ix) => ix.len(),
        }
    }

    fn contains(&self, raw: &[u8]) -> bool {
        match self {
            Store::Bitset(ix) => ix.contains_key(raw),
            Store::IntToInt(ix) | Store::StringToInt(ix) => ix.contains_key(raw),
            Store::IntToValue(ix) | Store::StringToValue(ix) => ix.contains_key(raw),
        }
    }

    fn get(&self, raw: &[u8]) -> Option<Value<V>> {
        match self {
            Store::Bitset(ix) => ix.get(raw).map(|_| Value::Bool(true)),
            Store::IntToInt(ix) | Store::StringToInt(ix) => ix.get(raw).map(|v| Value::Int(*v)),
            Store::IntToValue(ix) | Store::StringToValue(ix) => {
                ix.get(raw).map(|v| Value::Boxed(Arc::clone(v)))
            }
        }
    }

    fn remove(&mut self, raw: &[u8]) -> bool {
        match self {
            Store::Bitset(ix) => ix.remove(raw).is_some(),
            Store::IntToInt(ix) | Store::StringToInt(ix) => ix.remove(raw).is_some(),
            Store::IntToValue(ix) | Store::StringToValue(ix) => ix.remove(raw).is_some(),
        }
    }

    /// Smallest entry `>= raw` (or `> raw`), materialized.
    fn bound(&self, raw: &[u8], inclusive: bool) -> Option<(Vec<u8>, Value<V>)> {
        fn pick<'a, T>(ix: &'a KeyIndex<T>, raw: &[u8], inclusive: bool) -> Option<(Vec<u8>, &'a T)> {
            if inclusive {
                ix.seek(raw)
            } else {
                ix.successor(raw)
            }
        }
        match self {
            Store::Bitset(ix) => pick(ix, raw, inclusive).map(|(k, _)| (k, Value::Bool(true))),
            Store::IntToInt(ix) | Store::StringToInt(ix) => {
                pick(ix, raw, inclusive).map(|(k, v)| (k, Value::Int(*v)))
            }
            Store::IntToValue(ix) | Store::StringToValue(ix) => {
                pick(ix, raw, inclusive).map(|(k, v)| (k, Value::Boxed(Arc::clone(v))))
            }
        }
    }

    fn clear(&mut self) {
        match self {
            Store::Bitset(ix) => ix.clear(),
            Store::IntToInt(ix) | Store::StringToInt(ix) => ix.clear(),
            Store::IntToValue(ix) | Store::StringToValue(ix) => ix.clear(),
        }
    }

    fn memory_usage(&self) -> usize {
        match self {
            Store::Bitset(ix) => ix.memory_usage(),
            Store::IntToInt(ix) | Store::StringToInt(ix) => ix.memory_usage(),
            Store::IntToValue(ix) | Store::StringToValue(ix) => ix.memory_usage(),
        }
    }
}

/// A container shared between its owner and any number of cursors.
pub type Shared<V> = Rc<RefCell<Judy<V>>>;

/// A sparse ordered associative array.
///
/// Single-threaded: mutation through one handle while another thread reads
/// requires external locking.
#[derive(Clone)]
pub struct Judy<V> {
    judy_type: JudyType,
    store: Store<V>,
    config: Config,
    /// When `next_empty_valid`, every integer key below this one is present.
    next_empty: u64,
    next_empty_valid: bool,
}

impl<V> Judy<V> {
    /// Create an empty container with the default configuration.
    pub fn new(judy_type: JudyType) -> Self {
        Self::build(judy_type, Config::default())
    }

    /// Create an empty container. Fails if `config` does not validate.
    pub fn with_config(judy_type: JudyType, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(judy_type, config))
    }

    /// Create an empty container from a raw type tag (`1..=5`).
    pub fn from_tag(tag: i64, config: Config) -> Result<Self> {
        Self::with_config(JudyType::try_from(tag)?, config)
    }

    fn build(judy_type: JudyType, config: Config) -> Self {
        debug!(%judy_type, max_key_len = config.max_key_len, "creating judy array");
        Self {
            judy_type,
            store: Store::new(judy_type),
            config,
            next_empty: 0,
            next_empty_valid: false,
        }
    }

    /// Wrap the container so cursors can bind to it.
    pub fn into_shared(self) -> Shared<V> {
        Rc::new(RefCell::new(self))
    }

    pub fn judy_type(&self) -> JudyType {
        self.judy_type
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of present keys, in O(1).
    pub fn count(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Approximate bytes held by the backing index.
    pub fn memory_usage(&self) -> usize {
        self.store.memory_usage()
    }

    // -------------------------------------------------------------------------
    // Key encoding
    // -------------------------------------------------------------------------

    fn mismatch(&self, found: &'static str) -> Error {
        Error::TypeMismatch {
            judy_type: self.judy_type,
            found,
        }
    }

    pub(crate) fn encode<'k>(&self, key: KeyRef<'k>) -> Result<EncodedKey<'k>> {
        match (key, self.judy_type.is_string_keyed()) {
            (KeyRef::Int(k), false) => Ok(EncodedKey::Int(encode_int(k))),
            (KeyRef::Str(k), true) => Ok(EncodedKey::Str(bound_str_key(k, &self.config)?)),
            _ => Err(self.mismatch(key.kind())),
        }
    }

    pub(crate) fn decode(&self, raw: Vec<u8>) -> Key {
        if self.judy_type.is_string_keyed() {
            return Key::Str(raw);
        }
        // Integer stores only ever hold 8-byte keys.
        Key::Int(decode_int(&raw).unwrap_or_default())
    }

    // -------------------------------------------------------------------------
    // Element operations
    // -------------------------------------------------------------------------

    /// Store `value` at `key`, replacing (and dropping) any previous value.
    ///
    /// `Bitset` accepts any [`Value::Bool`] and records presence only.
    pub fn put<'k>(&mut self, key: impl Into<KeyRef<'k>>, value: impl Into<Value<V>>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let raw = self.encode(key)?;
        let judy_type = self.judy_type;

        let inserted = match (&mut self.store, value) {
            (Store::Bitset(ix), Value::Bool(_)) => ix.insert(&raw, ()).map(|_| ()),
            (Store::IntToInt(ix) | Store::StringToInt(ix), Value::Int(v)) => {
                ix.insert(&raw, v).map(|_| ())
            }
            (Store::IntToValue(ix) | Store::StringToValue(ix), Value::Boxed(v)) => {
                ix.insert(&raw, v).map(|_| ())
            }
            (_, value) => {
                return Err(Error::TypeMismatch {
                    judy_type,
                    found: value.shape(),
                })
            }
        };
        if let Err(e) = inserted {
            warn!(%judy_type, error = %e, "insert failed");
            return Err(e);
        }
        Ok(())
    }

    /// Value at `key`. A present `Bitset` key reads as `Value::Bool(true)`.
    pub fn get<'k>(&self, key: impl Into<KeyRef<'k>>) -> Result<Option<Value<V>>> {
        let raw = self.encode(key.into())?;
        Ok(self.store.get(&raw))
    }

    /// Remove `key`. Returns whether it was present; removing an absent key
    /// is not an error.
    pub fn delete<'k>(&mut self, key: impl Into<KeyRef<'k>>) -> Result<bool> {
        let key = key.into();
        let raw = self.encode(key)?;
        let removed = self.store.remove(&raw);
        if removed {
            if let KeyRef::Int(k) = key {
                if k <= self.next_empty {
                    self.next_empty_valid = false;
                }
            }
        }
        Ok(removed)
    }

    pub fn contains<'k>(&self, key: impl Into<KeyRef<'k>>) -> Result<bool> {
        let raw = self.encode(key.into())?;
        Ok(self.store.contains(&raw))
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.store.clear();
        self.next_empty = 0;
        self.next_empty_valid = false;
    }

    // -------------------------------------------------------------------------
    // Auto-append
    // -------------------------------------------------------------------------

    /// Smallest absent integer key, walking forward from the cached hint (or
    /// from `0` once a delete has invalidated it).
    pub fn next_free_key(&mut self) -> Result<u64> {
        if self.judy_type.is_string_keyed() {
            return Err(self.mismatch("integer key"));
        }
        let mut candidate = if self.next_empty_valid {
            self.next_empty
        } else {
            0
        };

        let mut probe = self.store.bound(&encode_int(candidate), true);
        while let Some((raw, _)) = probe {
            if decode_int(&raw) != Some(candidate) {
                break;
            }
            candidate = candidate.checked_add(1).ok_or(Error::KeySpaceExhausted)?;
            probe = self.store.bound(&raw, false);
        }

        self.next_empty = candidate;
        self.next_empty_valid = true;
        Ok(candidate)
    }

    /// Store `value` at [`next_free_key`](Self::next_free_key) and return that key.
    pub fn push(&mut self, value: impl Into<Value<V>>) -> Result<u64> {
        let key = self.next_free_key()?;
        self.put(key, value)?;
        Ok(key)
    }

    // -------------------------------------------------------------------------
    // Ordered queries
    // -------------------------------------------------------------------------

    /// Smallest key.
    pub fn first(&self) -> Option<Key> {
        self.store.bound(&[], true).map(|(raw, _)| self.decode(raw))
    }

    /// Smallest key strictly greater than `key`; `key` need not be present.
    pub fn next<'k>(&self, key: impl Into<KeyRef<'k>>) -> Result<Option<Key>> {
        let raw = self.encode(key.into())?;
        Ok(self.store.bound(&raw, false).map(|(raw, _)| self.decode(raw)))
    }

    /// Materialized entry at the smallest key `>= raw` (or `> raw`).
    pub(crate) fn entry_from(&self, raw: &[u8], inclusive: bool) -> Option<(Key, Value<V>)> {
        self.store
            .bound(raw, inclusive)
            .map(|(raw, value)| (self.decode(raw), value))
    }

    pub(crate) fn contains_raw(&self, raw: &[u8]) -> bool {
        self.store.contains(raw)
    }

    /// Ordered iterator over `(key, value)` pairs.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            judy: self,
            last: None,
            done: false,
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Judy<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Borrowing iterator over a [`Judy`], in ascending key order.
pub struct Iter<'a, V> {
    judy: &'a Judy<V>,
    last: Option<Vec<u8>>,
    done: bool,
}

impl<V> Iterator for Iter<'_, V> {
    type Item = (Key, Value<V>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let found = match &self.last {
            None => self.judy.store.bound(&[], true),
            Some(raw) => self.judy.store.bound(raw, false),
        };
        let Some((raw, value)) = found else {
            self.done = true;
            return None;
        };
        self.last = Some(raw.clone());
        Some((self.judy.decode(raw), value))
    }
}
