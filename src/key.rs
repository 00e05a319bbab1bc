//! Keys and their byte encoding in the index.
//!
//! Integer keys are stored as 8-byte big-endian strings so that byte order
//! equals numeric order. String keys are stored as terminated byte strings:
//! anything from the first NUL on is dropped, and keys at or above the
//! configured bound are cut to `max_key_len - 1` bytes.

use std::fmt;
use std::ops::Deref;

use tracing::trace;

use crate::config::{Config, KeyPolicy};
use crate::error::{Error, Result};

/// An owned key, as reported by cursors and iterators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    /// Key of a `Bitset`, `IntToInt` or `IntToValue` container.
    Int(u64),
    /// Key of a `StringToInt` or `StringToValue` container.
    Str(Vec<u8>),
}

impl Key {
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Key::Int(k) => Some(*k),
            Key::Str(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Key::Int(_) => None,
            Key::Str(k) => Some(k),
        }
    }

    /// Borrow this key for a container operation.
    pub fn as_key_ref(&self) -> KeyRef<'_> {
        match self {
            Key::Int(k) => KeyRef::Int(*k),
            Key::Str(k) => KeyRef::Str(k),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(k) => write!(f, "{k}"),
            Key::Str(k) => write!(f, "{}", String::from_utf8_lossy(k)),
        }
    }
}

/// A borrowed key accepted by container operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRef<'a> {
    Int(u64),
    Str(&'a [u8]),
}

impl KeyRef<'_> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            KeyRef::Int(_) => "integer key",
            KeyRef::Str(_) => "string key",
        }
    }
}

impl From<u64> for KeyRef<'_> {
    fn from(k: u64) -> Self {
        KeyRef::Int(k)
    }
}

impl From<u32> for KeyRef<'_> {
    fn from(k: u32) -> Self {
        KeyRef::Int(k as u64)
    }
}

impl From<usize> for KeyRef<'_> {
    fn from(k: usize) -> Self {
        KeyRef::Int(k as u64)
    }
}

impl<'a> From<&'a str> for KeyRef<'a> {
    fn from(k: &'a str) -> Self {
        KeyRef::Str(k.as_bytes())
    }
}

impl<'a> From<&'a String> for KeyRef<'a> {
    fn from(k: &'a String) -> Self {
        KeyRef::Str(k.as_bytes())
    }
}

impl<'a> From<&'a [u8]> for KeyRef<'a> {
    fn from(k: &'a [u8]) -> Self {
        KeyRef::Str(k)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for KeyRef<'a> {
    fn from(k: &'a [u8; N]) -> Self {
        KeyRef::Str(k)
    }
}

impl<'a> From<&'a Vec<u8>> for KeyRef<'a> {
    fn from(k: &'a Vec<u8>) -> Self {
        KeyRef::Str(k)
    }
}

impl<'a> From<&'a Key> for KeyRef<'a> {
    fn from(k: &'a Key) -> Self {
        k.as_key_ref()
    }
}

/// Raw index key: no allocation for integer keys.
#[derive(Debug, Clone, Copy)]
pub(crate) enum EncodedKey<'a> {
    Int([u8; 8]),
    Str(&'a [u8]),
}

impl Deref for EncodedKey<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            EncodedKey::Int(raw) => raw,
            EncodedKey::Str(raw) => raw,
        }
    }
}

#[inline]
pub(crate) fn encode_int(key: u64) -> [u8; 8] {
    key.to_be_bytes()
}

#[inline]
pub(crate) fn decode_int(raw: &[u8]) -> Option<u64> {
    <[u8; 8]>::try_from(raw).ok().map(u64::from_be_bytes)
}

/// Apply NUL-trimming and the configured bound to a string key.
pub(crate) fn bound_str_key<'a>(key: &'a [u8], config: &Config) -> Result<&'a [u8]> {
    let end = key.iter().position(|&b| b == 0).unwrap_or(key.len());
    let key = &key[..end];
    if key.len() < config.max_key_len {
        return Ok(key);
    }
    match config.key_policy {
        KeyPolicy::Truncate => {
            let keep = config.max_key_len - 1;
            trace!(len = key.len(), keep, "truncating string key");
            Ok(&key[..keep])
        }
        KeyPolicy::Reject => Err(Error::KeyTooLong {
            len: key.len(),
            max: config.max_key_len,
        }),
    }
}
