//! # judy-rs
//!
//! Sparse ordered associative arrays with a lazy forward cursor.
//!
//! A [`Judy`] is created with one of five fixed shapes ([`JudyType`]):
//! a presence-only bitset, integer→integer, integer→value, string→integer
//! or string→value. All five share one backing structure, a path-compressed
//! byte trie ([`KeyIndex`]) with ordered successor queries, and one
//! operation surface that rejects keys or values of the wrong shape.
//!
//! A [`Cursor`] walks a shared container in ascending key order one entry at
//! a time, querying the live index on every step.
//!
//! ## Example
//!
//! ```rust
//! use judy_rs::{Cursor, Judy, JudyType, Key, TraversalMode, Value};
//!
//! let mut judy: Judy<&str> = Judy::new(JudyType::IntToValue);
//! judy.put(5u64, Value::boxed("a")).unwrap();
//! judy.put(1u64, Value::boxed("b")).unwrap();
//! assert_eq!(judy.count(), 2);
//!
//! let judy = judy.into_shared();
//! let mut cursor = Cursor::new(&judy, TraversalMode::ByValue).unwrap();
//! cursor.rewind().unwrap();
//! assert_eq!(cursor.current_key().unwrap(), &Key::Int(1));
//! assert_eq!(cursor.current_value().unwrap(), &Value::boxed("b"));
//!
//! // Deleting the current key invalidates the position; advancing still
//! // finds the next surviving key.
//! judy.borrow_mut().delete(1u64).unwrap();
//! assert!(!cursor.valid());
//! cursor.advance().unwrap();
//! assert_eq!(cursor.current_key().unwrap(), &Key::Int(5));
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod cursor;
pub mod error;
pub mod index;
pub mod judy;
pub mod key;
pub mod value;

pub use config::{Config, KeyPolicy, DEFAULT_MAX_KEY_LEN};
pub use cursor::{Cursor, CursorState, TraversalMode};
pub use error::{Error, Result};
pub use index::KeyIndex;
pub use judy::{Iter, Judy, JudyType, Shared};
pub use key::{Key, KeyRef};
pub use value::Value;

#[cfg(test)]
mod proptests;
