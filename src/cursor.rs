//! External forward cursor over a shared container.
//!
//! A [`Cursor`] holds a non-owning back-reference to its container and
//! queries the live index on every step; it never copies the container.
//! Mutations made between steps are visible: deleting the current key makes
//! [`Cursor::valid`] false, but [`Cursor::advance`] still lands on the next
//! surviving key, and keys inserted ahead of the cursor show up when it
//! reaches them.
//!
//! The cursor owns exactly one transient value slot. Each positioning call
//! overwrites it; exhaustion and drop release it. For `*ToValue` containers
//! the slot shares the stored `Arc`, so releasing it never frees the
//! container's copy.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::judy::{Judy, Shared};
use crate::key::Key;
use crate::value::Value;

/// How the caller intends to traverse the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalMode {
    /// Read-only traversal; the only supported mode.
    ByValue,
    /// Traversal that hands out mutable references into the container.
    ByReference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// Created or never rewound.
    BeforeStart,
    /// On a key that was present when the cursor last moved.
    Positioned(Key),
    /// Walked past the last key. `rewind` starts over.
    Exhausted,
}

/// Forward-only cursor over a [`Shared`] container.
#[derive(Debug)]
pub struct Cursor<V> {
    judy: Weak<RefCell<Judy<V>>>,
    state: CursorState,
    current: Option<Value<V>>,
}

impl<V> Cursor<V> {
    /// Bind a cursor to `judy`. Only [`TraversalMode::ByValue`] is supported.
    pub fn new(judy: &Shared<V>, mode: TraversalMode) -> Result<Self> {
        if mode == TraversalMode::ByReference {
            return Err(Error::UnsupportedTraversalMode);
        }
        Ok(Self {
            judy: Rc::downgrade(judy),
            state: CursorState::BeforeStart,
            current: None,
        })
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    fn with_judy<R>(&self, f: impl FnOnce(&Judy<V>) -> R) -> Result<R> {
        let judy = self.judy.upgrade().ok_or(Error::ContainerReleased)?;
        let judy = judy.try_borrow()?;
        Ok(f(&judy))
    }

    /// Move to the smallest key, or to `Exhausted` if the container is empty.
    pub fn rewind(&mut self) -> Result<()> {
        let found = self.with_judy(|judy| judy.entry_from(&[], true));
        self.settle(found)
    }

    /// Move to the successor of the current key. Does nothing unless the
    /// cursor is positioned.
    pub fn advance(&mut self) -> Result<()> {
        let found = match &self.state {
            CursorState::Positioned(key) => self
                .with_judy(|judy| -> Result<_> {
                    let raw = judy.encode(key.as_key_ref())?;
                    Ok(judy.entry_from(&raw, false))
                })
                .and_then(|found| found),
            CursorState::BeforeStart | CursorState::Exhausted => return Ok(()),
        };
        self.settle(found)
    }

    fn settle(&mut self, found: Result<Option<(Key, Value<V>)>>) -> Result<()> {
        match found {
            Ok(Some((key, value))) => {
                trace!(%key, "cursor positioned");
                self.state = CursorState::Positioned(key);
                self.current = Some(value);
                Ok(())
            }
            Ok(None) => {
                trace!("cursor exhausted");
                self.release();
                Ok(())
            }
            // Someone else holds the container; try again later.
            Err(Error::ContainerBusy) => Err(Error::ContainerBusy),
            Err(e) => {
                self.release();
                Err(e)
            }
        }
    }

    fn release(&mut self) {
        self.state = CursorState::Exhausted;
        self.current = None;
    }

    /// Whether the cursor is positioned and its key is still present.
    pub fn valid(&self) -> bool {
        let CursorState::Positioned(key) = &self.state else {
            return false;
        };
        self.with_judy(|judy| {
            judy.encode(key.as_key_ref())
                .map(|raw| judy.contains_raw(&raw))
                .unwrap_or(false)
        })
        .unwrap_or(false)
    }

    pub fn current_key(&self) -> Result<&Key> {
        match &self.state {
            CursorState::Positioned(key) if self.valid() => Ok(key),
            _ => Err(Error::InvalidCursorState),
        }
    }

    /// Value materialized when the cursor last moved.
    pub fn current_value(&self) -> Result<&Value<V>> {
        if !self.valid() {
            return Err(Error::InvalidCursorState);
        }
        self.current.as_ref().ok_or(Error::InvalidCursorState)
    }
}

/// Lazy traversal: the first call rewinds, later calls advance.
impl<V> Iterator for Cursor<V> {
    type Item = (Key, Value<V>);

    fn next(&mut self) -> Option<Self::Item> {
        let step = match self.state {
            CursorState::BeforeStart => self.rewind(),
            CursorState::Positioned(_) => self.advance(),
            CursorState::Exhausted => return None,
        };
        if let Err(e) = step {
            warn!(error = %e, "cursor traversal stopped");
            return None;
        }
        match (&self.state, &self.current) {
            (CursorState::Positioned(key), Some(value)) => Some((key.clone(), value.clone())),
            _ => None,
        }
    }
}
