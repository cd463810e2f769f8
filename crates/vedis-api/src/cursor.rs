//! Lazy iteration over a live handle.

use crate::Shared;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use vedis_core::{Error, Result, Value};

/// Key order walk over one key range of a handle.
///
/// Each step takes the handle lock, looks up the first key after the last one
/// returned and releases the lock again, so writes made between steps are
/// visible to later steps. Once the handle is closed the next step yields
/// [`Error::Closed`]. While any cursor is alive [`Database::close`] fails with
/// [`Error::Busy`].
///
/// [`Database::close`]: crate::Database::close
pub struct Cursor {
    shared: Arc<Shared>,
    /// Engine key prefix of the range
    prefix: Vec<u8>,
    /// Bytes stripped from engine keys before they are returned
    strip: usize,
    last: Option<Vec<u8>>,
    done: bool,
}

impl Cursor {
    pub(crate) fn new(shared: Arc<Shared>, prefix: Vec<u8>, strip: usize) -> Self {
        shared.cursors.fetch_add(1, Ordering::SeqCst);
        Self {
            shared,
            prefix,
            strip,
            last: None,
            done: false,
        }
    }

    /// Start again from the first key
    pub fn reset(&mut self) {
        self.last = None;
        self.done = false;
    }

    fn step(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let prefix = &self.prefix;
        let last = self.last.as_deref();
        let found = self.shared.with(|handle| {
            let engine = &mut handle.engine;
            let key = match engine.next_key(prefix, last)? {
                Some(key) => key,
                None => return Ok(None),
            };
            let value = engine.get(&key)?.ok_or_else(|| {
                Error::Corrupted(format!(
                    "indexed key {:?} has no value",
                    String::from_utf8_lossy(&key)
                ))
            })?;
            Ok(Some((key, value)))
        })?;

        Ok(found.map(|(key, value)| {
            let visible = key[self.strip..].to_vec();
            self.last = Some(key);
            (visible, value)
        }))
    }
}

impl Iterator for Cursor {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.shared.cursors.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Elements of an array command result.
///
/// The elements are materialized when the command runs; the iterator only
/// checks that the handle is still open before handing out each one.
pub struct ValueIter {
    shared: Arc<Shared>,
    items: std::vec::IntoIter<Value>,
    done: bool,
}

impl ValueIter {
    pub(crate) fn new(shared: Arc<Shared>, items: Vec<Value>) -> Self {
        Self {
            shared,
            items: items.into_iter(),
            done: false,
        }
    }

    /// Elements not yet returned
    pub fn remaining(&self) -> usize {
        self.items.len()
    }
}

impl Iterator for ValueIter {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Err(e) = self.shared.with(|_| Ok(())) {
            self.done = true;
            return Some(Err(e));
        }
        let item = self.items.next();
        if item.is_none() {
            self.done = true;
        }
        item.map(Ok)
    }
}
