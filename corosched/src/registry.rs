//! Coroutine registry.
//!
//! Maps coroutine identifiers to live coroutine state. Entries live in a
//! generational arena; an ordered index maps each [`CoroId`] to its arena
//! key. The registry only serves identifier lookups: which queue a
//! coroutine currently sits in is tracked elsewhere.

use crate::coroutine::{Body, CoroHandle, CoroId};
use crate::error::{Error, Result};
use crate::utils::{Key, Slab};

use std::collections::BTreeMap;

struct Entry {
    handle: CoroHandle,

    /// `None` while the body is out: running, or diverted to the worker.
    body: Option<Body>,
}

pub(crate) struct Registry {
    index: BTreeMap<CoroId, Key>,
    entries: Slab<Entry>,
    daemons: usize,
}

impl Registry {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            index: BTreeMap::new(),
            entries: Slab::new(capacity),
            daemons: 0,
        }
    }

    /// Inserts a coroutine keyed by its identifier.
    pub(crate) fn insert(&mut self, handle: CoroHandle, body: Body) -> Result<()> {
        let id = handle.id();
        if self.index.contains_key(&id) {
            return Err(Error::AlreadyRegistered(id));
        }

        if handle.is_daemon() {
            self.daemons += 1;
        }

        let key = self.entries.insert(Entry {
            handle,
            body: Some(body),
        });
        self.index.insert(id, key);

        Ok(())
    }

    /// Returns a handle to the coroutine, or `None` if it is not registered.
    pub(crate) fn lookup(&self, id: CoroId) -> Option<CoroHandle> {
        let key = self.index.get(&id)?;
        self.entries.get(*key).map(|entry| entry.handle.clone())
    }

    pub(crate) fn contains(&self, id: CoroId) -> bool {
        self.index.contains_key(&id)
    }

    /// Takes the body out of the registry to run or divert it.
    pub(crate) fn take_body(&mut self, id: CoroId) -> Option<Body> {
        let key = self.index.get(&id)?;
        self.entries.get_mut(*key)?.body.take()
    }

    /// Puts a body back after a switch or a return from the worker.
    ///
    /// Hands the body back to the caller if the coroutine is no longer
    /// registered.
    pub(crate) fn restore_body(&mut self, id: CoroId, body: Body) -> std::result::Result<(), Body> {
        let entry = match self.index.get(&id) {
            Some(key) => self.entries.get_mut(*key),
            None => None,
        };

        match entry {
            Some(entry) => {
                debug_assert!(entry.body.is_none(), "coroutine {id} already has its body");
                entry.body = Some(body);
                Ok(())
            }
            None => Err(body),
        }
    }

    /// Removes the entry.
    ///
    /// Callers only remove coroutines whose `Exited` status they observed.
    /// Whatever body is still stored is returned for the caller to release.
    pub(crate) fn remove(&mut self, id: CoroId) -> Option<Option<Body>> {
        let key = self.index.remove(&id)?;
        let entry = self.entries.remove(key)?;

        if entry.handle.is_daemon() {
            self.daemons -= 1;
        }

        Some(entry.body)
    }

    /// Number of registered application coroutines.
    pub(crate) fn live(&self) -> usize {
        self.entries.len() - self.daemons
    }
}
