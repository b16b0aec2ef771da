//! Utilities for memory-efficient data structures.
//!
//! This module provides low-level utilities used internally by the
//! schedulers. In particular, it exposes a generational [`Slab`] used as
//! the arena behind the coroutine registry and the event manager.

mod slab;

pub(crate) use slab::{Key, Slab};
