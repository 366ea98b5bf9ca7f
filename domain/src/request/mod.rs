//! Working request descriptor.

pub mod entities;
