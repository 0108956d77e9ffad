//! Collaborator interfaces and in-memory implementations.
//!
//! The remote document tree and the object store are external services; this
//! module pins down the slice of their behavior the rest of the crate relies
//! on, plus in-memory implementations for tests and offline use and timeout
//! decorators for real remotes.

mod document;
mod memory;
mod object;
mod timed;

pub use document::{join_path, DocEvent, DocEventKind, DocumentStore};
pub use memory::{MemoryObjectStore, MemoryStore};
pub use object::ObjectStore;
pub use timed::{TimedObjects, TimedStore};
