//! mastery-store — Storage backends for the mastery engine.
//!
//! Implements the core storage seams over an in-memory dataset that can be
//! loaded from and saved to a JSON snapshot, a lock file for single-writer
//! access to that snapshot, and a fault-injecting wrapper for exercising
//! failure paths.

pub mod faulty;
pub mod lock;
pub mod memory;
pub mod snapshot;

pub use faulty::{FaultyStore, StoreOp};
pub use lock::DatasetLock;
pub use memory::MemoryStore;
pub use snapshot::Dataset;
