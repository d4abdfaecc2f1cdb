//! Atomic, permission-preserving file replacement.
//!
//! Content is staged in a scratch directory and renamed over the target, and
//! the replaced file's owner and mode are carried over to the new one.

pub mod atomic;
pub mod config;
pub mod entropy;
pub mod error;
pub mod links;
pub mod meta;
pub mod rename;
pub mod tmpname;

pub use atomic::{atomic_write, write_bytes, write_bytes_with, WriteMode, WriteOptions};
pub use config::Config;
pub use entropy::{EntropySource, FixedEntropy, SystemEntropy};
pub use error::{Error, Result};
pub use links::{hardlink_count, is_shared};
pub use meta::{Lookup, MetadataSnapshot, SAFETY_MASK};
pub use rename::force_rename;
pub use tmpname::{make_tmpname, make_tmpname_with, NameSeed};
