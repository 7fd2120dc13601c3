//! Persistence layer for ledgervault
//!
//! Unencrypted crypto metadata, per-record encrypted stores, the
//! write-coalescing queue, and atomic JSON file I/O.

pub mod file_io;
pub mod metadata;
pub mod queue;
pub mod records;

pub use metadata::MetaStore;
pub use queue::WriteQueue;
pub use records::{EncryptedRecord, RecordStore};
