//! ledgervault - Encrypted local data vault for personal finance data
//!
//! Turns a user password into a durable, per-record encrypted storage
//! layer. The working decryption key lives only in volatile memory; a
//! time-limited session token allows "stay signed in" without ever
//! persisting the password; portable encrypted backup files round-trip
//! the whole vault.
//!
//! # Architecture
//!
//! - `crypto`: AES-256-GCM primitives, PBKDF2 key derivation, the KWK/DEK
//!   key hierarchy
//! - `session`: the single resident DEK slot and session-token continuity
//! - `store`: unencrypted crypto metadata, per-record encrypted stores,
//!   the write-coalescing queue
//! - `transfer`: versioned, compressed, encrypted export/import
//! - `config`: path resolution and tunable parameters
//! - `error`: the typed error taxonomy
//!
//! # Key hierarchy
//!
//! A Key-Wrapping-Key (KWK) is derived from the password and vault salt
//! via PBKDF2-HMAC-SHA256; it exists only for the duration of a derive
//! call. The Data-Encryption-Key (DEK) is random, encrypts all records,
//! and is persisted only wrapped under the KWK. Without the password the
//! plaintext DEK is unrecoverable by design.

pub mod config;
pub mod crypto;
pub mod error;
pub mod session;
pub mod store;
pub mod transfer;

pub use error::{VaultError, VaultResult};
