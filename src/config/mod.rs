//! Configuration and path management for ledgervault

pub mod paths;
pub mod settings;

pub use paths::VaultPaths;
pub use settings::VaultConfig;
