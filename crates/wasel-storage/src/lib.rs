//! Session persistence for the Wasel client.
//!
//! The auth backend keeps its tokens in a [`SessionVault`], which sits on top
//! of any [`SessionStorage`] backend:
//! - [`MemoryStorage`] when sessions should not outlive the process
//! - [`FileStorage`] for a JSON file under `~/.wasel`

mod file;
mod keys;
mod memory;
mod traits;
mod vault;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::SessionStorage;
pub use vault::{SessionMeta, SessionVault, EXPIRY_MARGIN_SECS};

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
