#![forbid(unsafe_code)]

//! Persistent flash storage interface.
//!
//! The core does not define an on-flash format; it only guarantees that
//! storage I/O goes through this contract and reports errors from the
//! shared taxonomy: `Filesystem` for media errors, `NotFound` for missing
//! paths, `NotAvailable` when unmounted.

use slate_core::error::SysResult;

use crate::module::HalModule;

/// A directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name, no path components.
    pub name: String,
    /// File size in bytes; 0 for directories.
    pub size: u64,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Flash storage contract.
pub trait StorageHal: HalModule {
    /// Mount the filesystem. Idempotent.
    fn mount(&mut self) -> SysResult<()>;

    /// Unmount the filesystem. Idempotent.
    fn unmount(&mut self) -> SysResult<()>;

    /// Whether the filesystem is mounted.
    fn is_mounted(&self) -> bool;

    /// Read a whole file.
    fn read(&mut self, path: &str) -> SysResult<Vec<u8>>;

    /// Write a whole file, replacing any previous content.
    fn write(&mut self, path: &str, data: &[u8]) -> SysResult<()>;

    /// Remove a file.
    fn remove(&mut self, path: &str) -> SysResult<()>;

    /// List a directory.
    fn list(&self, path: &str) -> SysResult<Vec<DirEntry>>;
}
