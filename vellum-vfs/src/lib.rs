//! Virtual file system for the Vellum workspace
//!
//! This crate provides:
//! - The [`Vfs`] contract consumed by the sync engine, with a disk-backed
//!   implementation ([`DiskVfs`])
//! - The [`DatasetStore`], which manages named dataset directory trees and
//!   open-handle tracking (the substrate snapshots are built on)
//! - The workspace change-event stream

pub mod errors;
pub mod events;
pub mod store;
pub mod vfs;

pub use errors::{Result, VfsError};
pub use events::{VfsEvent, VfsEventKind};
pub use store::{DatasetHandle, DatasetStore, LIVE_DATASET};
pub use vfs::{
    is_system_path, split_module, DiskVfs, FileInfo, Vfs, CONFIG_MODULE, TRASH_MODULE,
};
