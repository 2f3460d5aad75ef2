//! Drive backing stores.
//!
//! - `Drive`: the interface every store implements
//! - `MemoryDrive`: in-memory store with long names
//! - `ImageDrive`: read-only disk image loaded from a ZIP archive
//! - `OverlayDrive`: copy-on-write overlay stacked over another drive

mod drive;
mod image_drive;
mod memory_drive;
mod overlay_drive;

pub use drive::{
    collect_entries, drive_ref, Attributes, DirEntry, Drive, DriveKind, DriveRef, FileStream,
    OpenMode, SearchState,
};
pub use image_drive::ImageDrive;
pub use memory_drive::{MemoryDrive, MemoryFile};
pub use overlay_drive::OverlayDrive;
