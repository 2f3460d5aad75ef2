//! DOS Drive Layer Core
//!
//! This crate provides the lettered-drive layer of a DOS-compatible emulator:
//! - 26 drive letters backed by heterogeneous stores
//! - 8.3 short-name synthesis and long-name aware path resolution
//! - Reference-counted open files that survive mount/unmount
//! - Swappable disk sets per drive letter
//! - Save/restore of per-drive working directories
//!
//! # Architecture
//!
//! Everything hangs off one session context, [`DriveSystem`]:
//! - `Drive` trait: a single backing store (memory, image, overlay, ...)
//! - `DriveArena`: owns every registered drive, keyed by [`DriveId`]
//! - `DriveTable`: letter -> `DriveId` for directly mounted drives
//! - `FileHandleTable`: fixed-capacity table of open files
//!
//! Shadow relationships (an overlay stacked over a base drive) are expressed
//! through ids, so unmounting a base drive can find and unmount the drives
//! stacked on top of it first.

pub mod archive;
pub mod config;
pub mod content;
pub mod disk_swap;
pub mod drive_table;
pub mod error;
pub mod files;
pub mod fs;
pub mod names;
pub mod resolver;
pub mod state;
pub mod system;
pub mod topology;
pub mod traversal;

pub use archive::{Archive, ArchiveMode, ArchiveWarnings};
pub use config::{DriveConfig, MountConfig, MountKind};
pub use disk_swap::DiskSet;
pub use drive_table::{drive_index, drive_letter, DriveArena, DriveId, DriveTable};
pub use error::{ArchiveError, DosError, DosResult};
pub use files::{FileHandle, FileHandleTable};
pub use fs::{
    Attributes, DirEntry, Drive, DriveKind, DriveRef, FileStream, ImageDrive, MemoryDrive,
    OpenMode, OverlayDrive, SearchState,
};
pub use names::{format_label, make_8dot3_name, remove_ending_dots, wild_file_cmp};
pub use resolver::{OpenedFile, MOUNTED_ONLY_PREFIX};
pub use system::{DriveHooks, DriveSystem, ImageDiskRef, NoHooks};
pub use traversal::{walk_drive, WalkEntry};

/// Number of drive letters (A-Z).
pub const DOS_DRIVES: usize = 26;

/// Maximum length of a DOS path, including the terminator.
pub const DOS_PATHLENGTH: usize = 80;

/// Maximum length of an 8.3 name ("FILENAME.EXT").
pub const DOS_NAMELENGTH: usize = 12;

/// Capacity of the open file table.
pub const DOS_FILES: usize = 255;

/// Number of low-level disk image slots (A: through D:).
pub const MAX_DISK_IMAGES: usize = 4;

/// Index of the virtual drive letter (Z:).
pub const VIRTUAL_DRIVE: u8 = b'Z' - b'A';
