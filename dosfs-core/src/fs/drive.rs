//! Drive trait - the capability every DOS drive backing store implements.

use std::cell::RefCell;
use std::io::{Read, Seek, Write};
use std::rc::Rc;

use bitflags::bitflags;

use crate::drive_table::DriveId;
use crate::error::{DosError, DosResult};
use crate::names::wild_file_cmp;

bitflags! {
    /// DOS directory entry attribute byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
        const DEVICE = 0x40;
    }
}

/// Access mode requested when opening a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

impl OpenMode {
    /// Whether this mode needs write access.
    pub fn can_write(self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

/// Kind of backing store behind a drive letter.
///
/// The kind decides the order of the ordered shutdown and which unmount
/// failures are tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveKind {
    /// Plain host directory.
    Local,
    /// Filesystem inside a disk image.
    Image,
    /// Filesystem inside an optical disc image.
    Optical,
    /// Union/overlay stacked over other drives.
    Overlay,
    /// The emulator's own always-present drive.
    Virtual,
}

/// Byte stream of an open file.
pub trait FileStream: Read + Write + Seek {}

impl<T: Read + Write + Seek> FileStream for T {}

/// One result of a find-first/find-next search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// 8.3 name of the entry.
    pub name: String,
    pub size: u32,
    pub date: u16,
    pub time: u16,
    pub attr: Attributes,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.attr.contains(Attributes::DIRECTORY)
    }

    /// `.` and `..` navigation entries.
    pub fn is_dot_entry(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// Cursor of a find-first/find-next search.
///
/// Owned by the caller; a drive fills it in `find_first` and advances it in
/// `find_next`.
#[derive(Debug, Clone)]
pub struct SearchState {
    pattern: String,
    attr: Attributes,
    entries: Vec<DirEntry>,
    next: usize,
    result: Option<DirEntry>,
}

impl SearchState {
    /// Create a search for `pattern` admitting entries with `attr`.
    pub fn new(pattern: &str, attr: Attributes) -> Self {
        Self {
            pattern: pattern.to_string(),
            attr,
            entries: Vec::new(),
            next: 0,
            result: None,
        }
    }

    /// Search for every entry except the volume label.
    pub fn all() -> Self {
        Self::new("*.*", Attributes::all() - Attributes::VOLUME)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn attributes(&self) -> Attributes {
        self.attr
    }

    /// Entry found by the last successful find-first/find-next.
    pub fn result(&self) -> Option<&DirEntry> {
        self.result.as_ref()
    }

    /// Set the result directly (used for volume label lookups).
    pub fn set_result(&mut self, entry: DirEntry) {
        self.result = Some(entry);
    }

    /// Whether an entry with `attr` may be returned by this search.
    pub fn admits(&self, attr: Attributes) -> bool {
        if self.attr == Attributes::VOLUME {
            return attr.contains(Attributes::VOLUME);
        }
        let special = Attributes::HIDDEN
            | Attributes::SYSTEM
            | Attributes::DIRECTORY
            | Attributes::VOLUME;
        let special = attr & special;
        self.attr.contains(special)
    }

    /// Start a search over `entries`, keeping those that match the pattern
    /// and attributes. Returns whether a first result exists.
    pub fn begin<I>(&mut self, entries: I) -> bool
    where
        I: IntoIterator<Item = DirEntry>,
    {
        let kept: Vec<DirEntry> = entries
            .into_iter()
            .filter(|e| self.admits(e.attr))
            .filter(|e| e.is_dot_entry() || wild_file_cmp(&e.name, &self.pattern))
            .collect();
        self.entries = kept;
        self.next = 0;
        self.advance()
    }

    /// Move to the next entry. Returns false when exhausted.
    pub fn advance(&mut self) -> bool {
        self.result = self.entries.get(self.next).cloned();
        if self.result.is_some() {
            self.next += 1;
        }
        self.result.is_some()
    }
}

/// Filesystem interface for a single DOS drive.
///
/// Paths are relative to the drive root, without drive letter or leading
/// separator, with `\` (or `/`) between components.
pub trait Drive {
    /// Kind of backing store.
    fn kind(&self) -> DriveKind;

    /// Human readable description ("memory", "image drive.zip", ...).
    fn info(&self) -> &str;

    /// Volume label, empty if none.
    fn label(&self) -> &str;

    /// Open an existing file.
    fn file_open(&mut self, path: &str, mode: OpenMode) -> DosResult<Box<dyn FileStream>>;

    /// Create or truncate a file.
    fn file_create(&mut self, path: &str, attr: Attributes) -> DosResult<Box<dyn FileStream>>;

    /// Delete a file.
    fn file_unlink(&mut self, path: &str) -> DosResult<()> {
        Err(DosError::AccessDenied(path.to_string()))
    }

    /// Begin a search in directory `dir`. Returns whether a result exists.
    fn find_first(&mut self, dir: &str, search: &mut SearchState) -> bool;

    /// Continue a search. Returns whether a result exists.
    fn find_next(&mut self, search: &mut SearchState) -> bool {
        search.advance()
    }

    /// Long name of the last component of a short-name path, if the store
    /// knows long names.
    fn long_file_name(&self, _path: &str) -> Option<String> {
        None
    }

    /// Called when the drive becomes the active disk of a disk set.
    fn activate(&mut self) {}

    /// Release the store's resources. Open files must already be closed.
    fn unmount(&mut self) -> DosResult<()>;

    /// The `n`th drive this drive is stacked over.
    fn shadow(&self, _n: usize) -> Option<DriveId> {
        None
    }

    /// Whether the store is a hard disk (as opposed to removable media).
    fn is_hard_disk(&self) -> bool {
        false
    }
}

/// Shared handle to a drive. Drives live on the emulation thread only.
pub type DriveRef = Rc<RefCell<dyn Drive>>;

/// Wrap a drive into a [`DriveRef`].
pub fn drive_ref<D: Drive + 'static>(drive: D) -> DriveRef {
    Rc::new(RefCell::new(drive))
}

/// Run a full search on `drive` and collect every result.
pub fn collect_entries(
    drive: &mut dyn Drive,
    dir: &str,
    pattern: &str,
    attr: Attributes,
) -> Vec<DirEntry> {
    let mut search = SearchState::new(pattern, attr);
    let mut entries = Vec::new();
    let mut more = drive.find_first(dir, &mut search);
    while more {
        if let Some(entry) = search.result() {
            entries.push(entry.clone());
        }
        more = drive.find_next(&mut search);
    }
    entries
}
