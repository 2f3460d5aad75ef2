//! The drive session context.
//!
//! A [`DriveSystem`] owns everything the drive layer of one emulated session
//! needs: the drive arena, the letter table, the open file table, the disk
//! sets and the low-level disk image registry. It is created when the session
//! starts and torn down explicitly when it ends.

use crate::disk_swap::DiskSet;
use crate::drive_table::{drive_index, drive_letter, DriveArena, DriveId, DriveTable};
use crate::error::{DosError, DosResult};
use crate::files::{FileHandle, FileHandleTable};
use crate::fs::{drive_ref, DriveKind, DriveRef, MemoryDrive, OpenMode};
use crate::{MAX_DISK_IMAGES, VIRTUAL_DRIVE};

/// Callbacks into the parts of the emulator that sit below the drive layer.
pub trait DriveHooks {
    /// A hard disk image behind C: or D: changed; recompute the disk
    /// parameter tables.
    fn update_hard_disk_params(&mut self, _letter: char) {}

    /// Force the optical media extension to release its drives.
    fn shutdown_optical(&mut self) {}

    /// A letter lost its drive (clear the media id byte and similar).
    fn drive_removed(&mut self, _letter: char) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl DriveHooks for NoHooks {}

/// Entry of the low-level disk image registry (A: to D:).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDiskRef {
    /// Drive whose image backs the BIOS disk.
    pub source: DriveId,
    pub hard_disk: bool,
}

/// Drive layer state of one emulated session.
pub struct DriveSystem {
    pub(crate) arena: DriveArena,
    pub(crate) table: DriveTable,
    pub(crate) files: FileHandleTable,
    pub(crate) disk_sets: [DiskSet; crate::DOS_DRIVES],
    pub(crate) image_disks: [Option<ImageDiskRef>; MAX_DISK_IMAGES],
    pub(crate) hooks: Box<dyn DriveHooks>,
    pub(crate) default_drive: Option<u8>,
}

impl Default for DriveSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveSystem {
    /// Create a session with the virtual drive mounted at Z:.
    pub fn new() -> Self {
        Self::with_hooks(Box::new(NoHooks))
    }

    pub fn with_hooks(hooks: Box<dyn DriveHooks>) -> Self {
        let mut system = Self {
            arena: DriveArena::new(),
            table: DriveTable::new(),
            files: FileHandleTable::new(),
            disk_sets: Default::default(),
            image_disks: [None; MAX_DISK_IMAGES],
            hooks,
            default_drive: None,
        };
        let id = system
            .arena
            .register(drive_ref(MemoryDrive::virtual_drive()));
        system.table.set(VIRTUAL_DRIVE, Some(id));
        system
    }

    /// Register a drive that is not directly mounted (an overlay base, say).
    pub fn register(&mut self, drive: DriveRef) -> DriveId {
        self.arena.register(drive)
    }

    /// Register a drive and mount it at `letter`.
    pub fn mount(&mut self, letter: char, drive: DriveRef) -> DosResult<DriveId> {
        let idx = drive_index(letter)?;
        if self.table.get(idx).is_some() {
            return Err(DosError::DriveInUse(letter.to_ascii_uppercase()));
        }
        let id = self.arena.register(drive);
        self.table.set(idx, Some(id));
        tracing::debug!(drive = %drive_letter(idx), id = id.as_u32(), "mounted drive");
        Ok(id)
    }

    /// Mount an already registered drive at `letter`.
    pub fn mount_registered(&mut self, letter: char, id: DriveId) -> DosResult<()> {
        let idx = drive_index(letter)?;
        if !self.arena.contains(id) {
            return Err(DosError::DriveNotMounted(letter.to_ascii_uppercase()));
        }
        if self.table.get(idx).is_some() {
            return Err(DosError::DriveInUse(letter.to_ascii_uppercase()));
        }
        self.table.set(idx, Some(id));
        Ok(())
    }

    /// Drive registered under `id`.
    pub fn drive(&self, id: DriveId) -> Option<DriveRef> {
        self.arena.get(id).cloned()
    }

    /// Id of the drive directly mounted at `letter`.
    pub fn drive_id(&self, letter: char) -> Option<DriveId> {
        drive_index(letter).ok().and_then(|idx| self.table.get(idx))
    }

    /// Drive directly mounted at `letter`.
    pub fn drive_at(&self, letter: char) -> DosResult<DriveRef> {
        let id = self
            .drive_id(letter)
            .ok_or(DosError::DriveNotMounted(letter.to_ascii_uppercase()))?;
        self.drive(id)
            .ok_or(DosError::DriveNotMounted(letter.to_ascii_uppercase()))
    }

    pub fn is_mounted(&self, letter: char) -> bool {
        self.drive_id(letter).is_some()
    }

    /// Letters with a directly mounted drive, in order.
    pub fn mounted_letters(&self) -> Vec<char> {
        self.table
            .mounted()
            .map(|(idx, _)| drive_letter(idx))
            .collect()
    }

    /// Working directory of the drive at `letter`.
    pub fn curdir(&self, letter: char) -> DosResult<String> {
        let id = self
            .drive_id(letter)
            .ok_or(DosError::DriveNotMounted(letter.to_ascii_uppercase()))?;
        Ok(self.arena.curdir(id).unwrap_or_default().to_string())
    }

    pub fn set_curdir(&mut self, letter: char, dir: &str) -> DosResult<()> {
        let id = self
            .drive_id(letter)
            .ok_or(DosError::DriveNotMounted(letter.to_ascii_uppercase()))?;
        self.arena.set_curdir(id, dir)
    }

    /// Current default drive letter, if DOS is up.
    pub fn default_drive(&self) -> Option<char> {
        self.default_drive.map(drive_letter)
    }

    pub fn set_default_drive(&mut self, letter: Option<char>) -> DosResult<()> {
        self.default_drive = letter.map(drive_index).transpose()?;
        Ok(())
    }

    pub fn files(&self) -> &FileHandleTable {
        &self.files
    }

    pub fn files_mut(&mut self) -> &mut FileHandleTable {
        &mut self.files
    }

    /// Open a short-name path on `letter` and put it into the file table.
    pub fn open_file(&mut self, letter: char, path: &str, mode: OpenMode) -> DosResult<usize> {
        let idx = drive_index(letter)?;
        let drive = self.drive_at(letter)?;
        let stream = drive.borrow_mut().file_open(path, mode)?;
        self.files
            .allocate(FileHandle::new(stream, Some(idx), Some(path.to_string())))
    }

    /// Drop one reference of a file table entry, freeing the slot with the
    /// last one.
    pub fn close_file(&mut self, handle: usize) -> DosResult<()> {
        if self.files.release(handle)? == 0 {
            self.files.reclaim(handle);
        }
        Ok(())
    }

    /// Delete a file, closing every handle still open on it first.
    pub fn unlink(&mut self, letter: char, path: &str) -> DosResult<()> {
        let id = self
            .drive_id(letter)
            .ok_or(DosError::DriveNotMounted(letter.to_ascii_uppercase()))?;
        if self.force_close_file(id, path) {
            tracing::debug!(drive = %letter, path, "closed open handles before delete");
        }
        let drive = self.drive_at(letter)?;
        let result = drive.borrow_mut().file_unlink(path);
        result
    }

    /// Link the drive at `letter` into the low-level disk image registry.
    pub fn attach_image_disk(&mut self, letter: char) -> DosResult<()> {
        let idx = drive_index(letter)?;
        if idx as usize >= MAX_DISK_IMAGES {
            return Err(DosError::InvalidDrive(letter));
        }
        let id = self
            .table
            .get(idx)
            .ok_or(DosError::DriveNotMounted(letter.to_ascii_uppercase()))?;
        let hard_disk = self.drive_at(letter)?.borrow().is_hard_disk();
        self.image_disks[idx as usize] = Some(ImageDiskRef {
            source: id,
            hard_disk,
        });
        if hard_disk && (idx == 2 || idx == 3) {
            self.hooks.update_hard_disk_params(drive_letter(idx));
        }
        Ok(())
    }

    /// Registry entry for A: to D:.
    pub fn image_disk(&self, letter: char) -> Option<ImageDiskRef> {
        let idx = drive_index(letter).ok()? as usize;
        self.image_disks.get(idx).copied().flatten()
    }

    /// Number of registered drives, mounted or not.
    pub fn registered_drives(&self) -> usize {
        self.arena.len()
    }

    /// Kind of the drive directly mounted at letter index `idx`.
    pub(crate) fn kind_at(&self, idx: u8) -> Option<DriveKind> {
        let id = self.table.get(idx)?;
        self.arena.get(id).map(|d| d.borrow().kind())
    }

    /// End the session: unmount everything in order, then release the
    /// virtual drive.
    pub fn teardown(mut self) {
        self.shutdown();
        if let Some(id) = self.table.set(VIRTUAL_DRIVE, None) {
            self.files.close_drive_files(VIRTUAL_DRIVE);
            self.arena.remove(id);
        }
        if !self.arena.is_empty() {
            tracing::warn!(count = self.arena.len(), "unmounted drives left at teardown");
        }
        tracing::debug!("drive system torn down");
    }
}

/// Hooks that log every call, shared with the test that installed them.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct RecordingHooks(pub(crate) std::rc::Rc<std::cell::RefCell<Vec<String>>>);

#[cfg(test)]
impl RecordingHooks {
    pub(crate) fn install() -> (DriveSystem, std::rc::Rc<std::cell::RefCell<Vec<String>>>) {
        let hooks = RecordingHooks::default();
        let log = hooks.0.clone();
        (DriveSystem::with_hooks(Box::new(hooks)), log)
    }
}

#[cfg(test)]
impl DriveHooks for RecordingHooks {
    fn update_hard_disk_params(&mut self, letter: char) {
        self.0.borrow_mut().push(format!("dpt {letter}"));
    }

    fn shutdown_optical(&mut self) {
        self.0.borrow_mut().push("optical".to_string());
    }

    fn drive_removed(&mut self, letter: char) {
        self.0.borrow_mut().push(format!("removed {letter}"));
    }
}
