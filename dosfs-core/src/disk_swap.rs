//! Swappable disk sets.
//!
//! A letter with registered disks is "managed": exactly one disk of its set
//! is published in the letter table and the others wait in the arena until
//! the user cycles to them. A letter with an empty set is mounted and
//! unmounted like any other.

use crate::drive_table::{drive_index, drive_letter, DriveId};
use crate::error::DosResult;
use crate::fs::{DriveKind, DriveRef};
use crate::system::{DriveSystem, ImageDiskRef};
use crate::{DOS_DRIVES, MAX_DISK_IMAGES};

/// Ordered disks of one letter plus the active index.
#[derive(Debug, Clone, Default)]
pub struct DiskSet {
    disks: Vec<DriveId>,
    current: usize,
}

impl DiskSet {
    pub fn len(&self) -> usize {
        self.disks.len()
    }

    /// An empty set marks an unmanaged letter.
    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }

    pub fn disks(&self) -> &[DriveId] {
        &self.disks
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The active disk.
    pub fn current(&self) -> Option<DriveId> {
        self.disks.get(self.current).copied()
    }

    pub fn contains(&self, id: DriveId) -> bool {
        self.disks.contains(&id)
    }
}

impl DriveSystem {
    /// Disk set of `letter`.
    pub fn disk_set(&self, letter: char) -> DosResult<&DiskSet> {
        Ok(&self.disk_sets[drive_index(letter)? as usize])
    }

    /// Add a disk to the set of `letter`. The disk is not published until
    /// [`initialize_drive`](Self::initialize_drive) or a cycle selects it.
    pub fn append_disk(&mut self, letter: char, disk: DriveRef) -> DosResult<DriveId> {
        let idx = drive_index(letter)?;
        let id = self.arena.register(disk);
        self.disk_sets[idx as usize].disks.push(id);
        Ok(id)
    }

    /// Publish the first disk of the set of `letter`.
    pub fn initialize_drive(&mut self, letter: char) -> DosResult<()> {
        let idx = drive_index(letter)?;
        let set = &mut self.disk_sets[idx as usize];
        let Some(&first) = set.disks.first() else {
            return Ok(());
        };
        set.current = 0;
        let count = set.disks.len();
        self.table.set(idx, Some(first));
        if count > 1 {
            if let Some(disk) = self.arena.get(first) {
                disk.borrow_mut().activate();
            }
        }
        tracing::debug!(drive = %drive_letter(idx), disks = count, "initialized disk set");
        Ok(())
    }

    /// Switch `letter` to its next disk. Sets of zero or one disk are left
    /// alone.
    pub fn cycle_disks(&mut self, letter: char, notify: bool) -> DosResult<()> {
        let idx = drive_index(letter)?;
        self.cycle_disks_at(idx, notify);
        Ok(())
    }

    /// Cycle every managed letter (the global "next disk" key).
    pub fn cycle_all_disks(&mut self) {
        for idx in 0..DOS_DRIVES as u8 {
            self.cycle_disks_at(idx, true);
        }
    }

    fn cycle_disks_at(&mut self, idx: u8, notify: bool) {
        let set = &self.disk_sets[idx as usize];
        let count = set.disks.len();
        if count <= 1 {
            return;
        }
        let old = set.disks[set.current];
        let current = (set.current + 1) % count;
        let new = set.disks[current];

        let Some(disk) = self.arena.get(new).cloned() else {
            tracing::warn!(drive = %drive_letter(idx), "disk set refers to a released drive");
            return;
        };

        // The letter may show a drive stacked over the old disk
        let top = self.table.get(idx).unwrap_or(old);
        let curdir = self.arena.curdir(top).unwrap_or_default().to_string();
        if let Err(err) = self.release_stacked(idx, old) {
            tracing::warn!(
                drive = %drive_letter(idx),
                %err,
                "stacked drive refused to unmount, not cycling"
            );
            return;
        }
        self.disk_sets[idx as usize].current = current;

        if (idx as usize) < MAX_DISK_IMAGES && self.image_disks[idx as usize].is_some() {
            let hard_disk = disk.borrow().is_hard_disk();
            self.image_disks[idx as usize] = Some(ImageDiskRef {
                source: new,
                hard_disk,
            });
            if (idx == 2 || idx == 3) && hard_disk {
                self.hooks.update_hard_disk_params(drive_letter(idx));
            }
        }

        if let Err(err) = self.arena.set_curdir(new, &curdir) {
            tracing::warn!(%err, "working directory not carried over");
        }
        disk.borrow_mut().activate();
        self.table.set(idx, Some(new));

        if notify {
            tracing::info!(
                "Drive {}: disk {} of {} now active",
                drive_letter(idx),
                current + 1,
                count
            );
        }
    }

    /// Release a drive published at `idx` in place of the set's `disk`
    /// (an overlay stacked over it).
    fn release_stacked(&mut self, idx: u8, disk: DriveId) -> DosResult<()> {
        match self.table.get(idx) {
            Some(top) if top != disk => {
                tracing::debug!(
                    drive = %drive_letter(idx),
                    "releasing drive stacked over the disk set"
                );
                self.release_drive(top)
            }
            _ => Ok(()),
        }
    }

    /// Unmount whatever is at `letter` and release it.
    ///
    /// Nothing mounted on an unmanaged letter counts as success. For a
    /// managed letter every disk of the set is released, not only the
    /// active one. An optical disk that fails to unmount is released anyway;
    /// every other failure is returned and leaves the letter mounted.
    pub fn unmount_drive(&mut self, letter: char) -> DosResult<()> {
        let idx = drive_index(letter)?;
        let set = &self.disk_sets[idx as usize];
        let Some(active) = set.current() else {
            return match self.table.get(idx) {
                Some(id) => self.release_drive(id),
                None => Ok(()),
            };
        };

        self.release_stacked(idx, active)?;
        self.force_close_all(active);
        if let Some(disk) = self.arena.get(active).cloned() {
            let kind = disk.borrow().kind();
            let result = disk.borrow_mut().unmount();
            if let Err(err) = result {
                if kind != DriveKind::Optical {
                    return Err(err);
                }
                tracing::debug!(
                    drive = %drive_letter(idx),
                    %err,
                    "optical unmount failed, releasing anyway"
                );
            }
        }

        if self.table.get(idx) == Some(active) {
            self.table.set(idx, None);
            self.hooks.drive_removed(drive_letter(idx));
        }
        let set = std::mem::take(&mut self.disk_sets[idx as usize]);
        for id in set.disks {
            self.arena.remove(id);
        }
        if (idx as usize) < MAX_DISK_IMAGES {
            self.image_disks[idx as usize] = None;
        }
        tracing::debug!(drive = %drive_letter(idx), "released disk set");
        Ok(())
    }
}
