//! Drive letter table and drive ownership.
//!
//! Every drive known to a session is registered in the [`DriveArena`] under a
//! stable [`DriveId`]. The [`DriveTable`] only stores ids: a letter points at
//! the drive directly mounted there. Disks waiting in a disk set and drives
//! used as the base of an overlay are registered but not in the table.

use std::collections::HashMap;

use crate::error::{DosError, DosResult};
use crate::fs::DriveRef;
use crate::{DOS_DRIVES, DOS_PATHLENGTH};

/// Stable identifier of a registered drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriveId(u32);

impl DriveId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// A registered drive plus the state DOS keeps for it.
struct DriveEntry {
    drive: DriveRef,
    curdir: String,
}

/// Owner of every registered drive.
#[derive(Default)]
pub struct DriveArena {
    next_id: u32,
    entries: HashMap<DriveId, DriveEntry>,
}

impl DriveArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a drive and hand out its id.
    pub fn register(&mut self, drive: DriveRef) -> DriveId {
        let id = DriveId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            DriveEntry {
                drive,
                curdir: String::new(),
            },
        );
        id
    }

    pub fn get(&self, id: DriveId) -> Option<&DriveRef> {
        self.entries.get(&id).map(|e| &e.drive)
    }

    pub fn contains(&self, id: DriveId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Release a drive. Dropping the returned handle destroys the drive
    /// unless an overlay still holds it.
    pub fn remove(&mut self, id: DriveId) -> Option<DriveRef> {
        self.entries.remove(&id).map(|e| e.drive)
    }

    /// Current working directory, without drive letter or leading `\`.
    pub fn curdir(&self, id: DriveId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.curdir.as_str())
    }

    /// Set the working directory of a drive.
    ///
    /// The directory must fit a DOS path (`DOS_PATHLENGTH` including the
    /// terminator).
    pub fn set_curdir(&mut self, id: DriveId, dir: &str) -> DosResult<()> {
        if dir.len() >= DOS_PATHLENGTH {
            return Err(DosError::PathNotFound(dir.to_string()));
        }
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| DosError::PathNotFound(dir.to_string()))?;
        entry.curdir = dir.to_string();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Letter -> directly mounted drive.
#[derive(Debug, Clone, Default)]
pub struct DriveTable {
    slots: [Option<DriveId>; DOS_DRIVES],
}

impl DriveTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive directly mounted at letter index `idx` (A=0).
    pub fn get(&self, idx: u8) -> Option<DriveId> {
        self.slots.get(idx as usize).copied().flatten()
    }

    /// Replace the slot content, returning the previous one.
    pub fn set(&mut self, idx: u8, id: Option<DriveId>) -> Option<DriveId> {
        match self.slots.get_mut(idx as usize) {
            Some(slot) => std::mem::replace(slot, id),
            None => None,
        }
    }

    /// Letter index the drive is directly mounted at.
    pub fn position(&self, id: DriveId) -> Option<u8> {
        self.slots
            .iter()
            .position(|s| *s == Some(id))
            .map(|i| i as u8)
    }

    /// All occupied slots, in letter order.
    pub fn mounted(&self) -> impl Iterator<Item = (u8, DriveId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|id| (i as u8, id)))
    }

    pub fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Convert drive letter to index (A=0, B=1, ..., Z=25).
pub fn drive_index(letter: char) -> DosResult<u8> {
    let upper = letter.to_ascii_uppercase();
    if upper.is_ascii_uppercase() {
        Ok(upper as u8 - b'A')
    } else {
        Err(DosError::InvalidDrive(letter))
    }
}

/// Convert an index back to its drive letter.
pub fn drive_letter(idx: u8) -> char {
    (b'A' + idx) as char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{drive_ref, MemoryDrive};

    #[test]
    fn test_drive_index() {
        assert_eq!(drive_index('A').unwrap(), 0);
        assert_eq!(drive_index('a').unwrap(), 0);
        assert_eq!(drive_index('Z').unwrap(), 25);
        assert!(drive_index('1').is_err());
        assert!(drive_index(':').is_err());
        assert_eq!(drive_letter(2), 'C');
    }

    #[test]
    fn test_arena_ids_are_stable() {
        let mut arena = DriveArena::new();
        let a = arena.register(drive_ref(MemoryDrive::new()));
        let b = arena.register(drive_ref(MemoryDrive::new()));
        assert_ne!(a, b);

        arena.remove(a);
        let c = arena.register(drive_ref(MemoryDrive::new()));
        assert_ne!(a, c); // ids are never reused
        assert!(arena.contains(b));
        assert!(!arena.contains(a));
    }

    #[test]
    fn test_arena_curdir_bounds() {
        let mut arena = DriveArena::new();
        let id = arena.register(drive_ref(MemoryDrive::new()));
        arena.set_curdir(id, "GAMES\\DOOM").unwrap();
        assert_eq!(arena.curdir(id), Some("GAMES\\DOOM"));

        let too_long = "D".repeat(DOS_PATHLENGTH);
        assert!(arena.set_curdir(id, &too_long).is_err());
        assert_eq!(arena.curdir(id), Some("GAMES\\DOOM"));
    }

    #[test]
    fn test_table_slots() {
        let mut arena = DriveArena::new();
        let id = arena.register(drive_ref(MemoryDrive::new()));
        let mut table = DriveTable::new();

        assert_eq!(table.set(2, Some(id)), None);
        assert_eq!(table.get(2), Some(id));
        assert_eq!(table.position(id), Some(2));
        assert_eq!(table.count(), 1);
        assert_eq!(table.mounted().collect::<Vec<_>>(), vec![(2, id)]);

        assert_eq!(table.set(2, None), Some(id));
        assert_eq!(table.count(), 0);
        assert_eq!(table.get(30), None);
    }
}
