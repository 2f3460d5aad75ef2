//! Open file handles and the fixed-capacity open file table.
//!
//! A handle counts the DOS references to it. The stream is closed when the
//! last reference goes away, so `ref_count > 0` holds exactly while the
//! handle is open. A closed handle can stay in its table slot until the
//! slot is reclaimed.

use std::fmt;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{DosError, DosResult};
use crate::fs::FileStream;
use crate::names::remove_ending_dots;
use crate::DOS_FILES;

/// One open file.
pub struct FileHandle {
    stream: Option<Box<dyn FileStream>>,
    drive: Option<u8>,
    name: Option<String>,
    ref_count: u32,
    open: bool,
}

impl FileHandle {
    /// Wrap an open stream. The handle starts with one reference.
    ///
    /// `drive` is the letter index the file was opened through, `None` for
    /// host files.
    pub fn new(stream: Box<dyn FileStream>, drive: Option<u8>, name: Option<String>) -> Self {
        Self {
            stream: Some(stream),
            drive,
            name,
            ref_count: 1,
            open: true,
        }
    }

    pub fn drive(&self) -> Option<u8> {
        self.drive
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Add a reference (DOS handle duplication).
    pub fn add_ref(&mut self) -> u32 {
        assert!(self.open, "add_ref on closed file handle");
        self.ref_count += 1;
        self.ref_count
    }

    /// Drop a reference, closing the stream with the last one.
    pub fn release(&mut self) -> u32 {
        if self.ref_count == 0 {
            return 0;
        }
        self.ref_count -= 1;
        if self.ref_count == 0 {
            self.close();
        }
        self.ref_count
    }

    /// Drain every reference and close.
    pub fn force_close(&mut self) {
        assert_eq!(
            self.ref_count > 0,
            self.open,
            "file handle reference count diverged from open flag"
        );
        while self.ref_count > 0 {
            self.release();
        }
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.flush() {
                tracing::warn!(name = ?self.name, %err, "flush on close failed");
            }
        }
        self.open = false;
    }

    fn stream(&mut self) -> DosResult<&mut Box<dyn FileStream>> {
        self.stream.as_mut().ok_or(DosError::FileClosed)
    }

    pub fn read(&mut self, buf: &mut [u8]) -> DosResult<usize> {
        Ok(self.stream()?.read(buf)?)
    }

    pub fn write(&mut self, buf: &[u8]) -> DosResult<usize> {
        Ok(self.stream()?.write(buf)?)
    }

    pub fn seek(&mut self, pos: SeekFrom) -> DosResult<u64> {
        Ok(self.stream()?.seek(pos)?)
    }

    /// Read everything from the current position to the end.
    pub fn read_to_end(&mut self, out: &mut Vec<u8>) -> DosResult<usize> {
        Ok(self.stream()?.read_to_end(out)?)
    }

    /// Size in bytes, leaving the position at the start of the file.
    pub fn size_and_rewind(&mut self) -> DosResult<u64> {
        let stream = self.stream()?;
        let size = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(0))?;
        Ok(size)
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("drive", &self.drive)
            .field("name", &self.name)
            .field("ref_count", &self.ref_count)
            .field("open", &self.open)
            .finish()
    }
}

/// Fixed-capacity table of open files.
pub struct FileHandleTable {
    slots: Vec<Option<FileHandle>>,
}

impl Default for FileHandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FileHandleTable {
    /// Table with the DOS capacity ([`DOS_FILES`]).
    pub fn new() -> Self {
        Self::with_capacity(DOS_FILES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Put a handle into the first free slot.
    pub fn allocate(&mut self, handle: FileHandle) -> DosResult<usize> {
        let idx = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(DosError::TooManyOpenFiles)?;
        self.slots[idx] = Some(handle);
        Ok(idx)
    }

    pub fn get(&self, idx: usize) -> Option<&FileHandle> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut FileHandle> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    /// Drop one reference of the handle in `idx`.
    pub fn release(&mut self, idx: usize) -> DosResult<u32> {
        let handle = self.get_mut(idx).ok_or(DosError::InvalidHandle(idx))?;
        Ok(handle.release())
    }

    /// Free the slot of a closed handle. Open handles are left alone.
    pub fn reclaim(&mut self, idx: usize) -> bool {
        match self.slots.get_mut(idx) {
            Some(slot) if slot.as_ref().is_some_and(|h| !h.is_open()) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Force-close and free every handle opened through letter `drive`.
    /// Returns how many handles were freed.
    pub fn close_drive_files(&mut self, drive: u8) -> usize {
        let mut count = 0;
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|h| h.drive() == Some(drive)) {
                if let Some(mut handle) = slot.take() {
                    handle.force_close();
                    count += 1;
                }
            }
        }
        count
    }

    /// Force-close every handle on letter `drive` whose name matches `name`
    /// (case-insensitive, ignoring trailing dots). The slots stay allocated.
    pub fn close_named(&mut self, drive: u8, name: &str) -> bool {
        let name = remove_ending_dots(name);
        let mut found = false;
        for handle in self.slots.iter_mut().flatten() {
            if handle.drive() != Some(drive) {
                continue;
            }
            let Some(handle_name) = handle.name() else {
                continue;
            };
            if !remove_ending_dots(handle_name).eq_ignore_ascii_case(&name) {
                continue;
            }
            handle.force_close();
            found = true;
        }
        found
    }

    /// Iterate over allocated slots.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &FileHandle)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|h| (i, h)))
    }

    /// Number of allocated slots.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn handle(drive: Option<u8>, name: &str) -> FileHandle {
        let stream: Box<dyn FileStream> = Box::new(Cursor::new(b"hello".to_vec()));
        FileHandle::new(stream, drive, Some(name.to_string()))
    }

    fn assert_open_matches_refs(table: &FileHandleTable) {
        for (_, h) in table.iter() {
            assert_eq!(h.ref_count() > 0, h.is_open());
        }
    }

    #[test]
    fn test_ref_counting_closes_on_last_release() {
        let mut h = handle(Some(2), "A.TXT");
        assert_eq!(h.add_ref(), 2);
        assert_eq!(h.release(), 1);
        assert!(h.is_open());
        assert_eq!(h.release(), 0);
        assert!(!h.is_open());
        assert_eq!(h.release(), 0);

        let mut buf = [0u8; 4];
        assert!(matches!(h.read(&mut buf), Err(DosError::FileClosed)));
    }

    #[test]
    fn test_size_and_rewind() {
        let mut h = handle(None, "HOST");
        h.seek(SeekFrom::Start(3)).unwrap();
        assert_eq!(h.size_and_rewind().unwrap(), 5);
        let mut buf = [0u8; 5];
        assert_eq!(h.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_table_capacity() {
        let mut table = FileHandleTable::with_capacity(2);
        table.allocate(handle(Some(0), "A")).unwrap();
        table.allocate(handle(Some(0), "B")).unwrap();
        assert!(matches!(
            table.allocate(handle(Some(0), "C")),
            Err(DosError::TooManyOpenFiles)
        ));
    }

    #[test]
    fn test_release_and_reclaim() {
        let mut table = FileHandleTable::with_capacity(4);
        let idx = table.allocate(handle(Some(0), "A")).unwrap();

        assert!(!table.reclaim(idx)); // still open
        assert_eq!(table.release(idx).unwrap(), 0);
        assert_open_matches_refs(&table);
        assert_eq!(table.len(), 1); // closed handle keeps its slot
        assert!(table.reclaim(idx));
        assert!(table.is_empty());
        assert!(matches!(table.release(idx), Err(DosError::InvalidHandle(_))));
    }

    #[test]
    fn test_close_drive_files() {
        let mut table = FileHandleTable::with_capacity(8);
        let a = table.allocate(handle(Some(2), "A")).unwrap();
        table.get_mut(a).unwrap().add_ref();
        table.allocate(handle(Some(2), "B")).unwrap();
        let other = table.allocate(handle(Some(3), "C")).unwrap();

        assert_eq!(table.close_drive_files(2), 2);
        assert_eq!(table.len(), 1);
        assert!(table.get(other).unwrap().is_open());
        assert_open_matches_refs(&table);
    }

    #[test]
    fn test_close_named_ignores_case_and_dots() {
        let mut table = FileHandleTable::with_capacity(8);
        let a = table.allocate(handle(Some(2), "DIR\\SAVE.DAT")).unwrap();
        let b = table.allocate(handle(Some(3), "DIR\\SAVE.DAT")).unwrap();

        assert!(table.close_named(2, "dir\\save.dat."));
        assert!(!table.get(a).unwrap().is_open());
        assert!(table.get(b).unwrap().is_open());
        assert!(!table.close_named(2, "OTHER.DAT"));
        assert_open_matches_refs(&table);
    }
}
