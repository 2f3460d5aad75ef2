//! Whole-file helpers for the frontend: reading, creating, checksums and
//! volume label lookups.

use std::io::{Read, Write};

use crate::error::{DosError, DosResult};
use crate::fs::{Attributes, DirEntry, Drive, OpenMode, SearchState};
use crate::names::wild_file_cmp;
use crate::system::DriveSystem;

/// Read a whole file from a drive.
pub fn read_file_content(drive: &mut dyn Drive, path: &str) -> DosResult<Vec<u8>> {
    let mut stream = drive.file_open(path, OpenMode::Read)?;
    let mut out = Vec::new();
    stream.read_to_end(&mut out)?;
    Ok(out)
}

/// Read up to `max` bytes from the start of a file.
pub fn read_file_bytes(drive: &mut dyn Drive, path: &str, max: usize) -> DosResult<Vec<u8>> {
    let stream = drive.file_open(path, OpenMode::Read)?;
    let mut out = Vec::with_capacity(max);
    stream.take(max as u64).read_to_end(&mut out)?;
    Ok(out)
}

/// Create (or truncate) a file with the archive attribute and write `data`.
pub fn create_file(drive: &mut dyn Drive, path: &str, data: &[u8]) -> DosResult<()> {
    let mut stream = drive.file_create(path, Attributes::ARCHIVE)?;
    stream.write_all(data)?;
    stream.flush()?;
    Ok(())
}

const CRC32_NIBBLES: [u32; 16] = [
    0, 0x1db71064, 0x3b6e20c8, 0x26d930ac, 0x76dc4190, 0x6b6b51f4, 0x4db26158, 0x5005713c,
    0xedb88320, 0xf00f9344, 0xd6d6a3e8, 0xcb61b38c, 0x9b64c2b0, 0x86d3d2d4, 0xa00ae278,
    0xbdbdf21c,
];

/// CRC-32 (IEEE) of `data`, continuing from `crc` (0 to start).
///
/// Uses a 16 entry table and processes one nibble at a time.
pub fn calculate_crc32(data: &[u8], crc: u32) -> u32 {
    let mut crc = !crc;
    for &b in data {
        crc = (crc >> 4) ^ CRC32_NIBBLES[((crc & 0xF) ^ u32::from(b & 0xF)) as usize];
        crc = (crc >> 4) ^ CRC32_NIBBLES[((crc & 0xF) ^ u32::from(b >> 4)) as usize];
    }
    !crc
}

/// Answer a find-first for the volume label.
///
/// Matches when the search asks for the volume attribute and the drive has
/// a label. Searches that also admit other entries only get the label in
/// the root directory, through a handle based find and when the label
/// matches the pattern.
pub fn find_drive_volume(
    drive: &dyn Drive,
    dir: &str,
    search: &mut SearchState,
    fcb_findfirst: bool,
) -> bool {
    let attr = search.attributes();
    let label = drive.label();
    if !attr.contains(Attributes::VOLUME) || label.is_empty() {
        return false;
    }
    if !(attr - Attributes::VOLUME).is_empty()
        && (!dir.is_empty() || fcb_findfirst || !wild_file_cmp(label, search.pattern()))
    {
        return false;
    }
    search.set_result(DirEntry {
        name: label.to_string(),
        size: 0,
        date: 0,
        time: 0,
        attr: Attributes::VOLUME,
    });
    true
}

impl DriveSystem {
    /// Read a file opened with [`find_and_open`](Self::find_and_open) and
    /// close it. Files larger than `max_size` are closed without reading
    /// and give `None`.
    pub fn read_and_close(&mut self, handle: usize, max_size: u64) -> DosResult<Option<Vec<u8>>> {
        let result = self.read_limited(handle, max_size);
        // The handle is closed even when the read failed
        let closed = self.close_file(handle);
        let content = result?;
        closed?;
        Ok(content)
    }

    fn read_limited(&mut self, handle: usize, max_size: u64) -> DosResult<Option<Vec<u8>>> {
        let file = self
            .files
            .get_mut(handle)
            .ok_or(DosError::InvalidHandle(handle))?;
        let size = file.size_and_rewind()?;
        if size > max_size {
            return Ok(None);
        }
        let mut out = Vec::with_capacity(size as usize);
        file.read_to_end(&mut out)?;
        Ok(Some(out))
    }
}
