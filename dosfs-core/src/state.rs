//! Save state of the drive table: the working directory of every mounted
//! letter.
//!
//! Layout: `[count:1]` then per mounted letter
//! `[letter index:1][curdir length:1][curdir bytes]`.

use crate::archive::{Archive, ArchiveMode, ArchiveWarnings};
use crate::drive_table::drive_letter;
use crate::error::DosResult;
use crate::system::DriveSystem;
use crate::{DOS_DRIVES, DOS_PATHLENGTH};

impl DriveSystem {
    /// Run the drive state through `ar` in whatever mode it is in.
    pub fn serialize_drives(&mut self, ar: &mut Archive) -> DosResult<()> {
        let mounted: Vec<_> = self.table.mounted().collect();
        let live_count = mounted.len() as u8;

        let mut count = live_count;
        ar.serialize_u8(&mut count)?;
        match ar.mode() {
            ArchiveMode::MaxSize => {
                // Every letter with a maximal working directory
                ar.reserve(DOS_DRIVES * (2 + DOS_PATHLENGTH));
                return Ok(());
            }
            ArchiveMode::Load if count != live_count => {
                tracing::warn!(saved = count, mounted = live_count, "saved drive count differs");
                ar.add_warning(ArchiveWarnings::WRONG_DRIVES);
            }
            _ => {}
        }

        if !ar.is_loading() {
            for (idx, id) in mounted {
                let curdir = self.arena.curdir(id).unwrap_or_default().as_bytes();
                let mut letter = idx;
                let mut len = curdir.len() as u8;
                ar.serialize_u8(&mut letter)?;
                ar.serialize_u8(&mut len)?;
                ar.write_bytes(curdir);
            }
            return Ok(());
        }

        for _ in 0..count {
            let mut idx = 0;
            let mut len = 0;
            ar.serialize_u8(&mut idx)?;
            ar.serialize_u8(&mut len)?;
            let Some(id) = self.table.get(idx) else {
                tracing::warn!(drive = idx, "state for a drive that is not mounted");
                ar.discard(len as usize)?;
                ar.add_warning(ArchiveWarnings::WRONG_DRIVES);
                continue;
            };
            let bytes = ar.read_bytes(len as usize)?;
            let curdir = String::from_utf8_lossy(&bytes);
            if let Err(err) = self.arena.set_curdir(id, &curdir) {
                tracing::warn!(
                    drive = %drive_letter(idx),
                    %err,
                    "saved working directory rejected"
                );
                ar.add_warning(ArchiveWarnings::WRONG_DRIVES);
            }
        }
        Ok(())
    }

    /// Save the drive state into a fresh buffer.
    pub fn save_state(&mut self) -> DosResult<Vec<u8>> {
        let mut ar = Archive::save();
        self.serialize_drives(&mut ar)?;
        Ok(ar.into_bytes())
    }

    /// Restore the drive state, returning the warnings raised on the way.
    pub fn load_state(&mut self, data: Vec<u8>) -> DosResult<ArchiveWarnings> {
        let mut ar = Archive::load(data);
        self.serialize_drives(&mut ar)?;
        Ok(ar.warnings())
    }

    /// Largest number of bytes the drive state can take.
    pub fn state_max_size(&mut self) -> DosResult<usize> {
        let mut ar = Archive::max_size();
        self.serialize_drives(&mut ar)?;
        Ok(ar.len())
    }

    /// Exact number of bytes the current drive state takes.
    pub fn state_size(&mut self) -> DosResult<usize> {
        let mut ar = Archive::size();
        self.serialize_drives(&mut ar)?;
        Ok(ar.len())
    }
}
