//! Resolving guest and frontend paths to open files.
//!
//! Paths may carry a drive letter, be absolute or relative to the drive's
//! working directory, and use long names. Long components are turned into
//! their 8.3 aliases and verified against the long names the drive reports.
//! When no mounted drive has the file, the path is tried on the host.

use std::borrow::Cow;
use std::fs::{File, OpenOptions};

use crate::drive_table::{drive_index, drive_letter};
use crate::error::{DosError, DosResult};
use crate::files::FileHandle;
use crate::fs::{collect_entries, Attributes, DriveRef, FileStream, OpenMode};
use crate::names::{is_separator, make_8dot3_name};
use crate::system::DriveSystem;
use crate::DOS_PATHLENGTH;

/// Leading marker restricting resolution to mounted drives.
pub const MOUNTED_ONLY_PREFIX: char = '$';

/// A file opened by [`DriveSystem::find_and_open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedFile {
    /// Slot in the open file table. The handle holds one reference.
    pub handle: usize,
    pub size: u64,
    pub writable: bool,
    /// Path that resolves to the same file again: `$X:\PATH` (uppercase)
    /// for mounted drives, the host path otherwise.
    pub resolved_path: String,
}

/// Directory part of `path` including its trailing separator, or the
/// `X:` prefix of a bare drive-qualified name.
fn base_directory(path: &str) -> Option<&str> {
    match path.rfind(is_separator) {
        Some(pos) => Some(&path[..=pos]),
        None if path.as_bytes().get(1) == Some(&b':') => Some(&path[..2]),
        None => None,
    }
}

/// Drop the last component of a backslash separated path.
fn pop_component(path: &mut String) {
    let keep = path.rfind('\\').unwrap_or(0);
    path.truncate(keep);
}

fn try_open(
    drive: &DriveRef,
    path: &str,
    want_write: bool,
) -> Option<(Box<dyn FileStream>, bool)> {
    let mut drive = drive.borrow_mut();
    if want_write {
        if let Ok(stream) = drive.file_open(path, OpenMode::ReadWrite) {
            return Some((stream, true));
        }
    }
    drive
        .file_open(path, OpenMode::Read)
        .ok()
        .map(|stream| (stream, false))
}

fn try_open_host(path: &str, want_write: bool) -> Option<(Box<dyn FileStream>, bool)> {
    if want_write {
        if let Ok(file) = OpenOptions::new().read(true).write(true).open(path) {
            return Some((Box::new(file), true));
        }
    }
    File::open(path)
        .ok()
        .map(|file| (Box::new(file) as Box<dyn FileStream>, false))
}

/// Short name of the directory entry in `dir` (with trailing separator)
/// whose long name is `long`. `guess` is the synthesized alias.
fn match_long_name(drive: &DriveRef, dir: &str, long: &str, guess: String) -> String {
    let known = drive.borrow().long_file_name(&format!("{dir}{guess}"));
    match known {
        Some(name) if !name.eq_ignore_ascii_case(long) => {}
        _ => return guess,
    }

    let search_dir = dir.strip_suffix('\\').unwrap_or(dir);
    let entries = collect_entries(
        &mut *drive.borrow_mut(),
        search_dir,
        "*.*",
        Attributes::all() - Attributes::VOLUME,
    );
    let drive = drive.borrow();
    let found = entries
        .into_iter()
        .filter(|entry| !entry.is_dot_entry())
        .find(|entry| {
            drive
                .long_file_name(&format!("{dir}{}", entry.name))
                .is_some_and(|name| name.eq_ignore_ascii_case(long))
        });
    match found {
        Some(entry) => entry.name,
        None => {
            tracing::warn!(dir, long, guess = %guess, "no directory entry carries this long name");
            guess
        }
    }
}

impl DriveSystem {
    /// Open `filename` through the mounted drives, falling back to the host.
    ///
    /// With `relative_to`, `filename` is first tried in the directory of
    /// that path. A leading [`MOUNTED_ONLY_PREFIX`] skips the host fallback.
    /// A name without drive letter uses the default drive.
    pub fn find_and_open(
        &mut self,
        filename: &str,
        relative_to: Option<&str>,
        want_write: bool,
    ) -> DosResult<OpenedFile> {
        if filename.is_empty() {
            return Err(DosError::FileNotFound(String::new()));
        }
        if let Some(dir) = relative_to.and_then(base_directory) {
            let merged = format!("{dir}{filename}");
            if let Ok(found) = self.find_and_open(&merged, None, want_write) {
                return Ok(found);
            }
        }

        let (mounted_only, name) = match filename.strip_prefix(MOUNTED_ONLY_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, filename),
        };

        if let Some((idx, path, stream, writable)) = self.open_on_drive(name, want_write) {
            let resolved_path =
                format!("{MOUNTED_ONLY_PREFIX}{}:\\{path}", drive_letter(idx)).to_ascii_uppercase();
            return self.finish_open(stream, Some(idx), path, writable, resolved_path);
        }

        if !mounted_only {
            if let Some((stream, writable)) = try_open_host(name, want_write) {
                tracing::debug!(path = name, writable, "opened host file");
                return self.finish_open(stream, None, name.to_string(), writable, name.to_string());
            }
        }
        Err(DosError::FileNotFound(filename.to_string()))
    }

    fn finish_open(
        &mut self,
        stream: Box<dyn FileStream>,
        drive: Option<u8>,
        name: String,
        writable: bool,
        resolved_path: String,
    ) -> DosResult<OpenedFile> {
        let mut handle = FileHandle::new(stream, drive, Some(name));
        let size = handle.size_and_rewind()?;
        let handle = self.files.allocate(handle)?;
        Ok(OpenedFile {
            handle,
            size,
            writable,
            resolved_path,
        })
    }

    /// Drive index, drive path, stream and writability of `name` opened
    /// through a mounted drive.
    fn open_on_drive(
        &self,
        name: &str,
        want_write: bool,
    ) -> Option<(u8, String, Box<dyn FileStream>, bool)> {
        let bytes = name.as_bytes();
        let (idx, rest) = if bytes.get(1) == Some(&b':') {
            (drive_index(bytes[0] as char).ok()?, &name[2..])
        } else {
            (self.default_drive?, name)
        };
        let id = self.table.get(idx)?;
        let drive = self.arena.get(id)?.clone();

        let mut dos_path = String::new();
        let rest = match rest.strip_prefix(is_separator) {
            Some(absolute) => absolute,
            None => {
                dos_path.push_str(self.arena.curdir(id).unwrap_or_default());
                rest
            }
        };

        let mut transformed = !dos_path.is_empty();
        if !transformed {
            // Works on drives without long names and on plain 8.3 paths
            if let Some((stream, writable)) = try_open(&drive, rest, want_write) {
                return Some((idx, rest.to_string(), stream, writable));
            }
        }

        for component in rest.split(is_separator) {
            if dos_path.len() >= DOS_PATHLENGTH {
                return None;
            }
            match component {
                "" | "." => {
                    transformed = true;
                    continue;
                }
                ".." => {
                    transformed = true;
                    pop_component(&mut dos_path);
                    continue;
                }
                _ => {}
            }
            if !dos_path.is_empty() {
                dos_path.push('\\');
            }
            let short = match make_8dot3_name(component) {
                Cow::Borrowed(same) => same.to_string(),
                Cow::Owned(guess) => {
                    transformed = true;
                    match_long_name(&drive, &dos_path, component, guess)
                }
            };
            dos_path.push_str(&short);
        }
        transformed |= rest.contains('/');

        if !transformed || dos_path.len() >= DOS_PATHLENGTH {
            return None;
        }
        let (stream, writable) = try_open(&drive, &dos_path, want_write)?;
        Some((idx, dos_path, stream, writable))
    }
}
