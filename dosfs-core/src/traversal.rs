//! Whole-drive enumeration.

use crate::error::DosResult;
use crate::fs::{Attributes, Drive, SearchState};
use crate::system::DriveSystem;
use crate::{DOS_NAMELENGTH, DOS_PATHLENGTH};

/// One entry reported by [`walk_drive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkEntry<'a> {
    /// Path from the drive root, `\` separated.
    pub path: &'a str,
    pub is_dir: bool,
    pub size: u32,
    pub date: u16,
    pub time: u16,
    pub attr: Attributes,
}

/// Visit every file and directory below `root`.
///
/// Directories are expanded from an explicit work list, most recently found
/// first. A directory whose path leaves no room for another 8.3 name within
/// a DOS path is skipped together with its subtree.
pub fn walk_drive<F>(drive: &mut dyn Drive, root: &str, mut visit: F)
where
    F: FnMut(WalkEntry<'_>),
{
    let mut dirs = vec![root.to_string()];
    while let Some(dir) = dirs.pop() {
        if dir.len() + DOS_NAMELENGTH >= DOS_PATHLENGTH {
            tracing::debug!(dir = %dir, "directory path too long, skipping subtree");
            continue;
        }
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}\\")
        };

        let mut search = SearchState::new("*.*", Attributes::all() - Attributes::VOLUME);
        let mut more = drive.find_first(&dir, &mut search);
        while more {
            if let Some(entry) = search.result() {
                if !entry.is_dot_entry() {
                    let path = format!("{prefix}{}", entry.name);
                    let is_dir = entry.is_dir();
                    visit(WalkEntry {
                        path: &path,
                        is_dir,
                        size: entry.size,
                        date: entry.date,
                        time: entry.time,
                        attr: entry.attr,
                    });
                    if is_dir {
                        dirs.push(path);
                    }
                }
            }
            more = drive.find_next(&mut search);
        }
    }
}

/// Every path of a drive, one per line.
pub fn listing(drive: &mut dyn Drive) -> String {
    let mut out = String::new();
    walk_drive(drive, "", |entry| {
        out.push_str(entry.path);
        out.push('\n');
    });
    out
}

impl DriveSystem {
    /// Walk the drive directly mounted at `letter`.
    pub fn walk<F>(&self, letter: char, root: &str, visit: F) -> DosResult<()>
    where
        F: FnMut(WalkEntry<'_>),
    {
        let drive = self.drive_at(letter)?;
        walk_drive(&mut *drive.borrow_mut(), root, visit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryDrive;

    fn sample() -> MemoryDrive {
        let mut drive = MemoryDrive::new();
        drive.add_file("AUTOEXEC.BAT", b"@echo off".to_vec()).unwrap();
        drive.add_file("GAMES/DOOM/DOOM.EXE", vec![0; 10]).unwrap();
        drive.add_file("GAMES/README.TXT", vec![0; 3]).unwrap();
        drive.add_dir("EMPTY").unwrap();
        drive
    }

    #[test]
    fn test_walk_visits_everything_once() {
        let mut drive = sample();
        let mut seen = Vec::new();
        walk_drive(&mut drive, "", |entry| {
            seen.push((entry.path.to_string(), entry.is_dir, entry.size));
        });
        seen.sort();

        assert_eq!(
            seen,
            vec![
                ("AUTOEXEC.BAT".to_string(), false, 9),
                ("EMPTY".to_string(), true, 0),
                ("GAMES".to_string(), true, 0),
                ("GAMES\\DOOM".to_string(), true, 0),
                ("GAMES\\DOOM\\DOOM.EXE".to_string(), false, 10),
                ("GAMES\\README.TXT".to_string(), false, 3),
            ]
        );
    }

    #[test]
    fn test_walk_from_subdirectory() {
        let mut drive = sample();
        let mut seen = Vec::new();
        walk_drive(&mut drive, "GAMES", |entry| seen.push(entry.path.to_string()));
        seen.sort();
        assert_eq!(seen, vec!["GAMES\\DOOM", "GAMES\\DOOM\\DOOM.EXE", "GAMES\\README.TXT"]);
    }

    #[test]
    fn test_walk_skips_too_deep_directories() {
        let mut drive = MemoryDrive::new();
        // 8 levels of 8 characters: 71 bytes of directory path
        let deep = ["ABCDEFGH"; 8].join("/");
        drive.add_file(&format!("{deep}/FILE.TXT"), vec![1]).unwrap();

        let mut seen = Vec::new();
        walk_drive(&mut drive, "", |entry| seen.push(entry.path.to_string()));

        assert!(seen.iter().all(|p| !p.ends_with("FILE.TXT")));
        // The deepest directory is still reported by its parent
        assert!(seen.iter().any(|p| p.len() == 71));
    }

    #[test]
    fn test_listing() {
        let mut drive = MemoryDrive::new();
        drive.add_file("A.TXT", vec![]).unwrap();
        assert_eq!(listing(&mut drive), "A.TXT\n");
    }
}
