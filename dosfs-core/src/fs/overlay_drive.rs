//! Copy-on-write overlay stacked over another registered drive.

use std::collections::{BTreeMap, HashSet};
use std::io::Read;

use super::drive::{
    collect_entries, Attributes, DirEntry, Drive, DriveKind, DriveRef, FileStream, OpenMode,
    SearchState,
};
use super::memory_drive::MemoryDrive;
use crate::drive_table::DriveId;
use crate::error::{DosError, DosResult};
use crate::names::is_separator;

fn normalize(path: &str) -> String {
    path.split(is_separator)
        .filter(|c| !c.is_empty())
        .map(str::to_ascii_uppercase)
        .collect::<Vec<_>>()
        .join("\\")
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind(is_separator) {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => ("", path),
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}\\{name}")
    }
}

/// Copy-on-write overlay on top of a base drive.
///
/// - Reads come from the overlay first, then fall back to the base
/// - Writes go to the overlay only (the base is never modified)
/// - Deletes hide base files without touching the base
///
/// The base stays registered in the session under `base_id`; the overlay
/// reports it as its shadow so the base cannot be unmounted from under it.
pub struct OverlayDrive {
    base_id: DriveId,
    base: DriveRef,
    upper: MemoryDrive,
    deleted: HashSet<String>,
    info: String,
    label: String,
    mounted: bool,
}

impl OverlayDrive {
    pub fn new(base_id: DriveId, base: DriveRef) -> Self {
        let (info, label) = {
            let base = base.borrow();
            (format!("overlay on {}", base.info()), base.label().to_string())
        };
        Self {
            base_id,
            base,
            upper: MemoryDrive::new(),
            deleted: HashSet::new(),
            info,
            label,
            mounted: true,
        }
    }

    pub fn base_id(&self) -> DriveId {
        self.base_id
    }

    /// Whether a file was written through the overlay.
    pub fn is_modified(&self, path: &str) -> bool {
        self.upper.exists(path)
    }

    /// Whether a base file is hidden by a delete.
    pub fn is_deleted(&self, path: &str) -> bool {
        self.deleted.contains(&normalize(path))
    }

    /// Drop every modification.
    pub fn clear_overlay(&mut self) {
        self.upper = MemoryDrive::new();
        self.deleted.clear();
    }

    fn base_has_dir(&self, dir: &str) -> bool {
        if normalize(dir).is_empty() {
            return true;
        }
        // Every subdirectory lists at least its "." entry
        let mut search = SearchState::new("*.*", Attributes::DIRECTORY);
        self.base.borrow_mut().find_first(dir, &mut search)
    }

    fn base_has_file(&self, path: &str) -> bool {
        self.base.borrow_mut().file_open(path, OpenMode::Read).is_ok()
    }

    fn ensure_upper_dir(&mut self, dir: &str) -> DosResult<()> {
        if self.upper.exists(dir) {
            return Ok(());
        }
        if !self.base_has_dir(dir) {
            return Err(DosError::PathNotFound(dir.to_string()));
        }
        self.upper.add_dir(&normalize(dir))
    }

    /// Copy a base file into the overlay before it is modified.
    fn copy_up(&mut self, path: &str) -> DosResult<()> {
        let mut content = Vec::new();
        self.base
            .borrow_mut()
            .file_open(path, OpenMode::Read)?
            .read_to_end(&mut content)?;
        let (parent, _) = split_parent(path);
        self.ensure_upper_dir(parent)?;
        self.upper.add_file(&normalize(path), content)
    }
}

impl Drive for OverlayDrive {
    fn kind(&self) -> DriveKind {
        DriveKind::Overlay
    }

    fn info(&self) -> &str {
        &self.info
    }

    /// Label of the base at the time the overlay was stacked.
    fn label(&self) -> &str {
        &self.label
    }

    fn file_open(&mut self, path: &str, mode: OpenMode) -> DosResult<Box<dyn FileStream>> {
        if self.is_deleted(path) {
            return Err(DosError::FileNotFound(path.to_string()));
        }
        if self.upper.exists(path) {
            return self.upper.file_open(path, mode);
        }
        if mode.can_write() {
            self.copy_up(path)?;
            return self.upper.file_open(path, mode);
        }
        self.base.borrow_mut().file_open(path, mode)
    }

    fn file_create(&mut self, path: &str, attr: Attributes) -> DosResult<Box<dyn FileStream>> {
        let (parent, _) = split_parent(path);
        self.ensure_upper_dir(parent)?;
        self.deleted.remove(&normalize(path));
        self.upper.file_create(path, attr)
    }

    fn file_unlink(&mut self, path: &str) -> DosResult<()> {
        if self.is_deleted(path) {
            return Err(DosError::FileNotFound(path.to_string()));
        }
        let in_upper = self.upper.file_unlink(path).is_ok();
        if self.base_has_file(path) {
            self.deleted.insert(normalize(path));
        } else if !in_upper {
            return Err(DosError::FileNotFound(path.to_string()));
        }
        Ok(())
    }

    fn find_first(&mut self, dir: &str, search: &mut SearchState) -> bool {
        let mut merged: BTreeMap<String, DirEntry> = BTreeMap::new();
        let mut order: Vec<String> = Vec::new();
        let base_entries =
            collect_entries(&mut *self.base.borrow_mut(), dir, "*.*", Attributes::all());
        let upper_entries = collect_entries(&mut self.upper, dir, "*.*", Attributes::all());

        for entry in base_entries.into_iter().chain(upper_entries) {
            if !entry.is_dot_entry() && self.deleted.contains(&normalize(&join(dir, &entry.name))) {
                continue;
            }
            if !merged.contains_key(&entry.name) {
                order.push(entry.name.clone());
            }
            merged.insert(entry.name.clone(), entry);
        }

        search.begin(order.iter().filter_map(|name| merged.remove(name)))
    }

    fn long_file_name(&self, path: &str) -> Option<String> {
        self.upper
            .long_file_name(path)
            .or_else(|| self.base.borrow().long_file_name(path))
    }

    fn unmount(&mut self) -> DosResult<()> {
        if !self.mounted {
            return Err(DosError::AccessDenied(self.info.clone()));
        }
        self.mounted = false;
        Ok(())
    }

    fn shadow(&self, n: usize) -> Option<DriveId> {
        (n == 0).then_some(self.base_id)
    }

    fn is_hard_disk(&self) -> bool {
        self.base.borrow().is_hard_disk()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive_table::DriveArena;
    use crate::fs::drive_ref;
    use std::io::Write;

    fn overlay_over(base: MemoryDrive) -> OverlayDrive {
        let mut arena = DriveArena::new();
        let base = drive_ref(base);
        let id = arena.register(base.clone());
        OverlayDrive::new(id, base)
    }

    fn read_all(drive: &mut dyn Drive, path: &str) -> Vec<u8> {
        let mut content = Vec::new();
        drive
            .file_open(path, OpenMode::Read)
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        content
    }

    #[test]
    fn test_read_from_base() {
        let mut base = MemoryDrive::new();
        base.add_file("BASE.TXT", b"base content".to_vec()).unwrap();
        let mut overlay = overlay_over(base);

        assert_eq!(read_all(&mut overlay, "BASE.TXT"), b"base content");
        assert_eq!(overlay.kind(), DriveKind::Overlay);
        assert_eq!(overlay.shadow(0), Some(overlay.base_id()));
        assert_eq!(overlay.shadow(1), None);
    }

    #[test]
    fn test_write_copies_up() {
        let mut base = MemoryDrive::new();
        base.add_file("SAVE/GAME.SAV", b"original".to_vec()).unwrap();
        let base = drive_ref(base);
        let mut arena = DriveArena::new();
        let id = arena.register(base.clone());
        let mut overlay = OverlayDrive::new(id, base.clone());

        {
            let mut file = overlay.file_open("SAVE\\GAME.SAV", OpenMode::ReadWrite).unwrap();
            file.write_all(b"MOD").unwrap();
        }

        assert!(overlay.is_modified("SAVE\\GAME.SAV"));
        assert_eq!(read_all(&mut overlay, "SAVE\\GAME.SAV"), b"MODginal");
        assert_eq!(read_all(&mut *base.borrow_mut(), "SAVE\\GAME.SAV"), b"original");
    }

    #[test]
    fn test_create_needs_parent() {
        let mut base = MemoryDrive::new();
        base.add_dir("DATA").unwrap();
        let mut overlay = overlay_over(base);

        overlay.file_create("DATA\\NEW.TXT", Attributes::empty()).unwrap();
        assert!(overlay.is_modified("DATA\\NEW.TXT"));
        assert!(matches!(
            overlay.file_create("NOPE\\NEW.TXT", Attributes::empty()),
            Err(DosError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_delete_hides_base_file() {
        let mut base = MemoryDrive::new();
        base.add_file("FILE.TXT", b"content".to_vec()).unwrap();
        let mut overlay = overlay_over(base);

        overlay.file_unlink("FILE.TXT").unwrap();
        assert!(overlay.is_deleted("file.txt"));
        assert!(matches!(
            overlay.file_open("FILE.TXT", OpenMode::Read),
            Err(DosError::FileNotFound(_))
        ));
        assert!(overlay.file_unlink("FILE.TXT").is_err());

        // Creating the file again makes it visible
        overlay.file_create("FILE.TXT", Attributes::empty()).unwrap();
        assert!(!overlay.is_deleted("FILE.TXT"));
    }

    #[test]
    fn test_find_merges_layers() {
        let mut base = MemoryDrive::new();
        base.add_file("A.TXT", vec![1]).unwrap();
        base.add_file("B.TXT", vec![2]).unwrap();
        let mut overlay = overlay_over(base);

        overlay.file_create("C.TXT", Attributes::empty()).unwrap();
        overlay.file_unlink("A.TXT").unwrap();
        {
            let mut file = overlay.file_open("B.TXT", OpenMode::ReadWrite).unwrap();
            file.write_all(&[9, 9]).unwrap();
        }

        let entries = collect_entries(&mut overlay, "", "*.TXT", Attributes::empty());
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["B.TXT", "C.TXT"]);
        assert_eq!(entries[0].size, 2);
    }

    #[test]
    fn test_clear_overlay() {
        let mut base = MemoryDrive::new();
        base.add_file("A.TXT", vec![1]).unwrap();
        let mut overlay = overlay_over(base);

        overlay.file_unlink("A.TXT").unwrap();
        overlay.clear_overlay();
        assert_eq!(read_all(&mut overlay, "A.TXT"), vec![1]);
    }
}
