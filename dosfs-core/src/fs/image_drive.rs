//! Read-only disk images stored as ZIP archives.
//!
//! Every file of the archive is loaded into memory when the image is opened.
//! Long names inside the archive are kept and get 8.3 aliases.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use zip::ZipArchive;

use super::drive::{Attributes, Drive, DriveKind, FileStream, OpenMode, SearchState};
use super::memory_drive::MemoryDrive;
use crate::error::{DosError, DosResult};

/// Disk image drive backed by a ZIP archive.
pub struct ImageDrive {
    inner: MemoryDrive,
    kind: DriveKind,
    info: String,
    files: usize,
    mounted: bool,
}

impl ImageDrive {
    /// Load an image from ZIP data. `name` is used for the drive info.
    pub fn load<R: Read + Seek>(reader: R, name: &str) -> DosResult<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut inner = MemoryDrive::new();
        let mut files = 0;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let path = entry.name().to_string();
            if entry.is_dir() {
                inner.add_dir(&path)?;
                continue;
            }
            let mut content = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut content)?;
            inner.add_file(&path, content)?;
            files += 1;
        }

        tracing::debug!(image = name, files, "loaded disk image");
        Ok(Self {
            inner,
            kind: DriveKind::Image,
            info: format!("image {name}"),
            files,
            mounted: true,
        })
    }

    /// Load an image from a ZIP file on the host.
    pub fn from_path(path: &Path) -> DosResult<Self> {
        let file = File::open(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::load(BufReader::new(file), &name)
    }

    /// Treat the image as an optical disc.
    pub fn optical(mut self) -> Self {
        self.kind = DriveKind::Optical;
        self.info = self.info.replacen("image", "optical", 1);
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.inner.set_label(label);
        self
    }

    pub fn with_hard_disk(mut self, hard_disk: bool) -> Self {
        self.inner = self.inner.with_hard_disk(hard_disk);
        self
    }

    /// Number of files loaded from the archive.
    pub fn file_count(&self) -> usize {
        self.files
    }

    pub fn activations(&self) -> u32 {
        self.inner.activations()
    }
}

impl Drive for ImageDrive {
    fn kind(&self) -> DriveKind {
        self.kind
    }

    fn info(&self) -> &str {
        &self.info
    }

    fn label(&self) -> &str {
        self.inner.label()
    }

    fn file_open(&mut self, path: &str, mode: OpenMode) -> DosResult<Box<dyn FileStream>> {
        if mode.can_write() {
            return Err(DosError::ReadOnly);
        }
        self.inner.file_open(path, mode)
    }

    fn file_create(&mut self, _path: &str, _attr: Attributes) -> DosResult<Box<dyn FileStream>> {
        Err(DosError::ReadOnly)
    }

    fn file_unlink(&mut self, _path: &str) -> DosResult<()> {
        Err(DosError::ReadOnly)
    }

    fn find_first(&mut self, dir: &str, search: &mut SearchState) -> bool {
        self.inner.find_first(dir, search)
    }

    fn long_file_name(&self, path: &str) -> Option<String> {
        self.inner.long_file_name(path)
    }

    fn activate(&mut self) {
        self.inner.activate();
    }

    fn unmount(&mut self) -> DosResult<()> {
        if !self.mounted {
            return Err(DosError::AccessDenied(self.info.clone()));
        }
        self.mounted = false;
        Ok(())
    }

    fn is_hard_disk(&self) -> bool {
        self.inner.is_hard_disk()
    }
}
