//! Mount configuration.
//!
//! A JSON document listing what to mount at which letter:
//!
//! ```json
//! {
//!   "defaultDrive": "C",
//!   "drives": [
//!     { "letter": "A", "kind": "image", "disks": ["disk1.zip", "disk2.zip"] },
//!     { "letter": "C", "kind": "image", "disks": ["hdd.zip"], "hardDisk": true },
//!     { "letter": "D", "kind": "optical", "disks": ["cd.zip"], "label": "GAMECD" },
//!     { "letter": "E", "kind": "memory", "curdir": "SAVES" }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::drive_table::drive_index;
use crate::error::{DosError, DosResult};
use crate::fs::{drive_ref, ImageDrive, MemoryDrive};
use crate::system::DriveSystem;
use crate::MAX_DISK_IMAGES;

/// Backing store of a configured drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    /// Empty in-memory drive.
    #[default]
    Memory,
    /// ZIP disk images; more than one makes a swappable disk set.
    Image,
    /// ZIP images treated as optical discs.
    Optical,
}

/// One configured drive letter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveConfig {
    pub letter: char,
    #[serde(default)]
    pub kind: MountKind,
    /// Image files, relative to the configuration file.
    #[serde(default)]
    pub disks: Vec<PathBuf>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub hard_disk: bool,
    #[serde(default)]
    pub curdir: Option<String>,
}

/// Mount configuration for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountConfig {
    #[serde(default)]
    pub default_drive: Option<char>,
    #[serde(default)]
    pub drives: Vec<DriveConfig>,
}

impl MountConfig {
    pub fn from_json(text: &str) -> DosResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> DosResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> DosResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl DriveSystem {
    /// Build a session from a configuration. Image paths are resolved
    /// against `base_dir`.
    pub fn from_config(config: &MountConfig, base_dir: &Path) -> DosResult<Self> {
        let mut system = DriveSystem::new();
        for drive in &config.drives {
            system.mount_config(drive, base_dir)?;
        }
        system.set_default_drive(config.default_drive)?;
        Ok(system)
    }

    fn mount_config(&mut self, config: &DriveConfig, base_dir: &Path) -> DosResult<()> {
        let letter = config.letter.to_ascii_uppercase();
        match config.kind {
            MountKind::Memory => {
                let mut drive = MemoryDrive::new().with_hard_disk(config.hard_disk);
                if let Some(label) = &config.label {
                    drive.set_label(label);
                }
                self.mount(letter, drive_ref(drive))?;
            }
            MountKind::Image | MountKind::Optical => {
                if config.disks.is_empty() {
                    return Err(DosError::Config(format!("drive {letter}: lists no disks")));
                }
                if self.is_mounted(letter) {
                    return Err(DosError::DriveInUse(letter));
                }
                for disk in &config.disks {
                    let mut image = ImageDrive::from_path(&base_dir.join(disk))?
                        .with_hard_disk(config.hard_disk);
                    if config.kind == MountKind::Optical {
                        image = image.optical();
                    }
                    if let Some(label) = &config.label {
                        image = image.with_label(label);
                    }
                    self.append_disk(letter, drive_ref(image))?;
                }
                self.initialize_drive(letter)?;
                if (drive_index(letter)? as usize) < MAX_DISK_IMAGES {
                    self.attach_image_disk(letter)?;
                }
            }
        }
        if let Some(curdir) = &config.curdir {
            self.set_curdir(letter, curdir)?;
        }
        tracing::info!(drive = %letter, kind = ?config.kind, disks = config.disks.len(), "mounted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config = MountConfig::from_json(
            r#"{
                "defaultDrive": "C",
                "drives": [
                    { "letter": "A", "kind": "image", "disks": ["d1.zip", "d2.zip"] },
                    { "letter": "C", "hardDisk": true, "label": "WORK" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.default_drive, Some('C'));
        assert_eq!(config.drives.len(), 2);
        assert_eq!(config.drives[0].kind, MountKind::Image);
        assert_eq!(config.drives[0].disks.len(), 2);
        assert_eq!(config.drives[1].kind, MountKind::Memory);
        assert!(config.drives[1].hard_disk);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            MountConfig::from_json("{ not json"),
            Err(DosError::Json(_))
        ));
    }

    #[test]
    fn test_memory_drives_from_config() {
        let config = MountConfig {
            default_drive: Some('C'),
            drives: vec![DriveConfig {
                letter: 'c',
                kind: MountKind::Memory,
                disks: Vec::new(),
                label: Some("WORK".to_string()),
                hard_disk: false,
                curdir: Some("SAVES".to_string()),
            }],
        };
        let system = DriveSystem::from_config(&config, Path::new(".")).unwrap();

        assert_eq!(system.mounted_letters(), vec!['C', 'Z']);
        assert_eq!(system.curdir('C').unwrap(), "SAVES");
        assert_eq!(system.default_drive(), Some('C'));
        assert_eq!(system.drive_at('C').unwrap().borrow().label(), "WORK");
    }

    #[test]
    fn test_image_without_disks_is_rejected() {
        let config = MountConfig::from_json(r#"{ "drives": [{ "letter": "A", "kind": "image" }] }"#)
            .unwrap();
        assert!(matches!(
            DriveSystem::from_config(&config, Path::new(".")),
            Err(DosError::Config(_))
        ));
    }
}
