//! Integration tests for the drive layer: mounting from ZIP images, path
//! resolution, disk swapping and save states.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use dosfs_core::{
    format_label, make_8dot3_name, remove_ending_dots, wild_file_cmp, ArchiveWarnings, DosError,
    DriveSystem, MemoryDrive, MountConfig, OpenMode, DOS_FILES,
};
use dosfs_core::fs::drive_ref;
use zip::ZipWriter;

fn write_image(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = ZipWriter::new(File::create(&path).unwrap());
    for (file, content) in files {
        writer.start_file::<_, ()>(*file, Default::default()).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
    path
}

fn memory_system(letters: &[char]) -> DriveSystem {
    let mut system = DriveSystem::new();
    for &letter in letters {
        system.mount(letter, drive_ref(MemoryDrive::new())).unwrap();
    }
    system
}

#[test]
fn test_name_helpers() {
    assert!(wild_file_cmp("GAME.EXE", "*.EXE"));
    assert!(wild_file_cmp("GAME.EXE", "G???.*"));
    assert!(!wild_file_cmp("GAME.COM", "*.EXE"));
    assert!(wild_file_cmp("README", "*.*"));

    assert_eq!(format_label("my disk", false), "MY DISK");
    assert_eq!(make_8dot3_name("GAME.EXE"), "GAME.EXE");
    assert_eq!(make_8dot3_name("LongFileName.txt"), "LONGNAME.TXT");
    assert_eq!(remove_ending_dots("DIR.\\FILE."), "DIR\\FILE");
    assert_eq!(remove_ending_dots("DIR\\FILE..."), "DIR\\FILE...");
}

#[test]
fn test_mount_images_from_config() {
    let dir = tempfile::tempdir().unwrap();
    write_image(dir.path(), "disk1.zip", &[("INSTALL.EXE", b"disk one")]);
    write_image(dir.path(), "disk2.zip", &[("DATA.DAT", b"disk two")]);
    write_image(
        dir.path(),
        "hdd.zip",
        &[("Games/Commander Keen/KEEN.EXE", b"MZkeen"), ("AUTOEXEC.BAT", b"@echo off")],
    );

    let config = MountConfig::from_json(
        r#"{
            "defaultDrive": "C",
            "drives": [
                {
                    "letter": "A",
                    "kind": "image",
                    "disks": ["disk1.zip", "disk2.zip"],
                    "label": "INSTALL"
                },
                { "letter": "C", "kind": "image", "disks": ["hdd.zip"], "hardDisk": true }
            ]
        }"#,
    )
    .unwrap();
    let mut system = DriveSystem::from_config(&config, dir.path()).unwrap();

    assert_eq!(system.mounted_letters(), vec!['A', 'C', 'Z']);
    assert_eq!(system.disk_set('A').unwrap().len(), 2);
    assert!(system.image_disk('C').unwrap().hard_disk);

    let opened = system.find_and_open("AUTOEXEC.BAT", None, false).unwrap();
    assert_eq!(opened.resolved_path, "$C:\\AUTOEXEC.BAT");
    assert!(!opened.writable);
    assert_eq!(
        system.read_and_close(opened.handle, 1024).unwrap().as_deref(),
        Some(&b"@echo off"[..])
    );

    let keen = system
        .find_and_open("C:\\Games\\Commander Keen\\KEEN.EXE", None, true)
        .unwrap();
    assert_eq!(keen.resolved_path, "$C:\\GAMES\\COMMKEEN\\KEEN.EXE");
    assert!(!keen.writable);
    system.close_file(keen.handle).unwrap();

    system.cycle_disks('A', true).unwrap();
    assert!(system.find_and_open("$A:\\DATA.DAT", None, false).is_ok());
    system.shutdown();
    assert_eq!(system.mounted_letters(), vec!['Z']);
}

#[test]
fn test_cycling_returns_to_first_disk() {
    let mut system = DriveSystem::new();
    for label in ["ONE", "TWO", "THREE"] {
        system
            .append_disk('B', drive_ref(MemoryDrive::new().with_label(label)))
            .unwrap();
    }
    system.initialize_drive('B').unwrap();
    system.set_curdir('B', "SETUP").unwrap();
    let first = system.drive_id('B').unwrap();

    for _ in 0..3 {
        system.cycle_disks('B', false).unwrap();
        assert_eq!(system.curdir('B').unwrap(), "SETUP");
    }
    assert_eq!(system.drive_id('B'), Some(first));
    assert_eq!(system.disk_set('B').unwrap().current_index(), 0);
}

#[test]
fn test_reference_counts_survive_unmount() {
    let mut drive = MemoryDrive::new();
    drive.add_file("SAVE.DAT", b"progress".to_vec()).unwrap();
    let mut system = DriveSystem::new();
    system.mount('D', drive_ref(drive)).unwrap();

    let handle = system.open_file('D', "SAVE.DAT", OpenMode::Read).unwrap();
    let file = system.files_mut().get_mut(handle).unwrap();
    assert_eq!(file.add_ref(), 2);

    system.close_file(handle).unwrap();
    assert!(system.files().get(handle).unwrap().is_open());

    system.unmount_drive('D').unwrap();
    assert!(system.files().get(handle).is_none());
    assert!(!system.is_mounted('D'));

    // Unmounting again is harmless
    system.unmount_drive('D').unwrap();
}

#[test]
fn test_overlay_unmounts_with_base() {
    let mut base = MemoryDrive::new();
    base.add_file("GAME.EXE", b"MZ".to_vec()).unwrap();
    let mut system = DriveSystem::new();
    system.mount('C', drive_ref(base)).unwrap();
    let base_id = system.drive_id('C').unwrap();
    let overlay_id = system.stack_overlay('C').unwrap();

    assert_eq!(system.drive_get_index(base_id), Some(2));
    assert_eq!(system.drive_get_index(overlay_id), Some(2));

    let writable = system.find_and_open("C:\\GAME.EXE", None, true).unwrap();
    assert!(writable.writable);
    system.close_file(writable.handle).unwrap();

    system.unmount_drive('C').unwrap();
    assert_eq!(system.drive_get_index(base_id), None);
    assert_eq!(system.registered_drives(), 1);
}

#[test]
fn test_state_round_trip() {
    let mut system = memory_system(&['A', 'C', 'F']);
    system.set_curdir('A', "INSTALL").unwrap();
    system.set_curdir('C', "GAMES\\DOOM").unwrap();
    let data = system.save_state().unwrap();

    for letter in ['A', 'C', 'F'] {
        system.set_curdir(letter, "").unwrap();
    }
    let warnings = system.load_state(data).unwrap();
    assert!(warnings.is_empty());
    assert_eq!(system.curdir('A').unwrap(), "INSTALL");
    assert_eq!(system.curdir('C').unwrap(), "GAMES\\DOOM");
    assert_eq!(system.curdir('F').unwrap(), "");
}

#[test]
fn test_state_from_different_drive_set() {
    let mut saved = memory_system(&['A', 'C']);
    saved.set_curdir('C', "GAMES").unwrap();
    let data = saved.save_state().unwrap();

    let mut system = memory_system(&['A', 'C', 'F']);
    system.set_curdir('F', "KEEP").unwrap();
    let warnings = system.load_state(data).unwrap();

    assert!(warnings.contains(ArchiveWarnings::WRONG_DRIVES));
    assert_eq!(system.curdir('C').unwrap(), "GAMES");
    assert_eq!(system.curdir('F').unwrap(), "KEEP");
}

#[test]
fn test_host_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let host = dir.path().join("host.cfg");
    std::fs::write(&host, b"sound=sb16").unwrap();
    let host = host.to_string_lossy().into_owned();

    let mut system = memory_system(&['C']);
    let opened = system.find_and_open(&host, None, true).unwrap();
    assert!(opened.writable);
    assert_eq!(opened.size, 10);
    assert_eq!(opened.resolved_path, host);
    system.close_file(opened.handle).unwrap();

    let mounted_only = format!("${host}");
    assert!(matches!(
        system.find_and_open(&mounted_only, None, false),
        Err(DosError::FileNotFound(_))
    ));
}

#[test]
fn test_file_table_is_bounded() {
    let mut drive = MemoryDrive::new();
    drive.add_file("A.TXT", b"a".to_vec()).unwrap();
    let mut system = DriveSystem::new();
    system.mount('C', drive_ref(drive)).unwrap();

    for _ in 0..DOS_FILES {
        system.open_file('C', "A.TXT", OpenMode::Read).unwrap();
    }
    assert!(matches!(
        system.open_file('C', "A.TXT", OpenMode::Read),
        Err(DosError::TooManyOpenFiles)
    ));

    system.unmount_drive('C').unwrap();
    assert!(system.files().is_empty());
}

#[test]
fn test_teardown_releases_everything() {
    let mut system = memory_system(&['C', 'D']);
    system.stack_overlay('D').unwrap();
    system.set_default_drive(Some('C')).unwrap();
    system.teardown();
}
