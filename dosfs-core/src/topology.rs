//! Shadow chains, forced closure and the ordered shutdown.
//!
//! A drive may be stacked over other drives (its shadows). Shadows are
//! registered in the arena, so the relationships form a tree of ids that can
//! be walked without holding references into the letter table.

use crate::drive_table::{drive_index, drive_letter, DriveId};
use crate::error::{DosError, DosResult};
use crate::fs::{drive_ref, DriveKind, OverlayDrive};
use crate::system::DriveSystem;
use crate::{DOS_DRIVES, VIRTUAL_DRIVE};

/// Deepest shadow chain that is followed. Deeper chains are treated as a
/// broken topology.
pub const MAX_SHADOW_DEPTH: usize = 16;

impl DriveSystem {
    /// Letter index whose directly mounted drive is `id` or reaches `id`
    /// through its shadows (depth-first).
    pub fn drive_get_index(&self, id: DriveId) -> Option<u8> {
        self.table
            .mounted()
            .find(|&(_, top)| self.reaches(top, id, 0))
            .map(|(idx, _)| idx)
    }

    fn reaches(&self, outer: DriveId, target: DriveId, depth: usize) -> bool {
        if outer == target {
            return true;
        }
        if depth >= MAX_SHADOW_DEPTH {
            tracing::error!(id = outer.as_u32(), "shadow chain too deep, giving up");
            return false;
        }
        let Some(drive) = self.arena.get(outer) else {
            return false;
        };
        let drive = drive.borrow();
        let found = (0..)
            .map_while(|n| drive.shadow(n))
            .any(|shadow| self.reaches(shadow, target, depth + 1));
        found
    }

    /// Close every file opened through a letter directly mounting `id`, then
    /// unmount every drive still stacked over it.
    ///
    /// # Panics
    ///
    /// When a shadowing drive refuses to unmount.
    pub fn force_close_all(&mut self, id: DriveId) {
        for idx in 0..DOS_DRIVES as u8 {
            if self.table.get(idx) != Some(id) {
                continue;
            }
            let closed = self.files.close_drive_files(idx);
            if closed > 0 {
                tracing::debug!(drive = %drive_letter(idx), closed, "force-closed open files");
            }

            loop {
                // Hide this letter so only other letters can match
                self.table.set(idx, None);
                let shadowing = self.drive_get_index(id);
                self.table.set(idx, Some(id));
                let Some(shadowing) = shadowing else { break };
                if let Err(err) = self.unmount_drive(drive_letter(shadowing)) {
                    panic!(
                        "unmount of drive {}: stacked over {}: failed: {err}",
                        drive_letter(shadowing),
                        drive_letter(idx)
                    );
                }
            }
        }
    }

    /// Close every handle of the letter directly mounting `id` whose name
    /// matches `name`. Drives stacked over `id` are not searched; they must
    /// call this themselves before forwarding a delete or rename.
    pub fn force_close_file(&mut self, id: DriveId, name: &str) -> bool {
        match self.table.position(id) {
            Some(idx) => self.files.close_named(idx, name),
            None => false,
        }
    }

    /// Unmount a drive and release it from the session.
    pub(crate) fn release_drive(&mut self, id: DriveId) -> DosResult<()> {
        let Some(drive) = self.arena.get(id).cloned() else {
            return Ok(());
        };
        self.force_close_all(id);
        let result = drive.borrow_mut().unmount();
        result?;

        while let Some(idx) = self.table.position(id) {
            self.table.set(idx, None);
            self.hooks.drive_removed(drive_letter(idx));
        }
        self.arena.remove(id);

        // Bases nobody else uses go with the drive stacked over them
        let shadows: Vec<DriveId> = {
            let drive = drive.borrow();
            (0..).map_while(|n| drive.shadow(n)).collect()
        };
        for shadow in shadows {
            if self.is_orphan(shadow) {
                if let Err(err) = self.release_drive(shadow) {
                    tracing::warn!(id = shadow.as_u32(), %err, "releasing shadow drive failed");
                }
            }
        }
        Ok(())
    }

    fn is_orphan(&self, id: DriveId) -> bool {
        self.arena.contains(id)
            && self.drive_get_index(id).is_none()
            && !self.disk_sets.iter().any(|set| set.contains(id))
    }

    /// Unmount every drive except the virtual one, in dependency order:
    /// image drives first, then overlays, then the optical extension, then
    /// everything else.
    ///
    /// # Panics
    ///
    /// When a drive refuses to unmount.
    pub fn shutdown(&mut self) {
        self.unmount_matching(|kind| matches!(kind, DriveKind::Image | DriveKind::Optical));
        self.unmount_matching(|kind| kind == DriveKind::Overlay);
        self.hooks.shutdown_optical();
        for idx in 0..DOS_DRIVES as u8 {
            if idx == VIRTUAL_DRIVE || self.kind_at(idx) == Some(DriveKind::Virtual) {
                continue;
            }
            if let Err(err) = self.unmount_drive(drive_letter(idx)) {
                panic!("unmount of drive {}: failed during shutdown: {err}", drive_letter(idx));
            }
        }

        let remaining: Vec<char> = self
            .table
            .mounted()
            .filter(|&(idx, _)| self.kind_at(idx) != Some(DriveKind::Virtual))
            .map(|(idx, _)| drive_letter(idx))
            .collect();
        assert!(remaining.is_empty(), "drives still mounted after shutdown: {remaining:?}");
        tracing::debug!("drives shut down");
    }

    fn unmount_matching(&mut self, wanted: impl Fn(DriveKind) -> bool) {
        for idx in 0..DOS_DRIVES as u8 {
            if !self.kind_at(idx).is_some_and(&wanted) {
                continue;
            }
            if let Err(err) = self.unmount_drive(drive_letter(idx)) {
                panic!("unmount of drive {}: failed during shutdown: {err}", drive_letter(idx));
            }
        }
    }

    /// Stack a copy-on-write overlay over the drive at `letter`.
    ///
    /// The old drive stays registered as the overlay's shadow and is
    /// released together with the overlay. On a letter with a disk set the
    /// overlay is released when the letter cycles or unmounts.
    pub fn stack_overlay(&mut self, letter: char) -> DosResult<DriveId> {
        let base_id = self
            .drive_id(letter)
            .ok_or(DosError::DriveNotMounted(letter.to_ascii_uppercase()))?;
        let base = self.drive_at(letter)?;
        let curdir = self.curdir(letter)?;
        let idx = drive_index(letter)?;

        let id = self.arena.register(drive_ref(OverlayDrive::new(base_id, base)));
        self.arena.set_curdir(id, &curdir)?;
        self.table.set(idx, Some(id));
        Ok(id)
    }
}
