//! Byte archive used for save states.
//!
//! The same serialization code runs in four modes: measuring the largest
//! possible size (to presize buffers), measuring the exact size, saving and
//! loading.

use bitflags::bitflags;

use crate::error::ArchiveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    /// Count the bytes of the largest state that could be written.
    MaxSize,
    /// Count the bytes of the current state.
    Size,
    Save,
    Load,
}

bitflags! {
    /// Non-fatal problems found while loading.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ArchiveWarnings: u8 {
        /// The saved drive set differs from the mounted one.
        const WRONG_DRIVES = 0x01;
    }
}

#[derive(Debug, Clone)]
pub struct Archive {
    mode: ArchiveMode,
    data: Vec<u8>,
    pos: usize,
    size: usize,
    warnings: ArchiveWarnings,
}

impl Archive {
    fn with_mode(mode: ArchiveMode, data: Vec<u8>) -> Self {
        Self {
            mode,
            data,
            pos: 0,
            size: 0,
            warnings: ArchiveWarnings::empty(),
        }
    }

    pub fn max_size() -> Self {
        Self::with_mode(ArchiveMode::MaxSize, Vec::new())
    }

    pub fn size() -> Self {
        Self::with_mode(ArchiveMode::Size, Vec::new())
    }

    pub fn save() -> Self {
        Self::with_mode(ArchiveMode::Save, Vec::new())
    }

    pub fn load(data: Vec<u8>) -> Self {
        Self::with_mode(ArchiveMode::Load, data)
    }

    pub fn mode(&self) -> ArchiveMode {
        self.mode
    }

    pub fn is_loading(&self) -> bool {
        self.mode == ArchiveMode::Load
    }

    /// Write or read one byte depending on the mode.
    pub fn serialize_u8(&mut self, value: &mut u8) -> Result<(), ArchiveError> {
        match self.mode {
            ArchiveMode::Load => {
                let bytes = self.take(1)?;
                *value = bytes[0];
            }
            _ => self.write_bytes(&[*value]),
        }
        Ok(())
    }

    /// Append bytes (counted in the measuring modes, ignored when loading).
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        match self.mode {
            ArchiveMode::Save => self.data.extend_from_slice(bytes),
            ArchiveMode::MaxSize | ArchiveMode::Size => self.size += bytes.len(),
            ArchiveMode::Load => {}
        }
    }

    /// Account for `len` bytes without providing them (measuring modes).
    pub fn reserve(&mut self, len: usize) {
        if matches!(self.mode, ArchiveMode::MaxSize | ArchiveMode::Size) {
            self.size += len;
        }
    }

    /// Read `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, ArchiveError> {
        if !self.is_loading() {
            return Err(ArchiveError::NotLoading);
        }
        Ok(self.take(len)?.to_vec())
    }

    /// Skip `len` bytes of the input.
    pub fn discard(&mut self, len: usize) -> Result<(), ArchiveError> {
        if !self.is_loading() {
            return Err(ArchiveError::NotLoading);
        }
        self.take(len).map(|_| ())
    }

    fn take(&mut self, len: usize) -> Result<&[u8], ArchiveError> {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(ArchiveError::UnexpectedEof {
                offset: self.pos,
                wanted: len,
            });
        }
        let start = self.pos;
        self.pos = end;
        Ok(&self.data[start..end])
    }

    /// Bytes written or counted so far, or the read position when loading.
    pub fn len(&self) -> usize {
        match self.mode {
            ArchiveMode::Save => self.data.len(),
            ArchiveMode::MaxSize | ArchiveMode::Size => self.size,
            ArchiveMode::Load => self.pos,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn warnings(&self) -> ArchiveWarnings {
        self.warnings
    }

    pub fn add_warning(&mut self, warning: ArchiveWarnings) {
        self.warnings |= warning;
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
