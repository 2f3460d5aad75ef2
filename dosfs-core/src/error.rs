//! Error types for the DOS drive layer.

use thiserror::Error;

/// Errors that can occur while operating on DOS drives.
#[derive(Error, Debug)]
pub enum DosError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Read-only drive")]
    ReadOnly,

    #[error("Invalid drive: {0}")]
    InvalidDrive(char),

    #[error("Drive not mounted: {0}")]
    DriveNotMounted(char),

    #[error("Invalid file handle: {0}")]
    InvalidHandle(usize),

    #[error("File is closed")]
    FileClosed,

    #[error("Drive already mounted: {0}")]
    DriveInUse(char),

    #[error("Too many open files")]
    TooManyOpenFiles,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by an [`Archive`](crate::archive::Archive) in load mode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("unexpected end of archive at offset {offset} (wanted {wanted} bytes)")]
    UnexpectedEof { offset: usize, wanted: usize },

    #[error("archive is not in load mode")]
    NotLoading,
}

/// Result type for drive layer operations.
pub type DosResult<T> = Result<T, DosError>;
