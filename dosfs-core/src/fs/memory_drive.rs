//! In-memory drive with long file names and generated 8.3 aliases.

use std::cell::RefCell;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::rc::Rc;

use super::drive::{Attributes, DirEntry, Drive, DriveKind, FileStream, OpenMode, SearchState};
use crate::error::{DosError, DosResult};
use crate::names::{is_separator, make_8dot3_name};

/// DOS date stamp given to in-memory entries (2000-01-01).
const DEFAULT_DATE: u16 = (20 << 9) | (1 << 5) | 1;

type SharedData = Rc<RefCell<Vec<u8>>>;

enum Content {
    File(SharedData),
    Dir(Vec<Node>),
}

struct Node {
    short: String,
    long: String,
    attr: Attributes,
    content: Content,
}

impl Node {
    fn dir(short: String, long: String) -> Self {
        Self {
            short,
            long,
            attr: Attributes::DIRECTORY,
            content: Content::Dir(Vec::new()),
        }
    }

    fn children(&self) -> Option<&Vec<Node>> {
        match &self.content {
            Content::Dir(children) => Some(children),
            Content::File(_) => None,
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match &mut self.content {
            Content::Dir(children) => Some(children),
            Content::File(_) => None,
        }
    }

    fn entry(&self) -> DirEntry {
        let size = match &self.content {
            Content::File(data) => data.borrow().len() as u32,
            Content::Dir(_) => 0,
        };
        DirEntry {
            name: self.short.clone(),
            size,
            date: DEFAULT_DATE,
            time: 0,
            attr: self.attr,
        }
    }
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split(is_separator).filter(|c| !c.is_empty())
}

/// Pick an 8.3 alias for `long` that is not yet used in `siblings`.
fn unique_short_name(siblings: &[Node], long: &str) -> String {
    let taken = |name: &str| siblings.iter().any(|n| n.short.eq_ignore_ascii_case(name));
    let base = make_8dot3_name(long).to_ascii_uppercase();
    if !taken(&base) {
        return base;
    }
    let (stem, ext) = match base.rfind('.') {
        Some(pos) => (&base[..pos], &base[pos..]),
        None => (base.as_str(), ""),
    };
    let numbered = (1u32..99_999)
        .map(|n| {
            let tail = format!("~{n}");
            let keep = stem.len().min(8 - tail.len());
            format!("{}{}{}", &stem[..keep], tail, ext)
        })
        .find(|candidate| !taken(candidate));
    numbered.unwrap_or_else(|| base.clone())
}

/// Handle to a file inside a [`MemoryDrive`].
pub struct MemoryFile {
    data: SharedData,
    pos: u64,
    writable: bool,
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.borrow();
        let start = (self.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "file opened read-only",
            ));
        }
        let mut data = self.data.borrow_mut();
        let start = self.pos as usize;
        let end = start + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        self.pos = end as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.data.borrow().len() as u64;
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(n) => len.checked_add_signed(n),
            SeekFrom::Current(n) => self.pos.checked_add_signed(n),
        };
        let Some(target) = target.filter(|&t| i64::try_from(t).is_ok()) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            ));
        };
        self.pos = target;
        Ok(self.pos)
    }
}

/// Simple in-memory drive.
///
/// Entries are added by their long names and get an 8.3 alias. Lookups
/// through the [`Drive`] interface use the 8.3 aliases only; the long name is
/// reported by `long_file_name`.
pub struct MemoryDrive {
    root: Node,
    kind: DriveKind,
    label: String,
    info: String,
    read_only: bool,
    hard_disk: bool,
    activations: u32,
    unmounted: bool,
}

impl Default for MemoryDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDrive {
    pub fn new() -> Self {
        Self {
            root: Node::dir(String::new(), String::new()),
            kind: DriveKind::Local,
            label: String::new(),
            info: "memory".to_string(),
            read_only: false,
            hard_disk: false,
            activations: 0,
            unmounted: false,
        }
    }

    /// The emulator's own drive. It refuses to unmount.
    pub fn virtual_drive() -> Self {
        Self::new()
            .with_kind(DriveKind::Virtual)
            .with_info("Internal Virtual Drive")
    }

    pub fn with_kind(mut self, kind: DriveKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn with_info(mut self, info: &str) -> Self {
        self.info = info.to_string();
        self
    }

    pub fn with_hard_disk(mut self, hard_disk: bool) -> Self {
        self.hard_disk = hard_disk;
        self
    }

    /// Reject every modification through the [`Drive`] interface.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    /// How often the drive was activated by a disk swap.
    pub fn activations(&self) -> u32 {
        self.activations
    }

    /// Create a directory (and its parents) from long names.
    pub fn add_dir(&mut self, path: &str) -> DosResult<()> {
        let mut dir = &mut self.root;
        for long in components(path) {
            let children = dir
                .children_mut()
                .ok_or_else(|| DosError::PathNotFound(path.to_string()))?;
            let idx = match children.iter().position(|n| n.long.eq_ignore_ascii_case(long)) {
                Some(idx) => idx,
                None => {
                    let short = unique_short_name(children, long);
                    children.push(Node::dir(short, long.to_string()));
                    children.len() - 1
                }
            };
            dir = &mut children[idx];
        }
        if dir.children().is_none() {
            return Err(DosError::PathNotFound(path.to_string()));
        }
        Ok(())
    }

    /// Add or replace a file, creating parent directories. Path components
    /// are long names.
    pub fn add_file(&mut self, path: &str, data: impl Into<Vec<u8>>) -> DosResult<()> {
        let (parent, name) = match path.rfind(is_separator) {
            Some(pos) => (&path[..pos], &path[pos + 1..]),
            None => ("", path),
        };
        if name.is_empty() {
            return Err(DosError::FileNotFound(path.to_string()));
        }
        self.add_dir(parent)?;
        let dir = self
            .lookup_long_mut(parent)
            .and_then(Node::children_mut)
            .ok_or_else(|| DosError::PathNotFound(path.to_string()))?;
        let data = Rc::new(RefCell::new(data.into()));
        match dir.iter_mut().find(|n| n.long.eq_ignore_ascii_case(name)) {
            Some(node) if node.children().is_some() => {
                return Err(DosError::AccessDenied(path.to_string()))
            }
            Some(node) => node.content = Content::File(data),
            None => {
                let short = unique_short_name(dir, name);
                dir.push(Node {
                    short,
                    long: name.to_string(),
                    attr: Attributes::ARCHIVE,
                    content: Content::File(data),
                });
            }
        }
        Ok(())
    }

    /// Add a file from string content.
    pub fn add_file_str(&mut self, path: &str, content: &str) -> DosResult<()> {
        self.add_file(path, content.as_bytes().to_vec())
    }

    /// Whether a short-name path exists.
    pub fn exists(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Content of the file at a short-name path.
    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        match &self.lookup(path)?.content {
            Content::File(data) => Some(data.borrow().clone()),
            Content::Dir(_) => None,
        }
    }

    fn lookup(&self, path: &str) -> Option<&Node> {
        let mut node = &self.root;
        for short in components(path) {
            node = node
                .children()?
                .iter()
                .find(|n| n.short.eq_ignore_ascii_case(short))?;
        }
        Some(node)
    }

    fn lookup_mut(&mut self, path: &str) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for short in components(path) {
            node = node
                .children_mut()?
                .iter_mut()
                .find(|n| n.short.eq_ignore_ascii_case(short))?;
        }
        Some(node)
    }

    fn lookup_long_mut(&mut self, path: &str) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for long in components(path) {
            node = node
                .children_mut()?
                .iter_mut()
                .find(|n| n.long.eq_ignore_ascii_case(long))?;
        }
        Some(node)
    }

    fn check_writable(&self, path: &str) -> DosResult<()> {
        if self.read_only {
            return Err(DosError::ReadOnly);
        }
        if self.unmounted {
            return Err(DosError::AccessDenied(path.to_string()));
        }
        Ok(())
    }
}

impl Drive for MemoryDrive {
    fn kind(&self) -> DriveKind {
        self.kind
    }

    fn info(&self) -> &str {
        &self.info
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn file_open(&mut self, path: &str, mode: OpenMode) -> DosResult<Box<dyn FileStream>> {
        if mode.can_write() {
            self.check_writable(path)?;
        }
        let node = self
            .lookup(path)
            .ok_or_else(|| DosError::FileNotFound(path.to_string()))?;
        let Content::File(data) = &node.content else {
            return Err(DosError::AccessDenied(path.to_string()));
        };
        if mode.can_write() && node.attr.contains(Attributes::READ_ONLY) {
            return Err(DosError::AccessDenied(path.to_string()));
        }
        Ok(Box::new(MemoryFile {
            data: Rc::clone(data),
            pos: 0,
            writable: mode.can_write(),
        }))
    }

    fn file_create(&mut self, path: &str, attr: Attributes) -> DosResult<Box<dyn FileStream>> {
        self.check_writable(path)?;
        let (parent, name) = match path.rfind(is_separator) {
            Some(pos) => (&path[..pos], &path[pos + 1..]),
            None => ("", path),
        };
        if name.is_empty() {
            return Err(DosError::FileNotFound(path.to_string()));
        }
        let dir = self
            .lookup_mut(parent)
            .and_then(Node::children_mut)
            .ok_or_else(|| DosError::PathNotFound(path.to_string()))?;

        let data: SharedData = Rc::new(RefCell::new(Vec::new()));
        match dir.iter_mut().find(|n| n.short.eq_ignore_ascii_case(name)) {
            Some(node) if node.children().is_some() => {
                return Err(DosError::AccessDenied(path.to_string()))
            }
            Some(node) => {
                node.content = Content::File(Rc::clone(&data));
                node.attr = attr | Attributes::ARCHIVE;
            }
            None => {
                let short = make_8dot3_name(name).to_ascii_uppercase();
                dir.push(Node {
                    short,
                    long: name.to_string(),
                    attr: attr | Attributes::ARCHIVE,
                    content: Content::File(Rc::clone(&data)),
                });
            }
        }
        Ok(Box::new(MemoryFile {
            data,
            pos: 0,
            writable: true,
        }))
    }

    fn file_unlink(&mut self, path: &str) -> DosResult<()> {
        self.check_writable(path)?;
        let (parent, name) = match path.rfind(is_separator) {
            Some(pos) => (&path[..pos], &path[pos + 1..]),
            None => ("", path),
        };
        let dir = self
            .lookup_mut(parent)
            .and_then(Node::children_mut)
            .ok_or_else(|| DosError::PathNotFound(path.to_string()))?;
        let idx = dir
            .iter()
            .position(|n| n.short.eq_ignore_ascii_case(name) && n.children().is_none())
            .ok_or_else(|| DosError::FileNotFound(path.to_string()))?;
        dir.remove(idx);
        Ok(())
    }

    fn find_first(&mut self, dir: &str, search: &mut SearchState) -> bool {
        let Some(children) = self.lookup(dir).and_then(Node::children) else {
            return false;
        };
        let mut entries = Vec::with_capacity(children.len() + 2);
        if components(dir).next().is_some() {
            for name in [".", ".."] {
                entries.push(DirEntry {
                    name: name.to_string(),
                    size: 0,
                    date: DEFAULT_DATE,
                    time: 0,
                    attr: Attributes::DIRECTORY,
                });
            }
        }
        entries.extend(children.iter().map(Node::entry));
        search.begin(entries)
    }

    fn long_file_name(&self, path: &str) -> Option<String> {
        components(path).next()?;
        self.lookup(path).map(|n| n.long.clone())
    }

    fn activate(&mut self) {
        self.activations += 1;
    }

    fn unmount(&mut self) -> DosResult<()> {
        if self.kind == DriveKind::Virtual || self.unmounted {
            return Err(DosError::AccessDenied(self.info.clone()));
        }
        self.unmounted = true;
        Ok(())
    }

    fn is_hard_disk(&self) -> bool {
        self.hard_disk
    }
}
