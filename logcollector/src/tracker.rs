// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Per-source file handle bookkeeping and rotation detection

use crate::error::SourceError;
use crate::source::{OpenMode, Source};
use std::fmt::Display;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Filesystem-level identity of a file: device and inode.
///
/// The identity survives renames, so a change of identity behind an unchanged
/// path means the path now refers to a different file, i.e. it was rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    pub fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    #[cfg(unix)]
    fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }

    // No stable identity available: rotation is then only detected as truncation
    #[cfg(not(unix))]
    fn from_metadata(_metadata: &std::fs::Metadata) -> Self {
        Self { dev: 0, ino: 0 }
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.dev, self.ino)
    }
}

/// Result of a stat: identity, size and whether it is a regular file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub id: FileId,
    pub size: u64,
    pub is_file: bool,
}

impl FileStat {
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        Self {
            id: FileId::from_metadata(metadata),
            size: metadata.len(),
            is_file: metadata.is_file(),
        }
    }
}

/// An open, readable log file
pub trait LogFile: Read + Seek + Send {
    /// Stat the open handle
    fn stat(&self) -> io::Result<FileStat>;
}

impl LogFile for File {
    fn stat(&self) -> io::Result<FileStat> {
        self.metadata().map(|m| FileStat::from_metadata(&m))
    }
}

/// Access to the files being monitored
pub trait FileSystem: Send + Sync {
    /// Open `path` for reading
    fn open(&self, path: &Path) -> io::Result<Box<dyn LogFile>>;

    /// Stat `path` independently of any handle already open on it
    fn stat(&self, path: &Path) -> io::Result<FileStat>;
}

/// The local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn open(&self, path: &Path) -> io::Result<Box<dyn LogFile>> {
        Ok(Box::new(File::open(path)?))
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        // Stat through a second, temporary handle. Metadata obtained from the
        // long-lived handle may be stale, e.g. when the file is a hard link.
        File::open(path)?.stat()
    }
}

/// Open handle plus the identity and size last seen for it
pub struct HandleState {
    pub(crate) file: Box<dyn LogFile>,
    pub(crate) id: FileId,
    pub(crate) size: u64,
}

impl HandleState {
    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl std::fmt::Debug for HandleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleState")
            .field("id", &self.id)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Outcome of [FileStateTracker::check_rotation]
#[derive(Debug)]
pub enum RotationVerdict {
    /// Same file, not shrunk. The recorded size has been refreshed.
    Unchanged,
    /// The path refers to a different file now
    Rotated,
    /// Same file, but smaller than last seen
    Truncated,
    /// The path does not exist anymore
    Gone,
    /// The path could not be examined
    StatFailed(io::Error),
}

/// Opens, re-examines and closes the file handles of sources.
///
/// Only the input worker owning a source calls into the tracker for it.
#[derive(Clone)]
pub struct FileStateTracker {
    fs: Arc<dyn FileSystem>,
}

impl FileStateTracker {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Open the source's file, replacing any handle it already holds.
    ///
    /// On success the error count of the source is reset.
    pub fn open(&self, source: &mut Source, mode: OpenMode) -> Result<(), SourceError> {
        self.close_if_open(source);

        let path = Path::new(source.identity());
        let mut file = self.fs.open(path).map_err(SourceError::from_open)?;
        let stat = file.stat().map_err(SourceError::Stat)?;

        if mode == OpenMode::End && stat.is_file {
            file.seek(SeekFrom::End(0)).map_err(SourceError::Read)?;
        }

        source.handle = Some(HandleState {
            file,
            id: stat.id,
            size: stat.size,
        });
        source.error_count = 0;
        Ok(())
    }

    /// Compare the file currently found at the source's path against the
    /// open handle.
    ///
    /// A source without an open handle has nothing to compare against and is
    /// reported unchanged unless its path cannot be examined.
    pub fn check_rotation(&self, source: &mut Source) -> RotationVerdict {
        let stat = match self.fs.stat(Path::new(source.identity())) {
            Ok(stat) => stat,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return RotationVerdict::Gone,
            Err(e) => return RotationVerdict::StatFailed(e),
        };

        let Some(handle) = source.handle.as_mut() else {
            return RotationVerdict::Unchanged;
        };

        if stat.id != handle.id {
            RotationVerdict::Rotated
        } else if stat.size < handle.size {
            RotationVerdict::Truncated
        } else {
            handle.size = stat.size;
            RotationVerdict::Unchanged
        }
    }

    /// Read the next chunk from the source's open handle into `buf`.
    ///
    /// Returns the number of bytes read; 0 when no handle is open or no new
    /// data is available.
    pub fn read(&self, source: &mut Source, buf: &mut [u8]) -> Result<usize, SourceError> {
        match source.handle.as_mut() {
            Some(handle) => loop {
                match handle.file.read(buf) {
                    Ok(n) => return Ok(n),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(SourceError::Read(e)),
                }
            },
            None => Ok(0),
        }
    }

    /// Drop the source's handle, if any
    pub fn close_if_open(&self, source: &mut Source) {
        source.handle = None;
    }
}
