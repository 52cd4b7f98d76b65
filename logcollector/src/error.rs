// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Log collector error types

use std::io;

/// Collector error type
#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    Channel(&'static str),
    Io((io::Error, &'static str)),
    Config(String),
    Glob(String),
    Transport((String, io::Error)),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Channel(description) => write!(f, "Channel error, {}", description),
            Error::Io((e, description)) => write!(f, "Io error: {}, {}", description, e),
            Error::Config(description) => write!(f, "Configuration error: {}", description),
            Error::Glob(description) => write!(f, "Invalid glob pattern: {}", description),
            Error::Transport((channel, e)) => {
                write!(f, "Transport error on channel '{}': {}", channel, e)
            }
        }
    }
}

/// Failure of a single monitored source.
///
/// These never leave the input worker that owns the source. They feed the
/// error-count / ignore-threshold bookkeeping and are logged.
#[derive(Debug)]
pub enum SourceError {
    /// The file could not be opened
    Open(io::Error),
    /// The independent stat used for rotation detection failed
    Stat(io::Error),
    /// Reading from an open handle failed
    Read(io::Error),
    /// The underlying file does not exist (anymore)
    Gone,
    /// A command source could not be executed
    CommandExec(io::Error),
    /// The extractor rejected (part of) the data
    Extract(String),
}

impl std::error::Error for SourceError {}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SourceError::Open(e) => write!(f, "open failed: {}", e),
            SourceError::Stat(e) => write!(f, "stat failed: {}", e),
            SourceError::Read(e) => write!(f, "read failed: {}", e),
            SourceError::Gone => write!(f, "file not found"),
            SourceError::CommandExec(e) => write!(f, "command execution failed: {}", e),
            SourceError::Extract(description) => write!(f, "extraction failed: {}", description),
        }
    }
}

impl SourceError {
    /// Classify an open error: a missing file is reported as [SourceError::Gone]
    pub fn from_open(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            SourceError::Gone
        } else {
            SourceError::Open(e)
        }
    }

    /// Classify a stat error: a missing file is reported as [SourceError::Gone]
    pub fn from_stat(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            SourceError::Gone
        } else {
            SourceError::Stat(e)
        }
    }
}
