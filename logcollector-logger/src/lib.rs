// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Logger of the log collector daemon.
//!
//! Writes to stdout, to a log file, or both. A valid level in the `RUST_LOG`
//! environment variable overrides the level passed to [init].

use log::{LevelFilter, Log, Metadata, SetLoggerError};
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;
use std::{error, fmt as std_fmt};

mod console;
mod file;
pub mod fmt;
pub mod record;
mod thread;

const ENV_RUST_LOG: &str = "RUST_LOG";
const MAX_MESSAGE_SIZE: usize = 8 * 1024;

/// Failure to install the logger
#[derive(Debug)]
pub enum InitError {
    /// The log file can not be opened
    Io(io::Error),
    /// Another logger is installed already
    SetLogger(SetLoggerError),
}

impl std_fmt::Display for InitError {
    fn fmt(&self, f: &mut std_fmt::Formatter<'_>) -> std_fmt::Result {
        match self {
            InitError::Io(e) => write!(f, "failed to open log file: {e}"),
            InitError::SetLogger(e) => write!(f, "failed to set logger: {e}"),
        }
    }
}

impl error::Error for InitError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            InitError::Io(e) => Some(e),
            InitError::SetLogger(e) => Some(e),
        }
    }
}

/// Initialize the logger.
///
/// Enable output to `stdout` via `console` and to the file at `log_file`
/// when given.
pub fn init(level: LevelFilter, console: bool, log_file: Option<&Path>) -> Result<(), InitError> {
    let logger = Logger::new(console, log_file).map_err(InitError::Io)?;
    log::set_boxed_logger(Box::new(logger)).map_err(InitError::SetLogger)?;
    log::set_max_level(level_from_env().unwrap_or(level));
    Ok(())
}

/// The collector logger
#[derive(Debug)]
pub struct Logger {
    console: Option<console::Console>,
    file: Option<file::LogFile>,
}

impl Logger {
    /// Create a new logger
    pub fn new(console: bool, log_file: Option<&Path>) -> io::Result<Self> {
        let console = console.then(console::Console::default);
        let file = log_file.map(file::LogFile::open).transpose()?;
        Ok(Self { console, file })
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Messages beyond the buffer size are cut
        let buffer = &mut [0u8; MAX_MESSAGE_SIZE];
        let message = {
            let mut writer = io::Cursor::new(&mut buffer[..]);
            let _ = write!(&mut writer, "{}", record.args());
            let len = writer.position() as usize;
            utf8_prefix(&buffer[..len])
        };

        let record = record::Record::capture(record, message);

        // There is nowhere left to report a failing sink
        if let Some(console) = &self.console {
            let _ = console.write(&record);
        }
        if let Some(file) = &self.file {
            let _ = file.write(&record);
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = file.flush();
        }
    }
}

/// Longest valid UTF-8 prefix of `bytes`
fn utf8_prefix(bytes: &[u8]) -> &str {
    match std::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
    }
}

/// Try to parse the log level from the environment variable `RUST_LOG`
fn level_from_env() -> Option<LevelFilter> {
    std::env::var(ENV_RUST_LOG).ok().and_then(|s| {
        LevelFilter::from_str(&s)
            .inspect_err(|_| eprintln!("Failed to parse log level from `RUST_LOG={s}`"))
            .ok()
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use log::Level;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn cut_messages_stay_utf8() {
        assert_eq!(utf8_prefix("grüß".as_bytes()), "grüß");
        let bytes = "grüß".as_bytes();
        assert_eq!(utf8_prefix(&bytes[..bytes.len() - 1]), "grü");
    }

    #[test]
    fn file_sink_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logcollector.log");
        fs::write(&path, "previous run\n").unwrap();

        let logger = Logger::new(false, Some(&path)).unwrap();
        log::set_max_level(LevelFilter::Trace);
        logger.log(
            &log::Record::builder()
                .args(format_args!("Collecting from {} sources", 2))
                .level(Level::Info)
                .target("logcollectord")
                .build(),
        );
        logger.flush();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "previous run");
        assert!(lines[1].contains("logcollectord"));
        assert!(lines[1].ends_with("INFO : Collecting from 2 sources"));
    }

    #[test]
    fn missing_directory_fails() {
        assert!(Logger::new(false, Some(Path::new("/nonexistent/dir/log"))).is_err());
    }
}
