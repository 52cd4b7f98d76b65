// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use log::Level;
use std::time::SystemTime;

/// A log record with everything the sinks print, borrowed from the caller
#[derive(Debug)]
pub struct Record<'a> {
    pub timestamp: SystemTime,
    pub level: Level,
    pub target: &'a str,
    pub file: Option<&'a str>,
    pub line: Option<u32>,
    pub pid: u32,
    pub tid: u32,
    pub message: &'a str,
}

impl<'a> Record<'a> {
    /// Capture a [log::Record] with an already formatted `message`
    pub fn capture(record: &'a log::Record<'a>, message: &'a str) -> Record<'a> {
        Record {
            timestamp: SystemTime::now(),
            level: record.level(),
            target: record.target(),
            file: record.file(),
            line: record.line(),
            pid: std::process::id(),
            tid: crate::thread::id(),
            message,
        }
    }
}
