// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use crate::record::Record;
use console::{style, Color, StyledObject};
use log::Level;
use std::fmt::Display;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const CONSOLE_TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour]:[minute]:[second].[subsecond digits:3]");
const FILE_TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
);

static TARGET_SIZE: AtomicUsize = AtomicUsize::new(16);
static PID_SIZE: AtomicUsize = AtomicUsize::new(4);
static TID_SIZE: AtomicUsize = AtomicUsize::new(4);

/// Output flavour of [format]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Terminal colors and short timestamps
    Colored,
    /// No escape sequences, full UTC timestamps
    Plain,
}

impl Style {
    fn apply<D: Display>(self, object: D) -> StyledObject<D> {
        style(object).force_styling(self == Style::Colored)
    }
}

/// Write `record` as one line to `writer`
pub fn format<W: io::Write>(record: &Record, mut writer: W, flavour: Style) -> io::Result<()> {
    let timestamp = {
        let format = match flavour {
            Style::Colored => CONSOLE_TIMESTAMP_FORMAT,
            Style::Plain => FILE_TIMESTAMP_FORMAT,
        };
        OffsetDateTime::from(record.timestamp)
            .format(format)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
    };

    let level = {
        let level_color = match record.level {
            Level::Error => Color::Red,
            Level::Warn => Color::Yellow,
            Level::Info => Color::Green,
            Level::Debug => Color::Color256(243),
            Level::Trace => Color::White,
        };
        flavour.apply(record.level).bold().fg(level_color)
    };

    let pid = format_id(record.pid, &PID_SIZE, true, flavour);
    let tid = format_id(record.tid, &TID_SIZE, false, flavour);

    let target = {
        TARGET_SIZE.fetch_max(record.target.len(), Ordering::Relaxed);
        let target_size = TARGET_SIZE.load(Ordering::Relaxed);
        flavour
            .apply(format!("{:<target_size$}", record.target))
            .fg(record.target.color())
    };

    let message = record.message;

    // Source location only on trace level
    if record.level == Level::Trace {
        let file = record.file.unwrap_or("file unknown");
        let file = flavour.apply(file).fg(file.color());
        let line = record.line.unwrap_or(0);
        writeln!(
            writer,
            "{timestamp} {target} ({pid} {tid}): {level:<5}: {file}:{line}: {message}",
        )
    } else {
        writeln!(
            writer,
            "{timestamp} {target} ({pid} {tid}): {level:<5}: {message}"
        )
    }
}

/// Color derived from a hash of `self`
trait HashColor {
    fn color(&self) -> Color;
}

impl HashColor for &str {
    fn color(&self) -> Color {
        let hash = self.bytes().fold(42u8, |c, x| c ^ x);
        Color::Color256(hash)
    }
}

impl HashColor for u32 {
    fn color(&self) -> Color {
        // Skip colors that are hard to read on dark terminals
        let color = match *self as u8 {
            c @ 0..=1 => c + 2,
            c @ 16..=21 => c + 6,
            c @ 52..=55 | c @ 126..=129 => c + 4,
            c @ 163..=165 | c @ 200..=201 => c + 3,
            c @ 207 => c + 1,
            c @ 232..=240 => c + 9,
            c => c,
        };
        Color::Color256(color)
    }
}

/// Format `id` in hex, padded to the widest id seen so far in `width`
fn format_id(id: u32, width: &AtomicUsize, align_left: bool, flavour: Style) -> StyledObject<String> {
    width.fetch_max(num_hex_digits(id), Ordering::Relaxed);
    let len = width.load(Ordering::Relaxed);
    let id_text = if align_left {
        format!("{id:<len$x}")
    } else {
        format!("{id:>len$x}")
    };
    flavour.apply(id_text).fg(id.color())
}

fn num_hex_digits(n: u32) -> usize {
    (1 + n.checked_ilog2().unwrap_or_default() / 4) as usize
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn record<'a>(level: Level, message: &'a str) -> Record<'a> {
        Record {
            timestamp: SystemTime::UNIX_EPOCH + Duration::from_millis(86_400_000 + 3_723_042),
            level,
            target: "logcollector::collector",
            file: Some("logcollector/src/collector.rs"),
            line: Some(42),
            pid: 0x1a2,
            tid: 0x1a3,
            message,
        }
    }

    fn plain(record: &Record) -> String {
        let mut out = Vec::new();
        format(record, &mut out, Style::Plain).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn hex_digits() {
        assert_eq!(num_hex_digits(0), 1);
        assert_eq!(num_hex_digits(15), 1);
        assert_eq!(num_hex_digits(16), 2);
        assert_eq!(num_hex_digits(255), 2);
        assert_eq!(num_hex_digits(256), 3);
        assert_eq!(num_hex_digits(4095), 3);
    }

    #[test]
    fn plain_line_has_no_escapes() {
        let line = plain(&record(Level::Info, "Collecting from 3 sources"));
        assert!(line.starts_with("1970-01-02T01:02:03.042Z logcollector::collector"));
        assert!(line.contains("INFO"));
        assert!(line.ends_with(": Collecting from 3 sources\n"));
        assert!(!line.contains('\u{1b}'));
        assert!(!line.contains("collector.rs"));
    }

    #[test]
    fn trace_line_has_location() {
        let line = plain(&record(Level::Trace, "Forwarded"));
        assert!(line.contains("logcollector/src/collector.rs:42: Forwarded"));
    }
}
