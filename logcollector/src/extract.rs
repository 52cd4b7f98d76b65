// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Record extraction.
//!
//! An [Extractor] turns raw bytes read from a source into zero or more record
//! payloads. One extractor instance is chosen per source from its format tag
//! when the source is constructed and stays with that source for its whole
//! lifetime, so extractors may keep per-source state such as an incomplete
//! trailing line.

use crate::error::SourceError;
use bytes::Bytes;
use log::trace;

/// Longest line handed on as a single record. Longer lines are cut.
pub const MAX_LINE_SIZE: usize = 64 * 1024;

/// Capability turning raw source data into record payloads
pub trait Extractor: Send {
    /// Append the payloads found in `raw` to `out`.
    ///
    /// Payloads pushed to `out` before an error is returned are still valid
    /// and will be forwarded by the caller.
    fn extract(&mut self, raw: &[u8], out: &mut Vec<Bytes>) -> Result<(), SourceError>;

    /// Forget any carried-over state, e.g. after the source was rotated
    fn reset(&mut self) {}
}

/// Choose the extractor for a format tag.
///
/// `alias` names command sources in their output prefix.
pub fn for_format(format: &str, alias: &str) -> Box<dyn Extractor> {
    match format {
        "json" => Box::new(JsonExtractor::default()),
        "command" => Box::new(CommandExtractor::new(alias, false)),
        "full_command" => Box::new(CommandExtractor::new(alias, true)),
        f => match multiline_count(f) {
            Some(lines) => Box::new(MultilineExtractor::new(lines)),
            None => Box::new(LineExtractor::default()),
        },
    }
}

/// Parse the line count of a multi-line format tag such as `"3"`
fn multiline_count(format: &str) -> Option<usize> {
    let digits: String = format.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok().filter(|n| *n > 0)
}

/// Splits a byte stream into lines, carrying incomplete lines across calls
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Feed `raw` and call `on_line` for every complete line (without the
    /// line terminator). Empty lines are skipped.
    fn feed(&mut self, raw: &[u8], mut on_line: impl FnMut(&[u8])) {
        for &byte in raw {
            if byte == b'\n' {
                let line = trim_cr(&self.pending);
                if !line.is_empty() {
                    on_line(line);
                }
                self.pending.clear();
                continue;
            }

            self.pending.push(byte);
            if self.pending.len() >= MAX_LINE_SIZE {
                trace!("Line exceeds {MAX_LINE_SIZE} bytes, cutting");
                on_line(&self.pending);
                self.pending.clear();
            }
        }
    }

    fn clear(&mut self) {
        self.pending.clear();
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// One record per line. Used for syslog and every format without a
/// dedicated extractor.
#[derive(Debug, Default)]
pub struct LineExtractor {
    lines: LineBuffer,
}

impl Extractor for LineExtractor {
    fn extract(&mut self, raw: &[u8], out: &mut Vec<Bytes>) -> Result<(), SourceError> {
        self.lines
            .feed(raw, |line| out.push(Bytes::copy_from_slice(line)));
        Ok(())
    }

    fn reset(&mut self) {
        self.lines.clear();
    }
}

/// One record per line; lines that are not a JSON document are dropped
#[derive(Debug, Default)]
pub struct JsonExtractor {
    lines: LineBuffer,
}

impl Extractor for JsonExtractor {
    fn extract(&mut self, raw: &[u8], out: &mut Vec<Bytes>) -> Result<(), SourceError> {
        let mut rejected = 0usize;
        self.lines.feed(raw, |line| {
            if serde_json::from_slice::<serde_json::Value>(line).is_ok() {
                out.push(Bytes::copy_from_slice(line));
            } else {
                rejected += 1;
            }
        });

        if rejected > 0 {
            Err(SourceError::Extract(format!(
                "dropped {rejected} line(s) that are not valid JSON"
            )))
        } else {
            Ok(())
        }
    }

    fn reset(&mut self) {
        self.lines.clear();
    }
}

/// Groups a fixed number of lines into one record
#[derive(Debug)]
pub struct MultilineExtractor {
    lines: LineBuffer,
    lines_per_record: usize,
    group: Vec<u8>,
    collected: usize,
}

impl MultilineExtractor {
    /// A `lines_per_record` of 0 is treated as 1
    pub fn new(lines_per_record: usize) -> Self {
        Self {
            lines: LineBuffer::default(),
            lines_per_record: lines_per_record.max(1),
            group: Vec::new(),
            collected: 0,
        }
    }
}

impl Extractor for MultilineExtractor {
    fn extract(&mut self, raw: &[u8], out: &mut Vec<Bytes>) -> Result<(), SourceError> {
        let Self {
            lines,
            lines_per_record,
            group,
            collected,
        } = self;

        lines.feed(raw, |line| {
            if *collected > 0 {
                group.push(b' ');
            }
            group.extend_from_slice(line);
            *collected += 1;

            if *collected == *lines_per_record {
                out.push(Bytes::from(std::mem::take(group)));
                *collected = 0;
            }
        });
        Ok(())
    }

    fn reset(&mut self) {
        self.lines.clear();
        self.group.clear();
        self.collected = 0;
    }
}

/// Extractor for command output.
///
/// Commands are run to completion before extraction, so there is never an
/// incomplete line to carry over.
#[derive(Debug)]
pub struct CommandExtractor {
    alias: String,
    full_output: bool,
}

impl CommandExtractor {
    pub fn new(alias: &str, full_output: bool) -> Self {
        Self {
            alias: alias.to_owned(),
            full_output,
        }
    }
}

impl Extractor for CommandExtractor {
    fn extract(&mut self, raw: &[u8], out: &mut Vec<Bytes>) -> Result<(), SourceError> {
        if self.full_output {
            let mut payload = format!("output: '{}':\n", self.alias).into_bytes();
            let body = &raw[..raw.len().min(MAX_LINE_SIZE)];
            payload.extend_from_slice(body);
            out.push(Bytes::from(payload));
            return Ok(());
        }

        let prefix = format!("output: '{}': ", self.alias);
        let mut lines = LineBuffer::default();
        let mut push = |line: &[u8]| {
            let mut payload = Vec::with_capacity(prefix.len() + line.len());
            payload.extend_from_slice(prefix.as_bytes());
            payload.extend_from_slice(line);
            out.push(Bytes::from(payload));
        };
        lines.feed(raw, &mut push);

        // Output without a final newline still ends with a complete line
        let rest = trim_cr(&lines.pending);
        if !rest.is_empty() {
            push(rest);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn run(extractor: &mut dyn Extractor, raw: &[u8]) -> Vec<Bytes> {
        let mut out = Vec::new();
        let _ = extractor.extract(raw, &mut out);
        out
    }

    #[test]
    fn lines_are_carried_over() {
        let mut extractor = LineExtractor::default();
        assert_eq!(run(&mut extractor, b"first li"), Vec::<Bytes>::new());
        assert_eq!(
            run(&mut extractor, b"ne\r\n\nsecond\nthi"),
            vec![Bytes::from("first line"), Bytes::from("second")]
        );

        extractor.reset();
        assert_eq!(run(&mut extractor, b"rd\n"), vec![Bytes::from("rd")]);
    }

    #[test]
    fn overlong_lines_are_cut() {
        let mut extractor = LineExtractor::default();
        let raw = vec![b'x'; MAX_LINE_SIZE + 10];
        let out = run(&mut extractor, &raw);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), MAX_LINE_SIZE);
    }

    #[test]
    fn json_rejects_invalid_lines() {
        let mut extractor = JsonExtractor::default();
        let mut out = Vec::new();
        let result = extractor.extract(b"{\"a\":1}\nnot json\n[1,2]\n", &mut out);
        assert!(matches!(result, Err(SourceError::Extract(_))));
        assert_eq!(out, vec![Bytes::from("{\"a\":1}"), Bytes::from("[1,2]")]);
    }

    #[test]
    fn multiline_groups_lines() {
        let mut extractor = for_format("3", "");
        let out = run(extractor.as_mut(), b"a\nb\nc\nd\ne\n");
        assert_eq!(out, vec![Bytes::from("a b c")]);
        let out = run(extractor.as_mut(), b"f\n");
        assert_eq!(out, vec![Bytes::from("d e f")]);
    }

    #[test]
    fn command_output_is_prefixed() {
        let mut extractor = for_format("command", "df");
        let out = run(extractor.as_mut(), b"line one\nline two");
        assert_eq!(
            out,
            vec![
                Bytes::from("output: 'df': line one"),
                Bytes::from("output: 'df': line two")
            ]
        );

        let mut extractor = for_format("full_command", "df");
        let out = run(extractor.as_mut(), b"line one\nline two\n");
        assert_eq!(out, vec![Bytes::from("output: 'df':\nline one\nline two\n")]);
    }

    #[test]
    fn unknown_formats_fall_back_to_lines() {
        let mut extractor = for_format("syslog", "");
        assert_eq!(run(extractor.as_mut(), b"x\n"), vec![Bytes::from("x")]);
        assert_eq!(multiline_count("0"), None);
        assert_eq!(multiline_count("12"), Some(12));
        assert_eq!(multiline_count("generic"), None);
    }
}
