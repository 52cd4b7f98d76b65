// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! One scan of a worker's partition

use crate::command::run_command;
use crate::context::CollectorContext;
use crate::error::SourceError;
use crate::record::Record;
use crate::registry::SourceRegistry;
use crate::source::{OpenMode, Source, SourceKind, SourceState};
use crate::template::resolve_templated_name;
use crate::tracker::RotationVerdict;
use bytes::Bytes;
use log::{debug, info, trace, warn};
use std::fmt::Display;
use std::time::Instant;
use time::OffsetDateTime;

/// Summary of one scan, reported back to the collector
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// Sources visited
    pub scanned: usize,
    /// Records created
    pub records: usize,
    /// Failures counted against sources
    pub failures: usize,
}

impl ScanReport {
    pub fn merge(&mut self, other: &ScanReport) {
        self.scanned += other.scanned;
        self.records += other.records;
        self.failures += other.failures;
    }
}

impl Display for ScanReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} scanned, {} records, {} failures",
            self.scanned, self.records, self.failures
        )
    }
}

/// Scans sources on behalf of one worker, reusing its buffers across cycles
pub(crate) struct Scanner {
    buf: Vec<u8>,
    payloads: Vec<Bytes>,
}

impl Scanner {
    pub(crate) fn new(read_chunk_bytes: usize) -> Self {
        Self {
            buf: vec![0; read_chunk_bytes],
            payloads: Vec::new(),
        }
    }

    /// Scan the partition the current plan assigns to `worker`
    pub(crate) fn scan_assigned(&mut self, ctx: &CollectorContext, worker: usize) -> ScanReport {
        let registry = ctx.registry();
        let plan = ctx.plan();
        self.scan_sources(ctx, &registry, plan.indices_for(worker))
    }

    /// Scan the sources at the given registry indices, in order
    #[cfg(test)]
    pub(crate) fn scan_partition(&mut self, ctx: &CollectorContext, indices: &[usize]) -> ScanReport {
        let registry = ctx.registry();
        self.scan_sources(ctx, &registry, indices)
    }

    fn scan_sources(
        &mut self,
        ctx: &CollectorContext,
        registry: &SourceRegistry,
        indices: &[usize],
    ) -> ScanReport {
        let mut report = ScanReport::default();
        if indices.is_empty() {
            return report;
        }

        let cycle = Cycle {
            started: Instant::now(),
            wall_clock: crate::template::local_now(),
        };
        for &index in indices {
            if let Some(mut source) = registry.lock(index) {
                self.scan_source(ctx, &mut source, &cycle, &mut report);
            }
        }
        report
    }

    fn scan_source(
        &mut self,
        ctx: &CollectorContext,
        source: &mut Source,
        cycle: &Cycle,
        report: &mut ScanReport,
    ) {
        // Dated files switch to the next file even while ignored
        if source.kind() == SourceKind::DateTemplatedFile {
            roll_over(source, cycle.wall_clock);
        }
        if source.state() != SourceState::Active {
            return;
        }
        report.scanned += 1;

        match source.kind() {
            SourceKind::CommandOutput => self.scan_command(ctx, source, cycle, report),
            SourceKind::GlobTemplate => {}
            _ => self.scan_file(ctx, source, cycle, report),
        }
    }

    fn scan_command(
        &mut self,
        ctx: &CollectorContext,
        source: &mut Source,
        cycle: &Cycle,
        report: &mut ScanReport,
    ) {
        let due = source
            .last_run
            .map_or(true, |last| cycle.started.duration_since(last) >= source.frequency);
        if !due {
            return;
        }
        source.last_run = Some(cycle.started);

        match run_command(source.identity()) {
            Ok(output) => {
                source.error_count = 0;
                self.forward(ctx, source, &output, report);
            }
            Err(e) => fail(source, SourceError::CommandExec(e), report),
        }
    }

    fn scan_file(
        &mut self,
        ctx: &CollectorContext,
        source: &mut Source,
        cycle: &Cycle,
        report: &mut ScanReport,
    ) {
        let tracker = &ctx.tracker;
        if source.is_open() {
            match tracker.check_rotation(source) {
                RotationVerdict::Unchanged => {}
                RotationVerdict::Rotated => {
                    debug!("File '{}' rotated, reopening", source.identity());
                    ctx.notify(format!(
                        "logcollector: File rotated (inode changed): '{}'.",
                        source.identity()
                    ));
                    tracker.close_if_open(source);
                    source.extractor.reset();
                    source.next_open = OpenMode::Start;
                }
                RotationVerdict::Truncated => {
                    debug!("File '{}' truncated, reopening", source.identity());
                    ctx.notify(format!(
                        "logcollector: File size reduced (inode remained): '{}'.",
                        source.identity()
                    ));
                    tracker.close_if_open(source);
                    source.extractor.reset();
                    source.next_open = OpenMode::End;
                }
                RotationVerdict::Gone if source.kind() == SourceKind::GlobExpandedFile => {
                    tracker.close_if_open(source);
                    vanished(source);
                    return;
                }
                RotationVerdict::Gone => {
                    // Keep the old handle: once a new file shows up under the
                    // path it is detected as a rotation and read from its start
                    trace!("File '{}' is missing, keeping its handle", source.identity());
                }
                RotationVerdict::StatFailed(e) => {
                    tracker.close_if_open(source);
                    fail(source, SourceError::Stat(e), report);
                    return;
                }
            }
        }

        if !source.is_open() {
            let mode = source.next_open;
            match tracker.open(source, mode) {
                Ok(()) => {
                    trace!("Opened '{}' at {mode:?}", source.identity());
                    // Later re-opens skip what was written while the file was unavailable
                    source.next_open = OpenMode::End;
                }
                Err(SourceError::Gone) => {
                    match source.kind() {
                        SourceKind::GlobExpandedFile => vanished(source),
                        // The file of a new day may be created late
                        SourceKind::DateTemplatedFile => {
                            trace!("Dated file '{}' does not exist yet", source.identity());
                        }
                        _ => fail(source, SourceError::Gone, report),
                    }
                    return;
                }
                Err(e) => {
                    fail(source, e, report);
                    return;
                }
            }
        }

        let mut buf = std::mem::take(&mut self.buf);
        match tracker.read(source, &mut buf) {
            Ok(0) => {}
            Ok(n) => self.forward(ctx, source, &buf[..n], report),
            Err(e) => {
                tracker.close_if_open(source);
                fail(source, e, report);
            }
        }
        self.buf = buf;
    }

    /// Extract records from `raw` and push them to the source's channels
    fn forward(
        &mut self,
        ctx: &CollectorContext,
        source: &mut Source,
        raw: &[u8],
        report: &mut ScanReport,
    ) {
        if let Err(e) = source.extractor.extract(raw, &mut self.payloads) {
            warn!("Extracting from '{}': {e}", source.identity());
        }

        for payload in self.payloads.drain(..) {
            let record = Record::new(
                payload,
                source.location().clone(),
                source.format.clone(),
                source.channels().clone(),
            );
            ctx.fanout.push_record(record);
            report.records += 1;
        }
    }
}

/// Times shared by all sources of one scan
struct Cycle {
    started: Instant,
    wall_clock: OffsetDateTime,
}

/// Switch a dated file over to the name resolved for `now`.
///
/// The first resolution keeps the configured open mode. Every later change of
/// name starts over at the beginning of the new file and gives an ignored
/// source another chance.
fn roll_over(source: &mut Source, now: OffsetDateTime) {
    let Some(template) = source.template.as_deref() else {
        return;
    };

    let resolved = resolve_templated_name(template, now);
    if resolved == source.identity() {
        source.template_resolved = true;
        return;
    }

    if source.template_resolved {
        debug!("Switching '{}' to '{resolved}'", source.identity());
        source.handle = None;
        source.extractor.reset();
        source.next_open = OpenMode::Start;
        source.error_count = 0;
        if source.state == SourceState::Ignored {
            info!("Monitoring '{resolved}' again");
            source.state = SourceState::Active;
        }
    }
    source.set_identity(resolved);
    source.template_resolved = true;
}

/// Mark a glob member whose file is gone for removal at the next barrier
fn vanished(source: &mut Source) {
    debug!("File '{}' vanished, marking for removal", source.identity());
    source.state = SourceState::Gone;
}

/// Count a failure against `source`.
///
/// Re-opens start at the end of the file, except for a dated file still
/// waiting to read the file of a new day from its start.
fn fail(source: &mut Source, error: SourceError, report: &mut ScanReport) {
    debug!("Source '{}': {error}", source.identity());
    report.failures += 1;
    if source.kind() != SourceKind::DateTemplatedFile {
        source.next_open = OpenMode::End;
    }
    source.record_failure(&error);
}
