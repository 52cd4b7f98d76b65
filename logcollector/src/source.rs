// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Monitored sources

use crate::error::SourceError;
use crate::extract::{self, Extractor};
use crate::record::Channels;
use crate::template;
use crate::tracker::HandleState;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of tolerated consecutive failures of a source
pub const DEFAULT_IGNORE_THRESHOLD: u32 = 8;

/// Default interval between two runs of a command source
pub const DEFAULT_COMMAND_FREQUENCY: Duration = Duration::from_secs(360);

/// What a source is
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A plain file at a fixed path
    StaticFile,
    /// A glob pattern whose matches become [SourceKind::GlobExpandedFile]s
    GlobTemplate,
    /// A file found by a glob template
    GlobExpandedFile,
    /// A file whose path contains date placeholders
    DateTemplatedFile,
    /// The output of a periodically executed command
    CommandOutput,
}

impl SourceKind {
    /// Derive the kind of a configured source from its identity and format
    pub fn infer(identity: &str, format: &str) -> Self {
        if matches!(format, "command" | "full_command") {
            SourceKind::CommandOutput
        } else if identity.contains(&['*', '?', '['][..]) {
            SourceKind::GlobTemplate
        } else if template::has_date_placeholders(identity) {
            SourceKind::DateTemplatedFile
        } else {
            SourceKind::StaticFile
        }
    }

    /// Whether sources of this kind are read through a file handle
    pub fn is_file_backed(&self) -> bool {
        !matches!(self, SourceKind::CommandOutput | SourceKind::GlobTemplate)
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceKind::StaticFile => "file",
            SourceKind::GlobTemplate => "glob",
            SourceKind::GlobExpandedFile => "glob member",
            SourceKind::DateTemplatedFile => "dated file",
            SourceKind::CommandOutput => "command",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Scanned every cycle
    Active,
    /// Exceeded its ignore threshold; kept but never retried
    Ignored,
    /// A glob member whose file vanished; removed at the next barrier
    Gone,
}

/// Where the next open of a file positions the handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Start,
    End,
}

/// Static description of a source: what to watch and where to send it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub identity: String,
    pub kind: SourceKind,
    pub format: String,
    pub channels: Channels,
    pub ignore_threshold: u32,
    pub frequency: Duration,
    pub alias: Option<String>,
}

impl SourceSpec {
    pub fn new(
        identity: impl Into<String>,
        kind: SourceKind,
        format: impl Into<String>,
        channels: Channels,
    ) -> Self {
        Self {
            identity: identity.into(),
            kind,
            format: format.into(),
            channels,
            ignore_threshold: DEFAULT_IGNORE_THRESHOLD,
            frequency: DEFAULT_COMMAND_FREQUENCY,
            alias: None,
        }
    }

    pub fn ignore_threshold(mut self, ignore_threshold: u32) -> Self {
        self.ignore_threshold = ignore_threshold;
        self
    }

    pub fn frequency(mut self, frequency: Duration) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// One monitored unit: a file, a glob member, a dated file or a command
pub struct Source {
    pub(crate) identity: String,
    pub(crate) kind: SourceKind,
    pub(crate) format: Arc<str>,
    pub(crate) channels: Channels,
    /// Location attached to records of this source
    pub(crate) location: Arc<str>,
    pub(crate) handle: Option<HandleState>,
    pub(crate) error_count: u32,
    pub(crate) ignore_threshold: u32,
    pub(crate) state: SourceState,
    pub(crate) next_open: OpenMode,
    /// Unresolved path of a dated file
    pub(crate) template: Option<String>,
    pub(crate) template_resolved: bool,
    pub(crate) frequency: Duration,
    pub(crate) last_run: Option<Instant>,
    /// Index of the owning glob template
    pub(crate) owner: Option<usize>,
    pub(crate) extractor: Box<dyn Extractor>,
}

impl Source {
    /// Create a source from its configuration.
    ///
    /// Configured files are read from their end on first open.
    pub fn from_spec(spec: &SourceSpec) -> Self {
        let alias = spec.alias.as_deref().unwrap_or(&spec.identity);
        let location: Arc<str> = match spec.kind {
            SourceKind::CommandOutput => alias.into(),
            _ => spec.identity.as_str().into(),
        };
        let template = (spec.kind == SourceKind::DateTemplatedFile).then(|| spec.identity.clone());

        Self {
            identity: spec.identity.clone(),
            kind: spec.kind,
            format: spec.format.as_str().into(),
            channels: spec.channels.clone(),
            location,
            handle: None,
            error_count: 0,
            ignore_threshold: spec.ignore_threshold,
            state: SourceState::Active,
            next_open: OpenMode::End,
            template,
            template_resolved: false,
            frequency: spec.frequency,
            last_run: None,
            owner: None,
            extractor: extract::for_format(&spec.format, alias),
        }
    }

    /// Create a glob member found by the template at index `owner`.
    ///
    /// Newly discovered files are read from their start.
    pub fn expanded(prototype: &SourceSpec, path: String, owner: usize) -> Self {
        let spec = SourceSpec {
            identity: path,
            kind: SourceKind::GlobExpandedFile,
            alias: None,
            ..prototype.clone()
        };
        let mut source = Self::from_spec(&spec);
        source.next_open = OpenMode::Start;
        source.owner = Some(owner);
        source
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    pub fn location(&self) -> &Arc<str> {
        &self.location
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn is_ignored(&self) -> bool {
        self.state == SourceState::Ignored
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<&HandleState> {
        self.handle.as_ref()
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn ignore_threshold(&self) -> u32 {
        self.ignore_threshold
    }

    pub fn owner(&self) -> Option<usize> {
        self.owner
    }

    /// Switch a dated file over to a newly resolved path
    pub(crate) fn set_identity(&mut self, identity: String) {
        self.location = identity.as_str().into();
        self.identity = identity;
    }

    /// Count a failure of this source.
    ///
    /// Once the error count exceeds the ignore threshold the source is closed
    /// and becomes ignored; this is reported exactly once. Returns whether the
    /// source became ignored with this failure.
    pub(crate) fn record_failure(&mut self, error: &SourceError) -> bool {
        if self.is_ignored() {
            return false;
        }

        self.error_count += 1;
        if self.error_count <= self.ignore_threshold {
            return false;
        }

        self.handle = None;
        self.state = SourceState::Ignored;
        info!(
            "Too many errors for {} '{}' (last: {}), ignoring it",
            self.kind, self.identity, error
        );
        true
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("identity", &self.identity)
            .field("kind", &self.kind)
            .field("format", &self.format)
            .field("channels", &self.channels)
            .field("handle", &self.handle)
            .field("error_count", &self.error_count)
            .field("ignore_threshold", &self.ignore_threshold)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record;

    #[test]
    fn infer_kind() {
        assert_eq!(
            SourceKind::infer("/var/log/syslog", "syslog"),
            SourceKind::StaticFile
        );
        assert_eq!(
            SourceKind::infer("/var/log/*.log", "syslog"),
            SourceKind::GlobTemplate
        );
        assert_eq!(
            SourceKind::infer("/var/log/app-%Y-%m-%d.log", "syslog"),
            SourceKind::DateTemplatedFile
        );
        assert_eq!(
            SourceKind::infer("df -P", "full_command"),
            SourceKind::CommandOutput
        );
    }

    #[test]
    fn becomes_ignored_after_threshold() {
        let spec = SourceSpec::new(
            "/var/log/app.log",
            SourceKind::StaticFile,
            "syslog",
            record::channels(["agent"]),
        )
        .ignore_threshold(2);
        let mut source = Source::from_spec(&spec);

        assert!(!source.record_failure(&SourceError::Gone));
        assert!(!source.record_failure(&SourceError::Gone));
        assert!(source.record_failure(&SourceError::Gone));
        assert!(source.is_ignored());

        // Reported once, counting stops
        assert!(!source.record_failure(&SourceError::Gone));
        assert_eq!(source.error_count(), 3);
    }

    #[test]
    fn expanded_sources_read_from_start() {
        let prototype = SourceSpec::new(
            "/var/log/*.log",
            SourceKind::GlobTemplate,
            "json",
            record::channels(["agent", "siem"]),
        );
        let source = Source::expanded(&prototype, "/var/log/a.log".to_owned(), 3);

        assert_eq!(source.kind(), SourceKind::GlobExpandedFile);
        assert_eq!(source.next_open, OpenMode::Start);
        assert_eq!(source.owner(), Some(3));
        assert_eq!(source.format(), "json");
        assert_eq!(source.channels().len(), 2);
        assert_eq!(&**source.location(), "/var/log/a.log");
    }

    #[test]
    fn commands_are_located_by_alias() {
        let spec = SourceSpec::new(
            "netstat -tulpn",
            SourceKind::CommandOutput,
            "full_command",
            record::channels(["agent"]),
        )
        .alias("netstat listening ports");
        let source = Source::from_spec(&spec);
        assert_eq!(&**source.location(), "netstat listening ports");
    }
}
