// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! The set of monitored sources.
//!
//! Sources live in index-stable slots. Removing a source leaves a tombstone
//! behind instead of shifting later sources, so indices handed out before a
//! removal stay valid until the scan plan is recomputed.

use crate::source::{Source, SourceKind, SourceSpec, SourceState};
use std::fmt::Display;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// A glob pattern and the members it currently owns
#[derive(Debug)]
pub struct GlobTemplate {
    /// Settings handed down to every member; `identity` is the pattern
    prototype: SourceSpec,
    /// Paths and registry indices of the current members
    children: Vec<(String, usize)>,
    last_rescan: Option<Instant>,
}

impl GlobTemplate {
    pub fn new(prototype: SourceSpec) -> Self {
        Self {
            prototype,
            children: Vec::new(),
            last_rescan: None,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.prototype.identity
    }

    pub fn prototype(&self) -> &SourceSpec {
        &self.prototype
    }

    pub fn children(&self) -> &[(String, usize)] {
        &self.children
    }

    pub fn owns(&self, path: &str) -> bool {
        self.children.iter().any(|(p, _)| p == path)
    }

    pub fn last_rescan(&self) -> Option<Instant> {
        self.last_rescan
    }

    pub(crate) fn mark_rescanned(&mut self, at: Instant) {
        self.last_rescan = Some(at);
    }

    fn adopt(&mut self, path: String, index: usize) {
        self.children.push((path, index));
    }

    fn release(&mut self, index: usize) {
        self.children.retain(|(_, i)| *i != index);
    }
}

/// Reasons for refusing to add a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// A live source with the same identity exists
    Duplicate(usize),
    /// The maximum number of monitored files is reached
    Full,
}

impl Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejected::Duplicate(index) => write!(f, "duplicate of source #{index}"),
            Rejected::Full => write!(f, "file limit reached"),
        }
    }
}

enum Slot {
    Live(Mutex<Source>),
    Tombstone,
}

/// Ordered, index-stable collection of all monitored sources
pub struct SourceRegistry {
    slots: Vec<Slot>,
    templates: Vec<GlobTemplate>,
    max_files: usize,
    live: usize,
    files: usize,
    generation: u64,
}

impl SourceRegistry {
    /// Create an empty registry monitoring at most `max_files` files.
    ///
    /// Command sources do not count toward the limit.
    pub fn new(max_files: usize) -> Self {
        Self {
            slots: Vec::new(),
            templates: Vec::new(),
            max_files,
            live: 0,
            files: 0,
            generation: 0,
        }
    }

    /// Indices of all live sources in registry order
    pub fn flatten(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| matches!(slot, Slot::Live(_)).then_some(i))
            .collect()
    }

    /// Number of live sources
    pub fn count(&self) -> usize {
        self.live
    }

    /// Number of live file-backed sources
    pub fn file_count(&self) -> usize {
        self.files
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Whether no more files may be added
    pub fn is_full(&self) -> bool {
        self.files >= self.max_files
    }

    /// Counter bumped by every structural change
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Add a source at the end of the registry and return its index
    pub fn append(&mut self, mut source: Source) -> Result<usize, Rejected> {
        let file_backed = source.kind().is_file_backed();
        if file_backed && self.is_full() {
            return Err(Rejected::Full);
        }
        if let Some(index) = self.find(source.identity()) {
            return Err(Rejected::Duplicate(index));
        }

        let index = self.slots.len();
        if let Some(owner) = source.owner() {
            match self.templates.get_mut(owner) {
                Some(template) => template.adopt(source.identity().to_owned(), index),
                None => source.owner = None,
            }
        }

        self.slots.push(Slot::Live(Mutex::new(source)));
        self.live += 1;
        if file_backed {
            self.files += 1;
        }
        self.generation += 1;
        Ok(index)
    }

    /// Remove the source at `index`, leaving a tombstone
    pub fn remove_at(&mut self, index: usize) -> Option<Source> {
        let slot = self.slots.get_mut(index)?;
        let Slot::Live(source) = std::mem::replace(slot, Slot::Tombstone) else {
            return None;
        };
        let source = source.into_inner().unwrap_or_else(PoisonError::into_inner);

        if let Some(template) = source.owner().and_then(|o| self.templates.get_mut(o)) {
            template.release(index);
        }
        self.live -= 1;
        if source.kind().is_file_backed() {
            self.files -= 1;
        }
        self.generation += 1;
        Some(source)
    }

    /// Lock the source at `index` for use by its owning worker
    pub fn lock(&self, index: usize) -> Option<MutexGuard<'_, Source>> {
        match self.slots.get(index)? {
            Slot::Live(source) => Some(source.lock().unwrap_or_else(PoisonError::into_inner)),
            Slot::Tombstone => None,
        }
    }

    /// Exclusive access to the source at `index`
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Source> {
        match self.slots.get_mut(index)? {
            Slot::Live(source) => Some(source.get_mut().unwrap_or_else(PoisonError::into_inner)),
            Slot::Tombstone => None,
        }
    }

    /// Index of the live source with the given identity
    pub fn find(&self, identity: &str) -> Option<usize> {
        self.slots.iter().position(|slot| match slot {
            Slot::Live(source) => {
                source.lock().unwrap_or_else(PoisonError::into_inner).identity() == identity
            }
            Slot::Tombstone => false,
        })
    }

    /// Indices of the glob members whose files vanished
    pub fn gone(&mut self) -> Vec<usize> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| match slot {
                Slot::Live(source) => {
                    let source = source.get_mut().unwrap_or_else(PoisonError::into_inner);
                    (source.state() == SourceState::Gone).then_some(i)
                }
                Slot::Tombstone => None,
            })
            .collect()
    }

    /// Add a configured source.
    ///
    /// Glob patterns become templates, everything else a source of its own.
    pub fn add_configured(&mut self, spec: &SourceSpec) -> Result<(), Rejected> {
        if spec.kind == SourceKind::GlobTemplate {
            if let Some(index) = self.templates.iter().position(|t| t.pattern() == spec.identity) {
                return Err(Rejected::Duplicate(index));
            }
            self.add_template(GlobTemplate::new(spec.clone()));
            return Ok(());
        }
        self.append(Source::from_spec(spec)).map(|_| ())
    }

    /// Register a glob template and return its index
    pub fn add_template(&mut self, template: GlobTemplate) -> usize {
        self.templates.push(template);
        self.templates.len() - 1
    }

    pub fn templates(&self) -> &[GlobTemplate] {
        &self.templates
    }

    pub(crate) fn template_mut(&mut self, index: usize) -> Option<&mut GlobTemplate> {
        self.templates.get_mut(index)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record;

    fn file(path: &str) -> Source {
        Source::from_spec(&SourceSpec::new(
            path,
            SourceKind::StaticFile,
            "syslog",
            record::channels(["agent"]),
        ))
    }

    fn command(cmd: &str) -> Source {
        Source::from_spec(&SourceSpec::new(
            cmd,
            SourceKind::CommandOutput,
            "command",
            record::channels(["agent"]),
        ))
    }

    #[test]
    fn removal_keeps_indices_stable() {
        let mut registry = SourceRegistry::new(10);
        let a = registry.append(file("/a")).unwrap();
        let b = registry.append(file("/b")).unwrap();
        let c = registry.append(file("/c")).unwrap();
        assert_eq!((a, b, c), (0, 1, 2));

        let removed = registry.remove_at(b).unwrap();
        assert_eq!(removed.identity(), "/b");
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.flatten(), vec![0, 2]);
        assert_eq!(registry.lock(c).unwrap().identity(), "/c");
        assert!(registry.lock(b).is_none());
        assert!(registry.remove_at(b).is_none());

        // New sources are appended, tombstones are not reused
        assert_eq!(registry.append(file("/d")).unwrap(), 3);
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut registry = SourceRegistry::new(10);
        registry.append(file("/a")).unwrap();
        assert_eq!(registry.append(file("/a")), Err(Rejected::Duplicate(0)));

        // A removed identity may come back
        registry.remove_at(0);
        assert_eq!(registry.append(file("/a")), Ok(1));
    }

    #[test]
    fn file_limit_excludes_commands() {
        let mut registry = SourceRegistry::new(2);
        registry.append(file("/a")).unwrap();
        registry.append(command("uptime")).unwrap();
        registry.append(file("/b")).unwrap();
        assert!(registry.is_full());
        assert_eq!(registry.append(file("/c")), Err(Rejected::Full));
        assert!(registry.append(command("df -h")).is_ok());
        assert_eq!(registry.count(), 4);
        assert_eq!(registry.file_count(), 2);
    }

    #[test]
    fn members_are_tracked_by_their_template() {
        let mut registry = SourceRegistry::new(10);
        let prototype = SourceSpec::new(
            "/var/log/*.log",
            SourceKind::GlobTemplate,
            "syslog",
            record::channels(["agent"]),
        );
        let t = registry.add_template(GlobTemplate::new(prototype.clone()));

        let index = registry
            .append(Source::expanded(&prototype, "/var/log/a.log".into(), t))
            .unwrap();
        assert!(registry.templates()[t].owns("/var/log/a.log"));

        let generation = registry.generation();
        registry.remove_at(index);
        assert!(!registry.templates()[t].owns("/var/log/a.log"));
        assert!(registry.generation() > generation);
    }

    #[test]
    fn configured_globs_become_templates() {
        let mut registry = SourceRegistry::new(10);
        let glob = SourceSpec::new(
            "/var/log/*.log",
            SourceKind::GlobTemplate,
            "syslog",
            record::channels(["agent"]),
        );
        registry.add_configured(&glob).unwrap();
        assert_eq!(registry.add_configured(&glob), Err(Rejected::Duplicate(0)));
        assert_eq!(registry.templates().len(), 1);
        assert_eq!(registry.count(), 0);

        let file = SourceSpec::new(
            "/var/log/syslog",
            SourceKind::StaticFile,
            "syslog",
            record::channels(["agent"]),
        );
        registry.add_configured(&file).unwrap();
        assert_eq!(registry.add_configured(&file), Err(Rejected::Duplicate(0)));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn gone_lists_vanished_members() {
        let mut registry = SourceRegistry::new(10);
        registry.append(file("/a")).unwrap();
        registry.append(file("/b")).unwrap();
        registry.get_mut(1).unwrap().state = SourceState::Gone;
        assert_eq!(registry.gone(), vec![1]);
    }
}
