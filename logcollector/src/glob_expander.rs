// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Discovery of files matching glob templates

use crate::registry::{Rejected, SourceRegistry};
use crate::source::Source;
use crate::template::resolve_templated_name;
use log::{debug, info, trace, warn};
use std::time::Instant;
use time::OffsetDateTime;

/// Rescans the glob templates of a registry and adds newly matching files.
///
/// Members whose path stops matching are kept. They are only removed once
/// their file is found to be gone.
#[derive(Debug, Default)]
pub struct GlobExpander {
    limit_reported: bool,
}

impl GlobExpander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate every template of `registry` and append the new matches.
    ///
    /// Date placeholders in a pattern are resolved against `now` first.
    /// Matches are appended in the order the glob walk yields them. Returns
    /// the number of sources added.
    pub fn rescan(&mut self, registry: &mut SourceRegistry, now: OffsetDateTime) -> usize {
        if !registry.is_full() {
            self.limit_reported = false;
        }

        let mut added = 0;
        for index in 0..registry.templates().len() {
            let template = &registry.templates()[index];
            let pattern = resolve_templated_name(template.pattern(), now);
            let prototype = template.prototype().clone();

            let paths = match glob::glob(&pattern) {
                Ok(paths) => paths,
                Err(e) => {
                    debug!("Invalid glob pattern '{pattern}': {e}");
                    continue;
                }
            };

            for entry in paths {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        debug!("Skipping unreadable match of '{pattern}': {e}");
                        continue;
                    }
                };
                if path.is_dir() {
                    continue;
                }
                let Some(path) = path.to_str().map(str::to_owned) else {
                    debug!("Skipping non UTF-8 match of '{pattern}': {}", path.display());
                    continue;
                };
                if registry.templates()[index].owns(&path) {
                    continue;
                }

                match registry.append(Source::expanded(&prototype, path.clone(), index)) {
                    Ok(_) => {
                        info!("New file '{path}' matching '{}'", prototype.identity);
                        added += 1;
                    }
                    Err(Rejected::Duplicate(other)) => {
                        trace!("File '{path}' is already monitored as source #{other}");
                    }
                    Err(Rejected::Full) => {
                        if !self.limit_reported {
                            warn!(
                                "Maximum number of files ({}) reached, not monitoring '{path}'",
                                registry.max_files()
                            );
                            self.limit_reported = true;
                        } else {
                            debug!("File limit reached, not monitoring '{path}'");
                        }
                        break;
                    }
                }
            }

            if let Some(template) = registry.template_mut(index) {
                template.mark_rescanned(Instant::now());
            }
        }
        added
    }
}
