// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! The JSON configuration file

use crate::error::Error;
use crate::record;
use crate::source::{SourceKind, SourceSpec, DEFAULT_IGNORE_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Channel that always exists
pub const AGENT_CHANNEL: &str = "agent";

/// Socket of the [AGENT_CHANNEL] unless configured otherwise
pub const DEFAULT_AGENT_SOCKET: &str = "/run/logcollector/queue";

/// Format of sources that do not name one
pub const DEFAULT_FORMAT: &str = "syslog";

/// A destination channel and the socket its records are sent to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub socket: PathBuf,
}

/// One configured source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// File path, glob pattern, dated path or command line
    pub identity: String,
    /// Inferred from identity and format when missing
    #[serde(default)]
    pub kind: Option<SourceKind>,
    #[serde(default = "default_format")]
    pub format: String,
    /// Defaults to the agent channel
    #[serde(default)]
    pub channels: Option<Vec<String>>,
    #[serde(default)]
    pub ignore_threshold: Option<u32>,
    /// Interval between two runs of a command
    #[serde(default)]
    pub frequency_secs: Option<u64>,
    /// Name of a command in its records
    #[serde(default)]
    pub alias: Option<String>,
}

impl SourceConfig {
    /// The configured kind, or the one inferred from identity and format
    pub fn kind(&self) -> SourceKind {
        self.kind
            .unwrap_or_else(|| SourceKind::infer(&self.identity, &self.format))
    }
}

/// Complete collector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Number of input workers
    pub worker_count: usize,
    /// Maximum number of monitored files
    pub max_files: usize,
    pub cycle_interval_secs: u64,
    /// Capacity of every channel queue, in records
    pub queue_capacity: usize,
    /// Bytes read from a file per cycle
    pub read_chunk_bytes: usize,
    /// Channel receiving heartbeats and collector notices
    pub admin_channel: String,
    /// Ignore threshold of sources that do not set their own
    pub open_attempts: u32,
    pub channels: Vec<ChannelConfig>,
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_count: 4,
            max_files: 1000,
            cycle_interval_secs: 1,
            queue_capacity: 1024,
            read_chunk_bytes: 64 * 1024,
            admin_channel: AGENT_CHANNEL.to_owned(),
            open_attempts: DEFAULT_IGNORE_THRESHOLD,
            channels: Vec::new(),
            sources: Vec::new(),
        }
    }
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_owned()
}

impl Config {
    /// Read and validate the configuration file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Config, Error> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Io((e, "failed to read configuration file")))?;
        Self::parse(&content)
    }

    /// Parse and validate a configuration
    pub fn parse(content: &str) -> Result<Config, Error> {
        let config: Config =
            serde_json::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    /// All channels with their sockets, the agent channel first
    pub fn channel_endpoints(&self) -> Vec<(String, PathBuf)> {
        let mut endpoints = Vec::with_capacity(self.channels.len() + 1);
        if !self.channels.iter().any(|c| c.name == AGENT_CHANNEL) {
            endpoints.push((AGENT_CHANNEL.to_owned(), PathBuf::from(DEFAULT_AGENT_SOCKET)));
        }
        endpoints.extend(
            self.channels
                .iter()
                .map(|c| (c.name.clone(), c.socket.clone())),
        );
        endpoints
    }

    /// Names of all channels
    pub fn channel_names(&self) -> Vec<String> {
        self.channel_endpoints()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    /// Check the configuration for consistency
    pub fn validate(&self) -> Result<(), Error> {
        let positive = [
            ("worker_count", self.worker_count),
            ("max_files", self.max_files),
            ("queue_capacity", self.queue_capacity),
            ("read_chunk_bytes", self.read_chunk_bytes),
            ("cycle_interval_secs", self.cycle_interval_secs as usize),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(Error::Config(format!("'{name}' must be greater than zero")));
        }

        let mut declared = HashSet::from([AGENT_CHANNEL]);
        for channel in &self.channels {
            if channel.name.is_empty() {
                return Err(Error::Config("channel without a name".into()));
            }
            if channel.name != AGENT_CHANNEL && !declared.insert(channel.name.as_str()) {
                return Err(Error::Config(format!(
                    "channel '{}' declared twice",
                    channel.name
                )));
            }
        }

        if !declared.contains(self.admin_channel.as_str()) {
            return Err(Error::Config(format!(
                "admin channel '{}' is not declared",
                self.admin_channel
            )));
        }

        for source in &self.sources {
            if source.identity.trim().is_empty() {
                return Err(Error::Config("source without identity".into()));
            }

            if let Some(channels) = &source.channels {
                if channels.is_empty() {
                    return Err(Error::Config(format!(
                        "source '{}' has an empty channel list",
                        source.identity
                    )));
                }
                if let Some(unknown) = channels.iter().find(|c| !declared.contains(c.as_str())) {
                    return Err(Error::Config(format!(
                        "source '{}' targets undeclared channel '{unknown}'",
                        source.identity
                    )));
                }
            }

            let is_command_format = matches!(source.format.as_str(), "command" | "full_command");
            let is_command_kind = source.kind == Some(SourceKind::CommandOutput);
            if source.kind.is_some() && is_command_format != is_command_kind {
                return Err(Error::Config(format!(
                    "source '{}': format '{}' does not fit kind {:?}",
                    source.identity, source.format, source.kind
                )));
            }

            if source.kind == Some(SourceKind::GlobExpandedFile) {
                return Err(Error::Config(format!(
                    "source '{}': glob members can not be configured",
                    source.identity
                )));
            }

            if source.kind() == SourceKind::GlobTemplate {
                glob::Pattern::new(&source.identity)
                    .map_err(|e| Error::Glob(format!("'{}': {e}", source.identity)))?;
            }
        }

        Ok(())
    }

    /// Source descriptions in configuration order
    pub fn source_specs(&self) -> Vec<SourceSpec> {
        self.sources
            .iter()
            .map(|source| {
                let kind = source.kind();
                let channels = match &source.channels {
                    Some(channels) => record::channels(channels.iter().map(String::as_str)),
                    None => record::channels([AGENT_CHANNEL]),
                };

                let mut spec = SourceSpec::new(&*source.identity, kind, &*source.format, channels)
                    .ignore_threshold(source.ignore_threshold.unwrap_or(self.open_attempts));
                if let Some(secs) = source.frequency_secs {
                    spec = spec.frequency(Duration::from_secs(secs));
                }
                if let Some(alias) = &source.alias {
                    spec = spec.alias(alias.as_str());
                }
                spec
            })
            .collect()
    }
}
