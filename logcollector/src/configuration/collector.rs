// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Collector builder

use super::file::Config;
use crate::collector::Collector;
use crate::context::CollectorContext;
use crate::dispatch::DispatchQueueFanout;
use crate::error::Error;
use crate::forwarder::{OutputForwarder, SocketTransport, Transport};
use crate::registry::{Rejected, SourceRegistry};
use crate::tracker::{FileStateTracker, FileSystem, LocalFileSystem};
use log::{info, warn};
use std::sync::Arc;

/// Builds a [Collector] and its output forwarders from a [Config]
pub struct Builder {
    config: Config,
    file_system: Option<Arc<dyn FileSystem>>,
    transport: Option<Arc<dyn Transport>>,
}

impl Builder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            file_system: None,
            transport: None,
        }
    }

    /// Set the file system the sources are read from (default: the local one)
    pub fn file_system(mut self, file_system: Arc<dyn FileSystem>) -> Self {
        self.file_system = Some(file_system);
        self
    }

    /// Set the transport used by the forwarders (default: one Unix datagram
    /// socket per channel)
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the collector and spawn its input workers.
    ///
    /// No forwarders are started: records stay in the channel queues.
    pub fn build(self) -> Result<Collector, Error> {
        let config = &self.config;
        config.validate()?;

        let fanout = Arc::new(DispatchQueueFanout::new(
            config.channel_names(),
            config.queue_capacity,
        ));

        let mut registry = SourceRegistry::new(config.max_files);
        for spec in config.source_specs() {
            match registry.add_configured(&spec) {
                Ok(()) => info!("Monitoring {} '{}'", spec.kind, spec.identity),
                Err(Rejected::Duplicate(_)) => {
                    warn!("Duplicated log source '{}', skipping", spec.identity)
                }
                Err(Rejected::Full) => warn!(
                    "Maximum number of files ({}) reached, not monitoring '{}'",
                    config.max_files, spec.identity
                ),
            }
        }

        let file_system = self
            .file_system
            .unwrap_or_else(|| Arc::new(LocalFileSystem));
        let context = Arc::new(CollectorContext::new(
            registry,
            fanout,
            FileStateTracker::new(file_system),
            &config.admin_channel,
            config.read_chunk_bytes,
        ));

        Collector::new(context, config.worker_count, config.cycle_interval())
    }

    /// Build the collector and start one output forwarder per channel
    pub fn spawn(mut self) -> Result<(Collector, Vec<OutputForwarder>), Error> {
        let transport = self.transport.take().unwrap_or_else(|| {
            Arc::new(SocketTransport::new(self.config.channel_endpoints()))
        });
        let channels = self.config.channel_names();

        let collector = self.build()?;
        let fanout = collector.context().fanout();
        let forwarders = channels
            .into_iter()
            .map(|channel| OutputForwarder::spawn(channel, Arc::clone(fanout), Arc::clone(&transport)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((collector, forwarders))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::configuration::SourceConfig;
    use crate::source::SourceKind;

    fn source(identity: &str) -> SourceConfig {
        SourceConfig {
            identity: identity.to_owned(),
            kind: None,
            format: "syslog".to_owned(),
            channels: None,
            ignore_threshold: None,
            frequency_secs: None,
            alias: None,
        }
    }

    #[test]
    fn duplicates_and_excess_files_are_skipped() {
        let config = Config {
            worker_count: 2,
            max_files: 2,
            sources: vec![
                source("/var/log/a.log"),
                source("/var/log/a.log"),
                source("/var/log/b.log"),
                source("/var/log/c.log"),
                source("/var/log/*.gz"),
                SourceConfig {
                    format: "command".to_owned(),
                    ..source("uptime")
                },
            ],
            ..Config::default()
        };

        let collector = Builder::new(config).build().unwrap();
        {
            let mut registry = collector.context().registry_mut();
            assert_eq!(registry.count(), 3);
            assert_eq!(registry.file_count(), 2);
            assert_eq!(registry.templates().len(), 1);
            let index = registry.find("uptime").unwrap();
            assert_eq!(registry.get_mut(index).unwrap().kind(), SourceKind::CommandOutput);
        }
        collector.shutdown();
    }

    #[test]
    fn invalid_configuration_is_refused() {
        let config = Config {
            worker_count: 0,
            ..Config::default()
        };
        assert!(matches!(Builder::new(config).build(), Err(Error::Config(_))));
    }
}
