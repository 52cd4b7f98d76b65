// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Log collector daemon

use anyhow::{Context, Error};
use argh::FromArgs;
use log::{info, LevelFilter};
use logcollector::prelude::*;
use logcollector::template::init_local_offset;
use std::path::PathBuf;

/// Configuration used unless given on the command line
const DEFAULT_CONFIG_PATH: &str = "/etc/logcollector/logcollector.json";

#[derive(FromArgs)]
#[argh(help_triggers("-h", "--help", "help"))]
/// Collect logs from files and commands and forward them to their channels
struct Args {
    #[argh(description = "configuration file")]
    #[argh(option, short = 'c', default = "PathBuf::from(DEFAULT_CONFIG_PATH)")]
    config: PathBuf,

    #[argh(description = "log level")]
    #[argh(option, short = 'l')]
    log_level: Option<LevelFilter>,

    #[argh(description = "write the log to this file")]
    #[argh(option, short = 'o')]
    log_file: Option<PathBuf>,

    #[argh(description = "validate the configuration and exit")]
    #[argh(switch, short = 't')]
    test: bool,
}

fn main() -> Result<(), Error> {
    let Args {
        config,
        log_level,
        log_file,
        test,
    } = argh::from_env();

    // The local offset can only be determined while single threaded
    init_local_offset();

    logcollector_logger::init(
        log_level.unwrap_or(LevelFilter::Info),
        log_file.is_none(),
        log_file.as_deref(),
    )?;

    let config = Config::load(&config)
        .with_context(|| format!("failed to load configuration {}", config.display()))?;

    if test {
        info!(
            "Configuration is valid: {} sources, {} channels",
            config.sources.len(),
            config.channel_names().len()
        );
        return Ok(());
    }

    info!("Starting logcollectord");

    let (mut collector, forwarders) = Builder::new(config).spawn()?;
    for forwarder in &forwarders {
        info!("Forwarding channel '{}'", forwarder.channel());
    }

    collector.run()?;
    Ok(())
}
