// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! A host log collector: tails files, glob-matched file families, dated files
//! and command output, and forwards the extracted records to named channels.
//!
//! # Sources
//!
//! Everything being watched is a [Source](crate::source::Source) in the
//! [SourceRegistry](crate::registry::SourceRegistry). Glob patterns are kept
//! as [templates](crate::registry::GlobTemplate) whose matches are added as
//! sources of their own by the [GlobExpander](crate::glob_expander::GlobExpander).
//! Open handles, rotation and truncation are tracked by the
//! [FileStateTracker](crate::tracker::FileStateTracker).
//!
//! # Cycles
//!
//! The [Collector](crate::collector::Collector) drives a fixed pool of input
//! workers. Each cycle it updates the registry while all workers are idle,
//! [partitions](crate::partition) the sources among the workers, releases
//! them and waits until all of them are done.
//!
//! # Forwarding
//!
//! Workers push records into per-channel bounded queues
//! ([DispatchQueueFanout](crate::dispatch::DispatchQueueFanout)). One
//! [OutputForwarder](crate::forwarder::OutputForwarder) per channel delivers
//! them through a [Transport](crate::forwarder::Transport).

pub mod collector;
pub mod command;
pub mod configuration;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod forwarder;
pub mod glob_expander;
pub mod partition;
pub mod record;
pub mod registry;
pub mod signalling;
pub mod source;
pub mod template;
pub mod tracker;
pub mod worker_pool;

/// Re-export the public API
pub mod prelude {
    pub use crate::collector::Collector;
    pub use crate::configuration::{self, Builder, Config};
    pub use crate::dispatch::{DispatchQueue, DispatchQueueFanout};
    pub use crate::error::{Error, SourceError};
    pub use crate::forwarder::{OutputForwarder, SocketTransport, Transport};
    pub use crate::record::Record;
    pub use crate::source::{SourceKind, SourceSpec, SourceState};
    pub use crate::tracker::{FileSystem, LocalFileSystem};
    pub use crate::worker_pool::{ScanReport, WorkerId};
}
