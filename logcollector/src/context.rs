// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! State shared between the collector and its input workers

use crate::dispatch::DispatchQueueFanout;
use crate::partition::ScanPlan;
use crate::record::{self, Channels, Record};
use crate::registry::SourceRegistry;
use crate::tracker::FileStateTracker;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Location of records created by the collector itself
pub const COLLECTOR_LOCATION: &str = "logcollector";

/// Everything the input workers need for a scan.
///
/// Workers only take read locks, and only while scanning. The collector takes
/// the write locks between cycles, when every worker has reported ready, so
/// the locks are never contended.
pub struct CollectorContext {
    registry: RwLock<SourceRegistry>,
    plan: RwLock<ScanPlan>,
    pub(crate) fanout: Arc<DispatchQueueFanout>,
    pub(crate) tracker: FileStateTracker,
    pub(crate) admin_channel: Channels,
    pub(crate) read_chunk_bytes: usize,
}

impl CollectorContext {
    pub fn new(
        registry: SourceRegistry,
        fanout: Arc<DispatchQueueFanout>,
        tracker: FileStateTracker,
        admin_channel: &str,
        read_chunk_bytes: usize,
    ) -> Self {
        Self {
            registry: RwLock::new(registry),
            plan: RwLock::new(ScanPlan::default()),
            fanout,
            tracker,
            admin_channel: record::channels([admin_channel]),
            read_chunk_bytes: read_chunk_bytes.max(1),
        }
    }

    pub fn registry(&self) -> RwLockReadGuard<'_, SourceRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn registry_mut(&self) -> RwLockWriteGuard<'_, SourceRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn plan(&self) -> RwLockReadGuard<'_, ScanPlan> {
        self.plan.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn plan_mut(&self) -> RwLockWriteGuard<'_, ScanPlan> {
        self.plan.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fanout(&self) -> &Arc<DispatchQueueFanout> {
        &self.fanout
    }

    /// Push a collector-generated message on the admin channel
    pub(crate) fn notify(&self, message: String) {
        let record = Record::new(
            message,
            COLLECTOR_LOCATION,
            "syslog",
            self.admin_channel.clone(),
        );
        self.fanout.push_record(record);
    }
}
