// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Division of the monitored sources among the input workers.
//!
//! Ranges index into the flattened list of live registry slots, so tombstones
//! never occupy a worker. A [ScanPlan] is only valid for the registry
//! generation it was computed from.

use crate::registry::SourceRegistry;
use std::ops::Range;

/// Contiguous, half-open range of positions in the flattened source list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionRange {
    pub start: usize,
    pub end: usize,
}

impl PartitionRange {
    /// Range of a worker without sources
    pub const EMPTY: PartitionRange = PartitionRange { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Split `source_count` positions into one range per worker.
///
/// Each worker gets `ceil(source_count / worker_count)` consecutive positions,
/// the last non-empty range ending at `source_count`. Workers left over get
/// [PartitionRange::EMPTY].
pub fn compute_ranges(source_count: usize, worker_count: usize) -> Vec<PartitionRange> {
    if worker_count == 0 {
        return Vec::new();
    }

    let per_worker = source_count.div_ceil(worker_count);
    (0..worker_count)
        .map(|worker| {
            let start = worker * per_worker;
            if start >= source_count {
                PartitionRange::EMPTY
            } else {
                PartitionRange::new(start, (start + per_worker).min(source_count))
            }
        })
        .collect()
}

/// Assignment of live sources to workers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPlan {
    order: Vec<usize>,
    ranges: Vec<PartitionRange>,
    generation: Option<u64>,
}

impl ScanPlan {
    /// Registry indices assigned to `worker`, in registry order
    pub fn indices_for(&self, worker: usize) -> &[usize] {
        match self.ranges.get(worker) {
            Some(range) if !range.is_empty() => &self.order[range.as_range()],
            _ => &[],
        }
    }

    pub fn ranges(&self) -> &[PartitionRange] {
        &self.ranges
    }

    /// Number of sources covered by the plan
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether the plan still matches the registry's current contents
    pub fn is_current(&self, registry: &SourceRegistry) -> bool {
        self.generation == Some(registry.generation())
    }
}

/// Produces scan plans for a fixed number of workers
#[derive(Debug, Clone, Copy)]
pub struct WorkPartitioner {
    worker_count: usize,
}

impl WorkPartitioner {
    pub fn new(worker_count: usize) -> Self {
        Self { worker_count }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Recompute `plan` unless it still matches `registry`.
    ///
    /// Returns whether the plan changed.
    pub fn refresh(&self, plan: &mut ScanPlan, registry: &SourceRegistry) -> bool {
        if plan.is_current(registry) {
            return false;
        }
        *plan = self.plan(registry);
        true
    }

    pub fn plan(&self, registry: &SourceRegistry) -> ScanPlan {
        let order = registry.flatten();
        let ranges = compute_ranges(order.len(), self.worker_count);
        ScanPlan {
            order,
            ranges,
            generation: Some(registry.generation()),
        }
    }
}
