// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use crate::worker_pool::{ScanReport, WorkerId};
use std::fmt::Display;

/// Signals exchanged between the collector and its input workers
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Signal {
    // Sent by the collector to release a worker for one scan of its partition
    Scan(WorkerId),

    // Sent by a worker once its scan is finished
    Ready((WorkerId, ScanReport)),
}

impl Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Scan(id) => write!(f, "Scan({id})"),
            Signal::Ready((id, report)) => write!(f, "Ready({id}, {report})"),
        }
    }
}
