// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

mod pool;
mod scan;
mod worker;

pub use pool::{WorkerPool, WorkerPoolListener, WorkerPoolTrigger};
pub use scan::ScanReport;
pub use worker::{Worker, WorkerId};
