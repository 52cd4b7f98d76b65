// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use super::scan::{ScanReport, Scanner};
use crate::context::CollectorContext;
use crate::error::Error;
use crate::signalling::{Receiver, Sender, Signal};
use log::{debug, error, trace};
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tracing::{span, Level};

/// Worker id type. This id is unique to each input worker thread and is the
/// index of the partition the worker scans.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct WorkerId(usize);

impl From<usize> for WorkerId {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl From<WorkerId> for usize {
    fn from(value: WorkerId) -> Self {
        value.0
    }
}

impl Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "W{}", self.0)
    }
}

/// An input worker thread scanning its partition once per trigger
pub struct Worker {
    id: WorkerId,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    /// Spawn a new input worker thread.
    ///
    /// The thread runs until its trigger channel is closed.
    pub fn new<R, S>(
        id: WorkerId,
        context: Arc<CollectorContext>,
        trigger: R,
        ready: S,
    ) -> Result<Worker, Error>
    where
        R: Receiver<Signal> + 'static,
        S: Sender<Signal> + 'static,
    {
        let thread_name = format!("lc-input-{id}").to_lowercase();
        let thread = thread::Builder::new()
            .name(thread_name)
            .spawn(move || run(id, context, trigger, ready))
            .map_err(|e| Error::Io((e, "failed to spawn input worker")))?;

        Ok(Worker { id, thread })
    }

    /// Wait for the worker thread to end
    pub fn join(self) {
        if self.thread.join().is_err() {
            debug!("Input worker {} panicked", self.id);
        }
    }
}

/// Worker thread main function
fn run<R, S>(wid: WorkerId, context: Arc<CollectorContext>, mut trigger: R, mut ready: S)
where
    R: Receiver<Signal> + 'static,
    S: Sender<Signal> + 'static,
{
    let mut scanner = Scanner::new(context.read_chunk_bytes);

    loop {
        // Wait for the collector to release this worker
        let signal = match trigger.recv() {
            Ok(signal) => signal,
            Err(_) => break,
        };
        if signal != Signal::Scan(wid) {
            debug!("Worker {wid} ignoring unexpected signal {signal}");
            continue;
        }

        let scanned = {
            let _span = span!(Level::INFO, "Scan", worker_id = %wid).entered();
            panic::catch_unwind(AssertUnwindSafe(|| {
                scanner.scan_assigned(&context, wid.into())
            }))
        };

        // Every release is answered with a ready signal
        let report = scanned.unwrap_or_else(|_| {
            error!("Worker {wid} panicked while scanning, continuing with fresh buffers");
            scanner = Scanner::new(context.read_chunk_bytes);
            ScanReport::default()
        });
        trace!("Worker {wid} finished scan: {report}");

        if ready.send(Signal::Ready((wid, report))).is_err() {
            break;
        }
    }

    debug!("Input worker {wid} shutting down");
}
