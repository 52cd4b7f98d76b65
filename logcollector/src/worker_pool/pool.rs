// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use super::scan::ScanReport;
use super::worker::{Worker, WorkerId};
use crate::context::CollectorContext;
use crate::error::Error;
use crate::signalling::{self, Sender, Signal};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Releases the workers of a pool for a scan
pub struct WorkerPoolTrigger {
    trigger_senders: BTreeMap<WorkerId, Box<dyn Sender<Signal>>>,
}

impl WorkerPoolTrigger {
    /// Release every worker of the pool
    pub fn trigger_all(&mut self) -> Result<(), Error> {
        for (worker_id, sender) in self.trigger_senders.iter_mut() {
            sender.send(Signal::Scan(*worker_id))?;
        }
        Ok(())
    }
}

/// Collects the ready signals of the workers of a pool
pub struct WorkerPoolListener {
    workers_ready: BTreeMap<WorkerId, bool>,
    ready_receiver: Box<dyn signalling::Receiver<Signal>>,
}

impl WorkerPoolListener {
    /// Create a new worker pool listener
    pub fn new(
        worker_ids: &[WorkerId],
        ready_receiver: impl signalling::Receiver<Signal> + 'static,
    ) -> WorkerPoolListener {
        let workers_ready = worker_ids.iter().map(|id| (*id, false)).collect();
        WorkerPoolListener {
            workers_ready,
            ready_receiver: Box::new(ready_receiver),
        }
    }

    /// Wait until the next ready signal has been received
    pub fn wait_next_ready(&mut self) -> Result<(WorkerId, ScanReport), Error> {
        loop {
            if let Signal::Ready((worker_id, report)) = self.ready_receiver.recv()? {
                self.workers_ready.insert(worker_id, true);
                return Ok((worker_id, report));
            }
        }
    }

    /// Wait until every worker has reported ready and sum up their reports
    pub fn wait_all_ready(&mut self) -> Result<ScanReport, Error> {
        let mut total = ScanReport::default();
        while !self.is_all_ready() {
            let (_, report) = self.wait_next_ready()?;
            total.merge(&report);
        }
        Ok(total)
    }

    /// Clear all ready flags
    pub fn clear_ready(&mut self) {
        self.workers_ready.values_mut().for_each(|v| *v = false);
    }

    /// Check if all ready flags are set
    pub fn is_all_ready(&self) -> bool {
        self.workers_ready.values().all(|v| *v)
    }
}

/// A pool of input worker threads
pub struct WorkerPool {
    workers: Vec<Worker>,
    worker_ids: Vec<WorkerId>,
    trigger: WorkerPoolTrigger,
}

impl WorkerPool {
    /// Spawn `worker_count` input workers scanning the partitions of `context`
    pub fn new(
        worker_count: usize,
        context: &Arc<CollectorContext>,
        ready_sender: &(impl Sender<Signal> + Clone + 'static),
    ) -> Result<WorkerPool, Error> {
        if worker_count == 0 {
            return Err(Error::Config("at least one input worker is required".into()));
        }

        let mut trigger_senders: BTreeMap<WorkerId, Box<dyn Sender<Signal>>> = BTreeMap::new();
        let mut workers = Vec::with_capacity(worker_count);
        let mut worker_ids = Vec::with_capacity(worker_count);

        for id in (0..worker_count).map(WorkerId::from) {
            let (trigger_sender, trigger_receiver) = signalling::channel();
            trigger_senders.insert(id, Box::new(trigger_sender));
            worker_ids.push(id);
            workers.push(Worker::new(
                id,
                Arc::clone(context),
                trigger_receiver,
                ready_sender.clone(),
            )?);
        }

        Ok(WorkerPool {
            workers,
            worker_ids,
            trigger: WorkerPoolTrigger { trigger_senders },
        })
    }

    /// Create a listener to this worker pool
    pub fn listener(
        &self,
        ready_receiver: impl signalling::Receiver<Signal> + 'static,
    ) -> WorkerPoolListener {
        WorkerPoolListener::new(&self.worker_ids, ready_receiver)
    }

    /// Split the worker pool into its workers and a [WorkerPoolTrigger]
    pub fn split(self) -> (Vec<Worker>, WorkerPoolTrigger) {
        (self.workers, self.trigger)
    }
}
