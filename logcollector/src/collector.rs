// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! The top-level collection loop.
//!
//! Every cycle runs through the same steps:
//!
//! 1. Barrier window: all input workers are idle. Vanished glob members are
//!    removed, glob templates are rescanned and the scan plan is recomputed
//!    if the registry changed.
//! 2. Release: every input worker is triggered for one scan of its partition.
//! 3. Barrier: the collector waits for all workers to report ready.
//! 4. Heartbeat: one keep-alive record is pushed on the admin channel.
//! 5. Sleep until the cycle interval has passed.
//!
//! The registry and the scan plan are only mutated in step 1.

use crate::context::CollectorContext;
use crate::error::Error;
use crate::glob_expander::GlobExpander;
use crate::partition::WorkPartitioner;
use crate::record::Record;
use crate::signalling;
use crate::template::local_now;
use crate::worker_pool::{ScanReport, Worker, WorkerPool, WorkerPoolListener, WorkerPoolTrigger};
use log::{debug, info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{span, Level};

/// Location of heartbeat records
pub const HEARTBEAT_LOCATION: &str = "logcollector-keepalive";

/// Fixed start of every heartbeat payload
pub const HEARTBEAT_PREFIX: &str = "--MARK--: ";

/// Heartbeat payloads are shorter than this
const HEARTBEAT_MAX_SIZE: usize = 1024;

/// Orchestrates the input workers cycle by cycle
pub struct Collector {
    context: Arc<CollectorContext>,
    partitioner: WorkPartitioner,
    expander: GlobExpander,
    cycle_interval: Duration,
    cycles: u64,
    workers: Vec<Worker>,
    trigger: WorkerPoolTrigger,
    listener: WorkerPoolListener,
}

impl Collector {
    /// Create a collector and spawn its `worker_count` input workers
    pub fn new(
        context: Arc<CollectorContext>,
        worker_count: usize,
        cycle_interval: Duration,
    ) -> Result<Self, Error> {
        let (ready_sender, ready_receiver) = signalling::channel();
        let pool = WorkerPool::new(worker_count, &context, &ready_sender)?;
        let listener = pool.listener(ready_receiver);
        let (workers, trigger) = pool.split();

        Ok(Self {
            context,
            partitioner: WorkPartitioner::new(worker_count),
            expander: GlobExpander::new(),
            cycle_interval,
            cycles: 0,
            workers,
            trigger,
            listener,
        })
    }

    pub fn context(&self) -> &Arc<CollectorContext> {
        &self.context
    }

    /// Number of completed cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run cycles until a worker is lost
    pub fn run(&mut self) -> Result<(), Error> {
        info!(
            "Collecting from {} sources with {} workers",
            self.context.registry().count(),
            self.partitioner.worker_count()
        );

        loop {
            let cycle_start = Instant::now();
            let report = self.run_cycle()?;

            let cycle_duration = cycle_start.elapsed();
            let time_left = self.cycle_interval.saturating_sub(cycle_duration);
            if time_left.is_zero() {
                warn!(
                    "Finished cycle after {cycle_duration:?} ({report}). Expected to be less than {:?}",
                    self.cycle_interval
                );
            } else {
                debug!("Finished cycle after {cycle_duration:?} ({report}). Sleeping for {time_left:?}");
                thread::sleep(time_left);
            }
        }
    }

    /// Run one cycle without the trailing sleep
    pub fn run_cycle(&mut self) -> Result<ScanReport, Error> {
        let _span = span!(Level::INFO, "Cycle", cycle = self.cycles).entered();

        self.barrier_window();

        self.listener.clear_ready();
        self.trigger.trigger_all()?;
        let report = self.listener.wait_all_ready()?;

        self.heartbeat();
        self.cycles += 1;
        Ok(report)
    }

    /// Stop all input workers and wait for them to end
    pub fn shutdown(self) {
        let Collector {
            workers, trigger, ..
        } = self;

        // Workers end once their trigger channel is closed
        drop(trigger);
        for worker in workers {
            worker.join();
        }
    }

    /// Mutate shared state while all workers are idle
    fn barrier_window(&mut self) {
        let mut registry = self.context.registry_mut();

        for index in registry.gone() {
            if let Some(source) = registry.remove_at(index) {
                info!("File '{}' vanished, no longer monitored", source.identity());
            }
        }

        self.expander.rescan(&mut registry, local_now());

        let mut plan = self.context.plan_mut();
        if self.partitioner.refresh(&mut plan, &registry) {
            debug!(
                "Partitioned {} sources over {} workers: {:?}",
                plan.len(),
                self.partitioner.worker_count(),
                plan.ranges()
            );
        }
    }

    fn heartbeat(&self) {
        let record = Record::new(
            heartbeat_payload(&mut rand::thread_rng()),
            HEARTBEAT_LOCATION,
            "syslog",
            self.context.admin_channel.clone(),
        );
        self.context.fanout.push_record(record);
    }
}

/// Keep-alive marker followed by random padding
fn heartbeat_payload(rng: &mut impl Rng) -> String {
    let padding = rng.gen_range(0..HEARTBEAT_MAX_SIZE - HEARTBEAT_PREFIX.len());
    let mut payload = String::with_capacity(HEARTBEAT_PREFIX.len() + padding);
    payload.push_str(HEARTBEAT_PREFIX);
    payload.extend((0..padding).map(|_| char::from(rng.sample(Alphanumeric))));
    payload
}
