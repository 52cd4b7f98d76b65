// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Bounded per-channel queues between input workers and output forwarders

use crate::error::Error;
use crate::record::Record;
use log::{debug, warn};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Record refused by a queue at capacity
#[derive(Debug)]
pub struct QueueFull(pub Record);

/// Bounded FIFO of records for one destination channel.
///
/// Pushing never blocks; popping blocks until a record is available.
#[derive(Debug)]
pub struct DispatchQueue {
    name: String,
    capacity: usize,
    records: Mutex<VecDeque<Record>>,
    available: Condvar,
}

impl DispatchQueue {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Append `record` unless the queue is full
    pub fn try_push(&self, record: Record) -> Result<(), QueueFull> {
        let mut records = self.lock();
        if records.len() >= self.capacity {
            return Err(QueueFull(record));
        }
        records.push_back(record);
        drop(records);
        self.available.notify_one();
        Ok(())
    }

    /// Remove the oldest record, waiting for one if the queue is empty
    pub fn pop(&self) -> Record {
        let mut records = self.lock();
        loop {
            if let Some(record) = records.pop_front() {
                return record;
            }
            records = self
                .available
                .wait(records)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Remove the oldest record if there is one
    pub fn try_pop(&self) -> Option<Record> {
        self.lock().pop_front()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The set of all destination queues.
///
/// Queues are created once at start-up; records for unknown channels are
/// discarded.
#[derive(Debug)]
pub struct DispatchQueueFanout {
    queues: HashMap<String, DispatchQueue>,
    // Declaration order, for deterministic iteration
    names: Vec<String>,
    overflow_reported: AtomicBool,
    dropped: AtomicU64,
}

impl DispatchQueueFanout {
    /// Create one queue of `capacity` records per distinct channel name
    pub fn new<I, S>(names: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut queues = HashMap::new();
        let mut order = Vec::new();
        for name in names {
            let name = name.into();
            if !queues.contains_key(&name) {
                queues.insert(name.clone(), DispatchQueue::new(name.clone(), capacity));
                order.push(name);
            }
        }

        Self {
            queues,
            names: order,
            overflow_reported: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Push `record` on every one of its target channels.
    ///
    /// Each push is independent and non-blocking. A full queue drops its copy
    /// of the record. Returns the number of queues that accepted the record.
    pub fn push_record(&self, record: Record) -> usize {
        let mut accepted = 0;
        for channel in record.channels.iter() {
            let Some(queue) = self.queues.get(channel) else {
                debug!("No queue for channel '{channel}', dropping record");
                continue;
            };

            match queue.try_push(record.clone()) {
                Ok(()) => accepted += 1,
                Err(QueueFull(dropped)) => self.report_overflow(channel, &dropped),
            }
        }
        accepted
    }

    /// Remove the oldest record of `channel`, blocking until one is available
    pub fn pop_record(&self, channel: &str) -> Result<Record, Error> {
        self.queue_for(channel)
            .map(DispatchQueue::pop)
            .ok_or(Error::Channel("unknown channel"))
    }

    pub fn queue_for(&self, channel: &str) -> Option<&DispatchQueue> {
        self.queues.get(channel)
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Number of record copies dropped on full queues so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn report_overflow(&self, channel: &str, record: &Record) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        if !self.overflow_reported.swap(true, Ordering::Relaxed) {
            warn!("Queue of channel '{channel}' is full, dropping records");
        }
        debug!(
            "Dropped record of '{}' for channel '{channel}'",
            record.location
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::{self, Record};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn record_for(payload: &str, channels: &[&str]) -> Record {
        Record::new(
            payload.to_owned(),
            "/var/log/app.log",
            "syslog",
            record::channels(channels.iter().copied()),
        )
    }

    #[test]
    fn fans_out_to_each_target_channel() {
        let fanout = DispatchQueueFanout::new(["agent", "siem", "audit"], 8);

        assert_eq!(fanout.push_record(record_for("x", &["agent", "siem"])), 2);
        assert_eq!(fanout.queue_for("agent").unwrap().len(), 1);
        assert_eq!(fanout.queue_for("siem").unwrap().len(), 1);
        assert_eq!(fanout.queue_for("audit").unwrap().len(), 0);
    }

    #[test]
    fn unknown_channels_are_skipped() {
        let fanout = DispatchQueueFanout::new(["agent"], 8);
        assert_eq!(fanout.push_record(record_for("x", &["agent", "nowhere"])), 1);
        assert!(fanout.queue_for("nowhere").is_none());
        assert!(fanout.pop_record("nowhere").is_err());
    }

    #[test]
    fn overflow_drops_without_blocking() {
        let fanout = DispatchQueueFanout::new(["agent"], 3);
        for i in 0..10 {
            fanout.push_record(record_for(&i.to_string(), &["agent"]));
        }

        let queue = fanout.queue_for("agent").unwrap();
        assert_eq!(queue.len(), 3);
        assert_eq!(fanout.dropped(), 7);

        // Oldest records survive
        assert_eq!(queue.try_pop().unwrap().payload, "0");
    }

    #[test]
    fn pop_waits_for_push() {
        let fanout = Arc::new(DispatchQueueFanout::new(["agent"], 4));

        let consumer = {
            let fanout = Arc::clone(&fanout);
            thread::spawn(move || fanout.pop_record("agent").unwrap())
        };
        thread::sleep(Duration::from_millis(20));
        fanout.push_record(record_for("late", &["agent"]));

        assert_eq!(consumer.join().unwrap().payload, "late");
    }

    #[test]
    fn single_slot_queue_refuses_second_record() {
        let queue = DispatchQueue::new("agent", 1);
        assert!(queue.try_pop().is_none());
        queue.try_push(record_for("x", &["agent"])).unwrap();
        assert!(queue.try_push(record_for("y", &["agent"])).is_err());
        assert_eq!(queue.pop().payload, "x");
    }

    #[test]
    fn duplicate_names_share_one_queue() {
        let fanout = DispatchQueueFanout::new(["agent", "agent", "siem"], 2);
        assert_eq!(fanout.channel_names().collect::<Vec<_>>(), ["agent", "siem"]);
    }
}
