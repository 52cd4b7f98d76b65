// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Collector cycles against real files

use bytes::Bytes;
use logcollector::configuration::{ChannelConfig, SourceConfig};
use logcollector::prelude::*;
use logcollector::tracker::{FileStat, LogFile};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn source(identity: &Path) -> SourceConfig {
    SourceConfig {
        identity: identity.display().to_string(),
        kind: None,
        format: "generic".to_owned(),
        channels: Some(vec!["agent".to_owned()]),
        ignore_threshold: Some(3),
        frequency_secs: None,
        alias: None,
    }
}

/// Heartbeats and notices go to a channel of their own
fn config(sources: Vec<SourceConfig>) -> Config {
    Config {
        worker_count: 2,
        queue_capacity: 64,
        admin_channel: "admin".to_owned(),
        channels: vec![ChannelConfig {
            name: "admin".to_owned(),
            socket: PathBuf::from("/nonexistent/admin.sock"),
        }],
        sources,
        ..Config::default()
    }
}

fn append(path: &Path, data: &[u8]) {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(data).unwrap();
}

fn drain(collector: &Collector, channel: &str) -> Vec<Record> {
    let queue = collector.context().fanout().queue_for(channel).unwrap();
    std::iter::from_fn(|| queue.try_pop()).collect()
}

fn payloads(records: &[Record]) -> Vec<Bytes> {
    records.iter().map(|r| r.payload.clone()).collect()
}

#[test]
fn appended_data_becomes_a_record() {
    let _ = logcollector_logger::init(log::LevelFilter::Debug, true, None);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    append(&path, b"existing content is skipped\n");

    let mut collector = Builder::new(config(vec![source(&path)])).build().unwrap();
    collector.run_cycle().unwrap();
    assert!(drain(&collector, "agent").is_empty());

    append(&path, b"123456789\n");
    let report = collector.run_cycle().unwrap();
    assert_eq!(report.records, 1);

    let records = drain(&collector, "agent");
    assert_eq!(payloads(&records), vec![Bytes::from("123456789")]);
    assert_eq!(&*records[0].location, path.display().to_string());
    assert_eq!(&*records[0].format, "generic");

    // One heartbeat per cycle
    let admin = drain(&collector, "admin");
    assert_eq!(admin.len(), 2);
    assert!(admin.iter().all(|r| &*r.location == "logcollector-keepalive"));

    collector.shutdown();
}

#[test]
fn rotated_file_is_read_from_the_start() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    append(&path, b"before\n");

    let mut collector = Builder::new(config(vec![source(&path)])).build().unwrap();
    collector.run_cycle().unwrap();

    // Keep the old file so the new one gets another inode
    fs::rename(&path, dir.path().join("app.log.1")).unwrap();
    append(&path, b"after rotation\n");
    collector.run_cycle().unwrap();

    assert_eq!(
        payloads(&drain(&collector, "agent")),
        vec![Bytes::from("after rotation")]
    );

    let notice = format!(
        "logcollector: File rotated (inode changed): '{}'.",
        path.display()
    );
    let admin = drain(&collector, "admin");
    assert!(admin.iter().any(|r| r.payload == notice.as_bytes()));

    collector.shutdown();
}

#[test]
fn vanished_glob_member_is_removed_at_next_barrier() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("member.log");
    append(&path, b"first\n");

    let pattern = dir.path().join("*.log");
    let mut collector = Builder::new(config(vec![source(&pattern)])).build().unwrap();

    // Discovered members are read from their start
    collector.run_cycle().unwrap();
    assert_eq!(collector.context().registry().count(), 1);
    assert_eq!(
        payloads(&drain(&collector, "agent")),
        vec![Bytes::from("first")]
    );

    fs::remove_file(&path).unwrap();
    collector.run_cycle().unwrap();
    assert_eq!(
        collector.context().registry().lock(0).unwrap().state(),
        SourceState::Gone
    );

    collector.run_cycle().unwrap();
    assert_eq!(collector.context().registry().count(), 0);
    assert!(collector.context().registry().templates()[0]
        .children()
        .is_empty());

    collector.run_cycle().unwrap();
    assert!(drain(&collector, "agent").is_empty());

    collector.shutdown();
}

/// Local file system whose permissions can be revoked, counting opens
#[derive(Default)]
struct RevocableFileSystem {
    revoked: AtomicBool,
    opens: AtomicUsize,
}

impl RevocableFileSystem {
    fn check(&self) -> io::Result<()> {
        if self.revoked.load(Ordering::SeqCst) {
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        } else {
            Ok(())
        }
    }
}

impl FileSystem for RevocableFileSystem {
    fn open(&self, path: &Path) -> io::Result<Box<dyn LogFile>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        LocalFileSystem.open(path)
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        self.check()?;
        LocalFileSystem.stat(path)
    }
}

#[test]
fn revoked_file_is_ignored_after_threshold() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    append(&path, b"content\n");

    let fs = Arc::new(RevocableFileSystem::default());
    let mut collector = Builder::new(config(vec![source(&path)]))
        .file_system(fs.clone())
        .build()
        .unwrap();
    collector.run_cycle().unwrap();
    assert_eq!(fs.opens.load(Ordering::SeqCst), 1);

    fs.revoked.store(true, Ordering::SeqCst);
    for cycle in 1..=4 {
        let ignored = collector.context().registry().lock(0).unwrap().is_ignored();
        assert!(!ignored, "ignored before revoked cycle {cycle}");
        let report = collector.run_cycle().unwrap();
        assert_eq!(report.failures, 1);
    }
    assert!(collector.context().registry().lock(0).unwrap().is_ignored());

    let opens = fs.opens.load(Ordering::SeqCst);
    collector.run_cycle().unwrap();
    collector.run_cycle().unwrap();
    assert_eq!(fs.opens.load(Ordering::SeqCst), opens);

    // Ignored sources stay ignored, even once the file is readable again
    fs.revoked.store(false, Ordering::SeqCst);
    append(&path, b"more\n");
    collector.run_cycle().unwrap();
    assert!(drain(&collector, "agent").is_empty());

    collector.shutdown();
}

#[test]
fn records_fan_out_to_all_target_channels() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    append(&path, b"");

    let mut config = config(vec![SourceConfig {
        channels: Some(vec!["agent".to_owned(), "siem".to_owned()]),
        ..source(&path)
    }]);
    config.channels.push(ChannelConfig {
        name: "siem".to_owned(),
        socket: PathBuf::from("/nonexistent/siem.sock"),
    });

    let mut collector = Builder::new(config).build().unwrap();
    collector.run_cycle().unwrap();
    append(&path, b"one\ntwo\n");
    collector.run_cycle().unwrap();

    let expected = vec![Bytes::from("one"), Bytes::from("two")];
    assert_eq!(payloads(&drain(&collector, "agent")), expected);
    assert_eq!(payloads(&drain(&collector, "siem")), expected);

    collector.shutdown();
}
