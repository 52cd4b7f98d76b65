// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Delivery of queued records to their destinations.
//!
//! Each destination channel has one [OutputForwarder] thread popping records
//! from the channel's queue and handing them to a [Transport]. A record whose
//! send fails is not retried: delivery is at most once.

use crate::dispatch::DispatchQueueFanout;
use crate::error::Error;
use crate::record::Record;
use log::{debug, error, trace};
use std::collections::HashMap;
use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

/// Message format version prefixed to every datagram
const WIRE_VERSION: u8 = b'1';

/// Sends records to the destination of a channel
pub trait Transport: Send + Sync {
    /// Deliver one record
    fn send(&self, channel: &str, record: &Record) -> Result<(), Error>;

    /// Re-establish the connection of `channel` after a failed send
    fn reconnect(&self, channel: &str) -> Result<(), Error>;
}

/// Encode a record as `1:<location>:<payload>`
pub fn encode(record: &Record) -> Vec<u8> {
    let mut message = Vec::with_capacity(record.location.len() + record.payload.len() + 3);
    message.push(WIRE_VERSION);
    message.push(b':');
    message.extend_from_slice(record.location.as_bytes());
    message.push(b':');
    message.extend_from_slice(&record.payload);
    message
}

struct Endpoint {
    path: PathBuf,
    socket: Mutex<Option<UnixDatagram>>,
}

/// Transport writing one datagram per record to a Unix socket per channel.
///
/// Connections are established lazily and dropped on the first failed send.
pub struct SocketTransport {
    endpoints: HashMap<String, Endpoint>,
}

impl SocketTransport {
    /// Create a transport for the given `(channel, socket path)` pairs
    pub fn new<I, S, P>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: Into<PathBuf>,
    {
        let endpoints = endpoints
            .into_iter()
            .map(|(channel, path)| {
                let endpoint = Endpoint {
                    path: path.into(),
                    socket: Mutex::new(None),
                };
                (channel.into(), endpoint)
            })
            .collect();
        Self { endpoints }
    }

    fn endpoint(&self, channel: &str) -> Result<&Endpoint, Error> {
        self.endpoints
            .get(channel)
            .ok_or(Error::Channel("no endpoint configured for channel"))
    }

    fn connect(path: &Path) -> io::Result<UnixDatagram> {
        let socket = UnixDatagram::unbound()?;
        socket.connect(path)?;
        Ok(socket)
    }
}

impl Transport for SocketTransport {
    fn send(&self, channel: &str, record: &Record) -> Result<(), Error> {
        let endpoint = self.endpoint(channel)?;
        let mut guard = endpoint.socket.lock().unwrap_or_else(PoisonError::into_inner);

        // Taken out while sending, only put back if the send succeeds
        let socket = match guard.take() {
            Some(socket) => socket,
            None => Self::connect(&endpoint.path)
                .map_err(|e| Error::Transport((channel.to_owned(), e)))?,
        };

        let message = encode(record);
        let e = match socket.send(&message) {
            Ok(n) if n == message.len() => {
                *guard = Some(socket);
                return Ok(());
            }
            Ok(n) => io::Error::new(
                io::ErrorKind::WriteZero,
                format!("sent {n} of {} bytes", message.len()),
            ),
            Err(e) => e,
        };
        Err(Error::Transport((channel.to_owned(), e)))
    }

    fn reconnect(&self, channel: &str) -> Result<(), Error> {
        let endpoint = self.endpoint(channel)?;
        let socket =
            Self::connect(&endpoint.path).map_err(|e| Error::Transport((channel.to_owned(), e)))?;
        *endpoint.socket.lock().unwrap_or_else(PoisonError::into_inner) = Some(socket);
        debug!(
            "Reconnected channel '{channel}' to {}",
            endpoint.path.display()
        );
        Ok(())
    }
}

/// Send one record, reconnecting the channel if that fails.
///
/// Returns whether the record was delivered. A failed record is dropped.
pub fn forward_one(channel: &str, record: &Record, transport: &dyn Transport) -> bool {
    match transport.send(channel, record) {
        Ok(()) => {
            trace!("Forwarded record of '{}' to '{channel}'", record.location);
            true
        }
        Err(e) => {
            error!("Unable to send record of '{}': {e}", record.location);
            if let Err(e) = transport.reconnect(channel) {
                debug!("Reconnect of channel '{channel}' failed: {e}");
            }
            false
        }
    }
}

/// Consumer thread of one destination channel
pub struct OutputForwarder {
    channel: String,
    _thread: thread::JoinHandle<()>,
}

impl OutputForwarder {
    /// Spawn the forwarder thread of `channel`
    pub fn spawn(
        channel: impl Into<String>,
        fanout: Arc<DispatchQueueFanout>,
        transport: Arc<dyn Transport>,
    ) -> Result<OutputForwarder, Error> {
        let channel = channel.into();
        if fanout.queue_for(&channel).is_none() {
            return Err(Error::Channel("no queue for forwarder channel"));
        }

        let thread = {
            let channel = channel.clone();
            thread::Builder::new()
                .name(format!("lc-output-{channel}"))
                .spawn(move || run(channel, fanout, transport))
                .map_err(|e| Error::Io((e, "failed to spawn output forwarder")))?
        };

        Ok(OutputForwarder {
            channel,
            _thread: thread,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// Forwarder thread main function
fn run(channel: String, fanout: Arc<DispatchQueueFanout>, transport: Arc<dyn Transport>) {
    debug!("Forwarding channel '{channel}'");
    loop {
        match fanout.pop_record(&channel) {
            Ok(record) => {
                forward_one(&channel, &record, transport.as_ref());
            }
            Err(e) => {
                error!("Forwarder of channel '{channel}' stopping: {e}");
                return;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn record_with(payload: &'static str) -> Record {
        Record::new(
            payload,
            "/var/log/app.log",
            "syslog",
            record::channels(["agent"]),
        )
    }

    #[test]
    fn encodes_version_location_payload() {
        assert_eq!(encode(&record_with("hello")), b"1:/var/log/app.log:hello");
    }

    #[test]
    fn socket_transport_delivers_datagrams() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue");
        let server = UnixDatagram::bind(&path).unwrap();

        let transport = SocketTransport::new([("agent", path.clone())]);
        transport.send("agent", &record_with("hello")).unwrap();

        let mut buf = [0u8; 128];
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"1:/var/log/app.log:hello");

        assert!(matches!(
            transport.send("siem", &record_with("x")),
            Err(Error::Channel(_))
        ));
    }

    #[test]
    fn socket_transport_reconnects() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue");
        let transport = SocketTransport::new([("agent", path.clone())]);

        assert!(matches!(
            transport.send("agent", &record_with("lost")),
            Err(Error::Transport(_))
        ));
        assert!(transport.reconnect("agent").is_err());

        let server = UnixDatagram::bind(&path).unwrap();
        transport.reconnect("agent").unwrap();
        transport.send("agent", &record_with("found")).unwrap();

        let mut buf = [0u8; 128];
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"1:/var/log/app.log:found");
    }

    /// Transport failing its first send
    #[derive(Default)]
    struct FlakyTransport {
        failed_once: AtomicBool,
        reconnects: AtomicUsize,
        sent: Mutex<Vec<Bytes>>,
    }

    impl Transport for FlakyTransport {
        fn send(&self, channel: &str, record: &Record) -> Result<(), Error> {
            if !self.failed_once.swap(true, Ordering::SeqCst) {
                let e = io::Error::from(io::ErrorKind::BrokenPipe);
                return Err(Error::Transport((channel.to_owned(), e)));
            }
            self.sent.lock().unwrap().push(record.payload.clone());
            Ok(())
        }

        fn reconnect(&self, _channel: &str) -> Result<(), Error> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn failed_records_are_not_retried() {
        let fanout = Arc::new(DispatchQueueFanout::new(["agent"], 8));
        let transport = Arc::new(FlakyTransport::default());
        let forwarder =
            OutputForwarder::spawn("agent", Arc::clone(&fanout), transport.clone()).unwrap();
        assert_eq!(forwarder.channel(), "agent");

        for payload in ["one", "two", "three"] {
            fanout.push_record(record_with(payload));
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while transport.sent.lock().unwrap().len() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(
            *transport.sent.lock().unwrap(),
            vec![Bytes::from("two"), Bytes::from("three")]
        );
        assert_eq!(transport.reconnects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn forwarder_needs_a_queue() {
        let fanout = Arc::new(DispatchQueueFanout::new(["agent"], 8));
        let transport = Arc::new(FlakyTransport::default());
        assert!(OutputForwarder::spawn("siem", fanout, transport).is_err());
    }
}
