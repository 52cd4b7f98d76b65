// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use std::sync::Arc;
use std::time::SystemTime;

/// Ordered, shared list of destination channel names
pub type Channels = Arc<[String]>;

/// A unit of telemetry extracted from a source, ready to be forwarded.
///
/// Cloning is cheap: payload and channel list are reference counted, which is
/// what fan-out to several channels relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Raw payload as produced by the extractor
    pub payload: Bytes,
    /// Identity of the originating source (path, command alias, or a
    /// collector-internal location)
    pub location: Arc<str>,
    /// Format tag of the originating source
    pub format: Arc<str>,
    /// Destination channels
    pub channels: Channels,
    /// Time the record was created for enqueuing
    pub enqueued_at: SystemTime,
}

impl Record {
    pub fn new(
        payload: impl Into<Bytes>,
        location: impl Into<Arc<str>>,
        format: impl Into<Arc<str>>,
        channels: Channels,
    ) -> Self {
        Self {
            payload: payload.into(),
            location: location.into(),
            format: format.into(),
            channels,
            enqueued_at: SystemTime::now(),
        }
    }
}

/// Build a channel list from anything yielding channel names
pub fn channels<I, S>(names: I) -> Channels
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}
