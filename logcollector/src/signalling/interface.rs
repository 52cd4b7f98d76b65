// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Endpoints of the channels between the collector and its input workers

use crate::error::Error;

/// Receiving end, blocking until a value arrives.
///
/// Fails once the sending side is gone, which workers take as shutdown.
pub trait Receiver<T>: Send {
    fn recv(&mut self) -> Result<T, Error>;
}

/// Sending end. Fails once the receiving side is gone.
pub trait Sender<T>: Send {
    fn send(&mut self, t: T) -> Result<(), Error>;
}
