// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use super::{Receiver, Sender};
use crate::error::Error;
use crate::error::Error::Channel;
use std::sync::mpsc;

/// Create a connected pair of in-process signal endpoints
pub fn channel<T>() -> (IntraProcSender<T>, IntraProcReceiver<T>) {
    let (sender, receiver) = mpsc::channel();
    (IntraProcSender { sender }, IntraProcReceiver { receiver })
}

pub struct IntraProcReceiver<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T: Send> Receiver<T> for IntraProcReceiver<T> {
    // Fails once every sender is gone
    fn recv(&mut self) -> Result<T> {
        self.receiver
            .recv()
            .map_err(|_| Channel("all senders disconnected"))
    }
}

pub struct IntraProcSender<T> {
    sender: mpsc::Sender<T>,
}

impl<T> Clone for IntraProcSender<T> {
    fn clone(&self) -> IntraProcSender<T> {
        IntraProcSender {
            sender: self.sender.clone(),
        }
    }
}

impl<T: Send> Sender<T> for IntraProcSender<T> {
    fn send(&mut self, t: T) -> Result<()> {
        self.sender
            .send(t)
            .map_err(|_| Channel("receiver disconnected"))
    }
}

type Result<T, E = Error> = std::result::Result<T, E>;
