// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

mod interface;
mod intra_proc_mpsc;
mod signals;

pub use interface::{Receiver, Sender};
pub use intra_proc_mpsc::{channel, IntraProcReceiver, IntraProcSender};
pub use signals::Signal;
