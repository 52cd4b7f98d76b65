// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

pub mod collector;
pub mod file;

pub use collector::Builder;
pub use file::{ChannelConfig, Config, SourceConfig, AGENT_CHANNEL};
