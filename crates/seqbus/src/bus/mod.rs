// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed subscription layers above the raw multicast transport.
//!
//! Two wrappers share the tag-peek discipline: the command receiver
//! (sequencer side) decodes commands and publishes them on the in-process
//! [`CommandBus`]; the event receiver (consumer side) decodes events,
//! filters by target instance and tracks the global sequence for gaps.
//!
//! ```text
//! cmd group -> CommandReceiver -> CommandBus -> sequencer pipelines
//! evt group -> EventReceiver -> tin filter -> seq check -> typed handler
//! ```

pub mod command_bus;
pub mod command_rx;
pub mod event_rx;

pub use command_bus::CommandBus;
pub use command_rx::CommandReceiver;
pub use event_rx::{EventMetrics, EventReceiver, SeqPolicy};
