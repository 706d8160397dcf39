// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process typed command pub/sub.
//!
//! The seam between the wire and the sequencer: the command receiver
//! publishes `(command, sender_id)` here, pipelines subscribe per command
//! type. Tests publish directly, no sockets involved.

use crate::identity::InstanceId;
use crate::wire::Command;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

type ErasedHandler = Arc<dyn Fn(&dyn Any, InstanceId) + Send + Sync>;

/// Append-only handler registry keyed by command type.
///
/// Dispatch snapshots the bucket under the lock and calls outside it, so
/// a handler may publish follow-up commands without deadlocking.
#[derive(Default)]
pub struct CommandBus {
    handlers: Mutex<HashMap<TypeId, Vec<ErasedHandler>>>,
}

impl CommandBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<C: Command>(
        &self,
        handler: impl Fn(&C, InstanceId) + Send + Sync + 'static,
    ) {
        let erased: ErasedHandler = Arc::new(move |any, sender_id| {
            if let Some(cmd) = any.downcast_ref::<C>() {
                handler(cmd, sender_id);
            }
        });
        self.handlers
            .lock()
            .entry(TypeId::of::<C>())
            .or_default()
            .push(erased);
    }

    pub fn publish<C: Command>(&self, command: &C, sender_id: InstanceId) {
        let snapshot = {
            let handlers = self.handlers.lock();
            handlers.get(&TypeId::of::<C>()).cloned().unwrap_or_default()
        };
        for handler in &snapshot {
            handler(command, sender_id);
        }
    }

    /// Number of handlers registered for `C`.
    #[must_use]
    pub fn subscriber_count<C: Command>(&self) -> usize {
        self.handlers
            .lock()
            .get(&TypeId::of::<C>())
            .map_or(0, Vec::len)
    }
}
