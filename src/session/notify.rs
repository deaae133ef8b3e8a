// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};

use tracing::warn;

use crate::driver::NotificationEvent;

/// Bounded FIFO of asynchronous tag events.
///
/// The queue carries its own lightweight lock so listener tasks pushing
/// events never contend with operations holding the session mutex.
/// Overflow drops the oldest entries, one log line per discard.
#[derive(Debug, Default)]
pub struct NotificationQueue {
    inner: Mutex<VecDeque<NotificationEvent>>,
}

pub const QUEUE_CAPACITY: usize = 1000;

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, VecDeque<NotificationEvent>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, event: NotificationEvent) {
        let mut queue = self.guard();
        queue.push_back(event);
        while queue.len() > QUEUE_CAPACITY {
            if let Some(dropped) = queue.pop_front() {
                warn!(
                    kind = ?dropped.kind,
                    "notification queue overflow, dropping oldest event"
                );
            }
        }
    }

    /// Drains the queue into a caller-owned snapshot.
    pub fn poll_all(&self) -> Vec<NotificationEvent> {
        self.guard().drain(..).collect()
    }

    /// Non-consuming snapshot.
    pub fn peek_all(&self) -> Vec<NotificationEvent> {
        self.guard().iter().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.guard().len()
    }
}
