// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use dashmap::DashMap;
use tracing::info;

use crate::{
    cfg::config::ReaderConfig,
    driver::DriverFactory,
    errors::GatewayError,
    session::managed::ManagedSession,
};

/// First listener port handed out for notification mode.
pub const LISTENER_PORT_SEED: u16 = 20001;

/// Name-keyed map of managed sessions.
///
/// Built once at startup; steady-state access is read-only apart from the
/// monotonically increasing listener-port counter.
pub struct ReaderRegistry {
    sessions: DashMap<String, Arc<ManagedSession>>,
    next_listener_port: AtomicU32,
}

impl ReaderRegistry {
    pub fn new(readers: &[ReaderConfig], factory: DriverFactory) -> Self {
        let sessions = DashMap::with_capacity(readers.len());
        for reader in readers {
            info!(
                reader = %reader.name,
                address = %reader.address,
                port = reader.port,
                mode = %reader.mode,
                "registering reader"
            );
            sessions.insert(
                reader.name.clone(),
                Arc::new(ManagedSession::new(reader.clone(), Arc::clone(&factory))),
            );
        }
        Self {
            sessions,
            next_listener_port: AtomicU32::new(u32::from(LISTENER_PORT_SEED)),
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<ManagedSession>, GatewayError> {
        self.sessions
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| GatewayError::UnknownReader(name.to_string()))
    }

    pub fn reader_count(&self) -> usize {
        self.sessions.len()
    }

    /// Snapshot of every session, for status endpoints and shutdown.
    pub fn all(&self) -> Vec<Arc<ManagedSession>> {
        let mut sessions: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        sessions.sort_by(|a, b| a.name().cmp(b.name()));
        sessions
    }

    pub fn allocate_listener_port(&self) -> u16 {
        self.next_listener_port.fetch_add(1, Ordering::SeqCst) as u16
    }

    /// Closes every session; called once on shutdown.
    pub async fn shutdown(&self) {
        for session in self.all() {
            info!(reader = session.name(), "closing reader session");
            session.close().await;
        }
    }
}
