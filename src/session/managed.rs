// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-reader connection lifecycle and serialization.
//!
//! A session owns at most one live driver handle, guarded by a FIFO-fair
//! mutex that is held for the whole duration of a protocol routine, so an
//! inventory and the tag-handle operations that follow it always see the
//! same tag population. Driver failures matching the connection-error
//! predicate trigger a full teardown/reconnect ladder; logical failures
//! surface immediately.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use tokio::{sync::Mutex, task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cfg::config::ReaderConfig,
    driver::{DriverFactory, ReaderDriver},
    errors::{DriverError, GatewayError},
    session::notify::NotificationQueue,
};

pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

struct ListenerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct SessionInner {
    driver: Option<Box<dyn ReaderDriver>>,
    listener: Option<ListenerHandle>,
}

/// Long-lived state for one configured reader.
pub struct ManagedSession {
    config: ReaderConfig,
    factory: DriverFactory,
    inner: Mutex<SessionInner>,
    queue: NotificationQueue,

    // Mirrors for lock-free introspection by `/readers` and
    // `/notification/status`; authoritative state lives behind `inner`.
    connected: AtomicBool,
    closed: AtomicBool,
    /// Active listener port, 0 when notification mode is off.
    listener_port: AtomicU32,
}

impl ManagedSession {
    pub fn new(config: ReaderConfig, factory: DriverFactory) -> Self {
        Self {
            config,
            factory,
            inner: Mutex::new(SessionInner::default()),
            queue: NotificationQueue::new(),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            listener_port: AtomicU32::new(0),
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn connection_status(&self) -> &'static str {
        if self.is_closed() {
            "closed"
        } else if self.is_connected() {
            "connected"
        } else {
            "disconnected"
        }
    }

    pub fn is_notification_active(&self) -> bool {
        self.listener_port.load(Ordering::SeqCst) != 0
    }

    pub fn notification_port(&self) -> Option<u16> {
        match self.listener_port.load(Ordering::SeqCst) {
            0 => None,
            port => Some(port as u16),
        }
    }

    /// Serializes `op` against this reader and hands it the connected
    /// driver.
    ///
    /// `op` may be re-run: when it fails with a connection-classified
    /// driver error the session sleeps `attempt * 1s`, tears the driver
    /// down, reconnects and tries again, up to `MAX_RECONNECT_ATTEMPTS`.
    /// Any other failure surfaces immediately.
    pub async fn execute<T, F>(&self, mut op: F) -> Result<T, GatewayError>
    where
        F: for<'a> FnMut(
            &'a mut dyn ReaderDriver,
        ) -> Pin<Box<dyn Future<Output = Result<T, GatewayError>> + Send + 'a>>,
    {
        if self.is_closed() {
            return Err(GatewayError::SessionClosed);
        }

        let mut inner = self.inner.lock().await;
        let mut attempt: u32 = 1;
        loop {
            match self.ensure_connected(&mut inner) {
                Ok(()) => {},
                Err(e) if attempt < MAX_RECONNECT_ATTEMPTS => {
                    warn!(
                        reader = self.name(),
                        attempt, "connect failed, backing off: {e}"
                    );
                    sleep(Duration::from_millis(u64::from(attempt) * 1000)).await;
                    attempt += 1;
                    continue;
                },
                Err(e) => {
                    return Err(GatewayError::OperationFailed(e.to_string()));
                },
            }

            let Some(driver) = inner.driver.as_mut() else {
                return Err(GatewayError::OperationFailed(
                    "driver handle missing after connect".to_string(),
                ));
            };

            match op(driver.as_mut()).await {
                Ok(value) => return Ok(value),
                Err(GatewayError::Driver(e)) if e.is_connection_error() => {
                    if attempt >= MAX_RECONNECT_ATTEMPTS {
                        return Err(GatewayError::OperationFailed(e.to_string()));
                    }
                    warn!(
                        reader = self.name(),
                        attempt, "connection fault, reconnecting: {e}"
                    );
                    sleep(Duration::from_millis(u64::from(attempt) * 1000)).await;
                    self.teardown(&mut inner);
                    attempt += 1;
                },
                Err(other) => return Err(other),
            }
        }
    }

    /// Full teardown followed by a fresh connect.
    pub async fn force_reconnect(&self) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().await;
        self.teardown(&mut inner);
        self.ensure_connected(&mut inner)
            .map_err(GatewayError::Driver)
    }

    fn ensure_connected(&self, inner: &mut SessionInner) -> Result<(), DriverError> {
        if inner.driver.as_ref().is_some_and(|d| d.is_connected()) {
            return Ok(());
        }
        debug!(reader = self.name(), "constructing driver and connecting");
        let mut driver = (self.factory)();
        match driver.connect(&self.config.address, self.config.port, CONNECT_TIMEOUT) {
            Ok(()) => {
                inner.driver = Some(driver);
                self.connected.store(true, Ordering::SeqCst);
                Ok(())
            },
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(e)
            },
        }
    }

    fn teardown(&self, inner: &mut SessionInner) {
        if let Some(mut driver) = inner.driver.take() {
            driver.disconnect();
            driver.close();
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Binds the listener on `port` and starts the event-drain task.
    ///
    /// Fails when notification mode is already active; a failure at the
    /// driver step leaves the session exactly as it was.
    pub async fn start_notification(
        self: &Arc<Self>,
        port: u16,
    ) -> Result<(), GatewayError> {
        if self.is_closed() {
            return Err(GatewayError::SessionClosed);
        }
        let mut inner = self.inner.lock().await;
        if inner.listener.is_some() {
            return Err(GatewayError::NotificationAlreadyActive);
        }

        self.ensure_connected(&mut inner)
            .map_err(GatewayError::Driver)?;
        let Some(driver) = inner.driver.as_mut() else {
            return Err(GatewayError::OperationFailed(
                "driver handle missing after connect".to_string(),
            ));
        };
        driver.start_listener(port)?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(drain_events_loop(Arc::clone(self), cancel.clone()));
        inner.listener = Some(ListenerHandle { cancel, task });
        self.listener_port.store(u32::from(port), Ordering::SeqCst);
        Ok(())
    }

    /// Stops the drain task and the driver listener, tolerating driver
    /// failures with a warning.
    pub async fn stop_notification(&self) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().await;
        let Some(listener) = inner.listener.take() else {
            return Err(GatewayError::NotificationInactive);
        };
        listener.cancel.cancel();
        listener.task.abort();
        if let Some(driver) = inner.driver.as_mut()
            && let Err(e) = driver.stop_listener()
        {
            warn!(reader = self.name(), "stop_listener failed: {e}");
        }
        self.listener_port.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Terminal shutdown: stops notification mode and drops the driver.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut inner = self.inner.lock().await;
        if let Some(listener) = inner.listener.take() {
            listener.cancel.cancel();
            listener.task.abort();
            if let Some(driver) = inner.driver.as_mut()
                && let Err(e) = driver.stop_listener()
            {
                warn!(reader = self.name(), "stop_listener failed: {e}");
            }
            self.listener_port.store(0, Ordering::SeqCst);
        }
        self.teardown(&mut inner);
    }
}

/// Periodically drains driver events into the session queue.
///
/// The drain acquires the session mutex so asynchronous event handling
/// never interleaves driver calls with an explicit operation; the queue
/// push itself happens outside any driver state.
async fn drain_events_loop(session: Arc<ManagedSession>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(EVENT_POLL_INTERVAL) => {},
        }
        let mut inner = session.inner.lock().await;
        if let Some(driver) = inner.driver.as_mut() {
            for event in driver.drain_events() {
                session.queue.push(event);
            }
        }
    }
}
