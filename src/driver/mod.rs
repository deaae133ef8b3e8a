// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Abstract reader driver: the impurity boundary in front of the vendor
//! library.
//!
//! All calls are blocking, mirroring the vendor SDK; the session layer is
//! responsible for serialization and for classifying failures into
//! connection faults (reconnect and retry) versus logical faults.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{errors::DriverError, tags::RssiValue};

/// In-memory reader used by the test-suite and for running the gateway
/// without hardware.
pub mod emulated;

pub type DriverResult<T> = Result<T, DriverError>;

/// Gen-2 memory banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryBank {
    Reserved,
    Epc,
    Tid,
    User,
}

/// Per-region parameter of the Gen-2 lock command. Only the first three
/// are issued by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    #[default]
    Unchanged,
    Lock,
    Unlock,
    PermanentLock,
    PermanentUnlock,
}

/// Full parameter vector of one lock command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockSettings {
    pub kill: LockMode,
    pub access: LockMode,
    pub epc: LockMode,
    pub tid: LockMode,
    pub user: LockMode,
}

impl LockSettings {
    /// `(Lock, Lock, Lock, Unchanged, Unchanged)`
    pub fn lock_all() -> Self {
        Self {
            kill: LockMode::Lock,
            access: LockMode::Lock,
            epc: LockMode::Lock,
            ..Self::default()
        }
    }

    /// `(Unlock, Unlock, Unlock, Unchanged, Unchanged)`
    pub fn unlock_all() -> Self {
        Self {
            kill: LockMode::Unlock,
            access: LockMode::Unlock,
            epc: LockMode::Unlock,
            ..Self::default()
        }
    }
}

/// One tag observed by an inventory round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    /// Uppercase hex of the tag identifier (the EPC contents).
    pub idd_hex: String,
    /// Protocol Control word, when the reader reports it. Formats keeping
    /// state in the PC (BR security) need the real word, not a synthesized
    /// one.
    pub pc: Option<[u8; 2]>,
    pub rssi: Vec<RssiValue>,
}

/// Opaque addressing of one tag within the most recent inventory. A
/// successful EPC rewrite invalidates every handle; callers must
/// re-inventory and re-select before touching the tag again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHandle(pub usize);

/// Kind of an asynchronous reader event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EventKind {
    #[serde(rename = "TAG_EVENT")]
    Tag,
    #[serde(rename = "IDENTIFICATION_EVENT")]
    Identification,
    #[serde(untagged)]
    Other(String),
}

/// Timestamped record pushed by a reader in notification mode. Immutable
/// after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub rssi_values: Vec<RssiValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reader_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reader_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
}

/// Contract the protocol engine and session manager program against.
///
/// `write_blocks` takes the payload bytes directly; the written word count
/// is `data.len() / 2` and payloads must always be an even number of
/// bytes. Passing `None` as the password issues the command without
/// authentication.
pub trait ReaderDriver: Send {
    fn connect(&mut self, address: &str, port: u16, timeout: Duration)
    -> DriverResult<()>;

    fn disconnect(&mut self);

    /// Releases every vendor resource; the handle is unusable afterwards.
    fn close(&mut self);

    fn is_connected(&self) -> bool;

    /// Enumerates tags in the RF field of the masked antennas.
    fn inventory(&mut self, antenna_mask: u8) -> DriverResult<Vec<InventoryItem>>;

    /// Acquires a handle onto item `index` of the most recent inventory.
    fn tag_handle(&mut self, index: usize) -> DriverResult<TagHandle>;

    fn read_blocks(
        &mut self,
        handle: TagHandle,
        bank: MemoryBank,
        start_word: u8,
        word_count: u8,
        password: Option<[u8; 4]>,
    ) -> DriverResult<Vec<u8>>;

    fn write_blocks(
        &mut self,
        handle: TagHandle,
        bank: MemoryBank,
        start_word: u8,
        data: &[u8],
        password: Option<[u8; 4]>,
    ) -> DriverResult<()>;

    fn lock(
        &mut self,
        handle: TagHandle,
        settings: LockSettings,
        password: [u8; 4],
    ) -> DriverResult<()>;

    /// ISO error code of the most recent failed tag operation, for
    /// diagnostic messages.
    fn last_iso_error(&self) -> Option<i32>;

    /// Binds the notification callback and starts the TCP listener the
    /// reader pushes events to. TCP keep-alive is enabled on the listener.
    fn start_listener(&mut self, port: u16) -> DriverResult<()>;

    fn stop_listener(&mut self) -> DriverResult<()>;

    /// Drains events the listener has buffered since the last call.
    fn drain_events(&mut self) -> Vec<NotificationEvent>;
}

/// Factory the session layer uses to construct a fresh driver after a
/// full teardown.
pub type DriverFactory =
    std::sync::Arc<dyn Fn() -> Box<dyn ReaderDriver> + Send + Sync>;
