// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! In-memory `ReaderDriver` implementation.
//!
//! The emulated reader keeps its tag field in an `Arc`-shared state so a
//! driver factory can hand out fresh handles (the session layer does this
//! after a reconnect) while the field survives. Tests script failures and
//! inspect the recorded operation log through the same shared state.
//!
//! TODO: swap in the FEDM-based driver in `main` once the vendor bindings
//! land.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    codec::bits,
    driver::{
        DriverResult, InventoryItem, LockMode, LockSettings, MemoryBank,
        NotificationEvent, ReaderDriver, TagHandle,
    },
    errors::DriverError,
    tags::RssiValue,
};

/// One tag sitting in the emulated RF field.
///
/// The EPC bank is modeled the Gen-2 way: word 0 a CRC placeholder, word 1
/// the PC, words 2.. the EPC proper. The visible EPC is whatever the PC
/// length field says, so a PC rewrite immediately changes the identifier
/// the next inventory reports.
#[derive(Debug, Clone)]
pub struct EmulatedTag {
    pub epc_bank: Vec<u8>,
    pub reserved: [u8; 8],
    pub tid: [u8; 12],
    pub locked: bool,
    pub rssi: Vec<RssiValue>,
}

impl EmulatedTag {
    pub fn new(pc: [u8; 2], epc: &[u8], tid: [u8; 12]) -> Self {
        let mut epc_bank = vec![0u8; 4];
        epc_bank[2] = pc[0];
        epc_bank[3] = pc[1];
        epc_bank.extend_from_slice(epc);
        Self {
            epc_bank,
            reserved: [0; 8],
            tid,
            locked: false,
            rssi: Vec::new(),
        }
    }

    /// Factory-fresh chip: zeroed 96-bit EPC, zero passwords, unlocked.
    pub fn blank(tid: [u8; 12]) -> Self {
        Self::new([0x30, 0x00], &[0u8; 12], tid)
    }

    pub fn pc(&self) -> [u8; 2] {
        [self.epc_bank[2], self.epc_bank[3]]
    }

    pub fn epc(&self) -> &[u8] {
        let len = usize::from(bits::pc_epc_words(self.pc())) * 2;
        let end = (4 + len).min(self.epc_bank.len());
        &self.epc_bank[4..end]
    }

    pub fn idd_hex(&self) -> String {
        bits::to_hex_upper(self.epc())
    }

    pub fn access_password(&self) -> [u8; 4] {
        [
            self.reserved[4],
            self.reserved[5],
            self.reserved[6],
            self.reserved[7],
        ]
    }

    fn write_epc_bank(&mut self, byte_offset: usize, data: &[u8]) {
        let end = byte_offset + data.len();
        if self.epc_bank.len() < end {
            self.epc_bank.resize(end, 0);
        }
        self.epc_bank[byte_offset..end].copy_from_slice(data);
    }
}

/// Operation record for sequence assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmulatedOp {
    Connect,
    Disconnect,
    Close,
    Inventory {
        mask: u8,
    },
    Read {
        bank: MemoryBank,
        start_word: u8,
        words: u8,
        auth: Option<[u8; 4]>,
    },
    Write {
        bank: MemoryBank,
        start_word: u8,
        words: u8,
        auth: Option<[u8; 4]>,
    },
    Lock {
        settings: LockSettings,
        password: [u8; 4],
    },
    StartListener {
        port: u16,
    },
    StopListener,
}

/// Shared field + scripting knobs behind every emulated driver handle.
#[derive(Debug, Default)]
pub struct EmulatedState {
    pub connected: bool,
    pub tags: Vec<EmulatedTag>,
    pub ops: Vec<EmulatedOp>,

    pub connect_failures: VecDeque<DriverError>,
    pub inventory_failures: VecDeque<DriverError>,
    pub read_failures: VecDeque<DriverError>,
    pub write_failures: VecDeque<DriverError>,
    pub lock_failures: VecDeque<DriverError>,
    /// ISO error reported alongside any scripted tag-operation failure.
    pub scripted_iso_error: Option<i32>,

    pub last_iso_error: Option<i32>,
    pub listener_port: Option<u16>,
    pub pending_events: Vec<NotificationEvent>,
    /// How many driver instances the factory has produced; reconnects
    /// bump this.
    pub constructed: u32,
}

impl EmulatedState {
    /// Queues `count` copies of `err` in front of the given failure queue.
    pub fn fail_next(queue: &mut VecDeque<DriverError>, count: u32, err: &DriverError) {
        for _ in 0..count {
            queue.push_back(err.clone());
        }
    }

    /// Operations of the given kinds, in recorded order.
    pub fn ops_of<F: Fn(&EmulatedOp) -> bool>(&self, keep: F) -> Vec<EmulatedOp> {
        self.ops.iter().filter(|op| keep(op)).cloned().collect()
    }
}

pub type SharedEmulatedState = Arc<Mutex<EmulatedState>>;

pub fn shared_state() -> SharedEmulatedState {
    Arc::new(Mutex::new(EmulatedState::default()))
}

/// Driver factory over a shared field, for the session reconnect ladder.
pub fn factory(state: SharedEmulatedState) -> crate::driver::DriverFactory {
    Arc::new(move || {
        Box::new(EmulatedReader::new(Arc::clone(&state))) as Box<dyn ReaderDriver>
    })
}

pub struct EmulatedReader {
    state: SharedEmulatedState,
}

impl EmulatedReader {
    pub fn new(state: SharedEmulatedState) -> Self {
        if let Ok(mut s) = state.lock() {
            s.constructed += 1;
        }
        Self { state }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, EmulatedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_tag_auth(
        tag: &EmulatedTag,
        password: Option<[u8; 4]>,
    ) -> DriverResult<()> {
        if tag.locked && password != Some(tag.access_password()) {
            return Err(DriverError::new(-4036, "authentication error"));
        }
        Ok(())
    }
}

impl ReaderDriver for EmulatedReader {
    fn connect(
        &mut self,
        _address: &str,
        _port: u16,
        _timeout: Duration,
    ) -> DriverResult<()> {
        let mut state = self.state();
        state.ops.push(EmulatedOp::Connect);
        if let Some(err) = state.connect_failures.pop_front() {
            return Err(err);
        }
        state.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.state();
        state.ops.push(EmulatedOp::Disconnect);
        state.connected = false;
    }

    fn close(&mut self) {
        let mut state = self.state();
        state.ops.push(EmulatedOp::Close);
        state.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn inventory(&mut self, antenna_mask: u8) -> DriverResult<Vec<InventoryItem>> {
        let mut state = self.state();
        state.ops.push(EmulatedOp::Inventory {
            mask: antenna_mask,
        });
        if let Some(err) = state.inventory_failures.pop_front() {
            return Err(err);
        }
        if state.tags.is_empty() {
            // The vendor library reports an empty field as an error code.
            return Err(DriverError::new(-4035, "no transponder in field"));
        }
        Ok(state
            .tags
            .iter()
            .map(|t| InventoryItem {
                idd_hex: t.idd_hex(),
                pc: Some(t.pc()),
                rssi: t.rssi.clone(),
            })
            .collect())
    }

    fn tag_handle(&mut self, index: usize) -> DriverResult<TagHandle> {
        let state = self.state();
        if index >= state.tags.len() {
            return Err(DriverError::new(-1, "tag index out of range"));
        }
        Ok(TagHandle(index))
    }

    fn read_blocks(
        &mut self,
        handle: TagHandle,
        bank: MemoryBank,
        start_word: u8,
        word_count: u8,
        password: Option<[u8; 4]>,
    ) -> DriverResult<Vec<u8>> {
        let mut state = self.state();
        state.ops.push(EmulatedOp::Read {
            bank,
            start_word,
            words: word_count,
            auth: password,
        });
        if let Some(err) = state.read_failures.pop_front() {
            state.last_iso_error = state.scripted_iso_error;
            return Err(err);
        }

        let tag = state
            .tags
            .get(handle.0)
            .ok_or_else(|| DriverError::new(-1, "stale tag handle"))?;

        let offset = usize::from(start_word) * 2;
        let len = usize::from(word_count) * 2;
        let source: Vec<u8> = match bank {
            MemoryBank::Reserved => {
                Self::check_tag_auth(tag, password)?;
                tag.reserved.to_vec()
            },
            MemoryBank::Epc => tag.epc_bank.clone(),
            MemoryBank::Tid => tag.tid.to_vec(),
            MemoryBank::User => Vec::new(),
        };
        if offset + len > source.len() {
            return Err(DriverError::new(-4034, "read beyond bank"));
        }
        Ok(source[offset..offset + len].to_vec())
    }

    fn write_blocks(
        &mut self,
        handle: TagHandle,
        bank: MemoryBank,
        start_word: u8,
        data: &[u8],
        password: Option<[u8; 4]>,
    ) -> DriverResult<()> {
        let mut state = self.state();
        state.ops.push(EmulatedOp::Write {
            bank,
            start_word,
            words: (data.len() / 2) as u8,
            auth: password,
        });
        if let Some(err) = state.write_failures.pop_front() {
            state.last_iso_error = state.scripted_iso_error;
            return Err(err);
        }

        let tag = state
            .tags
            .get_mut(handle.0)
            .ok_or_else(|| DriverError::new(-1, "stale tag handle"))?;
        Self::check_tag_auth(tag, password)?;

        let offset = usize::from(start_word) * 2;
        match bank {
            MemoryBank::Reserved => {
                if offset + data.len() > tag.reserved.len() {
                    return Err(DriverError::new(-4034, "write beyond bank"));
                }
                tag.reserved[offset..offset + data.len()].copy_from_slice(data);
            },
            MemoryBank::Epc => tag.write_epc_bank(offset, data),
            MemoryBank::Tid | MemoryBank::User => {
                return Err(DriverError::new(-4033, "bank is read-only"));
            },
        }
        Ok(())
    }

    fn lock(
        &mut self,
        handle: TagHandle,
        settings: LockSettings,
        password: [u8; 4],
    ) -> DriverResult<()> {
        let mut state = self.state();
        state.ops.push(EmulatedOp::Lock {
            settings,
            password,
        });
        if let Some(err) = state.lock_failures.pop_front() {
            state.last_iso_error = state.scripted_iso_error;
            return Err(err);
        }

        let tag = state
            .tags
            .get_mut(handle.0)
            .ok_or_else(|| DriverError::new(-1, "stale tag handle"))?;
        if password != tag.access_password() {
            return Err(DriverError::new(-4036, "authentication error"));
        }

        match settings.access {
            LockMode::Lock | LockMode::PermanentLock => tag.locked = true,
            LockMode::Unlock | LockMode::PermanentUnlock => tag.locked = false,
            LockMode::Unchanged => {},
        }
        Ok(())
    }

    fn last_iso_error(&self) -> Option<i32> {
        self.state().last_iso_error
    }

    fn start_listener(&mut self, port: u16) -> DriverResult<()> {
        let mut state = self.state();
        state.ops.push(EmulatedOp::StartListener { port });
        state.listener_port = Some(port);
        Ok(())
    }

    fn stop_listener(&mut self) -> DriverResult<()> {
        let mut state = self.state();
        state.ops.push(EmulatedOp::StopListener);
        state.listener_port = None;
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<NotificationEvent> {
        let mut state = self.state();
        if state.listener_port.is_none() {
            return Vec::new();
        }
        std::mem::take(&mut state.pending_events)
    }
}
