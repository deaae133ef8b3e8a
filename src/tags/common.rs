// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha512};

use crate::{codec::bits, errors::GatewayError};

/// RSSI decoration from the most recent inventory, one entry per antenna
/// that saw the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssiValue {
    pub antenna: u8,
    pub rssi: i32,
}

/// Operations every non-raw tag format implements.
///
/// `dynamic_blocks` is the smallest contiguous EPC/PC slice whose value
/// changes when only the security bit flips, addressed from
/// `dynamic_blocks_start_word` within the EPC bank (the Gen-2 layout puts
/// the PC itself at word 1, the EPC proper from word 2).
#[enum_dispatch]
pub trait TagOps {
    /// Format name reported through the API (`DE290`, `BR`, `Raw`, ...).
    fn tag_type(&self) -> &'static str;

    /// Protocol Control word, high 5 bits = EPC length in 16-bit words.
    fn pc(&self) -> [u8; 2];

    /// Defensive copy of the EPC bytes (always an even count).
    fn epc(&self) -> Vec<u8>;

    fn rssi_values(&self) -> Vec<RssiValue>;

    fn set_rssi_values(&mut self, rssi: Vec<RssiValue>);

    /// Decodes the media identifier out of the EPC payload region.
    fn media_id(&self) -> Result<String, GatewayError>;

    /// Checks `media_id` against the format's encoding rules without
    /// touching the tag. Mutation routines call this before any write.
    fn validate_media_id(&self, media_id: &str) -> Result<(), GatewayError>;

    /// Re-encodes the EPC payload region for the new media identifier,
    /// keeping PC and EPC consistent.
    fn set_media_id(&mut self, media_id: &str) -> Result<(), GatewayError>;

    fn is_secured(&self) -> bool;

    fn set_secured(&mut self, secured: bool);

    /// Gen-2 access password derived from this tag's current EPC.
    fn access_password(&self) -> [u8; 4];

    /// Gen-2 kill password derived from this tag's current EPC.
    fn kill_password(&self) -> [u8; 4];

    fn dynamic_blocks(&self) -> Vec<u8>;

    fn dynamic_blocks_start_word(&self) -> u8;
}

/// Owned `(pc, epc)` image shared by every format variant.
///
/// Accessors hand out copies so observable state is never aliased with the
/// internal buffers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagImage {
    pc: [u8; 2],
    epc: Vec<u8>,
    rssi: Vec<RssiValue>,
}

impl TagImage {
    pub fn new(pc: [u8; 2], epc: Vec<u8>) -> Self {
        Self {
            pc,
            epc,
            rssi: Vec::new(),
        }
    }

    pub fn pc(&self) -> [u8; 2] {
        self.pc
    }

    pub fn set_pc(&mut self, pc: [u8; 2]) {
        self.pc = pc;
    }

    pub fn pc_byte_mut(&mut self) -> &mut [u8; 2] {
        &mut self.pc
    }

    pub fn epc(&self) -> Vec<u8> {
        self.epc.clone()
    }

    pub fn epc_slice(&self) -> &[u8] {
        &self.epc
    }

    pub fn epc_mut(&mut self) -> &mut Vec<u8> {
        &mut self.epc
    }

    pub fn epc_hex(&self) -> String {
        bits::to_hex_upper(&self.epc)
    }

    pub fn rssi(&self) -> Vec<RssiValue> {
        self.rssi.clone()
    }

    pub fn set_rssi(&mut self, rssi: Vec<RssiValue>) {
        self.rssi = rssi;
    }

    /// Security flag of the 128-bit formats: LSB of the last EPC byte.
    pub fn trailing_bit(&self) -> bool {
        self.epc.last().is_some_and(|b| b & 0x01 != 0)
    }

    pub fn set_trailing_bit(&mut self, on: bool) {
        if let Some(b) = self.epc.last_mut() {
            *b = if on { *b | 0x01 } else { *b & !0x01 };
        }
    }
}

/// Password derivation of the hash-derived formats: first 4 bytes of
/// SHA-512 over the 12-byte EPC prefix followed by the secret key.
pub fn sha512_password(epc_prefix: &[u8], secret: &str) -> [u8; 4] {
    let mut hasher = Sha512::new();
    hasher.update(epc_prefix);
    hasher.update(secret.as_bytes());
    let digest = hasher.finalize();
    [digest[0], digest[1], digest[2], digest[3]]
}

/// BR password derivation: SHA-1 over the uppercase hex rendering of the
/// full EPC followed by the secret, taking digest bytes 0, 2, 3 and 6.
pub fn sha1_password(epc: &[u8], secret: &str) -> [u8; 4] {
    let mut hasher = Sha1::new();
    hasher.update(bits::to_hex_upper(epc).as_bytes());
    hasher.update(secret.as_bytes());
    let digest = hasher.finalize();
    [digest[0], digest[2], digest[3], digest[6]]
}
