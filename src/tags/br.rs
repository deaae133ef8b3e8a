// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! BR format: variable-length EPC carrying a six-bit ASCII payload.
//!
//! EPC byte 0 is `0x41`, byte 1 the payload length in bytes, bytes 2..
//! the packed payload plus one zero byte when the payload length is odd.
//! The security flag lives in the PC: byte 1 is `0x07` when secured and
//! `0xC2` when not, and bit 0 of byte 0 marks the EPC as non-GS1.

use crate::{
    codec::{bits, sixbit},
    errors::GatewayError,
    tags::{
        common::{RssiValue, TagImage, TagOps, sha1_password},
        passwords,
    },
};

pub const BR_HEADER_BYTE: u8 = 0x41;

pub const PC_SECURED: u8 = 0x07;
pub const PC_UNSECURED: u8 = 0xC2;

/// Bit 0 of PC byte 0: the EPC does not carry a GS1 identifier.
const PC_NON_GS1: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrTag {
    image: TagImage,
}

impl BrTag {
    pub fn from_parts(pc: [u8; 2], epc: Vec<u8>) -> Self {
        Self {
            image: TagImage::new(pc, epc),
        }
    }

    /// Builds the theoretical image for a payload string; used by tests
    /// and by clients computing expected layouts.
    pub fn new(media_id: &str, secured: bool) -> Result<Self, GatewayError> {
        let mut tag = Self {
            image: TagImage::new([PC_NON_GS1, PC_UNSECURED], Vec::new()),
        };
        tag.set_media_id(media_id)?;
        tag.set_secured(secured);
        Ok(tag)
    }

    /// Structural check used by the factory: header byte, then a length
    /// byte that accounts for the payload plus its evenness padding.
    pub fn matches_layout(epc: &[u8]) -> bool {
        if epc.len() < 2 || epc[0] != BR_HEADER_BYTE {
            return false;
        }
        let payload = usize::from(epc[1]);
        epc.len() == 2 + payload + payload % 2
    }

    fn payload(&self) -> &[u8] {
        let epc = self.image.epc_slice();
        let len = usize::from(epc[1]);
        &epc[2..2 + len]
    }
}

impl TagOps for BrTag {
    fn tag_type(&self) -> &'static str {
        "BR"
    }

    fn pc(&self) -> [u8; 2] {
        self.image.pc()
    }

    fn epc(&self) -> Vec<u8> {
        self.image.epc()
    }

    fn rssi_values(&self) -> Vec<RssiValue> {
        self.image.rssi()
    }

    fn set_rssi_values(&mut self, rssi: Vec<RssiValue>) {
        self.image.set_rssi(rssi);
    }

    fn media_id(&self) -> Result<String, GatewayError> {
        Ok(sixbit::decode(self.payload()))
    }

    fn validate_media_id(&self, media_id: &str) -> Result<(), GatewayError> {
        if media_id.is_empty() {
            return Err(GatewayError::InvalidMediaId(
                "media id must not be empty".to_string(),
            ));
        }
        let payload = sixbit::encode(media_id)?;
        if payload.len() > usize::from(u8::MAX) {
            return Err(GatewayError::InvalidMediaId(
                "media id does not fit into a BR payload".to_string(),
            ));
        }
        Ok(())
    }

    fn set_media_id(&mut self, media_id: &str) -> Result<(), GatewayError> {
        self.validate_media_id(media_id)?;
        let payload = sixbit::encode(media_id)?;

        let mut epc = Vec::with_capacity(2 + payload.len() + payload.len() % 2);
        epc.push(BR_HEADER_BYTE);
        epc.push(payload.len() as u8);
        epc.extend_from_slice(&payload);
        if payload.len() % 2 != 0 {
            epc.push(0);
        }

        let pc = self.image.pc();
        let words = (epc.len() / 2) as u8;
        self.image
            .set_pc(bits::pc_with_epc_words([pc[0] | PC_NON_GS1, pc[1]], words));
        *self.image.epc_mut() = epc;
        Ok(())
    }

    fn is_secured(&self) -> bool {
        self.image.pc()[1] == PC_SECURED
    }

    fn set_secured(&mut self, secured: bool) {
        let pc = self.image.pc_byte_mut();
        pc[0] |= PC_NON_GS1;
        pc[1] = if secured { PC_SECURED } else { PC_UNSECURED };
    }

    fn access_password(&self) -> [u8; 4] {
        sha1_password(
            self.image.epc_slice(),
            &passwords::lookup("BRTag", "secret"),
        )
    }

    fn kill_password(&self) -> [u8; 4] {
        self.access_password()
    }

    /// The whole PC word; BR keeps its security state there.
    fn dynamic_blocks(&self) -> Vec<u8> {
        self.image.pc().to_vec()
    }

    fn dynamic_blocks_start_word(&self) -> u8 {
        1
    }
}
