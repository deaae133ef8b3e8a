// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! DE290 format: 128-bit EPC, numeric media id.
//!
//! Layout: 4 header bytes, bytes 4..12 the media id as a big-endian
//! integer, bytes 12..15 zero, LSB of byte 15 the circulation-security
//! flag. CD290 is the legacy header variant with identical semantics.

use crate::{
    codec::bits,
    errors::GatewayError,
    tags::{
        common::{RssiValue, TagImage, TagOps, sha512_password},
        passwords,
    },
};

pub const DE290_HEADER: [u8; 4] = [0x19, 0xE9, 0xF8, 0x71];
pub const CD290_HEADER: [u8; 4] = [0x13, 0x81, 0xF8, 0x71];

const EPC_LEN: usize = 16;
const DEFAULT_PC: [u8; 2] = [0x40, 0x00];

/// CD290 shares the DE290 password configuration.
const PASSWORD_FORMAT: &str = "DE290Tag";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct De290Tag {
    image: TagImage,
    legacy: bool,
}

impl De290Tag {
    /// Wraps an EPC image observed in the field; the caller has already
    /// matched one of the two headers.
    pub fn from_parts(pc: [u8; 2], epc: Vec<u8>, legacy: bool) -> Self {
        Self {
            image: TagImage::new(pc, epc),
            legacy,
        }
    }

    /// Builds the theoretical image for a fresh tag.
    pub fn new(media_id: &str, secured: bool, legacy: bool) -> Result<Self, GatewayError> {
        let header = if legacy { CD290_HEADER } else { DE290_HEADER };
        let mut epc = vec![0u8; EPC_LEN];
        epc[..4].copy_from_slice(&header);
        let mut tag = Self {
            image: TagImage::new(DEFAULT_PC, epc),
            legacy,
        };
        tag.set_media_id(media_id)?;
        tag.set_secured(secured);
        Ok(tag)
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    fn parse_media_id(media_id: &str) -> Result<u64, GatewayError> {
        media_id.parse::<u64>().map_err(|_| {
            GatewayError::InvalidMediaId(format!(
                "{media_id:?} is not a decimal number"
            ))
        })
    }
}

impl TagOps for De290Tag {
    fn tag_type(&self) -> &'static str {
        if self.legacy { "CD290" } else { "DE290" }
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
        Ok(bits::u64_from_be(&self.image.epc_slice()[4..12]).to_string())
    }

    fn validate_media_id(&self, media_id: &str) -> Result<(), GatewayError> {
        Self::parse_media_id(media_id).map(|_| ())
    }

    fn set_media_id(&mut self, media_id: &str) -> Result<(), GatewayError> {
        let value = Self::parse_media_id(media_id)?;
        bits::u64_to_be(value, &mut self.image.epc_mut()[4..12]);
        Ok(())
    }

    fn is_secured(&self) -> bool {
        self.image.trailing_bit()
    }

    fn set_secured(&mut self, secured: bool) {
        self.image.set_trailing_bit(secured);
    }

    fn access_password(&self) -> [u8; 4] {
        sha512_password(
            &self.image.epc_slice()[..12],
            &passwords::lookup(PASSWORD_FORMAT, "access"),
        )
    }

    fn kill_password(&self) -> [u8; 4] {
        sha512_password(
            &self.image.epc_slice()[..12],
            &passwords::lookup(PASSWORD_FORMAT, "kill"),
        )
    }

    fn dynamic_blocks(&self) -> Vec<u8> {
        self.image.epc_slice()[14..16].to_vec()
    }

    fn dynamic_blocks_start_word(&self) -> u8 {
        9
    }
}
