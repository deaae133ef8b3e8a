// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! DE386 format: 128-bit EPC with a right-aligned ASCII media id.
//!
//! Bytes 4..14 hold 1 to 10 ASCII characters flush against byte 14, padded
//! on the left with `0x00` (or `0x20` on tags written by older tooling).
//! Byte 14 is a user-visible version byte that survives media-id rewrites;
//! the LSB of byte 15 is the security flag.

use crate::{
    codec::bits,
    errors::GatewayError,
    tags::{
        common::{RssiValue, TagImage, TagOps, sha512_password},
        passwords,
    },
};

pub const DE386_HEADER: [u8; 4] = [0x19, 0xEA, 0xF3, 0x21];

const EPC_LEN: usize = 16;
const DEFAULT_PC: [u8; 2] = [0x40, 0x00];
const MEDIA_ID_END: usize = 14;
const MAX_MEDIA_ID_LEN: usize = 10;
const INITIAL_VERSION: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct De386Tag {
    image: TagImage,
}

impl De386Tag {
    pub fn from_parts(pc: [u8; 2], epc: Vec<u8>) -> Self {
        Self {
            image: TagImage::new(pc, epc),
        }
    }

    pub fn new(media_id: &str, secured: bool) -> Result<Self, GatewayError> {
        let mut epc = vec![0u8; EPC_LEN];
        epc[..4].copy_from_slice(&DE386_HEADER);
        epc[14] = INITIAL_VERSION;
        let mut tag = Self {
            image: TagImage::new(DEFAULT_PC, epc),
        };
        tag.set_media_id(media_id)?;
        tag.set_secured(secured);
        Ok(tag)
    }

    /// The version byte at EPC offset 14.
    pub fn version(&self) -> u8 {
        self.image.epc_slice()[14]
    }

    fn check_media_id(media_id: &str) -> Result<(), GatewayError> {
        if media_id.is_empty() || media_id.len() > MAX_MEDIA_ID_LEN {
            return Err(GatewayError::InvalidMediaId(format!(
                "media id must be 1..={MAX_MEDIA_ID_LEN} characters, got {}",
                media_id.len()
            )));
        }
        if !media_id.is_ascii() {
            return Err(GatewayError::InvalidMediaId(format!(
                "{media_id:?} contains non-ASCII characters"
            )));
        }
        Ok(())
    }
}

impl TagOps for De386Tag {
    fn tag_type(&self) -> &'static str {
        "DE386"
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
        let region = &self.image.epc_slice()[4..MEDIA_ID_END];
        let start = region
            .iter()
            .position(|b| *b != 0x00 && *b != 0x20)
            .unwrap_or(region.len());
        String::from_utf8(region[start..].to_vec()).map_err(|_| {
            GatewayError::InvalidMediaId(
                "media id region holds non-ASCII bytes".to_string(),
            )
        })
    }

    fn validate_media_id(&self, media_id: &str) -> Result<(), GatewayError> {
        Self::check_media_id(media_id)
    }

    fn set_media_id(&mut self, media_id: &str) -> Result<(), GatewayError> {
        Self::check_media_id(media_id)?;
        let epc = self.image.epc_mut();
        let start = MEDIA_ID_END - media_id.len();
        epc[4..start].fill(0x00);
        epc[start..MEDIA_ID_END].copy_from_slice(media_id.as_bytes());
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
            &passwords::lookup("DE386Tag", "access"),
        )
    }

    fn kill_password(&self) -> [u8; 4] {
        sha512_password(
            &self.image.epc_slice()[..12],
            &passwords::lookup("DE386Tag", "kill"),
        )
    }

    fn dynamic_blocks(&self) -> Vec<u8> {
        self.image.epc_slice()[14..16].to_vec()
    }

    fn dynamic_blocks_start_word(&self) -> u8 {
        9
    }
}
