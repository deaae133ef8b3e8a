// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! DE6 format: DE290's numeric layout under its own header, PC pinned to
//! `0x4400`.

use crate::{
    codec::bits,
    errors::GatewayError,
    tags::{
        common::{RssiValue, TagImage, TagOps, sha512_password},
        passwords,
    },
};

pub const DE6_HEADER: [u8; 4] = [0x19, 0xED, 0x00, 0x01];

const EPC_LEN: usize = 16;
const FIXED_PC: [u8; 2] = [0x44, 0x00];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct De6Tag {
    image: TagImage,
}

impl De6Tag {
    pub fn from_parts(pc: [u8; 2], epc: Vec<u8>) -> Self {
        Self {
            image: TagImage::new(pc, epc),
        }
    }

    pub fn new(media_id: &str, secured: bool) -> Result<Self, GatewayError> {
        let mut epc = vec![0u8; EPC_LEN];
        epc[..4].copy_from_slice(&DE6_HEADER);
        let mut tag = Self {
            image: TagImage::new(FIXED_PC, epc),
        };
        tag.set_media_id(media_id)?;
        tag.set_secured(secured);
        Ok(tag)
    }

    fn parse_media_id(media_id: &str) -> Result<u64, GatewayError> {
        media_id.parse::<u64>().map_err(|_| {
            GatewayError::InvalidMediaId(format!(
                "{media_id:?} is not a decimal number"
            ))
        })
    }
}

impl TagOps for De6Tag {
    fn tag_type(&self) -> &'static str {
        "DE6"
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
        self.image.set_pc(FIXED_PC);
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
            &passwords::lookup("DE6Tag", "access"),
        )
    }

    fn kill_password(&self) -> [u8; 4] {
        sha512_password(
            &self.image.epc_slice()[..12],
            &passwords::lookup("DE6Tag", "kill"),
        )
    }

    fn dynamic_blocks(&self) -> Vec<u8> {
        self.image.epc_slice()[14..16].to_vec()
    }

    fn dynamic_blocks_start_word(&self) -> u8 {
        9
    }
}
