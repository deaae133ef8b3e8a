// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! DE290F format: DE290's frame with a discriminated media-id union.
//!
//! EPC byte 4 selects how the 7-byte payload at bytes 5..12 is read:
//!
//! | type | meaning |
//! |---|---|
//! | 0x01 | plain big-endian number |
//! | 0x02 | number rendered with an `@` prefix |
//! | 0x03 | number rendered as `49HBZUBD` + 7 zero-padded digits |
//! | 0x04 | 8 Code40 symbols in bytes 6..12 (byte 5 unused) |
//!
//! Security bit and password derivation are inherited from DE290,
//! including the `DE290Tag.*` password keys.

use crate::{
    codec::{bits, code40},
    errors::GatewayError,
    tags::{
        common::{RssiValue, TagImage, TagOps, sha512_password},
        passwords,
    },
};

pub const DE290F_HEADER: [u8; 4] = [0x19, 0xE9, 0xF8, 0x77];

const EPC_LEN: usize = 16;
const DEFAULT_PC: [u8; 2] = [0x40, 0x00];
const PASSWORD_FORMAT: &str = "DE290Tag";

const ID_TYPE_PLAIN: u8 = 0x01;
const ID_TYPE_AT: u8 = 0x02;
const ID_TYPE_HBZU: u8 = 0x03;
const ID_TYPE_CODE40: u8 = 0x04;

const HBZU_PREFIX: &str = "49HBZUBD";
const HBZU_MAX: u64 = 9_999_999;
const CODE40_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct De290FTag {
    image: TagImage,
}

impl De290FTag {
    pub fn from_parts(pc: [u8; 2], epc: Vec<u8>) -> Self {
        Self {
            image: TagImage::new(pc, epc),
        }
    }

    pub fn new(media_id: &str, secured: bool) -> Result<Self, GatewayError> {
        let mut epc = vec![0u8; EPC_LEN];
        epc[..4].copy_from_slice(&DE290F_HEADER);
        let mut tag = Self {
            image: TagImage::new(DEFAULT_PC, epc),
        };
        tag.set_media_id(media_id)?;
        tag.set_secured(secured);
        Ok(tag)
    }

    /// The id-type discriminator at EPC offset 4.
    pub fn id_type(&self) -> u8 {
        self.image.epc_slice()[4]
    }

    /// Encodes `media_id` into `(id_type, payload)` without touching the
    /// tag. The input decides the encoding: an 8-character Code40 string
    /// wins over the HBZU form, which wins over `@`-prefixed, which wins
    /// over plain numeric.
    fn encode_payload(media_id: &str) -> Result<(u8, [u8; 7]), GatewayError> {
        let mut payload = [0u8; 7];

        if media_id.len() == CODE40_LEN && code40::is_encodable(media_id) {
            let words = code40::encode(media_id)?;
            // 8 symbols pad to 3 words = 6 bytes behind the unused marker
            // byte.
            payload[1..7].copy_from_slice(&words);
            return Ok((ID_TYPE_CODE40, payload));
        }

        if let Some(digits) = media_id.strip_prefix(HBZU_PREFIX) {
            if media_id.len() != HBZU_PREFIX.len() + 7
                || !digits.chars().all(|c| c.is_ascii_digit())
            {
                return Err(GatewayError::InvalidMediaId(format!(
                    "{media_id:?} must be {HBZU_PREFIX} followed by exactly 7 digits"
                )));
            }
            let value = digits.parse::<u64>().map_err(|_| {
                GatewayError::InvalidMediaId(format!(
                    "{media_id:?} has a non-numeric {HBZU_PREFIX} suffix"
                ))
            })?;
            if value > HBZU_MAX {
                return Err(GatewayError::InvalidMediaId(format!(
                    "{media_id:?} exceeds the {HBZU_PREFIX} range"
                )));
            }
            Self::encode_numeric(value, &mut payload)?;
            return Ok((ID_TYPE_HBZU, payload));
        }

        if let Some(digits) = media_id.strip_prefix('@') {
            let value = Self::parse_numeric(digits)?;
            Self::encode_numeric(value, &mut payload)?;
            return Ok((ID_TYPE_AT, payload));
        }

        let value = Self::parse_numeric(media_id)?;
        Self::encode_numeric(value, &mut payload)?;
        Ok((ID_TYPE_PLAIN, payload))
    }

    fn parse_numeric(digits: &str) -> Result<u64, GatewayError> {
        digits.parse::<u64>().map_err(|_| {
            GatewayError::InvalidMediaId(format!(
                "{digits:?} is not a decimal number"
            ))
        })
    }

    fn encode_numeric(value: u64, payload: &mut [u8; 7]) -> Result<(), GatewayError> {
        if !bits::u64_to_be(value, payload) {
            return Err(GatewayError::InvalidMediaId(format!(
                "{value} does not fit into 7 bytes"
            )));
        }
        Ok(())
    }
}

impl TagOps for De290FTag {
    fn tag_type(&self) -> &'static str {
        "DE290F"
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
        let epc = self.image.epc_slice();
        match epc[4] {
            ID_TYPE_PLAIN => Ok(bits::u64_from_be(&epc[5..12]).to_string()),
            ID_TYPE_AT => Ok(format!("@{}", bits::u64_from_be(&epc[5..12]))),
            ID_TYPE_HBZU => {
                let value = bits::u64_from_be(&epc[5..12]);
                if value > HBZU_MAX {
                    return Err(GatewayError::InvalidMediaId(format!(
                        "{value} exceeds the {HBZU_PREFIX} range"
                    )));
                }
                Ok(format!("{HBZU_PREFIX}{value:07}"))
            },
            ID_TYPE_CODE40 => {
                // Byte 5 is an unused marker; the 3 Code40 words sit at
                // bytes 6..12.
                let decoded = code40::decode(&epc[6..12])?;
                Ok(decoded.trim_end_matches(' ').to_string())
            },
            other => Err(GatewayError::InvalidMediaId(format!(
                "unknown DE290F id type 0x{other:02X}"
            ))),
        }
    }

    fn validate_media_id(&self, media_id: &str) -> Result<(), GatewayError> {
        Self::encode_payload(media_id).map(|_| ())
    }

    fn set_media_id(&mut self, media_id: &str) -> Result<(), GatewayError> {
        let (id_type, payload) = Self::encode_payload(media_id)?;
        let epc = self.image.epc_mut();
        epc[4] = id_type;
        epc[5..12].copy_from_slice(&payload);
        epc[12..15].fill(0);
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
