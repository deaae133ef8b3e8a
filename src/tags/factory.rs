// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Header-based discrimination of raw EPC bytes into the format family.

use enum_dispatch::enum_dispatch;

use crate::{
    cfg::enums::TagFormat,
    codec::bits,
    errors::GatewayError,
    tags::{
        br::{self, BrTag},
        common::TagOps,
        de6::{DE6_HEADER, De6Tag},
        de290::{CD290_HEADER, DE290_HEADER, De290Tag},
        de290f::{DE290F_HEADER, De290FTag},
        de386::{DE386_HEADER, De386Tag},
        raw::RawTag,
        RssiValue,
    },
};

/// EPC byte length of the fixed 128-bit formats.
const FIXED_EPC_LEN: usize = 16;

/// The closed set of supported tag formats.
#[enum_dispatch(TagOps)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    De290Tag(De290Tag),
    De290FTag(De290FTag),
    De386Tag(De386Tag),
    De6Tag(De6Tag),
    BrTag(BrTag),
    RawTag(RawTag),
}

impl Tag {
    /// Discriminates raw inventory bytes into a format instance.
    ///
    /// Rules are evaluated in order, first match wins; the fixed formats
    /// additionally require the full 128-bit EPC so later offset-based
    /// accessors stay in bounds. A missing PC is synthesized per format:
    /// the length field always reflects the EPC byte count, DE6 gets its
    /// fixed `0x4400` word, BR gets the non-GS1 bit and the unsecured
    /// marker.
    pub fn from_bytes(pc: Option<[u8; 2]>, epc: Vec<u8>) -> Self {
        let synthesized = pc.is_none();
        let pc = pc.unwrap_or_else(|| bits::pc_for_epc_len(epc.len()));

        if epc.len() == FIXED_EPC_LEN {
            let header: [u8; 4] = [epc[0], epc[1], epc[2], epc[3]];
            match header {
                DE386_HEADER => return De386Tag::from_parts(pc, epc).into(),
                DE290F_HEADER => return De290FTag::from_parts(pc, epc).into(),
                DE6_HEADER => {
                    let pc = if synthesized { [0x44, 0x00] } else { pc };
                    return De6Tag::from_parts(pc, epc).into();
                },
                DE290_HEADER => return De290Tag::from_parts(pc, epc, false).into(),
                CD290_HEADER => return De290Tag::from_parts(pc, epc, true).into(),
                _ => {},
            }
        }

        if BrTag::matches_layout(&epc) {
            let pc = if synthesized {
                [pc[0] | 0x01, br::PC_UNSECURED]
            } else {
                pc
            };
            return BrTag::from_parts(pc, epc).into();
        }

        RawTag::from_parts(pc, epc).into()
    }

    /// Hex-string entry point used by the HTTP surface. Hex validation
    /// errors are surfaced distinctly from format validation errors.
    pub fn from_hex(epc_hex: &str) -> Result<Self, GatewayError> {
        let epc = bits::epc_from_hex(epc_hex)?;
        Ok(Self::from_bytes(None, epc))
    }

    /// Builds the theoretical image of a fresh tag for initialization.
    pub fn new_formatted(
        format: TagFormat,
        media_id: &str,
        secured: bool,
    ) -> Result<Self, GatewayError> {
        Ok(match format {
            TagFormat::De290 => De290Tag::new(media_id, secured, false)?.into(),
            TagFormat::Cd290 => De290Tag::new(media_id, secured, true)?.into(),
            TagFormat::De6 => De6Tag::new(media_id, secured)?.into(),
            TagFormat::De290F => De290FTag::new(media_id, secured)?.into(),
            TagFormat::De386 => De386Tag::new(media_id, secured)?.into(),
        })
    }

    /// Uppercase hex of the EPC, the identifier used throughout the API.
    pub fn epc_hex(&self) -> String {
        bits::to_hex_upper(&self.epc())
    }

    /// Uppercase hex of the PC word.
    pub fn pc_hex(&self) -> String {
        bits::to_hex_upper(&self.pc())
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Tag::RawTag(_))
    }
}
