// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Fallback for EPCs matching no known header. The media id is the raw
//! EPC as uppercase hex; mutation is not supported.

use crate::{
    errors::GatewayError,
    tags::common::{RssiValue, TagImage, TagOps},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTag {
    image: TagImage,
}

impl RawTag {
    pub fn from_parts(pc: [u8; 2], epc: Vec<u8>) -> Self {
        Self {
            image: TagImage::new(pc, epc),
        }
    }
}

impl TagOps for RawTag {
    fn tag_type(&self) -> &'static str {
        "Raw"
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
        Ok(self.image.epc_hex())
    }

    fn validate_media_id(&self, _media_id: &str) -> Result<(), GatewayError> {
        Err(GatewayError::InvalidMediaId(
            "raw tags do not carry a writable media id".to_string(),
        ))
    }

    fn set_media_id(&mut self, media_id: &str) -> Result<(), GatewayError> {
        self.validate_media_id(media_id)
    }

    fn is_secured(&self) -> bool {
        false
    }

    fn set_secured(&mut self, _secured: bool) {}

    fn access_password(&self) -> [u8; 4] {
        [0; 4]
    }

    fn kill_password(&self) -> [u8; 4] {
        [0; 4]
    }

    fn dynamic_blocks(&self) -> Vec<u8> {
        Vec::new()
    }

    fn dynamic_blocks_start_word(&self) -> u8 {
        0
    }
}
