// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Secure / unsecure: flip the circulation bit in place.
//!
//! Only the format's dynamic blocks are written: the last EPC word for
//! the 128-bit formats, the PC itself (EPC-bank word 1) for BR.

use tracing::info;

use crate::{
    driver::MemoryBank,
    errors::GatewayError,
    protocol::{inventory, retry},
    session::ManagedSession,
    tags::{Tag, TagOps},
};

#[derive(Debug)]
pub struct SecureOutcome {
    pub epc: String,
    pub tag_type: String,
    pub secured: bool,
}

pub async fn run(
    session: &ManagedSession,
    epc_hex: &str,
    secured: bool,
) -> Result<SecureOutcome, GatewayError> {
    let supplied = Tag::from_hex(epc_hex)?;
    if supplied.is_raw() {
        return Err(GatewayError::UnsupportedFormat(
            "tag format was not recognized; raw tags have no security flag"
                .to_string(),
        ));
    }
    let supplied_hex = supplied.epc_hex();
    let mask = session.config().antenna_mask();

    session
        .execute(|driver| Box::pin(async move {
            let tags = inventory::run(driver, mask)?;
            let (index, observed) = inventory::select_by_epc(&tags, &supplied_hex)?;

            // Work on the observed image: BR keeps its state in the PC,
            // which only the inventory can report faithfully.
            let mut tag = observed.clone();
            tag.set_secured(secured);
            let access = tag.access_password();
            let blocks = tag.dynamic_blocks();
            let start_word = tag.dynamic_blocks_start_word();
            info!(
                epc = %supplied_hex,
                secured,
                start_word,
                "writing security state"
            );

            let handle = driver.tag_handle(index).map_err(GatewayError::Driver)?;
            let auth = (access != [0u8; 4]).then_some(access);
            retry::block_write_ladder(driver, |d| {
                d.write_blocks(handle, MemoryBank::Epc, start_word, &blocks, auth)
            })
            .await?;

            Ok(SecureOutcome {
                epc: tag.epc_hex(),
                tag_type: tag.tag_type().to_string(),
                secured,
            })
        }))
        .await
}
