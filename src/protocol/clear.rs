// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Clear: restore a tag to a neutral identity, EPC = its TID.

use tracing::{info, warn};

use crate::{
    codec::bits,
    driver::{LockSettings, MemoryBank},
    errors::GatewayError,
    protocol::{inventory, retry},
    session::ManagedSession,
    tags::{Tag, TagOps},
};

const TID_WORDS: u8 = 6;
const TID_BYTES: usize = 12;

/// PC written alongside the TID-EPC: length field 6 words, flags zero.
const CLEARED_PC: [u8; 2] = [0x30, 0x00];

#[derive(Debug)]
pub struct ClearOutcome {
    pub old_epc: String,
    pub new_epc: String,
    pub new_pc: String,
    pub tid: String,
}

/// Unlocks (best effort), zeroes both passwords, and rewrites PC+EPC with
/// the chip's TID.
///
/// The password wipe is issued without authentication; if the tag is
/// locked under a password this gateway cannot derive, the write fails
/// through the ladder as *tag-write-failed* rather than silently
/// succeeding.
pub async fn run(
    session: &ManagedSession,
    epc_hex: &str,
) -> Result<ClearOutcome, GatewayError> {
    let old_tag = Tag::from_hex(epc_hex)?;
    let old_epc_hex = old_tag.epc_hex();
    let old_access = old_tag.access_password();
    let mask = session.config().antenna_mask();

    session
        .execute(|driver| Box::pin(async move {
            let tags = inventory::run(driver, mask)?;
            let (index, _) = inventory::select_by_epc(&tags, &old_epc_hex)?;
            let handle = driver.tag_handle(index).map_err(GatewayError::Driver)?;

            let tid = driver
                .read_blocks(handle, MemoryBank::Tid, 0, TID_WORDS, None)
                .map_err(inventory::map_read_err)?;
            if tid.len() != TID_BYTES {
                return Err(GatewayError::TidReadInvalid(tid.len()));
            }
            let tid_hex = bits::to_hex_upper(&tid);
            info!(old = %old_epc_hex, tid = %tid_hex, "clearing tag");

            if old_access != [0u8; 4] {
                if let Err(e) =
                    driver.lock(handle, LockSettings::unlock_all(), old_access)
                {
                    if e.is_connection_error() {
                        return Err(GatewayError::Driver(e));
                    }
                    warn!("unlock before clear failed, continuing: {e}");
                }
            }

            // Zero kill and access passwords.
            retry::block_write_ladder(driver, |d| {
                d.write_blocks(handle, MemoryBank::Reserved, 0, &[0u8; 8], None)
            })
            .await?;

            let mut image = Vec::with_capacity(2 + TID_BYTES);
            image.extend_from_slice(&CLEARED_PC);
            image.extend_from_slice(&tid);
            retry::block_write_ladder(driver, |d| {
                d.write_blocks(handle, MemoryBank::Epc, 1, &image, None)
            })
            .await?;

            Ok(ClearOutcome {
                old_epc: old_epc_hex.clone(),
                new_epc: tid_hex.clone(),
                new_pc: bits::to_hex_upper(&CLEARED_PC),
                tid: tid_hex,
            })
        })
        .await
}
