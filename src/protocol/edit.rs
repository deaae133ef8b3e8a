// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Edit: rewrite the media id of an already-formatted tag.
//!
//! The access password is a function of the EPC that is itself being
//! rewritten, so the routine tracks both derivations: the old password
//! opens the tag, the new one locks it again.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    driver::{LockSettings, MemoryBank},
    errors::GatewayError,
    protocol::{inventory, retry},
    session::ManagedSession,
    tags::{Tag, TagOps},
};

const EPC_SETTLE_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct EditOutcome {
    pub old_epc: String,
    pub new_epc: String,
    pub media_id: String,
    pub tag_type: String,
}

pub async fn run(
    session: &ManagedSession,
    epc_hex: &str,
    new_media_id: &str,
) -> Result<EditOutcome, GatewayError> {
    let old_tag = Tag::from_hex(epc_hex)?;
    if old_tag.is_raw() {
        return Err(GatewayError::UnsupportedFormat(
            "tag format was not recognized; raw tags cannot be edited".to_string(),
        ));
    }
    old_tag.validate_media_id(new_media_id)?;

    // The new image inherits everything but the media id (DE386 keeps its
    // version byte, the security bit stays as observed).
    let mut new_tag = old_tag.clone();
    new_tag.set_media_id(new_media_id)?;

    let old_epc_hex = old_tag.epc_hex();
    let old_access = old_tag.access_password();
    let new_epc = new_tag.epc();
    let new_epc_hex = new_tag.epc_hex();
    let new_access = new_tag.access_password();
    let new_kill = new_tag.kill_password();
    let same_length = new_epc.len() == old_tag.epc().len();

    let mask = session.config().antenna_mask();

    session
        .execute(|driver| Box::pin(async move {
            let tags = inventory::run(driver, mask)?;
            let (index, _) = inventory::select_by_epc(&tags, &old_epc_hex)?;
            info!(
                old = %old_epc_hex,
                new = %new_epc_hex,
                same_length,
                "editing media id"
            );
            let handle = driver.tag_handle(index).map_err(GatewayError::Driver)?;

            // Tags that were never locked make this step fail; that is
            // fine, the writes below tell us whether the tag is open.
            if let Err(e) = driver.lock(handle, LockSettings::unlock_all(), old_access)
            {
                if e.is_connection_error() {
                    return Err(GatewayError::Driver(e));
                }
                warn!("unlock before edit failed, continuing: {e}");
            }

            let mut reserved = [0u8; 8];
            reserved[..4].copy_from_slice(&new_kill);
            reserved[4..].copy_from_slice(&new_access);
            retry::block_write_ladder(driver, |d| {
                d.write_blocks(handle, MemoryBank::Reserved, 0, &reserved, None)
            })
            .await?;

            if same_length {
                // Only the EPC words change; leave the PC untouched.
                retry::block_write_ladder(driver, |d| {
                    d.write_blocks(handle, MemoryBank::Epc, 2, &new_epc, None)
                })
                .await?;
            } else {
                let pc_new = new_tag.pc();
                let mut image = Vec::with_capacity(2 + new_epc.len());
                image.extend_from_slice(&pc_new);
                image.extend_from_slice(&new_epc);
                retry::block_write_ladder(driver, |d| {
                    d.write_blocks(handle, MemoryBank::Epc, 1, &image, None)
                })
                .await?;
            }

            sleep(EPC_SETTLE_DELAY).await;
            let fresh = inventory::reselect(driver, mask, &new_epc_hex)?;

            retry::lock_ladder(driver, |d| {
                d.lock(fresh, LockSettings::lock_all(), new_access)
            })
            .await?;

            Ok(EditOutcome {
                old_epc: old_epc_hex.clone(),
                new_epc: new_epc_hex.clone(),
                media_id: new_media_id.to_string(),
                tag_type: new_tag.tag_type().to_string(),
            })
        }))
        .await
}
