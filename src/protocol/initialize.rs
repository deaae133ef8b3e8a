// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Initialize: blank tag → formatted, passworded, locked.

use std::time::Duration;

use tokio::time::sleep;
use tracing::info;

use crate::{
    cfg::enums::TagFormat,
    driver::{LockSettings, MemoryBank},
    errors::GatewayError,
    protocol::{inventory, retry},
    session::ManagedSession,
    tags::{Tag, TagOps},
};

/// The chip needs a moment to restart with its new EPC before it answers
/// the verification inventory.
const EPC_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Writes passwords, PC+EPC, and the lock state onto the single blank tag
/// in the field. Returns the written tag image.
///
/// Password and EPC writes assume a blank (unlocked, zero-password) chip
/// and go out unauthenticated; the final lock authenticates with the
/// access password derived from the new EPC.
pub async fn run(
    session: &ManagedSession,
    format: TagFormat,
    media_id: &str,
    secured: bool,
) -> Result<Tag, GatewayError> {
    let new_tag = Tag::new_formatted(format, media_id, secured)?;
    let mask = session.config().antenna_mask();

    let epc_new = new_tag.epc();
    let pc_new = new_tag.pc();
    let epc_new_hex = new_tag.epc_hex();
    let access = new_tag.access_password();
    let kill = new_tag.kill_password();

    session
        .execute(|driver| Box::pin(async move {
            let tags = inventory::run(driver, mask)?;
            let (index, observed) = inventory::select_single(&tags)?;
            info!(
                found = %observed.epc_hex(),
                writing = %epc_new_hex,
                "initializing tag"
            );
            let handle = driver.tag_handle(index).map_err(GatewayError::Driver)?;

            // Reserved bank word 0: kill ‖ access.
            let mut reserved = [0u8; 8];
            reserved[..4].copy_from_slice(&kill);
            reserved[4..].copy_from_slice(&access);
            retry::block_write_ladder(driver, |d| {
                d.write_blocks(handle, MemoryBank::Reserved, 0, &reserved, None)
            })
            .await?;

            // EPC bank word 1: PC ‖ EPC in one write.
            let mut image = Vec::with_capacity(2 + epc_new.len());
            image.extend_from_slice(&pc_new);
            image.extend_from_slice(&epc_new);
            retry::block_write_ladder(driver, |d| {
                d.write_blocks(handle, MemoryBank::Epc, 1, &image, None)
            })
            .await?;

            // The old handle died with the old EPC.
            sleep(EPC_SETTLE_DELAY).await;
            let fresh = inventory::reselect(driver, mask, &epc_new_hex)?;

            retry::lock_ladder(driver, |d| {
                d.lock(fresh, LockSettings::lock_all(), access)
            })
            .await?;

            Ok(new_tag.clone())
        }))
        .await
}
