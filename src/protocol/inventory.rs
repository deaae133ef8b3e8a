// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    codec::bits,
    driver::{ReaderDriver, TagHandle},
    errors::{DriverError, GatewayError},
    tags::{Tag, TagOps},
};

/// Runs one antenna-masked inventory and decodes every item into a tag.
///
/// The index of each entry is the driver's item index, usable for handle
/// acquisition until the next inventory or EPC rewrite. An empty field is
/// a normal result: the driver's "no transponder" error code maps to an
/// empty list.
pub fn run(
    driver: &mut dyn ReaderDriver,
    antenna_mask: u8,
) -> Result<Vec<Tag>, GatewayError> {
    let items = match driver.inventory(antenna_mask) {
        Ok(items) => items,
        Err(e) if e.is_no_transponder() => Vec::new(),
        Err(e) => return Err(GatewayError::Driver(e)),
    };

    let mut tags = Vec::with_capacity(items.len());
    for item in items {
        let epc = bits::epc_from_hex(&item.idd_hex)?;
        let mut tag = Tag::from_bytes(item.pc, epc);
        tag.set_rssi_values(item.rssi);
        tags.push(tag);
    }
    Ok(tags)
}

/// The routines needing a blank tag require the field to hold exactly one.
pub fn select_single(tags: &[Tag]) -> Result<(usize, &Tag), GatewayError> {
    match tags.len() {
        0 => Err(GatewayError::NoTagInField),
        1 => Ok((0, &tags[0])),
        n => Err(GatewayError::MultipleTagsInField(n)),
    }
}

/// Selects the tag whose identifier equals `epc_hex` (uppercase).
pub fn select_by_epc<'a>(
    tags: &'a [Tag],
    epc_hex: &str,
) -> Result<(usize, &'a Tag), GatewayError> {
    if tags.is_empty() {
        return Err(GatewayError::NoTagInField);
    }
    tags.iter()
        .enumerate()
        .find(|(_, t)| t.epc_hex() == epc_hex)
        .ok_or_else(|| GatewayError::TagNotFound {
            epc: epc_hex.to_string(),
        })
}

/// Re-inventories after an EPC rewrite and acquires a fresh handle onto
/// the tag that now carries `epc_hex`. Any miss or failure here is
/// *tag-verification-failed*: the write already reported success, the tag
/// state is ambiguous, and the routine must not re-attempt the write (so
/// connection faults deliberately do not bubble into the session ladder).
pub fn reselect(
    driver: &mut dyn ReaderDriver,
    antenna_mask: u8,
    epc_hex: &str,
) -> Result<TagHandle, GatewayError> {
    let items = driver.inventory(antenna_mask).unwrap_or_default();

    let index = items
        .iter()
        .position(|item| item.idd_hex == epc_hex)
        .ok_or_else(|| GatewayError::TagVerificationFailed {
            expected: epc_hex.to_string(),
        })?;
    driver
        .tag_handle(index)
        .map_err(|_| GatewayError::TagVerificationFailed {
            expected: epc_hex.to_string(),
        })
}

/// Maps a read failure, letting connection faults bubble for the session
/// ladder.
pub fn map_read_err(e: DriverError) -> GatewayError {
    if e.is_connection_error() {
        GatewayError::Driver(e)
    } else {
        GatewayError::TagReadFailed { source: e }
    }
}
