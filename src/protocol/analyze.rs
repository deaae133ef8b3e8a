// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Analyze: read-only inspection of a tag against its theoretical layout.
//!
//! No writes are issued. The Reserved bank is probed twice, without and
//! with the theoretical access password, and the two outcomes drive the
//! lock-status and security verdicts.

use serde::Serialize;

use crate::{
    codec::bits,
    driver::{MemoryBank, ReaderDriver, TagHandle},
    errors::GatewayError,
    protocol::inventory,
    session::ManagedSession,
    tags::{Tag, TagOps},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeReport {
    pub tag_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    pub epc_bank: EpcBankReport,
    pub tid_bank: TidBankReport,
    pub reserved_bank: ReservedBankReport,
    pub lock_status: LockStatusReport,
    pub security_assessment: SecurityAssessment,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpcBankReport {
    /// PC word as read from EPC-bank word 1.
    pub pc: String,
    pub epc_length_words: u8,
    /// Actual `pc ‖ epc` contents.
    pub actual: String,
    /// Theoretical `pc ‖ epc` computed from the supplied EPC.
    pub theoretical: String,
    pub matches_theoretical: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TidBankReport {
    pub tid: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservedBankReport {
    pub readable_without_auth: bool,
    pub readable_with_auth: bool,
    /// `kill ‖ access` as read, when any read succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_passwords: Option<String>,
    pub theoretical_passwords: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passwords_match: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_zero: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatusReport {
    pub reserved_bank: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAssessment {
    pub properly_secured: bool,
    pub issues: Vec<String>,
}

pub async fn run(
    session: &ManagedSession,
    epc_hex: &str,
) -> Result<AnalyzeReport, GatewayError> {
    let theoretical = Tag::from_hex(epc_hex)?;
    let supplied_hex = theoretical.epc_hex();
    let mask = session.config().antenna_mask();

    session
        .execute(|driver| Box::pin(async move {
            let tags = inventory::run(driver, mask)?;
            let (index, _) = inventory::select_by_epc(&tags, &supplied_hex)?;
            let handle = driver.tag_handle(index).map_err(GatewayError::Driver)?;

            build_report(driver, handle, &theoretical)
        }))
        .await
}

fn build_report(
    driver: &mut dyn ReaderDriver,
    handle: TagHandle,
    theoretical: &Tag,
) -> Result<AnalyzeReport, GatewayError> {
    // PC first, then the whole pc ‖ epc run it announces.
    let pc_bytes = driver
        .read_blocks(handle, MemoryBank::Epc, 1, 1, None)
        .map_err(inventory::map_read_err)?;
    if pc_bytes.len() != 2 {
        return Err(GatewayError::OperationFailed(format!(
            "PC read returned {} bytes, expected 2",
            pc_bytes.len()
        )));
    }
    let pc = [pc_bytes[0], pc_bytes[1]];
    let epc_length_words = bits::pc_epc_words(pc);

    let actual_image = driver
        .read_blocks(handle, MemoryBank::Epc, 1, 1 + epc_length_words, None)
        .map_err(inventory::map_read_err)?;

    let mut theoretical_image = theoretical.pc().to_vec();
    theoretical_image.extend_from_slice(&theoretical.epc());

    let epc_bank = EpcBankReport {
        pc: bits::to_hex_upper(&pc),
        epc_length_words,
        actual: bits::to_hex_upper(&actual_image),
        theoretical: bits::to_hex_upper(&theoretical_image),
        matches_theoretical: actual_image == theoretical_image,
    };

    let tid = driver
        .read_blocks(handle, MemoryBank::Tid, 0, 6, None)
        .map_err(inventory::map_read_err)?;
    let tid_bank = TidBankReport {
        tid: bits::to_hex_upper(&tid),
    };

    // Theoretical Reserved-bank image: kill ‖ access.
    let access = theoretical.access_password();
    let mut theoretical_reserved = theoretical.kill_password().to_vec();
    theoretical_reserved.extend_from_slice(&access);

    let open_read = driver.read_blocks(handle, MemoryBank::Reserved, 0, 4, None);
    let auth_read =
        driver.read_blocks(handle, MemoryBank::Reserved, 0, 4, Some(access));

    let readable_without_auth = open_read.is_ok();
    let readable_with_auth = auth_read.is_ok();
    let actual_reserved = open_read.ok().or(auth_read.ok());

    let passwords_match = actual_reserved
        .as_ref()
        .map(|actual| *actual == theoretical_reserved);
    let all_zero = actual_reserved
        .as_ref()
        .map(|actual| actual.iter().all(|b| *b == 0));

    let reserved_bank = ReservedBankReport {
        readable_without_auth,
        readable_with_auth,
        actual_passwords: actual_reserved.as_deref().map(bits::to_hex_upper),
        theoretical_passwords: bits::to_hex_upper(&theoretical_reserved),
        passwords_match,
        all_zero,
    };

    let lock_status = LockStatusReport {
        reserved_bank: match (readable_without_auth, readable_with_auth, all_zero) {
            (false, true, _) => "LOCKED",
            (true, _, Some(true)) => "UNLOCKED_NO_PASSWORD",
            (true, _, _) => "UNLOCKED",
            _ => "UNKNOWN",
        },
    };

    let mut issues = Vec::new();
    if readable_without_auth && all_zero == Some(false) {
        issues.push(
            "non-zero passwords are readable without authentication".to_string(),
        );
    }
    if passwords_match == Some(false) {
        issues.push(
            "passwords on the tag do not match the theoretical derivation"
                .to_string(),
        );
    }
    if !theoretical.is_raw() && all_zero == Some(true) {
        issues.push(
            "passwords are zero; initialization appears incomplete".to_string(),
        );
    }

    let properly_secured =
        !readable_without_auth && readable_with_auth && passwords_match == Some(true);

    Ok(AnalyzeReport {
        tag_type: theoretical.tag_type().to_string(),
        media_id: theoretical.media_id().ok(),
        epc_bank,
        tid_bank,
        reserved_bank,
        lock_status,
        security_assessment: SecurityAssessment {
            properly_secured,
            issues,
        },
    })
}
