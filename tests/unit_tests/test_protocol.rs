// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use hex_literal::hex;
use rfid_gateway::{
    cfg::enums::{ReaderMode, TagFormat},
    driver::{
        LockMode, MemoryBank,
        emulated::{EmulatedOp, EmulatedState, EmulatedTag},
    },
    errors::{DriverError, GatewayError},
    protocol::{clear, edit, initialize, inventory, secure},
    tags::{Tag, TagOps},
};

use crate::unit_tests::{install_test_passwords, session_with_emulator};

const TID: [u8; 12] = hex!("E280689400005003F76A18ED");

fn transient_write_error() -> DriverError {
    DriverError::new(-4037, "transponder write error")
}

/// Tag-facing operations in recorded order (connects and reads of the
/// emulator's own bookkeeping filtered out).
fn tag_ops(state: &EmulatedState) -> Vec<EmulatedOp> {
    state.ops_of(|op| {
        matches!(
            op,
            EmulatedOp::Inventory { .. }
                | EmulatedOp::Read { .. }
                | EmulatedOp::Write { .. }
                | EmulatedOp::Lock { .. }
        )
    })
}

#[tokio::test(start_paused = true)]
async fn initialize_runs_the_documented_sequence() {
    let (session, state) = session_with_emulator(ReaderMode::Host);
    state.lock().expect("state").tags.push(EmulatedTag::blank(TID));

    let tag = initialize::run(&session, TagFormat::De290, "22062", true)
        .await
        .expect("initialize");
    assert_eq!(
        tag.epc(),
        hex!("19E9F871 000000000000562E 00000001").to_vec()
    );

    let expected_access = tag.access_password();
    let expected_kill = tag.kill_password();

    let st = state.lock().expect("state");
    let ops = tag_ops(&st);
    assert_eq!(ops.len(), 5, "{ops:?}");
    assert!(matches!(ops[0], EmulatedOp::Inventory { mask: 0x01 }));
    assert!(matches!(
        ops[1],
        EmulatedOp::Write {
            bank: MemoryBank::Reserved,
            start_word: 0,
            words: 4,
            auth: None,
        }
    ));
    assert!(matches!(
        ops[2],
        EmulatedOp::Write {
            bank: MemoryBank::Epc,
            start_word: 1,
            words: 9,
            auth: None,
        }
    ));
    assert!(matches!(ops[3], EmulatedOp::Inventory { .. }));
    match &ops[4] {
        EmulatedOp::Lock { settings, password } => {
            assert_eq!(settings.kill, LockMode::Lock);
            assert_eq!(settings.access, LockMode::Lock);
            assert_eq!(settings.epc, LockMode::Lock);
            assert_eq!(settings.tid, LockMode::Unchanged);
            assert_eq!(settings.user, LockMode::Unchanged);
            assert_eq!(*password, expected_access);
        },
        other => panic!("expected lock, got {other:?}"),
    }

    // The chip now carries the new image, passwords, and lock state.
    let chip = &st.tags[0];
    assert_eq!(chip.pc(), [0x40, 0x00]);
    assert_eq!(chip.epc(), tag.epc());
    assert_eq!(chip.reserved[..4], expected_kill);
    assert_eq!(chip.reserved[4..], expected_access);
    assert!(chip.locked);
}

#[tokio::test(start_paused = true)]
async fn initialize_requires_exactly_one_tag() {
    let (session, state) = session_with_emulator(ReaderMode::Host);

    let err = initialize::run(&session, TagFormat::De290, "1", true)
        .await
        .expect_err("empty field");
    assert!(matches!(err, GatewayError::NoTagInField));

    {
        let mut st = state.lock().expect("state");
        st.tags.push(EmulatedTag::blank(TID));
        st.tags.push(EmulatedTag::blank(TID));
    }
    let err = initialize::run(&session, TagFormat::De290, "1", true)
        .await
        .expect_err("crowded field");
    assert!(matches!(err, GatewayError::MultipleTagsInField(2)));
}

#[tokio::test(start_paused = true)]
async fn initialize_rejects_invalid_media_ids_before_writing() {
    let (session, state) = session_with_emulator(ReaderMode::Host);
    state.lock().expect("state").tags.push(EmulatedTag::blank(TID));

    let err = initialize::run(&session, TagFormat::De290, "not-a-number", true)
        .await
        .expect_err("invalid media id");
    assert!(matches!(err, GatewayError::InvalidMediaId(_)));
    assert!(tag_ops(&state.lock().expect("state")).is_empty());
}

#[tokio::test(start_paused = true)]
async fn block_writes_are_retried_on_transient_errors() {
    let (session, state) = session_with_emulator(ReaderMode::Host);
    {
        let mut st = state.lock().expect("state");
        st.tags.push(EmulatedTag::blank(TID));
        let err = transient_write_error();
        EmulatedState::fail_next(&mut st.write_failures, 3, &err);
    }

    initialize::run(&session, TagFormat::De290, "22062", true)
        .await
        .expect("initialize despite transient failures");

    let st = state.lock().expect("state");
    let writes = st.ops_of(|op| matches!(op, EmulatedOp::Write { .. }));
    // 3 failed attempts + 1 success on the Reserved write, then the EPC
    // write.
    assert_eq!(writes.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn write_retry_exhaustion_surfaces_the_driver_text() {
    let (session, state) = session_with_emulator(ReaderMode::Host);
    {
        let mut st = state.lock().expect("state");
        st.tags.push(EmulatedTag::blank(TID));
        st.scripted_iso_error = Some(0x10);
        let err = transient_write_error();
        EmulatedState::fail_next(&mut st.write_failures, 10, &err);
    }

    let err = initialize::run(&session, TagFormat::De290, "22062", true)
        .await
        .expect_err("exhausted ladder");
    match &err {
        GatewayError::TagWriteFailed {
            attempts,
            iso_error,
            ..
        } => {
            assert_eq!(*attempts, 10);
            assert_eq!(*iso_error, Some(0x10));
        },
        other => panic!("expected TagWriteFailed, got {other:?}"),
    }
    assert!(err.to_string().contains("transponder write error"));
}

#[tokio::test(start_paused = true)]
async fn edit_same_length_writes_epc_words_only() {
    let (session, state) = session_with_emulator(ReaderMode::Host);

    let old_tag = Tag::new_formatted(TagFormat::De290, "22062", true).expect("build");
    let old_access = old_tag.access_password();
    {
        let mut st = state.lock().expect("state");
        let mut chip = EmulatedTag::new([0x40, 0x00], &old_tag.epc(), TID);
        chip.reserved[..4].copy_from_slice(&old_tag.kill_password());
        chip.reserved[4..].copy_from_slice(&old_access);
        chip.locked = true;
        st.tags.push(chip);
    }

    let outcome = edit::run(&session, &old_tag.epc_hex(), "6600")
        .await
        .expect("edit");
    assert_eq!(outcome.old_epc, "19E9F871000000000000562E00000001");
    assert_eq!(outcome.new_epc, "19E9F87100000000000019C800000001");
    assert_eq!(outcome.tag_type, "DE290");

    let new_tag = Tag::from_hex(&outcome.new_epc).expect("parse");
    let st = state.lock().expect("state");
    let ops = tag_ops(&st);
    assert_eq!(ops.len(), 6, "{ops:?}");
    assert!(matches!(ops[0], EmulatedOp::Inventory { .. }));
    // Unlock authenticates with the OLD password.
    match &ops[1] {
        EmulatedOp::Lock { settings, password } => {
            assert_eq!(settings.access, LockMode::Unlock);
            assert_eq!(*password, old_access);
        },
        other => panic!("expected unlock, got {other:?}"),
    }
    assert!(matches!(
        ops[2],
        EmulatedOp::Write {
            bank: MemoryBank::Reserved,
            start_word: 0,
            words: 4,
            auth: None,
        }
    ));
    // Same length: EPC words only, at word 2, PC untouched.
    assert!(matches!(
        ops[3],
        EmulatedOp::Write {
            bank: MemoryBank::Epc,
            start_word: 2,
            words: 8,
            auth: None,
        }
    ));
    assert!(matches!(ops[4], EmulatedOp::Inventory { .. }));
    // Relock authenticates with the NEW password.
    match &ops[5] {
        EmulatedOp::Lock { settings, password } => {
            assert_eq!(settings.access, LockMode::Lock);
            assert_eq!(*password, new_tag.access_password());
        },
        other => panic!("expected relock, got {other:?}"),
    }

    let chip = &st.tags[0];
    assert_eq!(chip.epc(), new_tag.epc());
    assert!(chip.locked);
}

#[tokio::test(start_paused = true)]
async fn edit_different_length_rewrites_pc_and_epc() {
    let (session, state) = session_with_emulator(ReaderMode::Host);

    let old_tag = rfid_gateway::tags::br::BrTag::new("ABC", false).expect("build");
    {
        let mut st = state.lock().expect("state");
        st.tags
            .push(EmulatedTag::new(old_tag.pc(), &old_tag.epc(), TID));
    }

    let outcome = edit::run(&session, &old_tag.epc_hex(), "ABCDEFG")
        .await
        .expect("edit");

    let new_tag = rfid_gateway::tags::br::BrTag::new("ABCDEFG", false).expect("build");
    assert_eq!(outcome.new_epc, Tag::from(new_tag.clone()).epc_hex());

    let st = state.lock().expect("state");
    let epc_writes = st.ops_of(|op| {
        matches!(
            op,
            EmulatedOp::Write {
                bank: MemoryBank::Epc,
                ..
            }
        )
    });
    assert_eq!(epc_writes.len(), 1);
    let expected_words = (2 + new_tag.epc().len() as u8) / 2;
    assert!(matches!(
        epc_writes[0],
        EmulatedOp::Write {
            bank: MemoryBank::Epc,
            start_word: 1,
            words,
            auth: None,
        } if words == expected_words
    ));
}

#[tokio::test(start_paused = true)]
async fn edit_rejects_raw_tags() {
    let (session, _state) = session_with_emulator(ReaderMode::Host);
    let err = edit::run(&session, "DEADBEEF1234", "42")
        .await
        .expect_err("raw tag");
    assert!(matches!(err, GatewayError::UnsupportedFormat(_)));
}

#[tokio::test(start_paused = true)]
async fn clear_restores_the_tid_identity() {
    let (session, state) = session_with_emulator(ReaderMode::Host);
    let old_epc = hex!("3034257BF468D4800000162E");
    {
        let mut st = state.lock().expect("state");
        let mut chip = EmulatedTag::new([0x30, 0x00], &old_epc, TID);
        chip.reserved = hex!("1122334455667788");
        st.tags.push(chip);
    }

    let outcome = clear::run(&session, "3034257BF468D4800000162E")
        .await
        .expect("clear");
    assert_eq!(outcome.new_epc, "E280689400005003F76A18ED");
    assert_eq!(outcome.tid, outcome.new_epc);
    assert_eq!(outcome.new_pc, "3000");

    let st = state.lock().expect("state");
    let chip = &st.tags[0];
    assert_eq!(chip.pc(), [0x30, 0x00]);
    assert_eq!(chip.epc(), TID);
    assert_eq!(chip.reserved, [0u8; 8]);

    let ops = tag_ops(&st);
    assert!(matches!(
        ops[1],
        EmulatedOp::Read {
            bank: MemoryBank::Tid,
            start_word: 0,
            words: 6,
            auth: None,
        }
    ));
    assert!(matches!(
        ops[ops.len() - 1],
        EmulatedOp::Write {
            bank: MemoryBank::Epc,
            start_word: 1,
            words: 7,
            auth: None,
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn secure_flips_only_the_br_pc() {
    let (session, state) = session_with_emulator(ReaderMode::Host);

    // 61 symbols pack into 46 payload bytes; the in-field PC carries the
    // matching 24-word length field with bit 0 clear.
    let media: String = std::iter::repeat_n('A', 61).collect();
    let payload = rfid_gateway::codec::sixbit::encode(&media).expect("encode");
    assert_eq!(payload.len(), 46);
    let mut epc = vec![0x41u8, 46];
    epc.extend_from_slice(&payload);
    {
        let mut st = state.lock().expect("state");
        st.tags.push(EmulatedTag::new([0xC2, 0x01], &epc, TID));
    }
    let epc_hex = rfid_gateway::codec::bits::to_hex_upper(&epc);

    let outcome = secure::run(&session, &epc_hex, true).await.expect("secure");
    assert_eq!(outcome.tag_type, "BR");
    assert!(outcome.secured);

    let st = state.lock().expect("state");
    let chip = &st.tags[0];
    assert_eq!(chip.pc(), [0xC3, 0x07]);
    assert_eq!(chip.epc(), epc, "EPC bytes must not change");

    let writes = st.ops_of(|op| matches!(op, EmulatedOp::Write { .. }));
    assert_eq!(writes.len(), 1);
    assert!(matches!(
        writes[0],
        EmulatedOp::Write {
            bank: MemoryBank::Epc,
            start_word: 1,
            words: 1,
            auth: Some(_),
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn secure_rejects_raw_tags() {
    let (session, _state) = session_with_emulator(ReaderMode::Host);
    let err = secure::run(&session, "DEADBEEF1234", true)
        .await
        .expect_err("raw tag");
    assert!(matches!(err, GatewayError::UnsupportedFormat(_)));
}

#[tokio::test(start_paused = true)]
async fn connection_errors_trigger_reconnect_and_logical_errors_do_not() {
    let (session, state) = session_with_emulator(ReaderMode::Host);
    {
        let mut st = state.lock().expect("state");
        st.tags.push(EmulatedTag::blank(TID));
        st.inventory_failures
            .push_back(DriverError::new(-5012, "Reader Disconnected"));
    }

    let mask = session.config().antenna_mask();
    let tags = session
        .execute(async |driver| inventory::run(driver, mask))
        .await
        .expect("retried after reconnect");
    assert_eq!(tags.len(), 1);
    {
        let st = state.lock().expect("state");
        assert_eq!(st.constructed, 2, "a fresh driver must be built");
    }

    // A logical fault surfaces immediately, no reconnect.
    {
        let mut st = state.lock().expect("state");
        st.inventory_failures
            .push_back(DriverError::new(0, "media id out of range"));
    }
    let err = session
        .execute(async |driver| inventory::run(driver, mask))
        .await
        .expect_err("logical error");
    assert!(matches!(err, GatewayError::Driver(_)));
    let st = state.lock().expect("state");
    assert_eq!(st.constructed, 2);
}

#[tokio::test(start_paused = true)]
async fn no_transponder_is_an_empty_inventory() {
    let (session, _state) = session_with_emulator(ReaderMode::Host);
    let mask = session.config().antenna_mask();
    let tags = session
        .execute(async |driver| inventory::run(driver, mask))
        .await
        .expect("empty field is not an error");
    assert!(tags.is_empty());
}

#[tokio::test(start_paused = true)]
async fn analyze_verdicts_a_properly_initialized_tag() {
    let (session, state) = session_with_emulator(ReaderMode::Host);
    state.lock().expect("state").tags.push(EmulatedTag::blank(TID));

    let tag = initialize::run(&session, TagFormat::De290, "22062", true)
        .await
        .expect("initialize");

    let report = rfid_gateway::protocol::analyze::run(&session, &tag.epc_hex())
        .await
        .expect("analyze");
    assert_eq!(report.lock_status.reserved_bank, "LOCKED");
    assert!(report.security_assessment.properly_secured);
    assert!(report.security_assessment.issues.is_empty());
    assert!(report.epc_bank.matches_theoretical);
    assert_eq!(report.tid_bank.tid, "E280689400005003F76A18ED");
    assert!(!report.reserved_bank.readable_without_auth);
    assert!(report.reserved_bank.readable_with_auth);
    assert_eq!(report.reserved_bank.passwords_match, Some(true));
}

#[tokio::test(start_paused = true)]
async fn analyze_flags_an_uninitialized_formatted_tag() {
    let (session, state) = session_with_emulator(ReaderMode::Host);
    let tag = Tag::new_formatted(TagFormat::De290, "22062", false).expect("build");
    {
        let mut st = state.lock().expect("state");
        // EPC written but passwords never set and nothing locked.
        st.tags.push(EmulatedTag::new(tag.pc(), &tag.epc(), TID));
    }

    let report = rfid_gateway::protocol::analyze::run(&session, &tag.epc_hex())
        .await
        .expect("analyze");
    assert_eq!(report.lock_status.reserved_bank, "UNLOCKED_NO_PASSWORD");
    assert!(!report.security_assessment.properly_secured);
    assert!(
        report
            .security_assessment
            .issues
            .iter()
            .any(|i| i.contains("zero"))
    );
}
