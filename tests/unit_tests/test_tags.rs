// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use hex_literal::hex;
use rfid_gateway::{
    cfg::enums::TagFormat,
    codec::bits,
    tags::{Tag, TagOps},
};
use sha2::{Digest, Sha512};

use crate::unit_tests::install_test_passwords;

#[test]
fn de290_builds_the_documented_image() {
    install_test_passwords();
    let tag = Tag::new_formatted(TagFormat::De290, "22062", true).expect("build");

    // 22062 = 0x562E, big-endian in bytes 4..12, security bit in byte 15.
    assert_eq!(
        tag.epc(),
        hex!("19E9F871 000000000000562E 00000001").to_vec()
    );
    assert_eq!(tag.pc(), [0x40, 0x00]);
    assert_eq!(tag.tag_type(), "DE290");
    assert!(tag.is_secured());
    assert_eq!(tag.media_id().expect("media id"), "22062");
}

#[test]
fn de290_password_is_sha512_of_prefix_and_secret() {
    install_test_passwords();
    let tag = Tag::new_formatted(TagFormat::De290, "22062", true).expect("build");

    let mut hasher = Sha512::new();
    hasher.update(&tag.epc()[..12]);
    hasher.update(b"12345678");
    let digest = hasher.finalize();
    assert_eq!(tag.access_password(), digest[..4]);

    let mut hasher = Sha512::new();
    hasher.update(&tag.epc()[..12]);
    hasher.update(b"87654321");
    let digest = hasher.finalize();
    assert_eq!(tag.kill_password(), digest[..4]);
}

#[test]
fn de290_round_trips_media_and_security() {
    install_test_passwords();
    for media in ["0", "1", "22062", "6600", "9223372036854775807"] {
        for secured in [false, true] {
            let built =
                Tag::new_formatted(TagFormat::De290, media, secured).expect("build");
            let parsed = Tag::from_bytes(Some(built.pc()), built.epc());
            assert_eq!(parsed.media_id().expect("media id"), media);
            assert_eq!(parsed.is_secured(), secured);
            assert_eq!(parsed.tag_type(), "DE290");
        }
    }
}

#[test]
fn cd290_uses_the_legacy_header() {
    install_test_passwords();
    let tag = Tag::new_formatted(TagFormat::Cd290, "7", false).expect("build");
    assert_eq!(tag.epc()[..4], hex!("1381F871"));
    assert_eq!(tag.tag_type(), "CD290");
    assert_eq!(
        Tag::from_bytes(None, tag.epc()).tag_type(),
        "CD290"
    );
}

#[test]
fn de290f_round_trips_every_id_type() {
    install_test_passwords();
    // type 1 plain, type 2 @-prefixed, type 3 HBZU, type 4 Code40.
    for media in ["22062", "@9912345", "49HBZUBD0034567", "AB-12.X:"] {
        let tag = Tag::new_formatted(TagFormat::De290F, media, false).expect("build");
        assert_eq!(tag.epc()[..4], hex!("19E9F877"));
        let parsed = Tag::from_bytes(None, tag.epc());
        assert_eq!(parsed.media_id().expect("media id"), media, "{media}");
    }
}

#[test]
fn de290f_discriminates_on_set() {
    install_test_passwords();
    let id_type = |media: &str| {
        let tag =
            Tag::new_formatted(TagFormat::De290F, media, false).expect("build");
        tag.epc()[4]
    };
    assert_eq!(id_type("22062"), 0x01);
    assert_eq!(id_type("@22062"), 0x02);
    assert_eq!(id_type("49HBZUBD1234567"), 0x03);
    // Exactly 8 characters over the Code40 alphabet, even all-digit ones.
    assert_eq!(id_type("12345678"), 0x04);
    assert_eq!(id_type("ABCDEFGH"), 0x04);
}

#[test]
fn de290f_rejects_out_of_range_input() {
    install_test_passwords();
    let build = |media: &str| Tag::new_formatted(TagFormat::De290F, media, false);

    // 2^56 does not fit the 7-byte numeric payload.
    assert!(build("72057594037927936").is_err());
    assert!(build("72057594037927935").is_ok());
    // Lowercase is outside the Code40 alphabet and not numeric either.
    assert!(build("abcdefgh").is_err());
    // HBZU needs exactly 7 digits.
    assert!(build("49HBZUBD123456").is_err());
    assert!(build("49HBZUBD12345678").is_err());
}

#[test]
fn de290f_code40_skips_the_marker_byte() {
    install_test_passwords();
    let tag =
        Tag::new_formatted(TagFormat::De290F, "ABCDEFGH", false).expect("build");
    let epc = tag.epc();
    assert_eq!(epc[4], 0x04);
    assert_eq!(epc[5], 0x00);
    // 8 symbols pad to 9 and pack into 3 words at bytes 6..12.
    assert_ne!(&epc[6..12], &[0u8; 6]);
    assert_eq!(&epc[12..15], &[0u8; 3]);
}

#[test]
fn de386_round_trips_ascii_media_ids() {
    install_test_passwords();
    for media in ["A", "X123", "ABCDEFGHIJ"] {
        let tag = Tag::new_formatted(TagFormat::De386, media, true).expect("build");
        assert_eq!(tag.epc()[..4], hex!("19EAF321"));
        let parsed = Tag::from_bytes(None, tag.epc());
        assert_eq!(parsed.media_id().expect("media id"), media);
        assert!(parsed.is_secured());
    }

    assert!(Tag::new_formatted(TagFormat::De386, "ABCDEFGHIJK", true).is_err());
    assert!(Tag::new_formatted(TagFormat::De386, "", true).is_err());
}

#[test]
fn de386_media_id_is_right_aligned_and_keeps_the_version_byte() {
    install_test_passwords();
    let mut tag = Tag::new_formatted(TagFormat::De386, "42", false).expect("build");
    let epc = tag.epc();
    assert_eq!(&epc[12..14], b"42");
    assert_eq!(&epc[4..12], &[0u8; 8]);
    let version = epc[14];

    tag.set_media_id("NEWID").expect("set media id");
    let epc = tag.epc();
    assert_eq!(&epc[9..14], b"NEWID");
    assert_eq!(epc[14], version);
}

#[test]
fn de386_decode_skips_space_padding() {
    install_test_passwords();
    let mut epc = hex!("19EAF321 00000000000000000000 0100").to_vec();
    epc[9..14].copy_from_slice(b"\x20\x20X42".as_ref());
    let tag = Tag::from_bytes(None, epc);
    assert_eq!(tag.media_id().expect("media id"), "X42");
}

#[test]
fn de6_pins_its_pc() {
    install_test_passwords();
    let tag = Tag::new_formatted(TagFormat::De6, "815", true).expect("build");
    assert_eq!(tag.epc()[..4], hex!("19ED0001"));
    assert_eq!(tag.pc(), [0x44, 0x00]);
    let parsed = Tag::from_bytes(None, tag.epc());
    assert_eq!(parsed.pc(), [0x44, 0x00]);
    assert_eq!(parsed.media_id().expect("media id"), "815");
}

#[test]
fn br_round_trips_and_keeps_the_epc_even() {
    install_test_passwords();
    for media in ["A", "AB", "ABC", "HELLO WORLD", "0123456789ABCDEF"] {
        let tag = rfid_gateway::tags::br::BrTag::new(media, false).expect("build");
        let epc = tag.epc();
        assert_eq!(epc.len() % 2, 0, "{media}");
        assert_eq!(epc[0], 0x41);
        assert_eq!(
            epc.len(),
            2 + usize::from(epc[1]) + usize::from(epc[1]) % 2
        );

        let parsed = Tag::from_bytes(Some(tag.pc()), epc);
        assert_eq!(parsed.tag_type(), "BR");
        assert_eq!(parsed.media_id().expect("media id"), media);
    }
}

#[test]
fn br_security_lives_in_the_pc() {
    install_test_passwords();
    let mut tag = rfid_gateway::tags::br::BrTag::new("BOOK42", false).expect("build");
    let epc_before = tag.epc();
    assert!(!tag.is_secured());
    assert_eq!(tag.pc()[1], 0xC2);

    tag.set_secured(true);
    assert!(tag.is_secured());
    assert_eq!(tag.pc()[1], 0x07);
    assert_eq!(tag.pc()[0] & 0x01, 0x01);
    assert_eq!(tag.epc(), epc_before);

    // Dynamic blocks are the PC itself, addressed at EPC-bank word 1.
    assert_eq!(tag.dynamic_blocks(), tag.pc().to_vec());
    assert_eq!(tag.dynamic_blocks_start_word(), 1);
}

#[test]
fn br_passwords_take_sha1_bytes_0_2_3_6() {
    use sha1::Sha1;

    install_test_passwords();
    let tag = rfid_gateway::tags::br::BrTag::new("BOOK42", false).expect("build");

    let mut hasher = <Sha1 as Digest>::new();
    hasher.update(bits::to_hex_upper(&tag.epc()).as_bytes());
    hasher.update(b"SECRET");
    let digest = hasher.finalize();
    assert_eq!(
        tag.access_password(),
        [digest[0], digest[2], digest[3], digest[6]]
    );
    assert_eq!(tag.kill_password(), tag.access_password());
}

#[test]
fn pc_length_field_matches_epc_length_for_every_format() {
    install_test_passwords();
    let tags = [
        Tag::new_formatted(TagFormat::De290, "1", true).expect("build"),
        Tag::new_formatted(TagFormat::Cd290, "2", false).expect("build"),
        Tag::new_formatted(TagFormat::De6, "3", true).expect("build"),
        Tag::new_formatted(TagFormat::De290F, "4", false).expect("build"),
        Tag::new_formatted(TagFormat::De386, "FIVE", true).expect("build"),
        rfid_gateway::tags::br::BrTag::new("SIX", false)
            .map(Tag::from)
            .expect("build"),
    ];
    for tag in &tags {
        assert_eq!(
            usize::from(bits::pc_epc_words(tag.pc())) * 2,
            tag.epc().len(),
            "{}",
            tag.tag_type()
        );
    }
}

#[test]
fn dynamic_blocks_of_fixed_formats_are_the_last_word() {
    install_test_passwords();
    let tag = Tag::new_formatted(TagFormat::De290, "22062", true).expect("build");
    assert_eq!(tag.dynamic_blocks(), tag.epc()[14..16].to_vec());
    assert_eq!(tag.dynamic_blocks_start_word(), 9);
}

#[test]
fn raw_media_id_is_the_epc_hex() {
    install_test_passwords();
    let tag = Tag::from_bytes(None, hex!("DEADBEEF1234").to_vec());
    assert_eq!(tag.tag_type(), "Raw");
    assert_eq!(tag.media_id().expect("media id"), "DEADBEEF1234");
    assert!(!tag.is_secured());
    assert_eq!(tag.access_password(), [0; 4]);
}
