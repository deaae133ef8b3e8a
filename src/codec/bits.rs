// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::errors::GatewayError;

/// Interprets up to 8 bytes as a big-endian unsigned integer.
///
/// Shorter slices are treated as left-padded with zeros, which is how the
/// tag formats store media ids narrower than 8 bytes.
pub fn u64_from_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Writes `value` big-endian into `out`, left-padding with zeros.
///
/// Returns `false` when the value does not fit into `out.len()` bytes.
pub fn u64_to_be(value: u64, out: &mut [u8]) -> bool {
    let full = value.to_be_bytes();
    let skip = full.len().saturating_sub(out.len());
    if full[..skip].iter().any(|b| *b != 0) {
        return false;
    }
    out.copy_from_slice(&full[skip..]);
    true
}

/// Uppercase hex rendering used for EPC identifiers everywhere in the API.
pub fn to_hex_upper(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Decodes an EPC hex string from a request.
///
/// Whitespace is stripped and case is normalized first; an odd length or a
/// non-hex character is an input error distinct from format validation.
pub fn epc_from_hex(s: &str) -> Result<Vec<u8>, GatewayError> {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if cleaned.is_empty() {
        return Err(GatewayError::InvalidEpcHex("empty EPC".to_string()));
    }
    if cleaned.len() % 2 != 0 {
        return Err(GatewayError::InvalidEpcHex(format!(
            "odd number of hex digits ({})",
            cleaned.len()
        )));
    }
    if let Some(bad) = cleaned.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(GatewayError::InvalidEpcHex(format!(
            "invalid character {bad:?}"
        )));
    }
    hex::decode(&cleaned).map_err(|e| GatewayError::InvalidEpcHex(e.to_string()))
}

/// EPC length in 16-bit words, read from the high 5 bits of the PC.
pub fn pc_epc_words(pc: [u8; 2]) -> u8 {
    (pc[0] >> 3) & 0x1F
}

/// Returns `pc` with the length field replaced by `words`.
///
/// Bits 2..0 of the first byte and the whole second byte carry application
/// flags and are preserved untouched.
pub fn pc_with_epc_words(pc: [u8; 2], words: u8) -> [u8; 2] {
    [(pc[0] & 0x07) | (words << 3), pc[1]]
}

/// Synthesizes a PC for a bare EPC observed without one: length field set,
/// all application flags zero.
pub fn pc_for_epc_len(epc_len_bytes: usize) -> [u8; 2] {
    pc_with_epc_words([0, 0], (epc_len_bytes / 2) as u8)
}
