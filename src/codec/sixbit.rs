// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Six-bit ASCII codec for BR tag payloads.
//!
//! Each character maps to a 6-bit index into a 64-symbol alphabet; symbols
//! are packed MSB-first, so 4 characters occupy 3 bytes. Symbol value 0
//! (`@`) doubles as padding and is skipped on decode.

use crate::errors::GatewayError;

/// Indices 0..63. Four rows of sixteen.
const ALPHABET: &[u8; 64] =
    b"@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^- !\"#$%&'()*+,-./0123456789:;<=>?";

fn symbol_of(c: char) -> Option<u8> {
    let byte = u8::try_from(c).ok()?;
    ALPHABET.iter().position(|a| *a == byte).map(|i| i as u8)
}

/// Packs `text` into the six-bit byte stream.
///
/// The result is exactly `ceil(len * 6 / 8)` bytes; the trailing partial
/// byte is filled with zero bits.
pub fn encode(text: &str) -> Result<Vec<u8>, GatewayError> {
    let mut out = Vec::with_capacity(text.len() * 6 / 8 + 1);
    let mut acc: u16 = 0;
    let mut bits: u8 = 0;

    for c in text.chars() {
        let sym = symbol_of(c).ok_or_else(|| {
            GatewayError::InvalidMediaId(format!(
                "character {c:?} is outside the six-bit alphabet"
            ))
        })?;
        acc = (acc << 6) | u16::from(sym);
        bits += 6;
        while bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
        }
    }
    if bits > 0 {
        out.push((acc << (8 - bits)) as u8);
    }

    Ok(out)
}

/// Unpacks a six-bit byte stream back into text, skipping padding symbols.
pub fn decode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 8 / 6);
    let mut acc: u16 = 0;
    let mut bits: u8 = 0;

    for b in bytes {
        acc = (acc << 8) | u16::from(*b);
        bits += 8;
        while bits >= 6 {
            bits -= 6;
            let sym = ((acc >> bits) & 0x3F) as u8;
            if sym != 0 {
                out.push(char::from(ALPHABET[sym as usize]));
            }
        }
    }

    out
}
