//! The tag codec family: per-format encode/decode of EPC images, media
//! ids, security bits, and Gen-2 password derivation.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// BR: variable-length six-bit ASCII payloads.
pub mod br;
/// Shared trait, owned EPC image, and password derivations.
pub mod common;
/// DE6: numeric media id, fixed PC.
pub mod de6;
/// DE290/CD290: numeric media id.
pub mod de290;
/// DE290F: discriminated media-id union.
pub mod de290f;
/// DE386: right-aligned ASCII media id.
pub mod de386;
/// Header-based format discrimination.
pub mod factory;
/// Name-keyed secret material for password derivation.
pub mod passwords;
/// Unknown-format fallback.
pub mod raw;

pub use common::{RssiValue, TagOps};
pub use factory::Tag;
