// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize};

/// Tag format selectable for initialization and as the configured default.
///
/// BR and Raw tags are detected in the field but never written from
/// scratch, so they are not part of this enumeration.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagFormat {
    #[default]
    #[serde(rename = "DE290", alias = "de290")]
    De290,
    #[serde(rename = "CD290", alias = "cd290")]
    Cd290,
    #[serde(rename = "DE6", alias = "de6")]
    De6,
    #[serde(rename = "DE290F", alias = "de290f")]
    De290F,
    #[serde(rename = "DE386", alias = "de386")]
    De386,
}

impl fmt::Display for TagFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TagFormat::De290 => "DE290",
            TagFormat::Cd290 => "CD290",
            TagFormat::De6 => "DE6",
            TagFormat::De290F => "DE290F",
            TagFormat::De386 => "DE386",
        })
    }
}

impl TagFormat {
    /// Parses the `format` query parameter (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_uppercase().as_str() {
            "DE290" => TagFormat::De290,
            "CD290" => TagFormat::Cd290,
            "DE6" => TagFormat::De6,
            "DE290F" => TagFormat::De290F,
            "DE386" => TagFormat::De386,
            _ => return None,
        })
    }
}

/// Operating mode of a reader connection.
///
/// Host mode polls the reader synchronously; notification mode additionally
/// runs a TCP listener the reader pushes asynchronous tag events to.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderMode {
    #[serde(rename = "host", alias = "Host", alias = "HOST")]
    Host,
    #[serde(
        rename = "notification",
        alias = "Notification",
        alias = "NOTIFICATION"
    )]
    Notification,
}

impl fmt::Display for ReaderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReaderMode::Host => "host",
            ReaderMode::Notification => "notification",
        })
    }
}
