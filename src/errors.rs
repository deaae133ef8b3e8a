// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;
use tracing::debug;

/// Error returned by a reader driver call.
///
/// `status` carries the vendor status code when the driver exposes one
/// (0 when only error text is available); `message` is the driver's
/// human-readable error text, which doubles as the classification oracle
/// for connection faults.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message} (status {status})")]
pub struct DriverError {
    pub status: i32,
    pub message: String,
}

/// Case-insensitive substrings that mark a broken reader link.
const CONNECTION_ERROR_PATTERNS: [&str; 5] = [
    "disconnected",
    "connection lost",
    "connection timeout",
    "transmit failed",
    "peer",
];

/// Vendor status codes that mark a broken reader link even when the error
/// text is unhelpful.
const CONNECTION_ERROR_CODES: [i32; 4] = [-5012, -5011, -5010, -1520];

impl DriverError {
    pub fn new(status: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Classifies this error as a connection fault (retry with reconnect)
    /// or a logical fault (surface immediately).
    ///
    /// Error-text matching is fragile but the vendor library reports most
    /// link failures only through its message string; the numeric codes
    /// cover the cases where structured status is available.
    pub fn is_connection_error(&self) -> bool {
        let text = self.message.to_lowercase();
        let by_text = CONNECTION_ERROR_PATTERNS.iter().any(|p| text.contains(p));
        let by_code = CONNECTION_ERROR_CODES
            .iter()
            .any(|c| self.status == *c || text.contains(&c.to_string()));
        let connection = by_text || by_code;
        debug!(
            status = self.status,
            connection, "classified driver error: {}", self.message
        );
        connection
    }

    /// The driver reports an empty antenna field as an error code; treat it
    /// as a normal zero-tag inventory result.
    pub fn is_no_transponder(&self) -> bool {
        self.message.to_lowercase().contains("no transponder")
    }
}

/// Domain error taxonomy surfaced through the HTTP envelope.
///
/// Input validation maps to 400, unknown-reader and inactive-notification
/// to 404, everything else to 500 (see `http::api`).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid EPC hex: {0}")]
    InvalidEpcHex(String),

    #[error("invalid media id: {0}")]
    InvalidMediaId(String),

    #[error("unsupported tag format: {0}")]
    UnsupportedFormat(String),

    #[error("unknown reader: {0}")]
    UnknownReader(String),

    #[error("no tag in antenna field")]
    NoTagInField,

    #[error("expected exactly one tag in antenna field, found {0}")]
    MultipleTagsInField(usize),

    #[error("tag {epc} is not in the antenna field")]
    TagNotFound { epc: String },

    #[error("tag {expected} not found after EPC rewrite; tag state is ambiguous")]
    TagVerificationFailed { expected: String },

    #[error("TID read returned {0} bytes, expected 12")]
    TidReadInvalid(usize),

    #[error("tag read failed: {source}")]
    TagReadFailed {
        #[source]
        source: DriverError,
    },

    #[error(
        "tag write failed after {} attempts: {}{}",
        .attempts,
        .source,
        format_iso_error(.iso_error)
    )]
    TagWriteFailed {
        attempts: u32,
        source: DriverError,
        iso_error: Option<i32>,
    },

    #[error(
        "tag lock failed after {} attempts: {}{}",
        .attempts,
        .source,
        format_iso_error(.iso_error)
    )]
    TagLockFailed {
        attempts: u32,
        source: DriverError,
        iso_error: Option<i32>,
    },

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("reader session is closed")]
    SessionClosed,

    #[error("notification mode already active")]
    NotificationAlreadyActive,

    #[error("no active notification session")]
    NotificationInactive,

    #[error(transparent)]
    Driver(#[from] DriverError),
}

fn format_iso_error(iso: &Option<i32>) -> String {
    match iso {
        Some(code) => format!(" (last ISO error {code})"),
        None => String::new(),
    }
}

impl GatewayError {
    /// Bad-request class: the caller supplied something malformed.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidEpcHex(_)
                | Self::InvalidMediaId(_)
                | Self::UnsupportedFormat(_)
                | Self::NotificationAlreadyActive
        )
    }

    /// Not-found class: the named resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownReader(_) | Self::NotificationInactive)
    }
}
