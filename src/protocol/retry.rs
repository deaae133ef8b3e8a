// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Intra-operation retry ladders for transient RF-link failures.
//!
//! The ladders absorb the chip briefly leaving the field or losing power
//! mid-write. Connection faults are NOT consumed here; they bubble up so
//! the session can reconnect and re-run the whole routine.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::{
    driver::{DriverResult, ReaderDriver},
    errors::{DriverError, GatewayError},
};

pub const MAX_RETRIES: u32 = 10;
const RETRY_DELAY: Duration = Duration::from_millis(100);
const LOCK_RETRY_BASE: u64 = 100;
const LOCK_RETRY_STEP: u64 = 50;

enum Ladder {
    BlockWrite,
    Lock,
}

impl Ladder {
    fn delay(&self, attempt: u32) -> Duration {
        match self {
            Ladder::BlockWrite => RETRY_DELAY,
            Ladder::Lock => Duration::from_millis(
                LOCK_RETRY_BASE + u64::from(attempt - 1) * LOCK_RETRY_STEP,
            ),
        }
    }

    fn exhausted(&self, source: DriverError, iso_error: Option<i32>) -> GatewayError {
        match self {
            Ladder::BlockWrite => GatewayError::TagWriteFailed {
                attempts: MAX_RETRIES,
                source,
                iso_error,
            },
            Ladder::Lock => GatewayError::TagLockFailed {
                attempts: MAX_RETRIES,
                source,
                iso_error,
            },
        }
    }
}

async fn run_ladder(
    driver: &mut dyn ReaderDriver,
    mut op: impl FnMut(&mut dyn ReaderDriver) -> DriverResult<()>,
    ladder: Ladder,
) -> Result<(), GatewayError> {
    let mut last: Option<DriverError> = None;
    for attempt in 1..=MAX_RETRIES {
        match op(driver) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_connection_error() => return Err(GatewayError::Driver(e)),
            Err(e) => {
                debug!(attempt, "tag operation failed: {e}");
                last = Some(e);
                if attempt < MAX_RETRIES {
                    sleep(ladder.delay(attempt)).await;
                }
            },
        }
    }
    let iso_error = driver.last_iso_error();
    let source = last.unwrap_or_else(|| DriverError::new(0, "no attempts made"));
    Err(ladder.exhausted(source, iso_error))
}

/// Up to 10 attempts with a flat 100 ms pause; exhaustion surfaces
/// *tag-write-failed* carrying the last driver text and ISO error.
pub async fn block_write_ladder(
    driver: &mut dyn ReaderDriver,
    op: impl FnMut(&mut dyn ReaderDriver) -> DriverResult<()>,
) -> Result<(), GatewayError> {
    run_ladder(driver, op, Ladder::BlockWrite).await
}

/// Up to 10 attempts with a growing pause (100, 150, 200, ... ms);
/// exhaustion surfaces *tag-lock-failed*.
pub async fn lock_ladder(
    driver: &mut dyn ReaderDriver,
    op: impl FnMut(&mut dyn ReaderDriver) -> DriverResult<()>,
) -> Result<(), GatewayError> {
    run_ladder(driver, op, Ladder::Lock).await
}
