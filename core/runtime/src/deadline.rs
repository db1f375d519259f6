// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Call deadlines carried in metadata as absolute UNIX seconds

use std::time::{Duration, SystemTime};

use crate::metadata::Metadata;

/// Metadata key holding the call deadline
pub const DEADLINE_KEY: &str = "shaperpc-timeout";

/// Upper bound on any call timeout, in seconds (10 hours)
pub const MAX_TIMEOUT: u64 = 36000;

pub fn max_timeout() -> Duration {
    Duration::from_secs(MAX_TIMEOUT)
}

/// Reads the deadline from `metadata`, capped at `now + max`
///
/// Malformed, negative or non finite values are ignored.
pub fn parse_deadline(metadata: &Metadata, max: Duration) -> Option<SystemTime> {
    let seconds = metadata.get(DEADLINE_KEY)?.trim().parse::<f64>().ok()?;
    let offset = Duration::try_from_secs_f64(seconds).ok()?;
    let deadline = SystemTime::UNIX_EPOCH.checked_add(offset)?;
    let now = SystemTime::now();
    match now.checked_add(max) {
        Some(cap) if deadline > cap => Some(cap),
        _ => Some(deadline),
    }
}

pub fn write_deadline(metadata: &mut Metadata, deadline: SystemTime) {
    let seconds = deadline
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();
    metadata.insert(DEADLINE_KEY, seconds.to_string());
}

/// Deadline `timeout` from now, capped at `max`
pub fn deadline_after(timeout: Duration, max: Duration) -> SystemTime {
    let now = SystemTime::now();
    now.checked_add(timeout.min(max)).unwrap_or(now)
}

/// Time left until `deadline`, zero when it already passed
pub fn remaining(deadline: SystemTime) -> Duration {
    deadline
        .duration_since(SystemTime::now())
        .unwrap_or(Duration::ZERO)
}

pub fn is_exceeded(deadline: SystemTime) -> bool {
    SystemTime::now() >= deadline
}
