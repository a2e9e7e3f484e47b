// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stopwatch for tracking when entities start and how long they stay open.
//!
//! Each entity tracks a start time and a duration, combining a realtime clock
//! for timestamps with a monotonic clock for durations. The two syscalls at
//! construction happen imperceptibly close to each other, which is good
//! enough for span timing.

use chrono::{DateTime, FixedOffset, Local};
use std::time::{Duration, Instant};

pub(crate) fn stopwatch() -> StopwatchStart {
    StopwatchStart::new()
}

#[derive(Clone, Debug)]
pub(crate) struct StopwatchStart {
    start_time: DateTime<Local>,
    instant: Instant,
}

impl StopwatchStart {
    fn new() -> Self {
        Self {
            start_time: Local::now(),
            instant: Instant::now(),
        }
    }

    pub(crate) fn snapshot(&self) -> StopwatchSnapshot {
        StopwatchSnapshot {
            start_time: self.start_time.fixed_offset(),
            duration: self.instant.elapsed(),
        }
    }
}

/// The end state of a stopwatch.
#[derive(Clone, Debug)]
pub(crate) struct StopwatchSnapshot {
    pub(crate) start_time: DateTime<FixedOffset>,
    pub(crate) duration: Duration,
}

impl StopwatchSnapshot {
    pub(crate) fn end_time(&self) -> DateTime<FixedOffset> {
        self.start_time
            + chrono::Duration::from_std(self.duration).unwrap_or(chrono::Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_time_is_not_before_start_time() {
        let watch = stopwatch();
        let snapshot = watch.snapshot();
        assert!(snapshot.end_time() >= snapshot.start_time);
    }
}
