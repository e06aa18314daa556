// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Produces the value of the `time` parameter, the start of the collection window.
pub trait TimeWindow: Debug + Send + Sync {
    fn time_param(&self) -> String;
}

/// Window that starts `minutes` before the moment it is asked, in epoch milliseconds.
/// Each call reads the clock again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionWindow {
    pub minutes: u64,
}

impl CollectionWindow {
    pub fn new(minutes: u64) -> Self {
        Self { minutes }
    }

    pub fn start_millis_at(&self, now: SystemTime) -> u128 {
        let start = now
            .checked_sub(Duration::from_secs(self.minutes.saturating_mul(60)))
            .unwrap_or(UNIX_EPOCH);
        start
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
    }
}

impl TimeWindow for CollectionWindow {
    fn time_param(&self) -> String {
        self.start_millis_at(SystemTime::now()).to_string()
    }
}

/// Window pinned to a fixed value, for replays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedWindow(pub String);

impl TimeWindow for FixedWindow {
    fn time_param(&self) -> String {
        self.0.clone()
    }
}
