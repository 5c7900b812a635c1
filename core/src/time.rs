// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Time related utils.
//!
//! Timestamps are unix seconds (`i64`). Intervals and deadlines are measured
//! with a separate monotonic millisecond counter, because wall-clock time may
//! jump when the device synchronizes with a time server.

use std::fmt::Debug;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use chrono::DateTime;
use chrono::Utc;

/// Wall-clock values at or below this timestamp (2021-04-21) mean the clock
/// has not been set yet.
pub const DEFAULT_TIMESTAMP: i64 = 1_618_971_013;

/// Clock provides wall-clock time, a monotonic millisecond counter and a
/// way to ask the platform to synchronize time.
pub trait Clock: Debug + Send + Sync + 'static {
    /// Current unix timestamp in seconds.
    fn now(&self) -> i64;

    /// Milliseconds since an arbitrary fixed point, never going backwards.
    fn millis(&self) -> u64;

    /// Whether wall-clock time is trustworthy.
    fn is_synchronized(&self) -> bool {
        self.now() > DEFAULT_TIMESTAMP
    }

    /// Ask the platform to synchronize time with the given GMT offset.
    ///
    /// This must not block; callers poll [`Clock::is_synchronized`].
    fn request_sync(&self, gmt_offset_hours: f32) {
        let _ = gmt_offset_hours;
    }
}

/// SystemClock reads the operating system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }

    fn millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// ManualClock is a settable clock shared between clones.
///
/// This is useful for testing or for platforms that feed time from outside.
/// With a non-zero tick every [`Clock::millis`] read advances the monotonic
/// counter, so busy-wait loops make progress.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<ManualClockInner>,
}

#[derive(Debug, Default)]
struct ManualClockInner {
    now: AtomicI64,
    millis: AtomicU64,
    tick: AtomicU64,
    sync_target: AtomicI64,
    sync_blocked: AtomicBool,
    sync_requests: AtomicUsize,
}

impl ManualClock {
    /// Create a clock at the given unix timestamp.
    pub fn new(now: i64) -> Self {
        let clock = Self::default();
        clock.set_now(now);
        clock
    }

    /// Advance every [`Clock::millis`] read by `tick` milliseconds.
    pub fn with_tick(self, tick: u64) -> Self {
        self.inner.tick.store(tick, Ordering::SeqCst);
        self
    }

    /// Jump wall-clock time to `target` on the next sync request.
    pub fn with_sync_target(self, target: i64) -> Self {
        self.inner.sync_target.store(target, Ordering::SeqCst);
        self
    }

    /// Make sync requests fail until unblocked.
    pub fn set_sync_blocked(&self, blocked: bool) {
        self.inner.sync_blocked.store(blocked, Ordering::SeqCst);
    }

    /// Set wall-clock time.
    pub fn set_now(&self, now: i64) {
        self.inner.now.store(now, Ordering::SeqCst);
    }

    /// Advance both wall-clock and monotonic time.
    pub fn advance_secs(&self, secs: i64) {
        self.inner.now.fetch_add(secs, Ordering::SeqCst);
        self.inner
            .millis
            .fetch_add(secs.max(0) as u64 * 1000, Ordering::SeqCst);
    }

    /// Advance monotonic time only.
    pub fn advance_millis(&self, millis: u64) {
        self.inner.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Number of sync requests seen so far.
    pub fn sync_requests(&self) -> usize {
        self.inner.sync_requests.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.inner.now.load(Ordering::SeqCst)
    }

    fn millis(&self) -> u64 {
        let tick = self.inner.tick.load(Ordering::SeqCst);
        self.inner.millis.fetch_add(tick, Ordering::SeqCst) + tick
    }

    fn request_sync(&self, _: f32) {
        self.inner.sync_requests.fetch_add(1, Ordering::SeqCst);
        if self.inner.sync_blocked.load(Ordering::SeqCst) {
            return;
        }
        let target = self.inner.sync_target.load(Ordering::SeqCst);
        if target > DEFAULT_TIMESTAMP {
            self.set_now(target);
        }
    }
}

/// Format a unix timestamp as RFC 3339, for logging.
pub fn format_timestamp(ts: i64) -> String {
    match DateTime::<Utc>::from_timestamp(ts, 0) {
        Some(t) => t.to_rfc3339(),
        None => ts.to_string(),
    }
}
