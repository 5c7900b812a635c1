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

use std::time::Duration;

use gsheet_core::Context;
use log::warn;

use crate::constants::*;

const MIN_PRE_REFRESH_SECS: i64 = 60;
const MAX_PRE_REFRESH_SECS: i64 = 3540;
const MIN_SERVER_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_SERVER_RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);
const MIN_WIFI_RECONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_WIFI_RECONNECT_TIMEOUT: Duration = Duration::from_secs(300);
const MIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Config carries the tuning knobs of the token manager.
///
/// Fields are only reachable through the `with_*` setters, which clamp
/// their input into the accepted range, so every `Config` is usable as is.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Seconds before expiry at which a token is treated as expired.
    pre_refresh_seconds: i64,
    /// Lifetime requested in the JWT `exp` claim.
    token_expiry_seconds: i64,
    /// Upper bound for reading one response.
    request_timeout: Duration,
    /// Time without received bytes after which a response is abandoned.
    server_response_timeout: Duration,
    /// Minimum time between two network reconnect attempts.
    wifi_reconnect_timeout: Duration,
    /// Minimum time between two attempts of the first generation step.
    begin_step_interval: Duration,
    /// Minimum time between two token requests.
    exchange_interval: Duration,
    /// Minimum time between two status callbacks for the same condition.
    callback_interval: Duration,
    /// How long to wait for time synchronization before reporting an error.
    clock_sync_timeout: Duration,
    /// GMT offset passed along with time synchronization requests.
    gmt_offset_hours: f32,
    /// Wait for a synchronized clock before the refresh-token grant as well.
    ///
    /// The JWT grant always needs real time for its `iat` and `exp` claims.
    require_synced_clock: bool,
    /// CA certificate (PEM) the transport should trust.
    ca_cert: Option<String>,
    /// Path of a CA certificate read through [`gsheet_core::FileRead`] on begin.
    ca_cert_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pre_refresh_seconds: 300,
            token_expiry_seconds: MAX_TOKEN_EXPIRY_SECS,
            request_timeout: Duration::from_secs(15),
            server_response_timeout: Duration::from_secs(5),
            wifi_reconnect_timeout: MIN_WIFI_RECONNECT_TIMEOUT,
            begin_step_interval: Duration::from_millis(300),
            exchange_interval: Duration::from_secs(5),
            callback_interval: Duration::from_secs(5),
            clock_sync_timeout: Duration::from_secs(15),
            gmt_offset_hours: 0.0,
            require_synced_clock: true,
            ca_cert: None,
            ca_cert_path: None,
        }
    }
}

impl Config {
    /// Create a new config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pre-refresh window, clamped to 60..=3540 seconds.
    pub fn with_pre_refresh_seconds(mut self, secs: i64) -> Self {
        self.pre_refresh_seconds = secs.clamp(MIN_PRE_REFRESH_SECS, MAX_PRE_REFRESH_SECS);
        self
    }

    /// Set the requested token lifetime, clamped to 1..=3600 seconds.
    pub fn with_token_expiry_seconds(mut self, secs: i64) -> Self {
        self.token_expiry_seconds = secs.clamp(1, MAX_TOKEN_EXPIRY_SECS);
        self
    }

    /// Set the upper bound for reading one response, at least one second.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout.max(MIN_TIMEOUT);
        self
    }

    /// Set the stall timeout, clamped to 1s..=60s.
    pub fn with_server_response_timeout(mut self, timeout: Duration) -> Self {
        self.server_response_timeout =
            timeout.clamp(MIN_SERVER_RESPONSE_TIMEOUT, MAX_SERVER_RESPONSE_TIMEOUT);
        self
    }

    /// Set the network reconnect interval, clamped to 10s..=5min.
    pub fn with_wifi_reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.wifi_reconnect_timeout =
            timeout.clamp(MIN_WIFI_RECONNECT_TIMEOUT, MAX_WIFI_RECONNECT_TIMEOUT);
        self
    }

    /// Set the debounce of the first generation step.
    pub fn with_begin_step_interval(mut self, interval: Duration) -> Self {
        self.begin_step_interval = interval;
        self
    }

    /// Set the minimum time between two token requests.
    pub fn with_exchange_interval(mut self, interval: Duration) -> Self {
        self.exchange_interval = interval;
        self
    }

    /// Set the minimum time between two status callbacks.
    pub fn with_callback_interval(mut self, interval: Duration) -> Self {
        self.callback_interval = interval;
        self
    }

    /// Set the time synchronization timeout, at least one second.
    pub fn with_clock_sync_timeout(mut self, timeout: Duration) -> Self {
        self.clock_sync_timeout = timeout.max(MIN_TIMEOUT);
        self
    }

    /// Set the GMT offset used for time synchronization.
    pub fn with_gmt_offset_hours(mut self, hours: f32) -> Self {
        self.gmt_offset_hours = hours;
        self
    }

    /// Whether the refresh-token grant waits for a synchronized clock.
    pub fn with_require_synced_clock(mut self, require: bool) -> Self {
        self.require_synced_clock = require;
        self
    }

    /// Trust only this CA certificate.
    pub fn with_ca_cert(mut self, pem: impl Into<String>) -> Self {
        self.ca_cert = Some(pem.into());
        self
    }

    /// Load the trusted CA certificate from this path on begin.
    pub fn with_ca_cert_path(mut self, path: impl Into<String>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Seconds before expiry at which a token is treated as expired.
    pub fn pre_refresh_seconds(&self) -> i64 {
        self.pre_refresh_seconds
    }

    /// Lifetime requested in the JWT `exp` claim.
    pub fn token_expiry_seconds(&self) -> i64 {
        self.token_expiry_seconds
    }

    /// Upper bound for reading one response.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Stall timeout of the response reader.
    pub fn server_response_timeout(&self) -> Duration {
        self.server_response_timeout
    }

    /// Minimum time between two network reconnect attempts.
    pub fn wifi_reconnect_timeout(&self) -> Duration {
        self.wifi_reconnect_timeout
    }

    /// Debounce of the first generation step.
    pub fn begin_step_interval(&self) -> Duration {
        self.begin_step_interval
    }

    /// Minimum time between two token requests.
    pub fn exchange_interval(&self) -> Duration {
        self.exchange_interval
    }

    /// Minimum time between two status callbacks.
    pub fn callback_interval(&self) -> Duration {
        self.callback_interval
    }

    /// Time synchronization timeout.
    pub fn clock_sync_timeout(&self) -> Duration {
        self.clock_sync_timeout
    }

    /// GMT offset used for time synchronization.
    pub fn gmt_offset_hours(&self) -> f32 {
        self.gmt_offset_hours
    }

    /// Whether the refresh-token grant waits for a synchronized clock.
    pub fn require_synced_clock(&self) -> bool {
        self.require_synced_clock
    }

    /// CA certificate (PEM) the transport should trust.
    pub fn ca_cert(&self) -> Option<&str> {
        self.ca_cert.as_deref()
    }

    /// Path of the CA certificate read on begin.
    pub fn ca_cert_path(&self) -> Option<&str> {
        self.ca_cert_path.as_deref()
    }

    /// Load config from environment variables.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn from_env(ctx: &Context) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = parse_env::<i64>(ctx, GSHEET_PRE_REFRESH_SECONDS) {
            cfg = cfg.with_pre_refresh_seconds(v);
        }

        if let Some(v) = parse_env::<i64>(ctx, GSHEET_TOKEN_EXPIRY_SECONDS) {
            cfg = cfg.with_token_expiry_seconds(v);
        }

        if let Some(v) = parse_env::<u64>(ctx, GSHEET_SERVER_RESPONSE_TIMEOUT_MS) {
            cfg = cfg.with_server_response_timeout(Duration::from_millis(v));
        }

        if let Some(v) = parse_env::<f32>(ctx, GSHEET_GMT_OFFSET_HOURS) {
            cfg = cfg.with_gmt_offset_hours(v);
        }

        if let Some(v) = ctx.env_var(GSHEET_CA_CERT_PATH) {
            cfg.ca_cert_path = Some(v);
        }

        cfg
    }
}

fn parse_env<T: std::str::FromStr>(ctx: &Context, key: &str) -> Option<T> {
    let raw = ctx.env_var(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring {key}: {raw:?} is not a valid value");
            None
        }
    }
}
