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

//! OAuth2 token lifecycle as a pure state machine.
//!
//! [`TokenMachine::advance`] never touches the network. It runs the CPU-only
//! steps (credential checks, JWT encoding and signing) inline and returns an
//! [`Action`] whenever I/O is needed. The driver performs the action and
//! reports the outcome through [`TokenMachine::on_connect`],
//! [`TokenMachine::on_sent`] and [`TokenMachine::on_response`].

use std::collections::VecDeque;
use std::fmt::{self, Debug};

use gsheet_core::time::DEFAULT_TIMESTAMP;
use gsheet_core::utils::Redact;
use gsheet_core::{Clock, Context, Error, HttpResponse, Result};
use http::Method;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::jwt::{Claims, UnsignedJwt};
use crate::request::{Host, PendingRequest};
use crate::{Config, Credential};

/// TokenStatus is the coarse lifecycle state reported to users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TokenStatus {
    /// No credential, or never started.
    #[default]
    Uninitialized,
    /// Checking the credential and waiting for time.
    Initializing,
    /// Building and signing the JWT.
    Signing,
    /// Exchanging the JWT for an access token.
    Requesting,
    /// Exchanging a refresh token for an access token.
    Refreshing,
    /// A usable access token is available.
    Ready,
    /// The last attempt failed, see [`TokenState::error`].
    Error,
}

impl TokenStatus {
    /// Human readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Uninitialized => "uninitialized",
            TokenStatus::Initializing => "on initializing",
            TokenStatus::Signing => "on signing",
            TokenStatus::Requesting => "on request",
            TokenStatus::Refreshing => "on refreshing",
            TokenStatus::Ready => "ready",
            TokenStatus::Error => "error",
        }
    }
}

/// TokenStep is the position inside one generation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TokenStep {
    /// Check the credential and wait for a synchronized clock.
    #[default]
    Begin,
    /// Encode the JWT header and claims.
    EncodeHeaderPayload,
    /// Sign the encoded JWT.
    Sign,
    /// Send the token request.
    Exchange,
}

/// TokenType is the kind of token held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// No token yet.
    #[default]
    Undefined,
    /// An OAuth2 bearer access token.
    AccessToken,
}

impl TokenType {
    /// Human readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Undefined => "undefined",
            TokenType::AccessToken => "OAuth2.0 access token",
        }
    }
}

/// TokenError is the last error recorded by the machine, `code == 0` when
/// there is none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenError {
    /// Numeric code, see [`gsheet_core::ErrorKind::code`].
    pub code: i32,
    /// Human readable message.
    pub message: String,
}

impl TokenError {
    /// Whether an error is recorded.
    pub fn is_error(&self) -> bool {
        self.code != 0
    }
}

impl From<&Error> for TokenError {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// TokenInfo is the snapshot handed to the status callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// Current status.
    pub status: TokenStatus,
    /// Kind of token held.
    pub token_type: TokenType,
    /// Last error.
    pub error: TokenError,
}

/// TokenState is everything the machine knows about the current token.
#[derive(Clone, Default)]
pub struct TokenState {
    /// Lifecycle status.
    pub status: TokenStatus,
    /// Generation step.
    pub step: TokenStep,
    /// Kind of token held.
    pub token_type: TokenType,
    /// Bearer token, empty until the first successful exchange.
    pub access_token: String,
    /// Refresh token, only used by the refresh-token grant.
    pub refresh_token: Option<String>,
    /// Expiry as unix seconds, `0` when no token was ever obtained.
    pub expires_at: i64,
    /// Wall-clock time the token was issued at.
    pub issued_at: i64,
    /// Monotonic millis the token was issued at.
    pub last_issued_at_millis: u64,
    /// Last error.
    pub error: TokenError,
    /// Signed JWT waiting to be exchanged.
    pub jwt: Option<String>,
    /// A token request is in flight.
    pub task_running: bool,
}

impl Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenState")
            .field("status", &self.status)
            .field("step", &self.step)
            .field("token_type", &self.token_type)
            .field("access_token", &Redact::from(&self.access_token))
            .field("refresh_token", &Redact::from(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .field("issued_at", &self.issued_at)
            .field("error", &self.error)
            .field("jwt", &Redact::from(&self.jwt))
            .field("task_running", &self.task_running)
            .finish()
    }
}

/// Tick is one reading of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Unix seconds.
    pub now: i64,
    /// Monotonic millis.
    pub millis: u64,
    /// Whether `now` is trustworthy.
    pub synchronized: bool,
}

impl Tick {
    /// Read the clock.
    pub fn from_clock(clock: &dyn Clock) -> Self {
        Self {
            now: clock.now(),
            millis: clock.millis(),
            synchronized: clock.is_synchronized(),
        }
    }
}

/// Action is what the driver has to do next.
#[derive(Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do right now, call again later.
    Idle,
    /// Ask the clock to synchronize, then call again later.
    SyncClock,
    /// Open a connection, report with [`TokenMachine::on_connect`].
    Connect {
        /// Host name.
        host: &'static str,
        /// Port.
        port: u16,
    },
    /// Write these bytes, report with [`TokenMachine::on_sent`].
    Send(Vec<u8>),
    /// Read one response, report with [`TokenMachine::on_response`].
    AwaitResponse,
    /// The cycle ended, `true` when a token is ready.
    Done(bool),
}

impl Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Idle => f.write_str("Idle"),
            Action::SyncClock => f.write_str("SyncClock"),
            Action::Connect { host, port } => f
                .debug_struct("Connect")
                .field("host", host)
                .field("port", port)
                .finish(),
            Action::Send(bytes) => f.debug_tuple("Send").field(&bytes.len()).finish(),
            Action::AwaitResponse => f.write_str("AwaitResponse"),
            Action::Done(ready) => f.debug_tuple("Done").field(ready).finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitConnect(Vec<u8>),
    AwaitSent,
    AwaitResponse,
}

#[derive(Serialize)]
struct JwtBearerRequest<'a> {
    grant_type: &'a str,
    assertion: &'a str,
}

#[derive(Serialize)]
struct RefreshTokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(i64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Status {
        code: Option<i32>,
        message: Option<String>,
        status: Option<String>,
    },
    Name(String),
}

#[derive(Deserialize, Default)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    expires_in: Option<Seconds>,
    refresh_token: Option<String>,
    error: Option<ErrorField>,
    error_description: Option<String>,
}

impl TokenResponse {
    /// Token lifetime in seconds, capped at [`MAX_TOKEN_EXPIRY_SECS`].
    fn lifetime(&self) -> Result<i64> {
        let expires_in = match &self.expires_in {
            Some(Seconds::Number(v)) => *v,
            Some(Seconds::Text(v)) => v.trim().parse().unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            None => DEFAULT_EXPIRES_IN_SECS,
        };
        if expires_in <= 0 {
            return Err(Error::response_invalid(format!(
                "token response has non-positive expires_in {expires_in}"
            )));
        }
        Ok(expires_in.min(MAX_TOKEN_EXPIRY_SECS))
    }
}

/// TokenMachine owns the token state and decides every transition.
pub struct TokenMachine {
    config: Config,
    credential: Option<Credential>,
    client_email: Option<String>,
    credential_failed: bool,
    state: TokenState,
    unsigned: Option<UnsignedJwt>,
    phase: Phase,
    next: Option<Action>,
    millis: u64,
    last_begin_millis: Option<u64>,
    last_exchange_millis: Option<u64>,
    sync_started_millis: Option<u64>,
    last_callback_millis: Option<u64>,
    notifications: VecDeque<TokenInfo>,
}

impl Debug for TokenMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenMachine")
            .field("credential", &self.credential)
            .field("state", &self.state)
            .field("phase", &self.phase_name())
            .finish()
    }
}

impl TokenMachine {
    /// Create a machine without credential.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            credential: None,
            client_email: None,
            credential_failed: false,
            state: TokenState::default(),
            unsigned: None,
            phase: Phase::Idle,
            next: None,
            millis: 0,
            last_begin_millis: None,
            last_exchange_millis: None,
            sync_started_millis: None,
            last_callback_millis: None,
            notifications: VecDeque::new(),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> &TokenState {
        &self.state
    }

    /// Snapshot for the status callback.
    pub fn info(&self) -> TokenInfo {
        TokenInfo {
            status: self.state.status,
            token_type: self.state.token_type,
            error: self.state.error.clone(),
        }
    }

    /// Take the queued status notifications.
    pub fn drain_notifications(&mut self) -> impl Iterator<Item = TokenInfo> + '_ {
        self.notifications.drain(..)
    }

    /// Replace the credential, dropping any token obtained with the old one.
    pub fn set_credential(&mut self, credential: Credential) {
        let refresh_token = match &credential {
            Credential::RefreshToken(c) => Some(c.refresh_token.clone()),
            _ => None,
        };
        self.reset();
        self.credential = Some(credential);
        self.state.refresh_token = refresh_token;
    }

    /// Forget credential and token.
    pub fn reset(&mut self) {
        if self.phase != Phase::Idle {
            debug!("reset while a token request is in flight, its outcome will be ignored");
        }
        *self = Self::new(self.config.clone());
    }

    /// Force a new exchange on the next [`TokenMachine::advance`].
    pub fn refresh(&mut self) {
        self.state.expires_at = 0;
        if self.state.status == TokenStatus::Ready {
            self.state.step = TokenStep::Begin;
            self.set_status(TokenStatus::Initializing);
        }
    }

    /// Whether the token has to be renewed at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        let expires_at = self.state.expires_at;
        if expires_at == 0 {
            return true;
        }
        now > expires_at.saturating_sub(self.effective_pre_refresh())
    }

    /// Whether a usable token is held at `now`.
    pub fn is_ready(&self, now: i64) -> bool {
        self.state.status == TokenStatus::Ready && !self.is_expired(now)
    }

    fn effective_pre_refresh(&self) -> i64 {
        let pre_refresh = self.config.pre_refresh_seconds();
        if self.state.expires_at > 0 && pre_refresh > self.state.expires_at {
            FALLBACK_PRE_REFRESH_SECS
        } else {
            pre_refresh
        }
    }

    /// Decide what to do next.
    pub fn advance(&mut self, tick: Tick, ctx: &Context) -> Action {
        self.millis = tick.millis;
        if let Some(action) = self.next.take() {
            return action;
        }
        if self.phase != Phase::Idle {
            return Action::Idle;
        }

        self.adjust_expiry(tick);
        if self.is_ready(tick.now) {
            return Action::Done(true);
        }

        let Some(credential) = &self.credential else {
            return Action::Done(false);
        };
        let is_refresh_grant = credential.is_refresh_token();

        if self.credential_failed {
            self.notify();
            return Action::Done(false);
        }

        if self.state.status == TokenStatus::Ready {
            info!(
                "access token expires at {}, renewing",
                gsheet_core::time::format_timestamp(self.state.expires_at)
            );
            self.state.step = TokenStep::Begin;
            self.set_status(TokenStatus::Initializing);
        }

        loop {
            match self.state.step {
                TokenStep::Begin => {
                    let debounce = interval(self.config.begin_step_interval());
                    if let Some(last) = self.last_begin_millis {
                        if tick.millis.saturating_sub(last) <= debounce {
                            return Action::Idle;
                        }
                    }
                    self.last_begin_millis = Some(tick.millis);
                    self.set_status(TokenStatus::Initializing);

                    if let Err(err) = self.load_credential(ctx) {
                        return self.fail_credential(err);
                    }

                    let needs_clock = !is_refresh_grant || self.config.require_synced_clock();
                    if needs_clock && !tick.synchronized {
                        return self.wait_for_clock(tick);
                    }
                    self.sync_started_millis = None;

                    self.state.step = if is_refresh_grant {
                        TokenStep::Exchange
                    } else {
                        TokenStep::EncodeHeaderPayload
                    };
                }
                TokenStep::EncodeHeaderPayload => {
                    self.set_status(TokenStatus::Signing);
                    self.state.jwt = None;
                    let client_email = self.client_email.clone().unwrap_or_default();
                    let claims = Claims::new(
                        &client_email,
                        DEFAULT_SCOPE,
                        tick.now,
                        self.config.token_expiry_seconds(),
                    );
                    match UnsignedJwt::encode(ctx, &claims) {
                        Ok(unsigned) => {
                            self.unsigned = Some(unsigned);
                            self.state.step = TokenStep::Sign;
                        }
                        Err(err) => return self.fail(err, TokenStep::EncodeHeaderPayload),
                    }
                }
                TokenStep::Sign => {
                    self.set_status(TokenStatus::Signing);
                    match self.sign(ctx) {
                        Ok(jwt) => {
                            self.state.jwt = Some(jwt);
                            self.state.step = TokenStep::Exchange;
                        }
                        Err(err) => return self.fail(err, TokenStep::EncodeHeaderPayload),
                    }
                }
                TokenStep::Exchange => {
                    let debounce = interval(self.config.exchange_interval());
                    if let Some(last) = self.last_exchange_millis {
                        if tick.millis.saturating_sub(last) < debounce {
                            return Action::Idle;
                        }
                    }

                    let request = match self.token_request() {
                        Ok(request) => request,
                        Err(err) => return self.fail(err, self.retry_step()),
                    };
                    self.set_status(if is_refresh_grant {
                        TokenStatus::Refreshing
                    } else {
                        TokenStatus::Requesting
                    });
                    self.last_exchange_millis = Some(tick.millis);
                    self.phase = Phase::AwaitConnect(request);
                    self.state.task_running = true;
                    return Action::Connect {
                        host: TOKEN_HOST,
                        port: HTTPS_PORT,
                    };
                }
            }
        }
    }

    /// Report the outcome of [`Action::Connect`].
    pub fn on_connect(&mut self, result: Result<()>) {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::AwaitConnect(request) => match result {
                Ok(()) => {
                    self.phase = Phase::AwaitSent;
                    self.next = Some(Action::Send(request));
                }
                Err(err) => self.fail_transport(err),
            },
            other => {
                warn!("unexpected connect outcome while {}", phase_name(&other));
                self.phase = other;
            }
        }
    }

    /// Report the outcome of [`Action::Send`].
    pub fn on_sent(&mut self, result: Result<usize>) {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::AwaitSent => match result {
                Ok(_) => {
                    self.phase = Phase::AwaitResponse;
                    self.next = Some(Action::AwaitResponse);
                }
                Err(err) => self.fail_transport(err),
            },
            other => {
                warn!("unexpected send outcome while {}", phase_name(&other));
                self.phase = other;
            }
        }
    }

    /// Report the outcome of [`Action::AwaitResponse`].
    pub fn on_response(&mut self, result: Result<HttpResponse>, tick: Tick) {
        if self.phase != Phase::AwaitResponse {
            warn!("unexpected response while {}", self.phase_name());
            return;
        }
        self.millis = tick.millis;
        self.phase = Phase::Idle;
        self.state.task_running = false;
        self.state.jwt = None;

        let token = match result {
            Ok(resp) => parse_token_response(&resp)
                .and_then(|token| token.lifetime().map(|lifetime| (token, lifetime))),
            Err(err) => return self.fail_transport(err),
        };
        match token {
            Ok((token, expires_in)) => self.accept(token, expires_in, tick),
            Err(err) if err.is_transport_error() => self.fail_transport(err),
            Err(err) => {
                self.next = Some(self.fail(err, self.retry_step()));
            }
        }
    }

    fn accept(&mut self, token: TokenResponse, expires_in: i64, tick: Tick) {
        self.state.access_token = token.access_token;
        if let Some(refresh_token) = token.refresh_token {
            self.state.refresh_token = Some(refresh_token);
        }
        self.state.token_type = TokenType::AccessToken;
        self.state.issued_at = tick.now;
        self.state.expires_at = tick.now.saturating_add(expires_in).max(1);
        self.state.last_issued_at_millis = tick.millis;
        self.state.error = TokenError::default();
        self.state.step = TokenStep::Begin;
        info!(
            "access token ready, expires at {}",
            gsheet_core::time::format_timestamp(self.state.expires_at)
        );
        self.set_status(TokenStatus::Ready);
        self.next = Some(Action::Done(true));
    }

    fn load_credential(&mut self, ctx: &Context) -> Result<()> {
        let Some(credential) = &self.credential else {
            return Err(Error::credential_invalid("no credential set"));
        };
        self.client_email = credential
            .load_service_account(ctx)?
            .map(|sa| sa.client_email.clone());
        Ok(())
    }

    fn sign(&mut self, ctx: &Context) -> Result<String> {
        let Some(unsigned) = self.unsigned.take() else {
            return Err(Error::unexpected("no encoded JWT to sign"));
        };
        let Some(credential) = &self.credential else {
            return Err(Error::credential_invalid("no credential set"));
        };
        // A key file is read for every signature and dropped right after.
        let Some(sa) = credential.load_service_account(ctx)? else {
            return Err(Error::unexpected("refresh-token grant has no key to sign with"));
        };
        unsigned.sign(ctx, &sa.private_key)
    }

    fn token_request(&self) -> Result<Vec<u8>> {
        let request = PendingRequest::new(Host::Token, Method::POST, TOKEN_PATH);
        let request = match &self.credential {
            Some(Credential::RefreshToken(c)) => {
                let refresh_token = self
                    .state
                    .refresh_token
                    .as_deref()
                    .unwrap_or(&c.refresh_token);
                request.with_json(&RefreshTokenRequest {
                    client_id: &c.client_id,
                    client_secret: &c.client_secret,
                    grant_type: REFRESH_TOKEN_GRANT,
                    refresh_token,
                })?
            }
            _ => {
                let Some(jwt) = self.state.jwt.as_deref() else {
                    return Err(Error::unexpected("no signed JWT to exchange"));
                };
                request.with_json(&JwtBearerRequest {
                    grant_type: JWT_BEARER_GRANT,
                    assertion: jwt,
                })?
            }
        };
        Ok(request.to_bytes(None))
    }

    fn wait_for_clock(&mut self, tick: Tick) -> Action {
        let started = *self.sync_started_millis.get_or_insert(tick.millis);
        if tick.millis.saturating_sub(started) <= interval(self.config.clock_sync_timeout()) {
            debug!("waiting for time synchronization");
            return Action::SyncClock;
        }

        self.sync_started_millis = None;
        let err = Error::ntp_sync_timed_out(format!(
            "time was not synchronized within {:?}",
            self.config.clock_sync_timeout()
        ));
        warn!("{err}");
        self.set_error(&err);
        // Reported once, then retried from scratch.
        self.state.error = TokenError::default();
        self.state.status = TokenStatus::Initializing;
        Action::Done(false)
    }

    /// Adjust an expiry computed before the clock was synchronized.
    fn adjust_expiry(&mut self, tick: Tick) {
        let expires_at = self.state.expires_at;
        if expires_at == 0 || expires_at >= DEFAULT_TIMESTAMP || !tick.synchronized {
            return;
        }

        let elapsed = (tick.millis.saturating_sub(self.state.last_issued_at_millis) / 1000) as i64;
        let lifetime = expires_at - self.state.issued_at;
        let issued_at = tick.now - elapsed;
        self.state.issued_at = issued_at;
        self.state.expires_at = issued_at + lifetime - CLOCK_ADJUST_MARGIN_SECS;
        info!(
            "clock synchronized, token expiry moved from {expires_at} to {}",
            self.state.expires_at
        );
    }

    fn retry_step(&self) -> TokenStep {
        if self.credential.as_ref().is_some_and(Credential::is_refresh_token) {
            TokenStep::Exchange
        } else {
            TokenStep::EncodeHeaderPayload
        }
    }

    fn fail(&mut self, err: Error, step: TokenStep) -> Action {
        warn!("token generation failed: {err}");
        self.state.step = step;
        self.state.jwt = None;
        self.unsigned = None;
        self.set_error(&err);
        Action::Done(false)
    }

    fn fail_credential(&mut self, err: Error) -> Action {
        self.credential_failed = true;
        self.fail(err, TokenStep::Begin)
    }

    fn fail_transport(&mut self, err: Error) {
        self.phase = Phase::Idle;
        self.state.task_running = false;
        self.next = Some(self.fail(err, TokenStep::Begin));
    }

    fn set_error(&mut self, err: &Error) {
        let error = TokenError::from(err);
        if self.state.status != TokenStatus::Error || self.state.error != error {
            self.last_callback_millis = None;
        }
        self.state.error = error;
        self.state.status = TokenStatus::Error;
        self.notify();
    }

    fn set_status(&mut self, status: TokenStatus) {
        if self.state.status == status {
            return;
        }
        debug!(
            "token status {} -> {}",
            self.state.status.as_str(),
            status.as_str()
        );
        self.state.status = status;
        self.last_callback_millis = None;
        self.notify();
    }

    fn notify(&mut self) {
        if let Some(last) = self.last_callback_millis {
            if self.millis.saturating_sub(last) < interval(self.config.callback_interval()) {
                return;
            }
        }
        self.last_callback_millis = Some(self.millis);
        self.notifications.push_back(self.info());
    }

    fn phase_name(&self) -> &'static str {
        phase_name(&self.phase)
    }
}

fn phase_name(phase: &Phase) -> &'static str {
    match phase {
        Phase::Idle => "idle",
        Phase::AwaitConnect(_) => "connecting",
        Phase::AwaitSent => "sending",
        Phase::AwaitResponse => "awaiting response",
    }
}

fn interval(duration: std::time::Duration) -> u64 {
    duration.as_millis() as u64
}

fn parse_token_response(resp: &HttpResponse) -> Result<TokenResponse> {
    let token: TokenResponse = match &resp.json {
        Some(json) => serde_json::from_value(json.clone()).map_err(|e| {
            Error::response_invalid("unexpected token response").with_source(e)
        })?,
        None if resp.status == 200 => {
            return Err(Error::response_invalid("token response has no JSON body"));
        }
        None => TokenResponse::default(),
    };

    if let Some(error) = &token.error {
        let (code, message) = match error {
            ErrorField::Status {
                code,
                message,
                status,
            } => (
                code.unwrap_or(i32::from(resp.status)),
                message
                    .clone()
                    .or_else(|| status.clone())
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
            ErrorField::Name(name) => (
                i32::from(resp.status),
                match &token.error_description {
                    Some(description) => format!("{name}: {description}"),
                    None => name.clone(),
                },
            ),
        };
        return Err(Error::api(code, message));
    }

    if resp.status != 200 {
        let message = if resp.payload.is_empty() {
            format!("token endpoint answered {}", resp.status)
        } else {
            resp.payload.clone()
        };
        return Err(Error::api(i32::from(resp.status), message));
    }

    if token.access_token.is_empty() {
        return Err(Error::response_invalid("token response has no access_token"));
    }
    Ok(token)
}
