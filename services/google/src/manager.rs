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

use std::fmt::{self, Debug};

use gsheet_core::utils::redact_authorization;
use gsheet_core::{Context, Error, HttpResponse, ResponseReader, Result, Storage, Transport};
use log::{debug, info, trace, warn};

use crate::constants::HTTPS_PORT;
use crate::request::PendingRequest;
use crate::token::{Action, Tick, TokenInfo, TokenMachine, TokenStatus, TokenType};
use crate::{Config, Credential};

/// StatusCallback receives every reported change of the token status.
pub type StatusCallback = Box<dyn FnMut(&TokenInfo) + Send>;

/// TokenManager owns a transport and keeps an access token fresh.
///
/// It is driven by the caller: [`TokenManager::check_token`] performs at most
/// one token request and returns, so it can be polled from a main loop.
pub struct TokenManager<T: Transport> {
    ctx: Context,
    machine: TokenMachine,
    transport: T,
    reader: ResponseReader,
    callback: Option<StatusCallback>,
    connected_host: Option<&'static str>,
    last_reconnect_millis: Option<u64>,
}

impl<T: Transport> Debug for TokenManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("ctx", &self.ctx)
            .field("machine", &self.machine)
            .field("transport", &self.transport)
            .field("connected_host", &self.connected_host)
            .finish()
    }
}

impl<T: Transport> TokenManager<T> {
    /// Create a manager without credential.
    pub fn new(ctx: Context, config: Config, transport: T) -> Self {
        let reader = ResponseReader::new(config.server_response_timeout())
            .with_request_timeout(config.request_timeout());
        Self {
            ctx,
            machine: TokenMachine::new(config),
            transport,
            reader,
            callback: None,
            connected_host: None,
            last_reconnect_millis: None,
        }
    }

    /// Set the credential and prepare the transport.
    ///
    /// The CA certificate is taken from [`Config::ca_cert`], or read from
    /// [`Config::ca_cert_path`] on flash. No request is made until the token
    /// is checked.
    pub fn begin(&mut self, credential: Credential) -> Result<()> {
        let config = self.machine.config();
        let ca_cert = match (config.ca_cert(), config.ca_cert_path()) {
            (Some(pem), _) => Some(pem.to_string()),
            (None, Some(path)) => Some(
                self.ctx
                    .file_read_as_string(Storage::Flash, path)
                    .map_err(|e| {
                        Error::config_invalid(format!("failed to read CA certificate {path}"))
                            .with_source(e)
                    })?,
            ),
            (None, None) => None,
        };
        self.transport.set_ca_cert(ca_cert.as_deref());

        info!("token manager started");
        self.set_credential(credential);
        Ok(())
    }

    /// Replace the credential.
    pub fn set_credential(&mut self, credential: Credential) {
        self.machine.set_credential(credential);
    }

    /// Register the status callback.
    pub fn set_status_callback(&mut self, callback: impl FnMut(&TokenInfo) + Send + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Return `true` when a usable token is held, otherwise make progress
    /// towards one.
    pub fn check_token(&mut self) -> bool {
        let ready = self.drive();
        self.dispatch();
        ready
    }

    /// Like [`TokenManager::check_token`] but brings the network back first.
    ///
    /// Reconnecting is attempted at most once per
    /// [`Config::wifi_reconnect_timeout`].
    pub fn token_ready(&mut self) -> bool {
        if !self.transport.network_ready() {
            let millis = self.ctx.millis();
            let interval = self.machine.config().wifi_reconnect_timeout().as_millis() as u64;
            let due = !matches!(
                self.last_reconnect_millis,
                Some(last) if millis.saturating_sub(last) <= interval
            );
            if due {
                info!("network is down, reconnecting");
                self.last_reconnect_millis = Some(millis);
                self.transport.network_reconnect();
            }
            if !self.transport.network_ready() {
                return false;
            }
        }
        self.check_token()
    }

    /// Whether a usable token is held, without any side effect.
    pub fn is_ready(&self) -> bool {
        self.machine.is_ready(self.ctx.now())
    }

    /// Forget credential and token.
    pub fn reset(&mut self) {
        self.machine.reset();
        self.dispatch();
    }

    /// Force a new token request on the next check.
    pub fn refresh(&mut self) {
        self.machine.refresh();
        self.dispatch();
    }

    /// Reset and close the connection.
    pub fn end(&mut self) {
        self.reset();
        self.disconnect();
        info!("token manager stopped");
    }

    /// Expiry of the current token as unix seconds, `0` when none.
    pub fn expired_timestamp(&self) -> i64 {
        self.machine.state().expires_at
    }

    /// Current status.
    pub fn status(&self) -> TokenStatus {
        self.machine.state().status
    }

    /// Current status as text.
    pub fn token_status(&self) -> &'static str {
        self.machine.state().status.as_str()
    }

    /// Current token type as text.
    pub fn token_type(&self) -> &'static str {
        self.machine.state().token_type.as_str()
    }

    /// Last error message, empty when there is none.
    pub fn token_error(&self) -> String {
        self.machine.state().error.message.clone()
    }

    /// Snapshot of status, type and error.
    pub fn token_info(&self) -> TokenInfo {
        self.machine.info()
    }

    /// The access token when one is ready.
    pub fn access_token(&self) -> Option<&str> {
        self.is_ready()
            .then_some(self.machine.state().access_token.as_str())
    }

    /// The underlying state machine.
    pub fn machine(&self) -> &TokenMachine {
        &self.machine
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The context in use.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Send an API request with the bearer token and read the response.
    ///
    /// Fails with [`gsheet_core::ErrorKind::TokenNotReady`] when no token is
    /// ready yet; the caller is expected to try again later.
    pub fn send(&mut self, request: PendingRequest) -> Result<HttpResponse> {
        if !self.token_ready() {
            let reason = self.token_error();
            return Err(Error::token_not_ready(if reason.is_empty() {
                format!("access token is {}", self.token_status())
            } else {
                reason
            }));
        }

        let bytes = request.to_bytes(Some(self.machine.state().access_token.as_str()));
        debug!("{} {} on {}", request.method, request.path, request.host.name());
        let result = self.round_trip(request.host.name(), &bytes);
        if let Err(err) = &result {
            warn!("request to {} failed: {err}", request.host.name());
        }
        result
    }

    fn drive(&mut self) -> bool {
        loop {
            let tick = Tick::from_clock(self.ctx.clock());
            match self.machine.advance(tick, &self.ctx) {
                Action::Idle => return false,
                Action::Done(ready) => return ready,
                Action::SyncClock => {
                    let offset = self.machine.config().gmt_offset_hours();
                    self.ctx.clock().request_sync(offset);
                }
                Action::Connect { host, port } => {
                    let result = self.connect(host, port);
                    self.machine.on_connect(result);
                }
                Action::Send(bytes) => {
                    let result = self.write(&bytes);
                    self.machine.on_sent(result);
                }
                Action::AwaitResponse => {
                    let result = self.read();
                    let tick = Tick::from_clock(self.ctx.clock());
                    self.machine.on_response(result, tick);
                }
            }
        }
    }

    fn dispatch(&mut self) {
        let infos: Vec<TokenInfo> = self.machine.drain_notifications().collect();
        let Some(callback) = self.callback.as_mut() else {
            return;
        };
        for info in &infos {
            callback(info);
        }
    }

    fn round_trip(&mut self, host: &'static str, bytes: &[u8]) -> Result<HttpResponse> {
        self.connect(host, HTTPS_PORT)?;
        self.write(bytes)?;
        self.read()
    }

    fn connect(&mut self, host: &'static str, port: u16) -> Result<()> {
        if self.connected_host == Some(host) && self.transport.connected() {
            trace!("reusing connection to {host}");
            return Ok(());
        }

        self.disconnect();
        if !self.transport.network_ready() {
            return Err(Error::not_connected("network is not ready"));
        }
        self.transport.begin(host, port);
        self.transport.connect()?;
        self.connected_host = Some(host);
        debug!("connected to {host}:{port}");
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        if log::log_enabled!(log::Level::Trace) {
            trace!(
                "sending request:\n{}",
                redact_authorization(&String::from_utf8_lossy(bytes))
            );
        }
        let result = self.transport.send(bytes);
        if result.is_err() {
            self.disconnect();
        }
        result
    }

    fn read(&mut self) -> Result<HttpResponse> {
        let result = self.reader.read(&mut self.transport, self.ctx.clock());
        match &result {
            Ok(resp) => {
                let closing = resp
                    .connection()
                    .is_some_and(|v| v.eq_ignore_ascii_case("close"));
                if closing || resp.timed_out {
                    self.disconnect();
                }
            }
            Err(_) => self.disconnect(),
        }
        result
    }

    fn disconnect(&mut self) {
        if self.connected_host.take().is_some() || self.transport.connected() {
            self.transport.stop();
        }
    }
}
