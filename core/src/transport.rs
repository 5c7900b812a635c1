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

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::Mutex;

use crate::Error;
use crate::Result;

/// Transport is a byte stream to a TLS server, read line by line.
///
/// It mirrors the socket API found on constrained devices: there is no
/// buffered reader, only [`Transport::available`] and a bounded
/// [`Transport::read_line`]. Implementations must not block in
/// `available`.
pub trait Transport: Debug + Send + 'static {
    /// Remember the host and port used by the next [`Transport::connect`].
    fn begin(&mut self, host: &str, port: u16);

    /// Open the connection set by [`Transport::begin`].
    fn connect(&mut self) -> Result<()>;

    /// Whether the connection is open.
    fn connected(&self) -> bool;

    /// Write all bytes, returning how many were written.
    fn send(&mut self, data: &[u8]) -> Result<usize>;

    /// Number of bytes that can be read without blocking.
    fn available(&mut self) -> usize;

    /// Append at most `max_len` bytes to `buf`, stopping after `\n`.
    ///
    /// Returns the number of bytes appended, `0` if nothing is available.
    fn read_line(&mut self, buf: &mut Vec<u8>, max_len: usize) -> usize;

    /// Discard everything left in the receive buffer.
    fn flush(&mut self);

    /// Close the connection.
    fn stop(&mut self);

    /// Trust only this CA certificate (PEM), or the built-in roots when `None`.
    fn set_ca_cert(&mut self, pem: Option<&str>);

    /// Whether the network below the socket is usable.
    fn network_ready(&self) -> bool {
        true
    }

    /// Ask the platform to bring the network back.
    fn network_reconnect(&mut self) {}
}

/// ScriptedTransport replays canned responses from memory.
///
/// Each queued response is released into the receive buffer by the first
/// `send` after the previous response has been drained. Clones share state,
/// so a test can keep a handle after moving one into a client.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<ScriptState>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    host: String,
    port: u16,
    connected: bool,
    refuse_connect: bool,
    network_down: bool,
    keep_open: bool,
    max_read: Option<usize>,
    responses: VecDeque<Vec<u8>>,
    rx: VecDeque<u8>,
    sent: Vec<Vec<u8>>,
    connects: usize,
    reconnects: usize,
    ca_cert: Option<String>,
}

impl ScriptedTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn push_response(&self, response: impl Into<Vec<u8>>) {
        self.state().responses.push_back(response.into());
    }

    /// Builder form of [`ScriptedTransport::push_response`].
    pub fn with_response(self, response: impl Into<Vec<u8>>) -> Self {
        self.push_response(response);
        self
    }

    /// Return at most `max` bytes per read, to split lines and chunks.
    pub fn with_max_read(self, max: usize) -> Self {
        self.state().max_read = Some(max.max(1));
        self
    }

    /// Keep the connection open after a response is drained, so a short
    /// body stalls instead of ending.
    pub fn with_keep_open(self) -> Self {
        self.state().keep_open = true;
        self
    }

    /// Fail every connect attempt.
    pub fn set_refuse_connect(&self, refuse: bool) {
        self.state().refuse_connect = refuse;
    }

    /// Report the network as down until [`Transport::network_reconnect`].
    pub fn set_network_down(&self, down: bool) {
        self.state().network_down = down;
    }

    /// Every buffer passed to `send`, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state().sent.clone()
    }

    /// Number of successful connects.
    pub fn connects(&self) -> usize {
        self.state().connects
    }

    /// Number of network reconnect requests.
    pub fn reconnects(&self) -> usize {
        self.state().reconnects
    }

    /// Host and port of the last `begin`.
    pub fn endpoint(&self) -> (String, u16) {
        let state = self.state();
        (state.host.clone(), state.port)
    }

    /// CA certificate set through [`Transport::set_ca_cert`].
    pub fn ca_cert(&self) -> Option<String> {
        self.state().ca_cert.clone()
    }

    /// Responses not yet released.
    pub fn pending_responses(&self) -> usize {
        self.state().responses.len()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ScriptState {
    fn close_if_drained(&mut self) {
        if self.rx.is_empty() && !self.keep_open {
            self.connected = false;
        }
    }
}

impl Transport for ScriptedTransport {
    fn begin(&mut self, host: &str, port: u16) {
        let mut state = self.state();
        state.host = host.to_string();
        state.port = port;
    }

    fn connect(&mut self) -> Result<()> {
        let mut state = self.state();
        if state.refuse_connect || state.network_down {
            return Err(Error::connection_refused(format!(
                "connect to {}:{} refused",
                state.host, state.port
            )));
        }
        state.connected = true;
        state.connects += 1;
        Ok(())
    }

    fn connected(&self) -> bool {
        self.state().connected
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        let mut state = self.state();
        if !state.connected {
            return Err(Error::not_connected("send on a closed connection"));
        }
        state.sent.push(data.to_vec());
        if state.rx.is_empty() {
            if let Some(resp) = state.responses.pop_front() {
                state.rx.extend(resp);
            }
        }
        Ok(data.len())
    }

    fn available(&mut self) -> usize {
        let state = self.state();
        match state.max_read {
            Some(max) => state.rx.len().min(max),
            None => state.rx.len(),
        }
    }

    fn read_line(&mut self, buf: &mut Vec<u8>, max_len: usize) -> usize {
        let mut state = self.state();
        let limit = state.max_read.map_or(max_len, |m| m.min(max_len));
        let mut n = 0;
        while n < limit {
            let Some(b) = state.rx.pop_front() else {
                break;
            };
            buf.push(b);
            n += 1;
            if b == b'\n' {
                break;
            }
        }
        state.close_if_drained();
        n
    }

    fn flush(&mut self) {
        let mut state = self.state();
        state.rx.clear();
        state.close_if_drained();
    }

    fn stop(&mut self) {
        let mut state = self.state();
        state.rx.clear();
        state.connected = false;
    }

    fn set_ca_cert(&mut self, pem: Option<&str>) {
        self.state().ca_cert = pem.map(str::to_string);
    }

    fn network_ready(&self) -> bool {
        !self.state().network_down
    }

    fn network_reconnect(&mut self) {
        let mut state = self.state();
        state.reconnects += 1;
        state.network_down = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_transport_releases_response_on_send() {
        let mut t = ScriptedTransport::new().with_response("HTTP/1.1 200 OK\r\n\r\n");
        t.begin("example.com", 443);
        t.connect().unwrap();
        assert_eq!(t.available(), 0);
        assert_eq!(t.pending_responses(), 1);

        t.send(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(t.available(), 19);
        assert_eq!(t.pending_responses(), 0);

        let mut line = Vec::new();
        assert_eq!(t.read_line(&mut line, 1024), 17);
        assert_eq!(line, b"HTTP/1.1 200 OK\r\n");
        assert!(t.connected());

        line.clear();
        assert_eq!(t.read_line(&mut line, 1024), 2);
        assert!(!t.connected());
    }

    #[test]
    fn test_scripted_transport_max_read_splits_lines() {
        let mut t = ScriptedTransport::new()
            .with_response("abcdef\n")
            .with_max_read(4);
        t.connect().unwrap();
        t.send(b"x").unwrap();

        let mut buf = Vec::new();
        assert_eq!(t.read_line(&mut buf, 1024), 4);
        assert_eq!(t.read_line(&mut buf, 1024), 3);
        assert_eq!(buf, b"abcdef\n");
    }

    #[test]
    fn test_scripted_transport_refuses_connect() {
        let mut t = ScriptedTransport::new();
        t.set_refuse_connect(true);
        assert!(t.connect().is_err());
        assert!(t.send(b"x").is_err());
        assert_eq!(t.connects(), 0);
    }
}
