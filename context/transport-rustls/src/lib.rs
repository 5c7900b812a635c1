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

//! Blocking TLS [`Transport`] over `std::net::TcpStream` and `rustls`.

use std::fmt::{self, Debug};
use std::io::{ErrorKind as IoKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use gsheet_core::{Error, Result, Transport};
use log::{debug, warn};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

const READ_BUFFER_SIZE: usize = 2048;
const MAX_FLUSH_ROUNDS: usize = 64;

/// RustlsTransport keeps one TLS connection open at a time.
///
/// Without a CA certificate the Mozilla root set from `webpki-roots` is
/// trusted.
pub struct RustlsTransport {
    host: String,
    port: u16,
    ca_cert: Option<String>,
    connect_timeout: Duration,
    poll_timeout: Duration,
    stream: Option<StreamOwned<ClientConnection, TcpStream>>,
    rx: Vec<u8>,
    closed: bool,
}

impl Debug for RustlsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RustlsTransport")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("custom_ca", &self.ca_cert.is_some())
            .field("connected", &self.connected())
            .field("buffered", &self.rx.len())
            .finish()
    }
}

impl Default for RustlsTransport {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 443,
            ca_cert: None,
            connect_timeout: Duration::from_secs(10),
            poll_timeout: Duration::from_millis(10),
            stream: None,
            rx: Vec::new(),
            closed: false,
        }
    }
}

impl RustlsTransport {
    /// Create a disconnected transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TCP connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set how long [`Transport::available`] waits for data.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    fn client_config(&self) -> Result<ClientConfig> {
        let mut roots = RootCertStore::empty();
        match &self.ca_cert {
            Some(pem) => {
                for cert in CertificateDer::pem_slice_iter(pem.as_bytes()) {
                    let cert = cert.map_err(|e| {
                        Error::config_invalid(format!("invalid CA certificate: {e:?}"))
                    })?;
                    roots.add(cert).map_err(|e| {
                        Error::config_invalid("CA certificate rejected").with_source(e)
                    })?;
                }
                if roots.is_empty() {
                    return Err(Error::config_invalid("no certificate found in CA PEM"));
                }
            }
            None => roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::config_invalid("unsupported TLS versions").with_source(e))?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(config)
    }

    fn open(&self) -> Result<StreamOwned<ClientConnection, TcpStream>> {
        let config = self.client_config()?;
        let server_name = ServerName::try_from(self.host.as_str())
            .map_err(|_| Error::connection_refused(format!("invalid server name {}", self.host)))?
            .to_owned();
        let conn = ClientConnection::new(Arc::new(config), server_name)
            .map_err(|e| Error::connection_refused("TLS setup failed").with_source(e))?;

        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| Error::connection_refused(format!("resolve {} failed", self.host)).with_source(e))?
            .next()
            .ok_or_else(|| Error::connection_refused(format!("no address for {}", self.host)))?;
        let sock = TcpStream::connect_timeout(&addr, self.connect_timeout).map_err(|e| {
            Error::connection_refused(format!("connect to {addr} failed")).with_source(e)
        })?;
        sock.set_nodelay(true)?;
        sock.set_read_timeout(Some(self.connect_timeout))?;

        let mut stream = StreamOwned::new(conn, sock);
        // Finish the handshake now so certificate problems surface as a
        // refused connection rather than a failed send.
        while stream.conn.is_handshaking() {
            stream
                .conn
                .complete_io(&mut stream.sock)
                .map_err(|e| Error::connection_refused("TLS handshake failed").with_source(e))?;
        }
        Ok(stream)
    }

    fn fill(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        if let Err(err) = stream.sock.set_read_timeout(Some(self.poll_timeout)) {
            warn!("failed to set socket read timeout: {err}");
        }

        let mut buf = [0u8; READ_BUFFER_SIZE];
        match stream.read(&mut buf) {
            Ok(0) => {
                debug!("server closed connection to {}", self.host);
                self.closed = true;
            }
            Ok(n) => self.rx.extend_from_slice(&buf[..n]),
            Err(err)
                if matches!(
                    err.kind(),
                    IoKind::WouldBlock | IoKind::TimedOut | IoKind::Interrupted
                ) => {}
            Err(err) => {
                debug!("read from {} failed: {err}", self.host);
                self.closed = true;
            }
        }
    }
}

impl Transport for RustlsTransport {
    fn begin(&mut self, host: &str, port: u16) {
        if host != self.host || port != self.port {
            self.stop();
        }
        self.host = host.to_string();
        self.port = port;
    }

    fn connect(&mut self) -> Result<()> {
        self.stop();
        if self.host.is_empty() {
            return Err(Error::connection_refused("no host set"));
        }
        debug!("connecting to {}:{}", self.host, self.port);
        self.stream = Some(self.open()?);
        Ok(())
    }

    fn connected(&self) -> bool {
        self.stream.is_some() && !self.closed
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        let Some(stream) = self.stream.as_mut().filter(|_| !self.closed) else {
            return Err(Error::not_connected("send on a closed connection"));
        };
        stream
            .write_all(data)
            .and_then(|_| stream.flush())
            .map_err(|e| Error::send_failed("send request failed").with_source(e))?;
        Ok(data.len())
    }

    fn available(&mut self) -> usize {
        if self.rx.is_empty() && self.connected() {
            self.fill();
        }
        self.rx.len()
    }

    fn read_line(&mut self, buf: &mut Vec<u8>, max_len: usize) -> usize {
        if self.rx.is_empty() && self.connected() {
            self.fill();
        }
        let limit = max_len.min(self.rx.len());
        let end = self.rx[..limit]
            .iter()
            .position(|b| *b == b'\n')
            .map_or(limit, |pos| pos + 1);
        buf.extend(self.rx.drain(..end));
        end
    }

    fn flush(&mut self) {
        self.rx.clear();
        for _ in 0..MAX_FLUSH_ROUNDS {
            if self.available() == 0 {
                break;
            }
            self.rx.clear();
        }
    }

    fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.conn.send_close_notify();
            let _ = stream.conn.complete_io(&mut stream.sock);
            let _ = stream.sock.shutdown(Shutdown::Both);
        }
        self.rx.clear();
        self.closed = false;
    }

    fn set_ca_cert(&mut self, pem: Option<&str>) {
        self.ca_cert = pem.map(str::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsheet_core::ErrorKind;

    #[test]
    fn test_default_roots_config() {
        assert!(RustlsTransport::new().client_config().is_ok());
    }

    #[test]
    fn test_invalid_ca_rejected() {
        let mut t = RustlsTransport::new();
        t.set_ca_cert(Some("not a certificate"));
        let err = t.client_config().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_send_without_connect() {
        let mut t = RustlsTransport::new();
        t.begin("oauth2.googleapis.com", 443);
        assert!(!t.connected());
        assert_eq!(t.available(), 0);
        assert_eq!(t.send(b"x").unwrap_err().kind(), ErrorKind::NotConnected);

        let mut line = Vec::new();
        assert_eq!(t.read_line(&mut line, 16), 0);
    }

    #[test]
    fn test_connect_without_host() {
        let mut t = RustlsTransport::new();
        assert_eq!(t.connect().unwrap_err().kind(), ErrorKind::ConnectionRefused);
    }
}
