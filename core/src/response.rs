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

//! HTTP/1.1 response reader over a line oriented [`Transport`].
//!
//! The reader pulls whatever the transport has, one bounded line at a time,
//! and assembles status, headers and body. Bodies framed by
//! `Content-Length`, by chunked transfer encoding, or by connection close
//! are supported. A response that stops arriving for longer than the stall
//! timeout is returned with whatever was read so far.

use std::mem;
use std::time::Duration;

use http::header::CONNECTION;
use http::header::CONTENT_LENGTH;
use http::header::CONTENT_TYPE;
use http::header::ETAG;
use http::header::LOCATION;
use http::header::TRANSFER_ENCODING;
use http::HeaderMap;
use http::HeaderName;
use http::HeaderValue;
use http::StatusCode;
use log::debug;
use log::warn;

use crate::time::Clock;
use crate::Error;
use crate::Result;
use crate::Transport;

/// Maximum bytes requested from the transport per read.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Time without any received byte after which a response is abandoned.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(5);

// Header lines longer than this are processed as if complete.
const MAX_LINE_LEN: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    SizeUnknown,
    Reading { remaining: usize },
}

/// ResponseHandler is the parse state of one HTTP response.
#[derive(Debug)]
pub struct ResponseHandler {
    /// Status code, `0` until a status line has been seen.
    pub http_code: u16,
    /// Body bytes received so far.
    pub payload_read: usize,
    /// Declared body length.
    pub content_length: Option<usize>,
    /// Still reading the status line or headers.
    pub is_header_phase: bool,
    /// The empty line ending the headers has been seen.
    pub header_complete: bool,
    /// The body uses chunked transfer encoding.
    pub is_chunked_encoding: bool,
    /// The status says there is no body.
    pub no_content: bool,
    /// Reading stopped because the stream stalled.
    pub timed_out: bool,
    chunk: ChunkState,
    deadline: u64,
    first_line: bool,
    complete: bool,
    received: bool,
    line: Vec<u8>,
    headers: HeaderMap,
    payload: Vec<u8>,
}

impl ResponseHandler {
    fn new(deadline: u64) -> Self {
        Self {
            http_code: 0,
            payload_read: 0,
            content_length: None,
            is_header_phase: true,
            header_complete: false,
            is_chunked_encoding: false,
            no_content: false,
            timed_out: false,
            chunk: ChunkState::SizeUnknown,
            deadline,
            first_line: true,
            complete: false,
            received: false,
            line: Vec::new(),
            headers: HeaderMap::new(),
            payload: Vec::new(),
        }
    }

    /// Whether a terminal condition has been reached.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    fn consume(&mut self, transport: &mut dyn Transport, max: usize) {
        if self.is_header_phase {
            if let Some(line) = self.read_full_line(transport, max) {
                self.header_line(&line);
            }
        } else if self.is_chunked_encoding {
            self.chunk_data(transport, max);
        } else {
            let want = match self.content_length {
                Some(len) => len.saturating_sub(self.payload_read).min(max),
                None => max,
            };
            let n = transport.read_line(&mut self.payload, want);
            self.payload_read += n;
            if self
                .content_length
                .is_some_and(|len| self.payload_read >= len)
            {
                self.complete = true;
            }
        }
    }

    // Lines may arrive split over several reads, keep the partial line until
    // its terminator shows up.
    fn read_full_line(&mut self, transport: &mut dyn Transport, max: usize) -> Option<Vec<u8>> {
        let n = transport.read_line(&mut self.line, max);
        if n == 0 {
            return None;
        }
        self.received = true;
        if self.line.ends_with(b"\n") || self.line.len() >= MAX_LINE_LEN {
            Some(mem::take(&mut self.line))
        } else {
            None
        }
    }

    fn header_line(&mut self, raw: &[u8]) {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_end_matches(['\r', '\n']);

        if mem::take(&mut self.first_line) {
            if let Some(code) = parse_status_line(text) {
                self.http_code = code;
                self.no_content = code == StatusCode::NO_CONTENT.as_u16();
                return;
            }
            debug!("response starts without a status line");
        }

        if text.is_empty() {
            self.is_header_phase = false;
            self.header_complete = true;
            if self.no_content || (!self.is_chunked_encoding && self.content_length == Some(0)) {
                self.complete = true;
            }
            return;
        }

        let Some((name, value)) = text.split_once(':') else {
            debug!("ignoring malformed header line: {text}");
            return;
        };
        let (name, value) = (name.trim(), value.trim());
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            debug!("ignoring invalid header: {text}");
            return;
        };

        if name == CONTENT_LENGTH {
            self.content_length = value.to_str().ok().and_then(|v| v.parse().ok());
        } else if name == TRANSFER_ENCODING {
            self.is_chunked_encoding = value
                .to_str()
                .is_ok_and(|v| v.to_ascii_lowercase().contains("chunked"));
        } else if name == LOCATION {
            let code = self.http_code;
            if !(code == 200 || (300..400).contains(&code)) {
                return;
            }
        }
        self.headers.append(name, value);
    }

    fn chunk_data(&mut self, transport: &mut dyn Transport, max: usize) {
        match self.chunk {
            ChunkState::SizeUnknown => {
                let Some(line) = self.read_full_line(transport, max) else {
                    return;
                };
                let text = String::from_utf8_lossy(&line);
                let size = text.split(';').next().unwrap_or_default().trim();
                // CRLF closing the previous chunk.
                if size.is_empty() {
                    return;
                }
                match usize::from_str_radix(size, 16) {
                    Ok(0) => self.complete = true,
                    Ok(remaining) => self.chunk = ChunkState::Reading { remaining },
                    Err(_) => {
                        warn!("invalid chunk size line: {size}");
                        self.complete = true;
                    }
                }
            }
            ChunkState::Reading { remaining } => {
                let n = transport.read_line(&mut self.payload, remaining.min(max));
                self.payload_read += n;
                let remaining = remaining - n;
                self.chunk = if remaining == 0 {
                    ChunkState::SizeUnknown
                } else {
                    ChunkState::Reading { remaining }
                };
            }
        }
    }

    fn finish(self) -> HttpResponse {
        let json = if !self.payload.is_empty() && !self.no_content {
            match serde_json::from_slice(&self.payload) {
                Ok(v) => Some(v),
                Err(err) => {
                    debug!("response payload is not json: {err}");
                    None
                }
            }
        } else {
            None
        };

        HttpResponse {
            status: self.http_code,
            headers: self.headers,
            payload: String::from_utf8_lossy(&self.payload).into_owned(),
            json,
            timed_out: self.timed_out,
        }
    }
}

fn parse_status_line(line: &str) -> Option<u16> {
    if !line.starts_with("HTTP/1.") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

/// HttpResponse is a fully read response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// Status code, `0` when the response had no status line.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body, decoded lossily as UTF-8.
    pub payload: String,
    /// Body parsed as JSON, if it was JSON.
    pub json: Option<serde_json::Value>,
    /// The body may be incomplete because the stream stalled.
    pub timed_out: bool,
}

impl HttpResponse {
    /// Status is `200 OK`.
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK.as_u16()
    }

    /// Header value as string.
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `Connection` header.
    pub fn connection(&self) -> Option<&str> {
        self.header(CONNECTION)
    }

    /// `Content-Type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
    }

    /// `Content-Length` header.
    pub fn content_length(&self) -> Option<usize> {
        self.header(CONTENT_LENGTH).and_then(|v| v.parse().ok())
    }

    /// `ETag` header.
    pub fn etag(&self) -> Option<&str> {
        self.header(ETAG)
    }

    /// `Transfer-Encoding` header.
    pub fn transfer_encoding(&self) -> Option<&str> {
        self.header(TRANSFER_ENCODING)
    }

    /// `Location` header, kept only for `200` and redirects.
    pub fn location(&self) -> Option<&str> {
        self.header(LOCATION)
    }
}

/// ResponseReader turns the bytes of a transport into an [`HttpResponse`].
#[derive(Debug, Clone, Copy)]
pub struct ResponseReader {
    chunk_size: usize,
    stall_timeout: Duration,
    request_timeout: Option<Duration>,
}

impl Default for ResponseReader {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            request_timeout: None,
        }
    }
}

impl ResponseReader {
    /// Create a reader with the given stall timeout.
    pub fn new(stall_timeout: Duration) -> Self {
        Self {
            stall_timeout,
            ..Self::default()
        }
    }

    /// Set the maximum bytes requested per read.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Bound the total time spent on one response, even while bytes keep
    /// arriving.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Read one response.
    ///
    /// Blocks until the response is complete, the peer closes the connection
    /// or nothing arrives for the stall timeout. Stalling after some bytes is
    /// not an error: the partial response is returned with `timed_out` set.
    pub fn read(&self, transport: &mut dyn Transport, clock: &dyn Clock) -> Result<HttpResponse> {
        if !transport.connected() && transport.available() == 0 {
            return Err(Error::not_connected("no connection to read a response from"));
        }

        let stall = self.stall_timeout.as_millis() as u64;
        let started = clock.millis();
        let limit = self.request_timeout.map(|v| started + v.as_millis() as u64);
        let mut handler = ResponseHandler::new(started + stall);

        while !handler.is_complete() {
            if limit.is_some_and(|limit| clock.millis() > limit) {
                warn!("response not complete after {:?}, giving up", self.request_timeout);
                handler.timed_out = true;
                break;
            }
            if transport.available() == 0 {
                if !transport.connected() {
                    debug!("connection closed by server while reading response");
                    break;
                }
                if clock.millis() > handler.deadline {
                    warn!(
                        "no data received for {}ms, giving up on response",
                        stall
                    );
                    handler.timed_out = true;
                    break;
                }
                // Let the network stack run.
                std::thread::yield_now();
                continue;
            }

            handler.received = true;
            handler.deadline = clock.millis() + stall;
            handler.consume(transport, self.chunk_size);
        }

        transport.flush();

        if !handler.received {
            return Err(if handler.timed_out {
                Error::read_timeout("no response from server")
            } else {
                Error::connection_lost("connection closed before any response")
            });
        }

        Ok(handler.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use crate::ErrorKind;
    use crate::ScriptedTransport;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn connected(transport: ScriptedTransport) -> ScriptedTransport {
        let mut t = transport;
        t.begin("example.com", 443);
        t.connect().unwrap();
        t.send(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        t
    }

    fn chunked(body: &[u8], sizes: &[usize]) -> Vec<u8> {
        let mut out = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
        let mut rest = body;
        for size in sizes {
            let (head, tail) = rest.split_at((*size).min(rest.len()));
            out.extend_from_slice(format!("{:x}\r\n", head.len()).as_bytes());
            out.extend_from_slice(head);
            out.extend_from_slice(b"\r\n");
            rest = tail;
        }
        if !rest.is_empty() {
            out.extend_from_slice(format!("{:X};ext=1\r\n", rest.len()).as_bytes());
            out.extend_from_slice(rest);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"0\r\n\r\n");
        out
    }

    #[test]
    fn test_read_content_length() {
        let mut t = connected(ScriptedTransport::new().with_response(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 11\r\nETag: \"v1\"\r\nConnection: keep-alive\r\n\r\n{\"a\":\"bc\"}\n",
        ).with_keep_open());
        let clock = ManualClock::new(0);

        let resp = ResponseReader::default().read(&mut t, &clock).unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.is_ok());
        assert_eq!(resp.payload, "{\"a\":\"bc\"}\n");
        assert_eq!(resp.json, Some(serde_json::json!({"a": "bc"})));
        assert_eq!(resp.content_type(), Some("application/json"));
        assert_eq!(resp.content_length(), Some(11));
        assert_eq!(resp.etag(), Some("\"v1\""));
        assert_eq!(resp.connection(), Some("keep-alive"));
        assert!(!resp.timed_out);
    }

    #[test]
    fn test_read_stops_at_content_length() {
        let mut t = connected(
            ScriptedTransport::new()
                .with_response("HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\nabcdEXTRA")
                .with_keep_open(),
        );
        let clock = ManualClock::new(0);

        let resp = ResponseReader::default().read(&mut t, &clock).unwrap();
        assert_eq!(resp.payload, "abcd");
        // Leftover bytes are flushed.
        assert_eq!(t.available(), 0);
    }

    #[test]
    fn test_read_with_small_chunk_size() {
        let mut t = connected(
            ScriptedTransport::new()
                .with_response("HTTP/1.1 200 OK\r\nContent-Length: 12\r\n\r\n{\"ok\":\"yes\"}")
                .with_keep_open(),
        );
        let clock = ManualClock::new(0);

        let resp = ResponseReader::default()
            .with_chunk_size(3)
            .read(&mut t, &clock)
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.payload, "{\"ok\":\"yes\"}");
        assert_eq!(resp.json, Some(serde_json::json!({"ok": "yes"})));
        assert!(!resp.timed_out);
    }

    #[test_case(&[5, 7, 100], 1024 ; "few chunks")]
    #[test_case(&[1, 1, 1, 1], 3 ; "tiny reads")]
    #[test_case(&[16, 3], 2 ; "chunks split across reads")]
    #[test_case(&[], 7 ; "single chunk with extension")]
    fn test_read_chunked(sizes: &[usize], max_read: usize) {
        let body = b"{\"values\":[[\"a\",\"b\"],\n[\"c\",\"d\"]],\n\"range\":\"Sheet1!A1:B2\"}";
        let mut t = connected(
            ScriptedTransport::new()
                .with_response(chunked(body, sizes))
                .with_max_read(max_read)
                .with_keep_open(),
        );
        let clock = ManualClock::new(0);

        let resp = ResponseReader::default().read(&mut t, &clock).unwrap();
        assert_eq!(resp.transfer_encoding(), Some("chunked"));
        assert_eq!(resp.payload.as_bytes(), body.as_slice());
        assert!(resp.json.is_some());
        assert!(!resp.timed_out);
    }

    #[test]
    fn test_read_stall_returns_partial_payload() {
        let mut t = connected(
            ScriptedTransport::new()
                .with_response("HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial")
                .with_keep_open(),
        );
        let clock = ManualClock::new(0).with_tick(50);

        let resp = ResponseReader::new(Duration::from_secs(5))
            .read(&mut t, &clock)
            .unwrap();
        assert!(resp.timed_out);
        assert_eq!(resp.payload, "partial");
        assert!(clock.millis() >= 5_000);
    }

    #[test]
    fn test_read_no_response_times_out() {
        let mut t = connected(ScriptedTransport::new().with_keep_open());
        let clock = ManualClock::new(0).with_tick(100);

        let err = ResponseReader::default().read(&mut t, &clock).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReadTimeout);
    }

    #[test]
    fn test_read_request_timeout_bounds_total_time() {
        let mut t = connected(ScriptedTransport::new().with_keep_open());
        let clock = ManualClock::new(0).with_tick(100);

        let err = ResponseReader::new(Duration::from_secs(60))
            .with_request_timeout(Duration::from_secs(2))
            .read(&mut t, &clock)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReadTimeout);
        assert!(clock.millis() < 60_000);
    }

    #[test]
    fn test_read_closed_connection() {
        let mut t = ScriptedTransport::new();
        let clock = ManualClock::new(0);

        let err = ResponseReader::default().read(&mut t, &clock).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
    }

    #[test]
    fn test_read_until_close_without_length() {
        let mut t = connected(
            ScriptedTransport::new().with_response("HTTP/1.1 200 OK\r\n\r\n{\"ok\":true}"),
        );
        let clock = ManualClock::new(0);

        let resp = ResponseReader::default().read(&mut t, &clock).unwrap();
        assert_eq!(resp.json, Some(serde_json::json!({"ok": true})));
    }

    #[test]
    fn test_read_no_content() {
        let mut t = connected(
            ScriptedTransport::new()
                .with_response("HTTP/1.1 204 No Content\r\nLocation: /x\r\n\r\n")
                .with_keep_open(),
        );
        let clock = ManualClock::new(0);

        let resp = ResponseReader::default().read(&mut t, &clock).unwrap();
        assert_eq!(resp.status, 204);
        assert_eq!(resp.payload, "");
        assert_eq!(resp.json, None);
        assert_eq!(resp.location(), None);
    }

    #[test]
    fn test_read_redirect_keeps_location() {
        let mut t = connected(
            ScriptedTransport::new()
                .with_response("HTTP/1.1 302 Found\r\nLocation: https://example.com/next\r\nContent-Length: 0\r\n\r\n")
                .with_keep_open(),
        );
        let clock = ManualClock::new(0);

        let resp = ResponseReader::default().read(&mut t, &clock).unwrap();
        assert_eq!(resp.status, 302);
        assert_eq!(resp.location(), Some("https://example.com/next"));
    }

    #[test]
    fn test_read_without_status_line() {
        let mut t = connected(
            ScriptedTransport::new()
                .with_response("Content-Length: 2\r\n\r\nok")
                .with_keep_open(),
        );
        let clock = ManualClock::new(0);

        let resp = ResponseReader::default().read(&mut t, &clock).unwrap();
        assert_eq!(resp.status, 0);
        assert_eq!(resp.payload, "ok");
    }

    #[test]
    fn test_read_split_header_lines() {
        let mut t = connected(
            ScriptedTransport::new()
                .with_response("HTTP/1.1 400 Bad Request\r\nContent-Length: 13\r\n\r\n{\"error\":\"x\"}")
                .with_max_read(3)
                .with_keep_open(),
        );
        let clock = ManualClock::new(0);

        let resp = ResponseReader::default().read(&mut t, &clock).unwrap();
        assert_eq!(resp.status, 400);
        assert_eq!(resp.json, Some(serde_json::json!({"error": "x"})));
    }
}
