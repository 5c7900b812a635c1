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

use std::fmt::Write;

use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, Method};
use serde::Serialize;

use gsheet_core::Result;

use crate::constants::*;

/// Host is one of the fixed servers requests are sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Host {
    /// The OAuth2 token endpoint.
    Token,
    /// The Sheets API.
    Sheets,
    /// The Drive API.
    Drive,
}

impl Host {
    /// Host name.
    pub fn name(&self) -> &'static str {
        match self {
            Host::Token => TOKEN_HOST,
            Host::Sheets => SHEETS_HOST,
            Host::Drive => DRIVE_HOST,
        }
    }
}

/// PendingRequest is one HTTP/1.1 request waiting to be written.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Destination server.
    pub host: Host,
    /// Request method.
    pub method: Method,
    /// Path including the query string.
    pub path: String,
    /// Extra headers, written in order after the standard ones.
    pub headers: Vec<(HeaderName, HeaderValue)>,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

impl PendingRequest {
    /// Create a request without body.
    pub fn new(host: Host, method: Method, path: impl Into<String>) -> Self {
        Self {
            host,
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Serialize `body` as the JSON payload.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    /// Append an extra header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Render the request in wire format.
    ///
    /// `bearer` adds an `Authorization` header. A JSON content type is
    /// declared whenever a body is present and no explicit `Content-Type`
    /// was given.
    pub fn to_bytes(&self, bearer: Option<&str>) -> Vec<u8> {
        let mut head = String::new();
        // Writing into a String never fails.
        let _ = write!(head, "{} {} HTTP/1.1\r\n", self.method, self.path);
        let _ = write!(head, "Host: {}\r\n", self.host.name());
        let _ = write!(head, "User-Agent: {USER_AGENT}\r\n");
        if let Some(token) = bearer {
            let _ = write!(head, "Authorization: Bearer {token}\r\n");
        }

        let has_content_type = self.headers.iter().any(|(k, _)| k == CONTENT_TYPE);
        match &self.body {
            Some(body) => {
                let _ = write!(head, "Content-Length: {}\r\n", body.len());
                if !has_content_type {
                    head.push_str("Content-Type: application/json\r\n");
                }
            }
            None if self.method == Method::POST || self.method == Method::PUT => {
                head.push_str("Content-Length: 0\r\n");
            }
            None => {}
        }

        let mut out = head.into_bytes();
        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_str().as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"Connection: keep-alive\r\n\r\n");
        if let Some(body) = &self.body {
            out.extend_from_slice(body);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_token_request_wire_format() {
        let body = serde_json::json!({"grant_type": "g"});
        let req = PendingRequest::new(Host::Token, Method::POST, TOKEN_PATH)
            .with_json(&body)
            .unwrap();

        assert_eq!(
            String::from_utf8(req.to_bytes(None)).unwrap(),
            "POST /token HTTP/1.1\r\n\
             Host: oauth2.googleapis.com\r\n\
             User-Agent: ESP\r\n\
             Content-Length: 18\r\n\
             Content-Type: application/json\r\n\
             Connection: keep-alive\r\n\
             \r\n\
             {\"grant_type\":\"g\"}"
        );
    }

    #[test]
    fn test_api_request_carries_bearer() {
        let req = PendingRequest::new(Host::Sheets, Method::GET, "/v4/spreadsheets/abc")
            .with_header(
                HeaderName::from_static("x-goog-user-project"),
                HeaderValue::from_static("p"),
            );

        assert_eq!(
            String::from_utf8(req.to_bytes(Some("tok"))).unwrap(),
            "GET /v4/spreadsheets/abc HTTP/1.1\r\n\
             Host: sheets.googleapis.com\r\n\
             User-Agent: ESP\r\n\
             Authorization: Bearer tok\r\n\
             x-goog-user-project: p\r\n\
             Connection: keep-alive\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_empty_post_declares_zero_length() {
        let req = PendingRequest::new(Host::Drive, Method::POST, "/x");
        let text = String::from_utf8(req.to_bytes(None)).unwrap();
        assert!(text.contains("Content-Length: 0\r\n"));
        assert!(!text.contains("Content-Type"));
    }
}
