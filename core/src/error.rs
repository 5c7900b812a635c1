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

use std::fmt;
use thiserror::Error;

/// The error type for gsheet operations
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    code: Option<i32>,
    #[source]
    source: Option<anyhow::Error>,
}

/// The kind of error that occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The TLS connection could not be established
    ConnectionRefused,

    /// Writing the request to the transport failed
    SendFailed,

    /// The server did not answer in time
    ReadTimeout,

    /// The transport is not connected
    NotConnected,

    /// The connection dropped while a response was expected
    ConnectionLost,

    /// The response could not be parsed
    ResponseInvalid,

    /// Service account credentials are missing or malformed
    CredentialInvalid,

    /// The RSA private key could not be parsed
    KeyInvalid,

    /// Hashing the JWT signing input failed
    DigestFailed,

    /// Signing the JWT failed
    SignFailed,

    /// A request needed a token that is not ready yet
    TokenNotReady,

    /// Device time could not be synchronized in time
    NtpSyncTimedOut,

    /// Configuration error (missing fields, invalid values)
    ConfigInvalid,

    /// The remote API returned an error
    ApiError,

    /// Unexpected errors
    Unexpected,
}

impl ErrorKind {
    /// Numeric code used when reporting this kind through token status.
    ///
    /// Transport errors use small negative numbers, token generation errors
    /// start at -100. [`ErrorKind::ApiError`] carries the HTTP status or the
    /// code returned by Google, so its table value is only a fallback.
    pub fn code(&self) -> i32 {
        match self {
            ErrorKind::ConnectionRefused => -1,
            ErrorKind::SendFailed => -2,
            ErrorKind::ReadTimeout => -3,
            ErrorKind::NotConnected => -4,
            ErrorKind::ConnectionLost => -5,
            ErrorKind::ResponseInvalid => -6,
            ErrorKind::CredentialInvalid => -101,
            ErrorKind::KeyInvalid => -102,
            ErrorKind::DigestFailed => -103,
            ErrorKind::SignFailed => -104,
            ErrorKind::TokenNotReady => -105,
            ErrorKind::NtpSyncTimedOut => -106,
            ErrorKind::ConfigInvalid => -107,
            ErrorKind::ApiError => -200,
            ErrorKind::Unexpected => -1000,
        }
    }

    /// Look up a kind by its table code.
    pub fn from_code(code: i32) -> Option<Self> {
        const ALL: [ErrorKind; 15] = [
            ErrorKind::ConnectionRefused,
            ErrorKind::SendFailed,
            ErrorKind::ReadTimeout,
            ErrorKind::NotConnected,
            ErrorKind::ConnectionLost,
            ErrorKind::ResponseInvalid,
            ErrorKind::CredentialInvalid,
            ErrorKind::KeyInvalid,
            ErrorKind::DigestFailed,
            ErrorKind::SignFailed,
            ErrorKind::TokenNotReady,
            ErrorKind::NtpSyncTimedOut,
            ErrorKind::ConfigInvalid,
            ErrorKind::ApiError,
            ErrorKind::Unexpected,
        ];
        ALL.into_iter().find(|k| k.code() == code)
    }
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            source: None,
        }
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Override the numeric code, used for errors reported by the server.
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the numeric error code
    pub fn code(&self) -> i32 {
        self.code.unwrap_or_else(|| self.kind.code())
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if this is a credential error
    ///
    /// Credential errors are not retried until the credential changes.
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::CredentialInvalid | ErrorKind::KeyInvalid
        )
    }

    /// Check if this is a transport error
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::ConnectionRefused
                | ErrorKind::SendFailed
                | ErrorKind::ReadTimeout
                | ErrorKind::NotConnected
                | ErrorKind::ConnectionLost
        )
    }
}

// Convenience constructors
impl Error {
    /// Create a connection refused error
    pub fn connection_refused(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionRefused, message)
    }

    /// Create a send failed error
    pub fn send_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SendFailed, message)
    }

    /// Create a read timeout error
    pub fn read_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReadTimeout, message)
    }

    /// Create a not connected error
    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotConnected, message)
    }

    /// Create a connection lost error
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionLost, message)
    }

    /// Create a response invalid error
    pub fn response_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResponseInvalid, message)
    }

    /// Create a credential invalid error
    pub fn credential_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CredentialInvalid, message)
    }

    /// Create a key invalid error
    pub fn key_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::KeyInvalid, message)
    }

    /// Create a digest failed error
    pub fn digest_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DigestFailed, message)
    }

    /// Create a sign failed error
    pub fn sign_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SignFailed, message)
    }

    /// Create a token not ready error
    pub fn token_not_ready(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenNotReady, message)
    }

    /// Create a clock sync timeout error
    pub fn ntp_sync_timed_out(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NtpSyncTimedOut, message)
    }

    /// Create a config invalid error
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Create an API error carrying the server side code
    pub fn api(code: i32, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ApiError, message).with_code(code)
    }

    /// Create an unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::ConnectionRefused => write!(f, "connection refused"),
            ErrorKind::SendFailed => write!(f, "send request failed"),
            ErrorKind::ReadTimeout => write!(f, "response read timed out"),
            ErrorKind::NotConnected => write!(f, "not connected"),
            ErrorKind::ConnectionLost => write!(f, "connection lost"),
            ErrorKind::ResponseInvalid => write!(f, "response payload is invalid"),
            ErrorKind::CredentialInvalid => {
                write!(f, "service account credentials are missing or invalid")
            }
            ErrorKind::KeyInvalid => write!(f, "RSA private key parsing failed"),
            ErrorKind::DigestFailed => write!(f, "create message digest failed"),
            ErrorKind::SignFailed => write!(f, "JWT signing failed"),
            ErrorKind::TokenNotReady => write!(f, "token is not ready"),
            ErrorKind::NtpSyncTimedOut => write!(f, "NTP server time synching failed"),
            ErrorKind::ConfigInvalid => write!(f, "invalid configuration"),
            ErrorKind::ApiError => write!(f, "API returned an error"),
            ErrorKind::Unexpected => write!(f, "unexpected error"),
        }
    }
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

// Common From implementations
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(err)
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::response_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::response_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as IoKind;

        let kind = match err.kind() {
            IoKind::ConnectionRefused => ErrorKind::ConnectionRefused,
            IoKind::ConnectionReset
            | IoKind::ConnectionAborted
            | IoKind::BrokenPipe
            | IoKind::UnexpectedEof => ErrorKind::ConnectionLost,
            IoKind::NotConnected => ErrorKind::NotConnected,
            IoKind::TimedOut | IoKind::WouldBlock => ErrorKind::ReadTimeout,
            _ => ErrorKind::Unexpected,
        };
        Self::new(kind, err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}
