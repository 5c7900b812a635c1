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

//! Core components for talking to Google APIs from constrained devices.
//!
//! This crate provides the foundational types and traits shared by the
//! gsheet crates: the capability traits a platform implements, the
//! [`Context`] bundling them, and the HTTP response reader used by both the
//! token exchange and ordinary API calls.
//!
//! ## Capabilities
//!
//! - [`Transport`]: a line oriented TLS socket
//! - [`Clock`]: wall-clock time, a monotonic counter and time sync
//! - [`Crypto`]: SHA-256 and RSA PKCS#1 v1.5 signing
//! - [`FileRead`]: reading key files from flash or SD storage
//! - [`Env`]: environment lookups for configuration
//!
//! ## Example
//!
//! ```
//! use gsheet_core::{ManualClock, ResponseReader, ScriptedTransport, Transport};
//!
//! let mut transport = ScriptedTransport::new()
//!     .with_response("HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n{}");
//! transport.begin("sheets.googleapis.com", 443);
//! transport.connect().unwrap();
//! transport.send(b"GET / HTTP/1.1\r\n\r\n").unwrap();
//!
//! let clock = ManualClock::new(1_700_000_000);
//! let resp = ResponseReader::default().read(&mut transport, &clock).unwrap();
//! assert!(resp.is_ok());
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;
pub mod response;
pub mod time;
pub mod utils;

mod context;
pub use context::Context;
pub use context::Env;
pub use context::OsEnv;
pub use context::StaticEnv;
mod crypto;
pub use crypto::Crypto;
mod error;
pub use error::{Error, ErrorKind, Result};
mod fs;
pub use fs::{FileRead, Storage};
mod transport;
pub use transport::{ScriptedTransport, Transport};

pub use response::{HttpResponse, ResponseHandler, ResponseReader};
pub use time::{Clock, ManualClock, SystemClock};
