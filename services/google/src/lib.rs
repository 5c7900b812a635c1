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

//! Google Sheets and Drive client built around an OAuth2 token manager.
//!
//! [`TokenManager`] obtains an access token for a service account with the
//! JWT-bearer grant (or for a user with the refresh-token grant), keeps it
//! fresh and attaches it to API requests built with [`api`].
//!
//! The manager never spawns anything. Call [`TokenManager::check_token`]
//! from the main loop until it returns `true`, then send requests.
//!
//! ## Example
//!
//! ```no_run
//! use gsheet_core::{Context, ScriptedTransport};
//! use gsheet_google::{api, Config, Credential, TokenManager};
//!
//! # fn main() -> gsheet_core::Result<()> {
//! let ctx = Context::new();
//! let credential = Credential::from_slice(&std::fs::read("service_account.json")?)?;
//!
//! let mut manager = TokenManager::new(ctx, Config::default(), ScriptedTransport::new());
//! manager.begin(credential)?;
//! while !manager.check_token() {
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//!
//! let resp = manager.send(api::values_get("spreadsheet-id", "Sheet1!A1:C3"))?;
//! println!("{}", resp.payload);
//! # Ok(())
//! # }
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

mod constants;
pub use constants::DEFAULT_SCOPE;

mod config;
pub use config::Config;

mod credential;
pub use credential::{Credential, OAuth2Credentials, ServiceAccount};

mod jwt;
pub use jwt::{Claims, UnsignedJwt};

mod request;
pub use request::{Host, PendingRequest};

mod token;
pub use token::{
    Action, Tick, TokenError, TokenInfo, TokenMachine, TokenState, TokenStatus, TokenStep,
    TokenType,
};

mod manager;
pub use manager::{StatusCallback, TokenManager};

pub mod api;
