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

use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;

// Env values used to configure the token manager.
pub const GSHEET_CLIENT_EMAIL: &str = "GSHEET_CLIENT_EMAIL";
pub const GSHEET_PROJECT_ID: &str = "GSHEET_PROJECT_ID";
pub const GSHEET_PRIVATE_KEY: &str = "GSHEET_PRIVATE_KEY";
pub const GSHEET_CREDENTIAL_PATH: &str = "GSHEET_CREDENTIAL_PATH";
pub const GSHEET_PRE_REFRESH_SECONDS: &str = "GSHEET_PRE_REFRESH_SECONDS";
pub const GSHEET_TOKEN_EXPIRY_SECONDS: &str = "GSHEET_TOKEN_EXPIRY_SECONDS";
pub const GSHEET_SERVER_RESPONSE_TIMEOUT_MS: &str = "GSHEET_SERVER_RESPONSE_TIMEOUT_MS";
pub const GSHEET_GMT_OFFSET_HOURS: &str = "GSHEET_GMT_OFFSET_HOURS";
pub const GSHEET_CA_CERT_PATH: &str = "GSHEET_CA_CERT_PATH";

// Hosts.
pub const TOKEN_HOST: &str = "oauth2.googleapis.com";
pub const SHEETS_HOST: &str = "sheets.googleapis.com";
pub const DRIVE_HOST: &str = "www.googleapis.com";
pub const HTTPS_PORT: u16 = 443;

pub const TOKEN_PATH: &str = "/token";
pub const TOKEN_AUDIENCE: &str = "https://oauth2.googleapis.com/token";
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
pub const REFRESH_TOKEN_GRANT: &str = "refresh_token";
pub const USER_AGENT: &str = "ESP";

/// Scopes requested for the service account token.
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/drive.file https://www.googleapis.com/auth/drive.metadata https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";

/// Upper bound on the lifetime asked for in the JWT `exp` claim.
pub const MAX_TOKEN_EXPIRY_SECS: i64 = 3600;

/// Used instead of a pre-refresh window that is larger than the token
/// expiry itself.
pub const FALLBACK_PRE_REFRESH_SECS: i64 = 60;

/// Safety margin subtracted when an expiry is re-anchored after a clock
/// synchronization.
pub const CLOCK_ADJUST_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// AsciiSet for A1 ranges and ids used as a path segment.
///
/// - Keep the unreserved characters plus `!` and `:` which Sheets expects
///   verbatim in ranges like `Sheet1!A1:C3`.
pub static PATH_SEGMENT_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b':');

/// AsciiSet for query values.
pub static QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');
