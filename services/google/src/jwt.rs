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

//! JWT assertion for the service account grant.

use std::fmt::{self, Debug};

use gsheet_core::hash::base64url_encode;
use gsheet_core::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::*;

#[derive(Serialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
}

const HEADER: Header = Header {
    alg: "RS256",
    typ: "JWT",
};

/// Claims of the JWT assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer, the service account email.
    pub iss: String,
    /// Subject, the service account email.
    pub sub: String,
    /// Audience, the token endpoint.
    pub aud: String,
    /// Issued at, unix seconds.
    pub iat: i64,
    /// Expiration, unix seconds.
    pub exp: i64,
    /// Space separated scopes.
    pub scope: String,
}

impl Claims {
    /// Build the claims issued at `now`, expiring after at most an hour.
    pub fn new(client_email: &str, scope: &str, now: i64, expiry_secs: i64) -> Self {
        Self {
            iss: client_email.to_string(),
            sub: client_email.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            iat: now,
            exp: now + expiry_secs.min(MAX_TOKEN_EXPIRY_SECS),
            scope: scope.to_string(),
        }
    }
}

/// UnsignedJwt is an encoded header and payload together with the digest
/// that will be signed.
pub struct UnsignedJwt {
    signing_input: String,
    digest: [u8; 32],
}

impl UnsignedJwt {
    /// Encode `base64url(header) + "." + base64url(claims)` and hash it.
    pub fn encode(ctx: &Context, claims: &Claims) -> Result<Self> {
        let header = base64url_encode(&serde_json::to_vec(&HEADER)?);
        let payload = base64url_encode(&serde_json::to_vec(claims)?);
        let signing_input = format!("{header}.{payload}");
        let digest = ctx.sha256(signing_input.as_bytes())?;

        Ok(Self {
            signing_input,
            digest,
        })
    }

    /// The encoded header and payload.
    pub fn signing_input(&self) -> &str {
        &self.signing_input
    }

    /// SHA-256 of the signing input.
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// Sign with the PEM private key and append the signature segment.
    pub fn sign(self, ctx: &Context, private_key_pem: &str) -> Result<String> {
        let signature = ctx.rsa_sign_pkcs1_sha256(private_key_pem, &self.digest)?;
        let mut jwt = self.signing_input;
        jwt.push('.');
        jwt.push_str(&base64url_encode(&signature));
        Ok(jwt)
    }
}

impl Debug for UnsignedJwt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsignedJwt")
            .field("signing_input_len", &self.signing_input.len())
            .finish()
    }
}
