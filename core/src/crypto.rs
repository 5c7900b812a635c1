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

use std::fmt::Debug;

use crate::Result;

/// Crypto provides the two primitives needed to sign a JWT with RS256.
///
/// Implementations are picked by the platform: any backend able to hash
/// with SHA-256 and sign a digest with RSASSA-PKCS1-v1_5 will do.
pub trait Crypto: Debug + Send + Sync + 'static {
    /// SHA-256 digest of `content`.
    fn sha256(&self, content: &[u8]) -> Result<[u8; 32]>;

    /// Sign a SHA-256 `digest` with the PEM encoded RSA private key.
    fn rsa_sign_pkcs1_sha256(&self, private_key_pem: &str, digest: &[u8; 32]) -> Result<Vec<u8>>;
}
