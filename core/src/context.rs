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

use crate::time::Clock;
use crate::time::SystemClock;
use crate::Crypto;
use crate::Error;
use crate::FileRead;
use crate::Result;
use crate::Storage;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Context bundles the platform capabilities the token manager relies on.
///
/// ## Important
///
/// gsheet provides NO default crypto or file implementations. Users MUST
/// configure the components they need. Any unconfigured component uses a
/// no-op implementation that returns errors or empty values when called.
/// The clock defaults to [`SystemClock`].
///
/// ## Example
///
/// ```
/// use gsheet_core::{Context, OsEnv};
///
/// let ctx = Context::new().with_env(OsEnv);
/// ```
#[derive(Clone)]
pub struct Context {
    crypto: Arc<dyn Crypto>,
    fs: Arc<dyn FileRead>,
    clock: Arc<dyn Clock>,
    env: Arc<dyn Env>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("crypto", &self.crypto)
            .field("fs", &self.fs)
            .field("clock", &self.clock)
            .field("env", &self.env)
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create a new Context with no-op crypto, file and env implementations.
    pub fn new() -> Self {
        Self {
            crypto: Arc::new(NoopCrypto),
            fs: Arc::new(NoopFileRead),
            clock: Arc::new(SystemClock::default()),
            env: Arc::new(NoopEnv),
        }
    }

    /// Replace the crypto backend.
    pub fn with_crypto(mut self, crypto: impl Crypto) -> Self {
        self.crypto = Arc::new(crypto);
        self
    }

    /// Replace the file reader implementation.
    pub fn with_file_read(mut self, fs: impl FileRead) -> Self {
        self.fs = Arc::new(fs);
        self
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replace the environment implementation.
    pub fn with_env(mut self, env: impl Env) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// SHA-256 digest of `content`.
    #[inline]
    pub fn sha256(&self, content: &[u8]) -> Result<[u8; 32]> {
        self.crypto.sha256(content)
    }

    /// Sign a SHA-256 digest with an RSA private key in PEM.
    #[inline]
    pub fn rsa_sign_pkcs1_sha256(&self, private_key_pem: &str, digest: &[u8; 32]) -> Result<Vec<u8>> {
        self.crypto.rsa_sign_pkcs1_sha256(private_key_pem, digest)
    }

    /// Read the file content entirely in `Vec<u8>`.
    #[inline]
    pub fn file_read(&self, storage: Storage, path: &str) -> Result<Vec<u8>> {
        self.fs.file_read(storage, path)
    }

    /// Read the file content entirely in `String`.
    pub fn file_read_as_string(&self, storage: Storage, path: &str) -> Result<String> {
        let bytes = self.file_read(storage, path)?;
        Ok(String::from_utf8_lossy(&bytes).to_string())
    }

    /// The clock in use.
    #[inline]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Current unix timestamp in seconds.
    #[inline]
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Monotonic milliseconds.
    #[inline]
    pub fn millis(&self) -> u64 {
        self.clock.millis()
    }

    /// Get the environment variable.
    ///
    /// - Returns `Some(v)` if the environment variable is found and is valid utf-8.
    /// - Returns `None` if the environment variable is not found or value is invalid.
    #[inline]
    pub fn env_var(&self, key: &str) -> Option<String> {
        self.env.var(key)
    }
}

/// Permits parameterizing environment lookups.
pub trait Env: Debug + Send + Sync + 'static {
    /// Get an environment variable.
    ///
    /// - Returns `Some(v)` if the environment variable is found and is valid utf-8.
    /// - Returns `None` if the environment variable is not found or value is invalid.
    fn var(&self, key: &str) -> Option<String>;
}

/// Implements Env for the OS context.
#[derive(Debug, Copy, Clone)]
pub struct OsEnv;

impl Env for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key)?.into_string().ok()
    }
}

/// StaticEnv provides a static env environment.
///
/// This is useful for testing or for devices without a process environment.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    /// The environment variables to use.
    pub envs: HashMap<String, String>,
}

impl Env for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.envs.get(key).cloned()
    }
}

#[derive(Debug)]
struct NoopCrypto;

impl Crypto for NoopCrypto {
    fn sha256(&self, _: &[u8]) -> Result<[u8; 32]> {
        Err(Error::digest_failed("no crypto backend configured"))
    }

    fn rsa_sign_pkcs1_sha256(&self, _: &str, _: &[u8; 32]) -> Result<Vec<u8>> {
        Err(Error::sign_failed("no crypto backend configured"))
    }
}

#[derive(Debug)]
struct NoopFileRead;

impl FileRead for NoopFileRead {
    fn file_read(&self, _: Storage, _: &str) -> Result<Vec<u8>> {
        Err(Error::unexpected(
            "file reading not supported: no file reader configured",
        ))
    }
}

#[derive(Debug)]
struct NoopEnv;

impl Env for NoopEnv {
    fn var(&self, _: &str) -> Option<String> {
        None
    }
}
