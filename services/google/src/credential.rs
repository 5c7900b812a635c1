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

use std::borrow::Cow;
use std::fmt::{self, Debug};

use gsheet_core::utils::Redact;
use gsheet_core::{Context, Error, Result, Storage};
use serde::Deserialize;

use crate::constants::*;

/// ServiceAccount holds the fields of a service account key file that the
/// token manager needs.
#[derive(Clone, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct ServiceAccount {
    /// Email of the service account, used as JWT issuer and subject.
    pub client_email: String,
    /// Project the service account belongs to.
    #[serde(default)]
    pub project_id: String,
    /// PEM encoded RSA private key, PKCS#1 or PKCS#8.
    pub private_key: String,
    /// Id of the private key.
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// Numeric client id.
    #[serde(default)]
    pub client_id: Option<String>,
}

impl ServiceAccount {
    /// Create a service account from its email, project id and private key.
    pub fn new(
        client_email: impl Into<String>,
        project_id: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            client_email: client_email.into(),
            project_id: project_id.into(),
            private_key: private_key.into(),
            ..Default::default()
        }
    }

    /// Set the client id.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.client_email.trim().is_empty() {
            return Err(Error::credential_invalid(
                "service account client_email is missing",
            ));
        }
        if !self.private_key.contains("PRIVATE KEY") {
            return Err(Error::credential_invalid(
                "service account private_key is missing or not a PEM key",
            ));
        }
        Ok(())
    }
}

impl Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("project_id", &self.project_id)
            .field("private_key", &Redact::from(&self.private_key))
            .field("private_key_id", &self.private_key_id)
            .finish()
    }
}

/// OAuth2 user credentials used by the refresh-token grant.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OAuth2Credentials {
    /// The client ID.
    pub client_id: String,
    /// The client secret.
    pub client_secret: String,
    /// The refresh token.
    pub refresh_token: String,
}

impl OAuth2Credentials {
    /// Create refresh-token credentials.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() || self.client_secret.is_empty() || self.refresh_token.is_empty()
        {
            return Err(Error::credential_invalid(
                "client_id, client_secret and refresh_token are all required",
            ));
        }
        Ok(())
    }
}

impl Debug for OAuth2Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &Redact::from(&self.client_secret))
            .field("refresh_token", &Redact::from(&self.refresh_token))
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialFile {
    ServiceAccount(ServiceAccount),
    AuthorizedUser(OAuth2Credentials),
}

/// Credential is what the token manager authenticates with.
#[derive(Clone, Debug)]
pub enum Credential {
    /// A service account held in memory.
    ServiceAccount(ServiceAccount),
    /// A service account key file, read again every time a JWT is signed.
    ServiceAccountFile {
        /// Path of the JSON key file.
        path: String,
        /// Storage the file lives on.
        storage: Storage,
    },
    /// The refresh-token grant.
    RefreshToken(OAuth2Credentials),
}

impl Credential {
    /// Parse a JSON key file.
    ///
    /// Both `service_account` and `authorized_user` files are understood.
    pub fn from_slice(content: &[u8]) -> Result<Self> {
        let file: CredentialFile = serde_json::from_slice(content).map_err(|e| {
            Error::credential_invalid("failed to parse credential file").with_source(e)
        })?;

        Ok(match file {
            CredentialFile::ServiceAccount(sa) => Credential::ServiceAccount(sa),
            CredentialFile::AuthorizedUser(c) => Credential::RefreshToken(c),
        })
    }

    /// Reference a service account key file on the given storage.
    pub fn from_file(path: impl Into<String>, storage: Storage) -> Self {
        Credential::ServiceAccountFile {
            path: path.into(),
            storage,
        }
    }

    /// Load a credential from environment variables.
    ///
    /// `GSHEET_CREDENTIAL_PATH` wins over the inline
    /// `GSHEET_CLIENT_EMAIL`/`GSHEET_PROJECT_ID`/`GSHEET_PRIVATE_KEY` triple.
    pub fn from_env(ctx: &Context) -> Option<Self> {
        if let Some(path) = ctx.env_var(GSHEET_CREDENTIAL_PATH) {
            return Some(Credential::from_file(path, Storage::Flash));
        }

        let client_email = ctx.env_var(GSHEET_CLIENT_EMAIL)?;
        let private_key = ctx.env_var(GSHEET_PRIVATE_KEY)?;
        let project_id = ctx.env_var(GSHEET_PROJECT_ID).unwrap_or_default();
        Some(Credential::ServiceAccount(ServiceAccount::new(
            client_email,
            project_id,
            private_key,
        )))
    }

    /// Whether this credential uses the refresh-token grant.
    pub fn is_refresh_token(&self) -> bool {
        matches!(self, Credential::RefreshToken(_))
    }

    /// Resolve the service account, reading the key file if needed.
    ///
    /// Returns `None` for the refresh-token grant. An inline account is
    /// borrowed, a key file yields an owned account.
    pub(crate) fn load_service_account(
        &self,
        ctx: &Context,
    ) -> Result<Option<Cow<'_, ServiceAccount>>> {
        match self {
            Credential::ServiceAccount(sa) => {
                sa.validate()?;
                Ok(Some(Cow::Borrowed(sa)))
            }
            Credential::ServiceAccountFile { path, storage } => {
                let content = ctx.file_read(*storage, path).map_err(|e| {
                    Error::credential_invalid(format!("failed to read key file {path}"))
                        .with_source(e)
                })?;
                match Credential::from_slice(&content)? {
                    Credential::ServiceAccount(sa) => {
                        sa.validate()?;
                        Ok(Some(Cow::Owned(sa)))
                    }
                    _ => Err(Error::credential_invalid(format!(
                        "{path} is not a service account key file"
                    ))),
                }
            }
            Credential::RefreshToken(c) => {
                c.validate()?;
                Ok(None)
            }
        }
    }
}

impl From<ServiceAccount> for Credential {
    fn from(sa: ServiceAccount) -> Self {
        Credential::ServiceAccount(sa)
    }
}

impl From<OAuth2Credentials> for Credential {
    fn from(c: OAuth2Credentials) -> Self {
        Credential::RefreshToken(c)
    }
}
