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

use std::env;
use std::time::{Duration, Instant};

use anyhow::Result;
use gsheet_core::{Context, OsEnv};
use gsheet_crypto_rsa::RsaCrypto;
use gsheet_file_read_std::StdFileRead;
use gsheet_google::{api, Config, Credential, TokenManager};
use gsheet_transport_rustls::RustlsTransport;
use log::{debug, warn};

fn init_manager() -> Option<TokenManager<RustlsTransport>> {
    let _ = env_logger::builder().is_test(true).try_init();

    if env::var("GSHEET_TEST").ok().as_deref() != Some("on") {
        return None;
    }

    let ctx = Context::new()
        .with_crypto(RsaCrypto)
        .with_file_read(StdFileRead::new())
        .with_env(OsEnv);
    let config = Config::from_env(&ctx);
    let credential = Credential::from_env(&ctx)
        .expect("GSHEET_CREDENTIAL_PATH or GSHEET_CLIENT_EMAIL/GSHEET_PRIVATE_KEY must be set");

    let mut manager = TokenManager::new(ctx, config, RustlsTransport::new());
    manager.begin(credential).expect("begin must succeed");
    Some(manager)
}

fn wait_ready(manager: &mut TokenManager<RustlsTransport>) -> bool {
    let deadline = Instant::now() + Duration::from_secs(60);
    while Instant::now() < deadline {
        if manager.token_ready() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(200));
    }
    false
}

#[test]
fn test_live_token_and_values_get() -> Result<()> {
    let Some(mut manager) = init_manager() else {
        warn!("GSHEET_TEST is not set, skipped");
        return Ok(());
    };

    assert!(wait_ready(&mut manager), "{}", manager.token_error());
    debug!("token expires at {}", manager.expired_timestamp());

    let spreadsheet_id =
        env::var("GSHEET_SPREADSHEET_ID").expect("env GSHEET_SPREADSHEET_ID must be set");
    let resp = manager.send(api::values_get(&spreadsheet_id, "A1:B2"))?;
    debug!("got response: {}", resp.payload);
    assert!(resp.is_ok(), "{}", resp.payload);

    manager.end();
    Ok(())
}
