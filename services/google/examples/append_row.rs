//! Append one row to a spreadsheet with a service account key file.
//!
//! ```shell
//! GSHEET_CREDENTIAL_PATH=/path/to/service_account.json \
//! GSHEET_SPREADSHEET_ID=1BxiMVs0XRA5nFMdKvBdBZjgmUUqptlbs74OgvE2upms \
//! RUST_LOG=debug cargo run --example append_row
//! ```

use std::time::Duration;

use anyhow::{bail, Result};
use gsheet_core::{Context, OsEnv};
use gsheet_crypto_rsa::RsaCrypto;
use gsheet_file_read_std::StdFileRead;
use gsheet_google::{api, Config, Credential, TokenInfo, TokenManager};
use gsheet_transport_rustls::RustlsTransport;
use log::info;
use serde_json::json;

fn main() -> Result<()> {
    env_logger::init();

    let ctx = Context::new()
        .with_crypto(RsaCrypto)
        .with_file_read(StdFileRead::new())
        .with_env(OsEnv);
    let Some(credential) = Credential::from_env(&ctx) else {
        bail!("set GSHEET_CREDENTIAL_PATH or GSHEET_CLIENT_EMAIL and GSHEET_PRIVATE_KEY");
    };
    let spreadsheet_id = std::env::var("GSHEET_SPREADSHEET_ID")?;

    let config = Config::from_env(&ctx);
    let mut manager = TokenManager::new(ctx, config, RustlsTransport::new());
    manager.set_status_callback(|info: &TokenInfo| {
        info!(
            "token status: {} ({})",
            info.status.as_str(),
            info.error.message
        );
    });
    manager.begin(credential)?;

    while !manager.token_ready() {
        std::thread::sleep(Duration::from_millis(100));
    }

    let row = json!({ "values": [["uptime", manager.expired_timestamp()]] });
    let resp = manager.send(api::values_append(
        &spreadsheet_id,
        "Sheet1!A1",
        api::ValueInputOption::UserEntered,
        &row,
    )?)?;
    info!("append answered {}: {}", resp.status, resp.payload);

    manager.end();
    Ok(())
}
