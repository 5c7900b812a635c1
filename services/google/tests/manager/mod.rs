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

use std::time::Duration;

use gsheet_core::{Clock, ErrorKind, ManualClock, ScriptedTransport, Storage, Transport};
use gsheet_file_read_std::StdFileRead;
use gsheet_google::{api, Config, TokenManager, TokenStatus, TokenStep};
use pretty_assertions::assert_eq;

use super::*;

#[test]
fn test_end_to_end_token_cycle() {
    let clock = clock();
    let transport = ScriptedTransport::new().with_response(
        "HTTP/1.1 200 OK\r\nContent-Length: 63\r\n\r\n{\"access_token\":\"abc123\",\"expires_in\":\"3599\"}",
    );
    let mut m = manager(&clock, &transport);
    let seen = record(&mut m);

    m.begin(service_account()).unwrap();
    assert_eq!(m.token_status(), "uninitialized");

    assert!(m.check_token());
    assert_eq!(m.access_token(), Some("abc123"));
    assert_eq!(m.expired_timestamp(), 1_700_003_599);
    assert_eq!(m.token_type(), "OAuth2.0 access token");
    assert_eq!(m.token_error(), "");

    let statuses: Vec<TokenStatus> = seen.lock().unwrap().iter().map(|i| i.status).collect();
    assert_eq!(
        statuses,
        vec![
            TokenStatus::Initializing,
            TokenStatus::Signing,
            TokenStatus::Requesting,
            TokenStatus::Ready
        ]
    );

    // No further I/O while the token is fresh.
    clock.advance_secs(3_000);
    for _ in 0..10 {
        assert!(m.check_token());
    }
    assert_eq!(transport.sent().len(), 1);
    assert_eq!(transport.connects(), 1);

    // Past expiry minus the pre-refresh window a new token is requested.
    transport.push_response(token_response("def456", 3599));
    clock.advance_secs(300);
    assert!(m.check_token());
    assert_eq!(m.access_token(), Some("def456"));
    assert_eq!(transport.sent().len(), 2);
    assert_eq!(m.expired_timestamp(), NOW + 3_300 + 3_599);
}

#[test]
fn test_wire_format_of_token_request() {
    let clock = clock();
    let transport = ScriptedTransport::new().with_response(token_response("t", 3600));
    let mut m = manager(&clock, &transport);
    m.begin(service_account()).unwrap();
    assert!(m.check_token());

    let text = String::from_utf8(transport.sent()[0].clone()).unwrap();
    let body = sent_body(&transport, 0);
    assert!(body.starts_with(
        r#"{"grant_type":"urn:ietf:params:oauth:grant-type:jwt-bearer","assertion":""#
    ));
    assert_eq!(
        text,
        format!(
            "POST /token HTTP/1.1\r\n\
             Host: oauth2.googleapis.com\r\n\
             User-Agent: ESP\r\n\
             Content-Length: {}\r\n\
             Content-Type: application/json\r\n\
             Connection: keep-alive\r\n\
             \r\n\
             {body}",
            body.len()
        )
    );
    assert_eq!(
        transport.endpoint(),
        ("oauth2.googleapis.com".to_string(), 443)
    );
}

#[test]
fn test_error_response_rebuilds_jwt() {
    let clock = clock();
    let transport = ScriptedTransport::new().with_response(http_response(
        "400 Bad Request",
        r#"{"error":"invalid_grant","error_description":"bad"}"#,
    ));
    let mut m = manager(&clock, &transport);
    m.begin(service_account()).unwrap();

    assert!(!m.check_token());
    assert_eq!(m.status(), TokenStatus::Error);
    assert!(m.token_error().contains("bad"));
    assert_eq!(m.token_info().error.code, 400);
    assert_eq!(m.machine().state().step, TokenStep::EncodeHeaderPayload);
    assert_eq!(m.access_token(), None);

    // The next poll signs a fresh JWT, then waits for the exchange interval.
    clock.advance_secs(1);
    assert!(!m.check_token());
    assert_eq!(m.machine().state().step, TokenStep::Exchange);
    assert!(m.machine().state().jwt.is_some());
    assert_eq!(transport.sent().len(), 1);

    transport.push_response(token_response("ok", 3600));
    clock.advance_secs(5);
    assert!(m.check_token());
    assert_eq!(transport.sent().len(), 2);
    assert_ne!(sent_body(&transport, 0), sent_body(&transport, 1));
}

#[test]
fn test_connection_refused_retries_from_begin() {
    let clock = clock();
    let transport = ScriptedTransport::new();
    transport.set_refuse_connect(true);
    let mut m = manager(&clock, &transport);
    m.begin(service_account()).unwrap();

    assert!(!m.check_token());
    assert_eq!(m.status(), TokenStatus::Error);
    assert_eq!(
        m.token_info().error.code,
        ErrorKind::ConnectionRefused.code()
    );
    assert_eq!(m.machine().state().step, TokenStep::Begin);
    assert!(!m.machine().state().task_running);

    transport.set_refuse_connect(false);
    transport.push_response(token_response("t", 3600));
    clock.advance_secs(6);
    assert!(m.check_token());
    assert_eq!(transport.connects(), 1);
}

#[test]
fn test_stalled_token_response() {
    let clock = clock();
    let transport = ScriptedTransport::new().with_keep_open();
    let mut m = manager(&clock, &transport);
    m.begin(service_account()).unwrap();

    assert!(!m.check_token());
    assert_eq!(m.token_info().error.code, ErrorKind::ReadTimeout.code());
    assert!(!transport.connected());
}

#[test]
fn test_waits_for_clock_sync() {
    let clock = ManualClock::new(1_000).with_tick(1).with_sync_target(NOW);
    clock.set_sync_blocked(true);
    let transport = ScriptedTransport::new().with_response(token_response("t", 3600));
    let mut m = manager(&clock, &transport);
    m.begin(service_account()).unwrap();

    assert!(!m.check_token());
    assert_eq!(m.status(), TokenStatus::Initializing);
    assert_eq!(clock.sync_requests(), 1);
    assert!(transport.sent().is_empty());

    clock.set_sync_blocked(false);
    clock.advance_millis(400);
    assert!(!m.check_token());
    assert_eq!(clock.sync_requests(), 2);

    clock.advance_millis(400);
    assert!(m.check_token());
    assert_eq!(m.expired_timestamp(), NOW + 3600);
}

#[test]
fn test_reuses_connection_for_api_calls() {
    let clock = clock();
    let transport = ScriptedTransport::new()
        .with_keep_open()
        .with_response(token_response("abc123", 3600))
        .with_response(http_response("200 OK", r#"{"range":"Sheet1!A1:B1","values":[["a","b"]]}"#))
        .with_response(http_response("200 OK", r#"{"range":"Sheet1!A2:B2"}"#));
    let mut m = manager(&clock, &transport);
    m.begin(service_account()).unwrap();

    let resp = m.send(api::values_get("sheet-id", "Sheet1!A1:B1")).unwrap();
    assert!(resp.is_ok());
    assert_eq!(
        resp.json.unwrap()["values"],
        serde_json::json!([["a", "b"]])
    );
    assert_eq!(transport.connects(), 2);
    assert_eq!(
        transport.endpoint(),
        ("sheets.googleapis.com".to_string(), 443)
    );

    let request = String::from_utf8(transport.sent()[1].clone()).unwrap();
    assert!(request.starts_with("GET /v4/spreadsheets/sheet-id/values/Sheet1!A1:B1 HTTP/1.1\r\n"));
    assert!(request.contains("Authorization: Bearer abc123\r\n"));

    m.send(api::values_get("sheet-id", "Sheet1!A2:B2")).unwrap();
    assert_eq!(transport.connects(), 2);
}

#[test]
fn test_send_without_token() {
    let clock = clock();
    let transport = ScriptedTransport::new();
    let mut m = manager(&clock, &transport);

    let err = m.send(api::spreadsheet_get("sheet-id")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TokenNotReady);
    assert!(transport.sent().is_empty());
}

#[test]
fn test_network_reconnect_is_rate_limited() {
    let clock = clock();
    let transport = ScriptedTransport::new().with_response(token_response("t", 3600));
    transport.set_network_down(true);
    let mut m = manager(&clock, &transport);
    m.begin(service_account()).unwrap();

    assert!(m.token_ready());
    assert_eq!(transport.reconnects(), 1);

    transport.set_network_down(true);
    assert!(!m.token_ready());
    assert_eq!(transport.reconnects(), 1);

    clock.advance_secs(11);
    assert!(m.token_ready());
    assert_eq!(transport.reconnects(), 2);
}

#[test]
fn test_refresh_and_end() {
    let clock = clock();
    let transport = ScriptedTransport::new()
        .with_response(token_response("first", 3600))
        .with_response(token_response("second", 3600));
    let mut m = manager(&clock, &transport);
    m.begin(service_account()).unwrap();
    assert!(m.check_token());

    m.refresh();
    assert!(!m.is_ready());
    clock.advance_secs(6);
    assert!(m.check_token());
    assert_eq!(m.access_token(), Some("second"));

    m.end();
    assert_eq!(m.status(), TokenStatus::Uninitialized);
    assert_eq!(m.expired_timestamp(), 0);
    assert!(!m.check_token());
}

#[test]
fn test_invalid_credential_never_requests() {
    let clock = clock();
    let transport = ScriptedTransport::new();
    let mut m = manager(&clock, &transport);
    let seen = record(&mut m);
    m.begin(gsheet_google::ServiceAccount::new("", "p", "").into())
        .unwrap();

    for _ in 0..3 {
        assert!(!m.check_token());
        clock.advance_secs(1);
    }
    assert_eq!(m.status(), TokenStatus::Error);
    assert_eq!(
        m.token_info().error.code,
        ErrorKind::CredentialInvalid.code()
    );
    assert!(transport.sent().is_empty());

    // Initializing, Error, then the throttled repeat after five seconds.
    clock.advance_secs(3);
    m.check_token();
    let statuses: Vec<TokenStatus> = seen.lock().unwrap().iter().map(|i| i.status).collect();
    assert_eq!(
        statuses,
        vec![
            TokenStatus::Initializing,
            TokenStatus::Error,
            TokenStatus::Error
        ]
    );
}

#[test]
fn test_key_file_and_ca_cert_from_storage() {
    let flash = tempfile::tempdir().unwrap();
    let sd = tempfile::tempdir().unwrap();
    std::fs::write(sd.path().join("sa.json"), SERVICE_ACCOUNT).unwrap();
    std::fs::write(flash.path().join("ca.pem"), "-----BEGIN CERTIFICATE-----\n").unwrap();

    let clock = clock();
    let transport = ScriptedTransport::new().with_response(token_response("t", 3600));
    let ctx = context(&clock).with_file_read(
        StdFileRead::new()
            .with_flash_root(flash.path())
            .with_sd_root(sd.path()),
    );
    let config = Config::default().with_ca_cert_path("/ca.pem");
    let mut m = TokenManager::new(ctx, config, transport.clone());

    m.begin(Credential::from_file("/sa.json", Storage::Sd))
        .unwrap();
    assert_eq!(
        transport.ca_cert().as_deref(),
        Some("-----BEGIN CERTIFICATE-----\n")
    );
    assert!(m.check_token());

    let mut missing = TokenManager::new(
        context(&clock),
        Config::default().with_ca_cert_path("/ca.pem"),
        ScriptedTransport::new(),
    );
    let err = missing.begin(service_account()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}

#[test]
fn test_ca_cert_from_config() {
    let clock = clock();
    let transport = ScriptedTransport::new();
    let config = Config::default().with_ca_cert("pem");
    let mut m = TokenManager::new(context(&clock), config, transport.clone());
    m.begin(service_account()).unwrap();
    assert_eq!(transport.ca_cert().as_deref(), Some("pem"));
}

#[test]
fn test_short_server_response_timeout() {
    let clock = clock();
    let transport = ScriptedTransport::new()
        .with_keep_open()
        .with_response("HTTP/1.1 200 OK\r\nContent-Length: 500\r\n\r\n{\"access_token\":\"x\"");
    let config = Config::default().with_server_response_timeout(Duration::from_secs(1));
    let mut m = TokenManager::new(context(&clock), config, transport.clone());
    m.begin(service_account()).unwrap();

    let before = clock.millis();
    assert!(!m.check_token());
    assert!(clock.millis() - before < 5_000);
    assert_eq!(
        m.token_info().error.code,
        ErrorKind::ResponseInvalid.code()
    );
}
