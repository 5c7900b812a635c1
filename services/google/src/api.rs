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

//! Request builders for the Sheets and Drive endpoints.
//!
//! Every function returns a [`PendingRequest`] ready for
//! [`crate::TokenManager::send`].

use http::Method;
use percent_encoding::utf8_percent_encode;
use serde_json::Value;

use gsheet_core::Result;

use crate::constants::{PATH_SEGMENT_ENCODE_SET, QUERY_ENCODE_SET};
use crate::request::{Host, PendingRequest};

/// How input values are interpreted by Sheets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueInputOption {
    /// Values are stored as is.
    Raw,
    /// Values are parsed as if typed into the UI.
    #[default]
    UserEntered,
}

impl ValueInputOption {
    fn as_str(&self) -> &'static str {
        match self {
            ValueInputOption::Raw => "RAW",
            ValueInputOption::UserEntered => "USER_ENTERED",
        }
    }
}

fn segment(value: &str) -> String {
    utf8_percent_encode(value, &PATH_SEGMENT_ENCODE_SET).to_string()
}

fn query(value: &str) -> String {
    utf8_percent_encode(value, &QUERY_ENCODE_SET).to_string()
}

fn values_path(spreadsheet_id: &str, range: &str) -> String {
    format!(
        "/v4/spreadsheets/{}/values/{}",
        segment(spreadsheet_id),
        segment(range)
    )
}

/// `GET /v4/spreadsheets/{id}/values/{range}`
pub fn values_get(spreadsheet_id: &str, range: &str) -> PendingRequest {
    PendingRequest::new(Host::Sheets, Method::GET, values_path(spreadsheet_id, range))
}

/// `PUT /v4/spreadsheets/{id}/values/{range}`
pub fn values_update(
    spreadsheet_id: &str,
    range: &str,
    option: ValueInputOption,
    body: &Value,
) -> Result<PendingRequest> {
    let path = format!(
        "{}?valueInputOption={}",
        values_path(spreadsheet_id, range),
        option.as_str()
    );
    PendingRequest::new(Host::Sheets, Method::PUT, path).with_json(body)
}

/// `POST /v4/spreadsheets/{id}/values/{range}:append`
pub fn values_append(
    spreadsheet_id: &str,
    range: &str,
    option: ValueInputOption,
    body: &Value,
) -> Result<PendingRequest> {
    let path = format!(
        "{}:append?valueInputOption={}",
        values_path(spreadsheet_id, range),
        option.as_str()
    );
    PendingRequest::new(Host::Sheets, Method::POST, path).with_json(body)
}

/// `POST /v4/spreadsheets/{id}/values/{range}:clear`
pub fn values_clear(spreadsheet_id: &str, range: &str) -> Result<PendingRequest> {
    let path = format!("{}:clear", values_path(spreadsheet_id, range));
    PendingRequest::new(Host::Sheets, Method::POST, path).with_json(&serde_json::json!({}))
}

/// `GET /v4/spreadsheets/{id}/values:batchGet`
pub fn values_batch_get(spreadsheet_id: &str, ranges: &[&str]) -> PendingRequest {
    let ranges = ranges
        .iter()
        .map(|r| format!("ranges={}", query(r)))
        .collect::<Vec<_>>()
        .join("&");
    let path = format!(
        "/v4/spreadsheets/{}/values:batchGet?{ranges}",
        segment(spreadsheet_id)
    );
    PendingRequest::new(Host::Sheets, Method::GET, path)
}

/// `POST /v4/spreadsheets/{id}/values:batchUpdate`
pub fn values_batch_update(spreadsheet_id: &str, body: &Value) -> Result<PendingRequest> {
    let path = format!(
        "/v4/spreadsheets/{}/values:batchUpdate",
        segment(spreadsheet_id)
    );
    PendingRequest::new(Host::Sheets, Method::POST, path).with_json(body)
}

/// `POST /v4/spreadsheets/{id}/values:batchClear`
pub fn values_batch_clear(spreadsheet_id: &str, ranges: &[&str]) -> Result<PendingRequest> {
    let path = format!(
        "/v4/spreadsheets/{}/values:batchClear",
        segment(spreadsheet_id)
    );
    PendingRequest::new(Host::Sheets, Method::POST, path)
        .with_json(&serde_json::json!({ "ranges": ranges }))
}

/// `GET /v4/spreadsheets/{id}`
pub fn spreadsheet_get(spreadsheet_id: &str) -> PendingRequest {
    let path = format!("/v4/spreadsheets/{}", segment(spreadsheet_id));
    PendingRequest::new(Host::Sheets, Method::GET, path)
}

/// `POST /v4/spreadsheets`
pub fn spreadsheet_create(body: &Value) -> Result<PendingRequest> {
    PendingRequest::new(Host::Sheets, Method::POST, "/v4/spreadsheets").with_json(body)
}

/// `POST /v4/spreadsheets/{id}:batchUpdate`
pub fn spreadsheet_batch_update(spreadsheet_id: &str, body: &Value) -> Result<PendingRequest> {
    let path = format!("/v4/spreadsheets/{}:batchUpdate", segment(spreadsheet_id));
    PendingRequest::new(Host::Sheets, Method::POST, path).with_json(body)
}

/// `GET /drive/v3/files`, optionally filtered by a Drive query.
pub fn drive_list_files(q: Option<&str>) -> PendingRequest {
    let path = match q {
        Some(q) => format!("/drive/v3/files?q={}", query(q)),
        None => "/drive/v3/files".to_string(),
    };
    PendingRequest::new(Host::Drive, Method::GET, path)
}

/// `DELETE /drive/v3/files/{id}`
pub fn drive_delete_file(file_id: &str) -> PendingRequest {
    let path = format!("/drive/v3/files/{}", segment(file_id));
    PendingRequest::new(Host::Drive, Method::DELETE, path)
}

/// `POST /drive/v3/files/{id}/permissions`
pub fn drive_create_permission(file_id: &str, body: &Value) -> Result<PendingRequest> {
    let path = format!("/drive/v3/files/{}/permissions", segment(file_id));
    PendingRequest::new(Host::Drive, Method::POST, path).with_json(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(values_get("abc", "Sheet1!A1:C3"), Method::GET, "/v4/spreadsheets/abc/values/Sheet1!A1:C3"; "get")]
    #[test_case(values_get("abc", "My Sheet!A1"), Method::GET, "/v4/spreadsheets/abc/values/My%20Sheet!A1"; "get with space")]
    #[test_case(values_batch_get("abc", &["A1:B2", "Sheet 2!C1"]), Method::GET, "/v4/spreadsheets/abc/values:batchGet?ranges=A1%3AB2&ranges=Sheet%202%21C1"; "batch get")]
    #[test_case(spreadsheet_get("abc"), Method::GET, "/v4/spreadsheets/abc"; "spreadsheet get")]
    #[test_case(drive_list_files(None), Method::GET, "/drive/v3/files"; "list files")]
    #[test_case(drive_list_files(Some("name='log'")), Method::GET, "/drive/v3/files?q=name%3D%27log%27"; "list files with query")]
    #[test_case(drive_delete_file("f1"), Method::DELETE, "/drive/v3/files/f1"; "delete file")]
    fn test_request_line(req: PendingRequest, method: Method, path: &str) {
        assert_eq!(req.method, method);
        assert_eq!(req.path, path);
        assert!(req.body.is_none());
    }

    #[test]
    fn test_values_append() {
        let body = json!({"values": [["a", 1]]});
        let req = values_append("abc", "Sheet1!A1", ValueInputOption::Raw, &body).unwrap();
        assert_eq!(req.host, Host::Sheets);
        assert_eq!(req.method, Method::POST);
        assert_eq!(
            req.path,
            "/v4/spreadsheets/abc/values/Sheet1!A1:append?valueInputOption=RAW"
        );
        assert_eq!(req.body.as_deref(), Some(br#"{"values":[["a",1]]}"#.as_slice()));
    }

    #[test]
    fn test_values_update_and_clear() {
        let req = values_update("abc", "A1", ValueInputOption::default(), &json!({})).unwrap();
        assert_eq!(req.method, Method::PUT);
        assert_eq!(
            req.path,
            "/v4/spreadsheets/abc/values/A1?valueInputOption=USER_ENTERED"
        );

        let req = values_clear("abc", "A1:Z").unwrap();
        assert_eq!(req.path, "/v4/spreadsheets/abc/values/A1:Z:clear");
        assert_eq!(req.body.as_deref(), Some(b"{}".as_slice()));
    }

    #[test]
    fn test_batch_and_drive_bodies() {
        let req = values_batch_clear("abc", &["A1", "B2"]).unwrap();
        assert_eq!(req.path, "/v4/spreadsheets/abc/values:batchClear");
        assert_eq!(req.body.as_deref(), Some(br#"{"ranges":["A1","B2"]}"#.as_slice()));

        let req = values_batch_update("abc", &json!({"data": []})).unwrap();
        assert_eq!(req.path, "/v4/spreadsheets/abc/values:batchUpdate");

        let req = spreadsheet_create(&json!({"properties": {"title": "log"}})).unwrap();
        assert_eq!(req.path, "/v4/spreadsheets");

        let req = spreadsheet_batch_update("abc", &json!({"requests": []})).unwrap();
        assert_eq!(req.path, "/v4/spreadsheets/abc:batchUpdate");

        let body = json!({"role": "writer", "type": "user", "emailAddress": "me@example.com"});
        let req = drive_create_permission("f1", &body).unwrap();
        assert_eq!(req.host, Host::Drive);
        assert_eq!(req.path, "/drive/v3/files/f1/permissions");
    }
}
