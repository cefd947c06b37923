use crate::error::{StudioError, StudioResult};
use crate::studio::config::StudioSyncConfig;
use crate::studio::payload::RuntimeUpsertPayload;
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const UPSERT_PATH: &str = "/api/v1/runtime/diaries";
const STAGE: &str = "upsert_runtime_diary";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReceipt {
    pub action: String,
    pub remote_id: Option<String>,
    pub status_code: u16,
}

/// The outbound side of a sync; the remote decides create versus patch.
pub trait SyncClient {
    fn base_url(&self) -> &str;
    fn upsert(&self, api_key: &str, payload: &RuntimeUpsertPayload) -> StudioResult<SyncReceipt>;
}

#[derive(Debug)]
pub struct HttpSyncClient {
    base_url: String,
    client: Client,
}

impl HttpSyncClient {
    pub fn new(cfg: &StudioSyncConfig) -> StudioResult<Self> {
        let base_url = cfg.api_base_url.trim().trim_end_matches('/').to_string();
        if base_url.starts_with("http://") && !cfg.allow_insecure_http {
            return Err(StudioError::delegate(
                "create_api_client",
                format!("refusing plain http endpoint {base_url}; set allow_insecure_http to permit it"),
            ));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(StudioError::delegate(
                "create_api_client",
                format!("api base url must be http(s): {base_url}"),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|err| StudioError::delegate("create_api_client", err))?;
        Ok(Self { base_url, client })
    }
}

impl SyncClient for HttpSyncClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn upsert(&self, api_key: &str, payload: &RuntimeUpsertPayload) -> StudioResult<SyncReceipt> {
        let url = format!("{}{UPSERT_PATH}", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("X-API-Key", api_key)
            .bearer_auth(api_key)
            .json(payload)
            .send()
            .map_err(|err| StudioError::delegate(STAGE, err))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| StudioError::delegate(STAGE, err))?;
        if !status.is_success() {
            return Err(StudioError::delegate(
                STAGE,
                format!("upload diary failed with status {}: {}", status.as_u16(), body.trim()),
            ));
        }
        Ok(parse_receipt(status.as_u16(), &body))
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn parse_receipt(status_code: u16, body: &str) -> SyncReceipt {
    let json = serde_json::from_str::<Value>(body).unwrap_or(Value::Null);
    let action = non_empty_str(json.get("action")).unwrap_or_else(|| "POST".to_string());
    let remote_id = non_empty_str(json.get("diaryId"))
        .or_else(|| non_empty_str(json.get("id")))
        .or_else(|| non_empty_str(json.get("data").and_then(|d| d.get("id"))));
    SyncReceipt {
        action,
        remote_id,
        status_code,
    }
}
