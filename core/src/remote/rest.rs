//! PostgREST implementation of the remote state store
//!
//! Tables: `devices (device_id, site_id, unit_name, is_active, kiosk_mode, last_seen)`
//! and `device_commands (id, device_id, command, executed, executed_at, created_at)`.

use super::{DeviceState, RemoteCommand, RemoteStateClient};
use crate::config::OrchestratorConfig;
use crate::error::{KioskError, Result};
use crate::util::{sanitize_base_url, validate_api_key};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client as HttpClient, RequestBuilder, Response,
};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=minimal";
const PREFER_MINIMAL: &str = "return=minimal";

pub struct RestStateClient {
    http_client: HttpClient,
    base_url: String,
    device_id: String,
    site_id: String,
    timeout: Duration,
}

impl RestStateClient {
    pub fn new(config: &OrchestratorConfig, timeout: Duration) -> Result<Self> {
        let base_url = sanitize_base_url(&config.base_url, "remote.base_url")?;
        let api_key = validate_api_key(&config.api_key)?;

        let mut headers = HeaderMap::new();
        let key_value = |v: String| {
            HeaderValue::from_str(&v).map_err(|e| KioskError::InvalidConfig {
                message: format!("API key is not a valid header value: {}", e),
            })
        };
        headers.insert("apikey", key_value(api_key.clone())?);
        headers.insert(AUTHORIZATION, key_value(format!("Bearer {}", api_key))?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = HttpClient::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("kioskd/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| KioskError::InvalidConfig {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            base_url,
            device_id: config.device_id.clone(),
            site_id: config.site_id.clone(),
            timeout,
        })
    }

    fn devices_url(&self) -> String {
        format!("{}/rest/v1/devices", self.base_url)
    }

    fn device_filter_url(&self) -> String {
        format!(
            "{}?device_id=eq.{}",
            self.devices_url(),
            urlencoding::encode(&self.device_id)
        )
    }

    fn state_url(&self) -> String {
        format!(
            "{}&select=is_active,kiosk_mode&limit=1",
            self.device_filter_url()
        )
    }

    fn pending_commands_url(&self, limit: usize) -> String {
        format!(
            "{}/rest/v1/device_commands?device_id=eq.{}&executed=is.false\
             &select=id,command,created_at&order=created_at.asc&limit={}",
            self.base_url,
            urlencoding::encode(&self.device_id),
            limit
        )
    }

    fn command_url(&self, command_id: &str) -> String {
        format!(
            "{}/rest/v1/device_commands?id=eq.{}",
            self.base_url,
            urlencoding::encode(command_id)
        )
    }

    fn registration_payload(&self, with_site_id: bool) -> serde_json::Value {
        let mut payload = json!({
            "device_id": self.device_id,
            "unit_name": self.site_id,
            "last_seen": Utc::now().to_rfc3339(),
        });
        if with_site_id {
            payload["site_id"] = json!(self.site_id);
        }
        payload
    }

    /// Send and turn timeouts and non-2xx statuses into errors
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                KioskError::Timeout {
                    duration: self.timeout,
                }
            } else {
                KioskError::from(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KioskError::RemoteStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn upsert_device(&self, with_site_id: bool) -> Result<()> {
        let request = self
            .http_client
            .post(self.devices_url())
            .header("Prefer", PREFER_UPSERT)
            .json(&self.registration_payload(with_site_id));
        self.send(request).await.map(|_| ())
    }
}

#[async_trait]
impl RemoteStateClient for RestStateClient {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn register_device(&self) -> Result<()> {
        match self.upsert_device(true).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Older schemas have no site_id column
                debug!(error = %e, "Registration with site_id failed, retrying without it");
                self.upsert_device(false).await
            }
        }
    }

    async fn fetch_state(&self) -> Result<Option<DeviceState>> {
        let response = self.send(self.http_client.get(self.state_url())).await?;
        let body = response.text().await.map_err(KioskError::from)?;
        parse_device_rows(&body)
    }

    async fn set_device_state(&self, state: DeviceState) -> Result<()> {
        let request = self
            .http_client
            .patch(self.device_filter_url())
            .header("Prefer", PREFER_MINIMAL)
            .json(&state);
        self.send(request).await.map(|_| ())
    }

    async fn touch_last_seen(&self) -> Result<()> {
        let request = self
            .http_client
            .patch(self.device_filter_url())
            .header("Prefer", PREFER_MINIMAL)
            .json(&json!({ "last_seen": Utc::now().to_rfc3339() }));
        self.send(request).await.map(|_| ())
    }

    async fn fetch_pending_commands(&self, limit: usize) -> Result<Vec<RemoteCommand>> {
        let response = self
            .send(self.http_client.get(self.pending_commands_url(limit)))
            .await?;
        let body = response.text().await.map_err(KioskError::from)?;
        parse_command_rows(&body)
    }

    async fn acknowledge_command(&self, command_id: &str) -> Result<()> {
        let request = self
            .http_client
            .patch(self.command_url(command_id))
            .header("Prefer", PREFER_MINIMAL)
            .json(&json!({
                "executed": true,
                "executed_at": Utc::now().to_rfc3339(),
            }));
        self.send(request)
            .await
            .map(|_| ())
            .map_err(|e| KioskError::AckFailed {
                command_id: command_id.to_string(),
                reason: e.to_string(),
            })
    }
}

/// First row of a `devices` select, or `None` for an empty result
pub(crate) fn parse_device_rows(body: &str) -> Result<Option<DeviceState>> {
    let rows: Vec<DeviceState> =
        serde_json::from_str(body).map_err(|e| KioskError::MalformedPayload {
            message: format!("devices: {}", e),
        })?;
    Ok(rows.into_iter().next())
}

pub(crate) fn parse_command_rows(body: &str) -> Result<Vec<RemoteCommand>> {
    serde_json::from_str(body).map_err(|e| KioskError::MalformedPayload {
        message: format!("device_commands: {}", e),
    })
}
