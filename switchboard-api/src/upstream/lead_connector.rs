use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::{header, RequestBuilder};

use switchboard_core::BearerToken;

use super::{
    AppointmentRequest, ContactDraft, ContactQuery, CrmApi, CrmError, McpReply, NoteRequest,
    UpstreamReply,
};
use crate::config::RelayConfig;
use crate::telemetry::metrics;

const EVENT_STREAM: &str = "text/event-stream";
const MCP_ACCEPT: &str = "application/json, text/event-stream";

/// reqwest-backed client for the LeadConnector CRM API.
#[derive(Debug, Clone)]
pub struct LeadConnectorClient {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
    timeout: Duration,
}

impl LeadConnectorClient {
    pub fn new(
        base_url: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CrmError> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(CrmError::from)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_version: api_version.into(),
            timeout,
        })
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self, CrmError> {
        Self::new(
            config.crm_base_url.clone(),
            config.crm_api_version.clone(),
            config.crm_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str, token: &BearerToken) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(token.expose())
            .header("Version", &self.api_version)
    }

    /// Send, buffer and parse a JSON call.
    async fn send_json(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<UpstreamReply, CrmError> {
        let started = Instant::now();
        let result = send_and_read(builder.timeout(self.timeout)).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(reply) => {
                let outcome = if reply.is_success() { "success" } else { "error" };
                if let Some(metrics) = metrics() {
                    metrics.record_upstream_call(operation, outcome, elapsed);
                }
                tracing::debug!(operation, status = reply.status, "Upstream call completed");
            }
            Err(err) => {
                if let Some(metrics) = metrics() {
                    metrics.record_upstream_call(operation, "transport", elapsed);
                }
                tracing::warn!(operation, error = %err, "Upstream call failed");
            }
        }
        result
    }
}

async fn send_and_read(builder: RequestBuilder) -> Result<UpstreamReply, CrmError> {
    let response = builder.send().await?;
    read_reply(response).await
}

async fn read_reply(response: reqwest::Response) -> Result<UpstreamReply, CrmError> {
    let status = response.status().as_u16();
    let text = response.text().await?;
    Ok(UpstreamReply::new(status, UpstreamReply::parse_body(&text)))
}

#[async_trait]
impl CrmApi for LeadConnectorClient {
    async fn search_contacts(
        &self,
        token: &BearerToken,
        query: &ContactQuery,
    ) -> Result<UpstreamReply, CrmError> {
        let mut params = vec![("locationId", query.location_id.as_str())];
        if let Some(phone) = query.phone.as_deref() {
            params.push(("phone", phone));
        } else if let Some(email) = query.email.as_deref() {
            params.push(("email", email));
        }

        let builder = self
            .request(reqwest::Method::GET, "/contacts/", token)
            .header(header::ACCEPT, "application/json")
            .query(&params);
        self.send_json("contact_search", builder).await
    }

    async fn create_contact(
        &self,
        token: &BearerToken,
        draft: &ContactDraft,
    ) -> Result<UpstreamReply, CrmError> {
        let builder = self
            .request(reqwest::Method::POST, "/contacts/", token)
            .header("LocationId", &draft.location_id)
            .json(draft);
        self.send_json("contact_create", builder).await
    }

    async fn free_slots(
        &self,
        token: &BearerToken,
        calendar_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<UpstreamReply, CrmError> {
        let path = format!("/calendars/{}/free-slots", calendar_id);
        let builder = self
            .request(reqwest::Method::GET, &path, token)
            .header(header::ACCEPT, "application/json")
            .query(&[("startDate", start_ms), ("endDate", end_ms)]);
        self.send_json("free_slots", builder).await
    }

    async fn create_appointment(
        &self,
        token: &BearerToken,
        request: &AppointmentRequest,
    ) -> Result<UpstreamReply, CrmError> {
        let builder = self
            .request(reqwest::Method::POST, "/calendars/events/appointments", token)
            .json(request);
        self.send_json("appointment_create", builder).await
    }

    async fn create_note(
        &self,
        token: &BearerToken,
        contact_id: &str,
        note: &NoteRequest,
    ) -> Result<UpstreamReply, CrmError> {
        let path = format!("/contacts/{}/notes", contact_id);
        let builder = self.request(reqwest::Method::POST, &path, token).json(note);
        self.send_json("note_create", builder).await
    }

    async fn mcp(
        &self,
        token: &BearerToken,
        location_id: &str,
        body: Bytes,
    ) -> Result<McpReply, CrmError> {
        let started = Instant::now();
        // No request-wide timeout: event streams stay open as long as the upstream
        // wants. Waiting for headers and buffering a JSON body are bounded instead.
        let send = self
            .request(reqwest::Method::POST, "/mcp/", token)
            .header("locationId", location_id)
            .header(header::ACCEPT, MCP_ACCEPT)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send();
        let response = match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result.map_err(CrmError::from),
            Err(_) => Err(CrmError::Timeout),
        };

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                if let Some(metrics) = metrics() {
                    metrics.record_upstream_call("mcp", "transport", started.elapsed().as_secs_f64());
                }
                return Err(err);
            }
        };

        let status = response.status().as_u16();
        let outcome = if response.status().is_success() { "success" } else { "error" };
        if let Some(metrics) = metrics() {
            metrics.record_upstream_call("mcp", outcome, started.elapsed().as_secs_f64());
        }

        let is_stream = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains(EVENT_STREAM));

        if is_stream {
            tracing::debug!(status, "Relaying upstream event stream");
            let body = response
                .bytes_stream()
                .map_err(|e| CrmError::Stream(e.to_string()))
                .boxed();
            Ok(McpReply::Stream { status, body })
        } else {
            tokio::time::timeout(self.timeout, read_reply(response))
                .await
                .map_err(|_| CrmError::Timeout)?
                .map(McpReply::Json)
        }
    }
}
