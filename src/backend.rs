use std::time::Duration;

use serde::Serialize;
use serde_json::json;

use crate::config::BackendConfig;
use crate::lead::{Lead, LeadStatus};

/// Longest status reason the backend accepts.
const MAX_STATUS_REASON: usize = 500;

/// REST client for the lead management backend.
///
/// Every write is a single request; retries belong to the caller, which logs
/// and continues so a failing backend never stalls a live call.
pub struct LeadClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

/// Entry appended to a lead's communication history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Communication {
    pub channel: String,
    pub direction: String,
    pub call_duration: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<f64>,
}

/// A follow-up placed on the lead's schedule.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FollowUp {
    #[serde(rename_all = "camelCase")]
    Callback {
        action_type: &'static str,
        scheduled_for: String,
        reason: String,
        timezone: String,
    },
    #[serde(rename_all = "camelCase")]
    Demo {
        #[serde(rename = "type")]
        kind: &'static str,
        scheduled_for: String,
        attendee_email: String,
        attendee_name: String,
        business_name: String,
    },
}

impl FollowUp {
    pub fn callback(scheduled_for: String, reason: String, timezone: String) -> Self {
        FollowUp::Callback {
            action_type: "call",
            scheduled_for,
            reason,
            timezone,
        }
    }

    pub fn demo(
        scheduled_for: String,
        attendee_email: String,
        attendee_name: String,
        business_name: String,
    ) -> Self {
        FollowUp::Demo {
            kind: "demo",
            scheduled_for,
            attendee_email,
            attendee_name,
            business_name,
        }
    }
}

impl LeadClient {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn lead_url(&self, lead_id: &str, suffix: &str) -> String {
        format!("{}/api/admin/leads/{lead_id}{suffix}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.request(method, url).timeout(self.timeout);
        if self.api_key.is_empty() {
            req
        } else {
            req.bearer_auth(&self.api_key)
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Api(format!("{status}: {body}")));
        }

        Ok(resp)
    }

    pub async fn fetch_lead(&self, lead_id: &str) -> Result<Lead, BackendError> {
        let url = self.lead_url(lead_id, "");
        let resp = self.send(self.request(reqwest::Method::GET, &url)).await?;

        let lead: Lead = resp
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        tracing::info!(lead_id, "Loaded lead");
        Ok(lead)
    }

    pub async fn update_status(
        &self,
        lead_id: &str,
        status: LeadStatus,
        reason: Option<&str>,
    ) -> Result<(), BackendError> {
        let url = self.lead_url(lead_id, "");
        let body = json!({
            "status": status,
            "statusReason": reason.map(truncate_reason),
        });
        self.send(self.request(reqwest::Method::PATCH, &url).json(&body))
            .await?;

        tracing::info!(lead_id, status = %status, "Lead status updated");
        Ok(())
    }

    pub async fn log_communication(
        &self,
        lead_id: &str,
        entry: &Communication,
    ) -> Result<(), BackendError> {
        let url = self.lead_url(lead_id, "/communications");
        self.send(self.request(reqwest::Method::POST, &url).json(entry))
            .await?;

        tracing::info!(lead_id, channel = %entry.channel, "Communication logged");
        Ok(())
    }

    pub async fn schedule_follow_up(
        &self,
        lead_id: &str,
        follow_up: &FollowUp,
    ) -> Result<(), BackendError> {
        let url = self.lead_url(lead_id, "/schedule");
        self.send(self.request(reqwest::Method::POST, &url).json(follow_up))
            .await?;

        tracing::info!(lead_id, "Follow-up scheduled");
        Ok(())
    }

    pub async fn send_sms(&self, lead_id: &str, message: &str) -> Result<(), BackendError> {
        let url = self.lead_url(lead_id, "/sms");
        let body = json!({ "message": message, "channel": "sms" });
        self.send(self.request(reqwest::Method::POST, &url).json(&body))
            .await?;

        tracing::info!(lead_id, message_len = message.len(), "SMS sent");
        Ok(())
    }

    pub async fn escalate(
        &self,
        lead_id: &str,
        reason: &str,
        urgency: &str,
    ) -> Result<(), BackendError> {
        let url = self.lead_url(lead_id, "/escalate");
        let body = json!({
            "escalationType": "specialist_required",
            "reason": reason,
            "urgency": urgency,
        });
        self.send(self.request(reqwest::Method::POST, &url).json(&body))
            .await?;

        tracing::info!(lead_id, urgency, "Escalation created");
        Ok(())
    }
}

fn truncate_reason(reason: &str) -> String {
    reason.chars().take(MAX_STATUS_REASON).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Backend request failed: {0}")]
    Request(String),
    #[error("Backend returned error: {0}")]
    Api(String),
    #[error("Failed to parse backend response: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::{GET, PATCH, POST};
    use httpmock::MockServer;

    fn client_for(server: &MockServer, api_key: &str) -> LeadClient {
        LeadClient::new(&BackendConfig {
            base_url: format!("{}/", server.base_url()),
            api_key: api_key.to_string(),
            timeout_secs: 2,
        })
    }

    #[tokio::test]
    async fn fetch_lead_sends_bearer_and_parses() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/admin/leads/lead_42")
                    .header("authorization", "Bearer secret");
                then.status(200).json_body(serde_json::json!({
                    "id": "lead_42",
                    "firstName": "Dana",
                    "businessType": "climbing",
                    "interestLevel": "warm",
                    "state": "CA"
                }));
            })
            .await;

        let lead = client_for(&server, "secret")
            .fetch_lead("lead_42")
            .await
            .unwrap();

        assert_eq!(lead.first_name.as_deref(), Some("Dana"));
        assert_eq!(lead.state.as_deref(), Some("CA"));
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn non_success_is_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/admin/leads/missing");
                then.status(404).body("not found");
            })
            .await;

        let err = client_for(&server, "")
            .fetch_lead("missing")
            .await
            .unwrap_err();
        match err {
            BackendError::Api(msg) => assert!(msg.contains("404"), "{msg}"),
            other => panic!("expected api error, got {other}"),
        }
    }

    #[tokio::test]
    async fn update_status_truncates_reason() {
        let server = MockServer::start_async().await;
        let long_reason = "x".repeat(800);
        let expected = "x".repeat(MAX_STATUS_REASON);
        let mock = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/api/admin/leads/lead_1")
                    .json_body(serde_json::json!({
                        "status": "lost",
                        "statusReason": expected,
                    }));
                then.status(200).json_body(serde_json::json!({"ok": true}));
            })
            .await;

        client_for(&server, "")
            .update_status("lead_1", LeadStatus::Lost, Some(&long_reason))
            .await
            .unwrap();
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn schedule_callback_payload() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/admin/leads/lead_1/schedule")
                    .json_body(serde_json::json!({
                        "actionType": "call",
                        "scheduledFor": "2026-11-02T14:30:00",
                        "reason": "Follow-up call requested",
                        "timezone": "America/Los_Angeles",
                    }));
                then.status(201);
            })
            .await;

        let follow_up = FollowUp::callback(
            "2026-11-02T14:30:00".into(),
            "Follow-up call requested".into(),
            "America/Los_Angeles".into(),
        );
        client_for(&server, "")
            .schedule_follow_up("lead_1", &follow_up)
            .await
            .unwrap();
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn communication_omits_empty_fields() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/admin/leads/lead_1/communications")
                    .json_body(serde_json::json!({
                        "channel": "call",
                        "direction": "outbound",
                        "callDuration": 95,
                        "disposition": "not_interested",
                        "agentId": "sarah-voice-agent",
                    }));
                then.status(200);
            })
            .await;

        let entry = Communication {
            channel: "call".into(),
            direction: "outbound".into(),
            call_duration: 95,
            disposition: Some("not_interested".into()),
            call_summary: None,
            next_action: None,
            agent_id: "sarah-voice-agent".into(),
            transcript: None,
            sentiment_score: None,
        };
        client_for(&server, "")
            .log_communication("lead_1", &entry)
            .await
            .unwrap();
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn unreachable_backend_is_request_error() {
        let client = LeadClient::new(&BackendConfig {
            base_url: "http://127.0.0.1:9".into(),
            api_key: String::new(),
            timeout_secs: 1,
        });
        let err = client.send_sms("lead_1", "hi").await.unwrap_err();
        assert!(matches!(err, BackendError::Request(_)));
    }
}
