pub mod transcript;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::backend::{Communication, LeadClient};
use crate::disposition::disposition_to_status;
use crate::lead::{Lead, LeadStatus};
use crate::script::Script;

pub use transcript::{CallTranscript, Sentiment, Speaker};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Outbound,
    Inbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Outbound => "outbound",
            Direction::Inbound => "inbound",
        }
    }
}

/// State owned by one live call. Nothing in here is shared between calls.
pub struct SessionContext {
    pub session_id: String,
    pub lead_id: Option<String>,
    pub lead: Lead,
    pub direction: Direction,
    pub script: Script,
    pub started_at: DateTime<Utc>,
    /// Last disposition the agent recorded during the call.
    pub disposition: Option<String>,
    last_activity: Instant,
    transcript: CallTranscript,
    finished: bool,
}

impl SessionContext {
    pub fn new(
        session_id: String,
        lead_id: Option<String>,
        lead: Lead,
        direction: Direction,
        script: Script,
    ) -> Self {
        Self {
            session_id,
            lead_id,
            lead,
            direction,
            script,
            started_at: Utc::now(),
            disposition: None,
            last_activity: Instant::now(),
            transcript: CallTranscript::new(),
            finished: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn transcript(&self) -> &CallTranscript {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut CallTranscript {
        &mut self.transcript
    }

    pub fn call_duration_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }

    /// Close the session and hand over its transcript. Returns `None` if it was
    /// already closed, so a call is flushed at most once.
    pub fn finish(&mut self) -> Option<FinishedSession> {
        if self.finished {
            return None;
        }
        self.finished = true;
        Some(FinishedSession {
            session_id: self.session_id.clone(),
            lead_id: self.lead_id.clone(),
            direction: self.direction,
            duration_secs: self.call_duration_secs(),
            disposition: self.disposition.clone(),
            transcript: std::mem::take(&mut self.transcript),
        })
    }
}

/// A closed call waiting to be persisted.
pub struct FinishedSession {
    pub session_id: String,
    pub lead_id: Option<String>,
    pub direction: Direction,
    pub duration_secs: i64,
    pub disposition: Option<String>,
    pub transcript: CallTranscript,
}

/// What happened when a finished session was persisted.
#[derive(Debug, Clone, Serialize)]
pub struct FlushReport {
    pub session_id: String,
    pub status: Option<LeadStatus>,
    pub turns: usize,
    pub average_sentiment: Option<f64>,
    pub flushed: bool,
}

impl FinishedSession {
    /// Persist the final disposition (if any) and the transcript. Best effort:
    /// backend failures are logged and reported, never propagated.
    pub async fn flush(
        self,
        client: &LeadClient,
        agent_id: &str,
        final_disposition: Option<&str>,
        notes: Option<&str>,
    ) -> FlushReport {
        let disposition = final_disposition
            .map(str::to_string)
            .or(self.disposition);
        let status = final_disposition.map(disposition_to_status);
        let mut report = FlushReport {
            session_id: self.session_id.clone(),
            status,
            turns: self.transcript.turns().len(),
            average_sentiment: self.transcript.average_sentiment(),
            flushed: false,
        };

        let Some(ref lead_id) = self.lead_id else {
            tracing::info!(
                session_id = %self.session_id,
                turns = report.turns,
                disposition = ?disposition,
                "Session ended without a lead, nothing to persist"
            );
            return report;
        };

        if let Some(status) = status {
            if let Err(e) = client.update_status(lead_id, status, notes).await {
                tracing::error!(session_id = %self.session_id, lead_id = %lead_id, "Final status update failed: {e}");
            }
        }

        tracing::debug!(session_id = %self.session_id, "Transcript:\n{}", self.transcript.to_text());

        if self.transcript.is_empty() && final_disposition.is_none() {
            tracing::debug!(session_id = %self.session_id, "Empty transcript, skipping log");
            report.flushed = true;
            return report;
        }

        let entry = Communication {
            channel: "call".to_string(),
            direction: self.direction.as_str().to_string(),
            call_duration: self.duration_secs,
            disposition,
            call_summary: notes.map(str::to_string),
            next_action: None,
            agent_id: agent_id.to_string(),
            transcript: Some(json!({
                "turns": self.transcript.turns(),
                "sentiments": self.transcript.sentiments(),
            })),
            sentiment_score: report.average_sentiment,
        };

        match client.log_communication(lead_id, &entry).await {
            Ok(()) => {
                report.flushed = true;
                tracing::info!(
                    session_id = %self.session_id,
                    lead_id = %lead_id,
                    turns = report.turns,
                    "Transcript flushed"
                );
            }
            Err(e) => {
                tracing::error!(session_id = %self.session_id, lead_id = %lead_id, "Transcript flush failed: {e}");
            }
        }

        report
    }
}

pub type SessionHandle = Arc<Mutex<SessionContext>>;

/// Registry of live call sessions, keyed by the runtime's session id.
///
/// Each session sits behind its own lock, so a slow backend call in one call
/// never holds up another.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<String, SessionHandle>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a new session. Returns `None` if the id is already live.
    pub async fn register(&self, ctx: SessionContext) -> Option<SessionHandle> {
        let mut sessions = self.inner.lock().await;
        if sessions.contains_key(&ctx.session_id) {
            return None;
        }
        tracing::info!(
            session_id = %ctx.session_id,
            lead_id = ?ctx.lead_id,
            script = %ctx.script.key,
            "Session registered"
        );
        let id = ctx.session_id.clone();
        let handle = Arc::new(Mutex::new(ctx));
        sessions.insert(id, Arc::clone(&handle));
        Some(handle)
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.inner.lock().await.get(session_id).cloned()
    }

    /// Deregister a session when it ends.
    pub async fn remove(&self, session_id: &str) -> Option<SessionHandle> {
        let removed = self.inner.lock().await.remove(session_id);
        if removed.is_some() {
            tracing::info!(session_id, "Session deregistered");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Remove and return every session idle for longer than `timeout`.
    /// Sessions currently running a tool are busy, not idle, and are skipped.
    pub async fn take_expired(&self, timeout: Duration) -> Vec<SessionHandle> {
        let mut sessions = self.inner.lock().await;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, handle)| {
                handle
                    .try_lock()
                    .map(|ctx| ctx.idle_for() > timeout)
                    .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| sessions.remove(&id))
            .collect()
    }

    pub async fn drain(&self) -> Vec<SessionHandle> {
        self.inner.lock().await.drain().map(|(_, h)| h).collect()
    }
}

/// Finish and flush each session with no final disposition.
pub async fn flush_all(handles: Vec<SessionHandle>, client: &LeadClient, agent_id: &str) {
    for handle in handles {
        let finished = handle.lock().await.finish();
        if let Some(finished) = finished {
            finished.flush(client, agent_id, None, None).await;
        }
    }
}

/// Periodically reap idle sessions until `cancel` fires.
pub fn spawn_reaper(
    registry: SessionRegistry,
    client: Arc<LeadClient>,
    agent_id: String,
    timeout: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let period = (timeout / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let expired = registry.take_expired(timeout).await;
                    if !expired.is_empty() {
                        tracing::info!(count = expired.len(), "Reaping idle sessions");
                        flush_all(expired, &client, &agent_id).await;
                        let active = registry.len().await;
                        tracing::debug!(active, "Reap complete");
                    }
                }
            }
        }
    })
}
