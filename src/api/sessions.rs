use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::greeting::select_greeting;
use crate::lead::Lead;
use crate::prompt::persona_prompt;
use crate::script::select_script;
use crate::session::{Direction, SessionContext};
use crate::tools::{self, ToolCall, ToolEnv};
use crate::AppState;

use super::{check_auth, error};

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    /// Runtime room or call identifier; becomes the session key.
    pub session_id: String,
    pub lead_id: Option<String>,
    /// First name passed in job metadata, used when the lead cannot be loaded.
    pub lead_name: Option<String>,
    pub business_name: Option<String>,
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub session_id: String,
    pub script: String,
    pub instructions: String,
    pub greeting: String,
}

#[derive(Debug, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub output: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct EndRequest {
    pub disposition: Option<String>,
    pub notes: Option<String>,
}

/// POST /api/sessions: open a session for a new call.
///
/// Loads the lead when an id is given, picks and renders a script for it, and
/// returns the instructions and greeting the agent should start with.
pub async fn handle_start(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<StartRequest>,
) -> Response {
    if let Err(resp) = check_auth(&headers, &state.config.api.token) {
        return resp;
    }

    if req.session_id.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "session_id must not be empty");
    }
    if state.sessions.get(&req.session_id).await.is_some() {
        return conflict(&req.session_id);
    }

    let lead_id = req.lead_id.filter(|id| !id.trim().is_empty());
    let lead = match lead_id {
        Some(ref id) => match state.client.fetch_lead(id).await {
            Ok(lead) => lead,
            Err(e) => {
                tracing::warn!(session_id = %req.session_id, lead_id = %id, "Lead fetch failed, using hints: {e}");
                Lead::from_hints(req.lead_name, req.business_name)
            }
        },
        None => Lead::from_hints(req.lead_name, req.business_name),
    };

    let script = select_script(
        &state.library,
        lead.business_type,
        lead.interest(),
        lead.state.as_deref(),
    );
    let rendered = script.render(&lead);
    let instructions = rendered.instructions(&persona_prompt(&state.config.agent));
    let greeting = select_greeting(req.direction, &lead, &rendered, &state.config.agent);

    let ctx = SessionContext::new(
        req.session_id.clone(),
        lead_id,
        lead,
        req.direction,
        script,
    );
    if state.sessions.register(ctx).await.is_none() {
        return conflict(&req.session_id);
    }

    (
        StatusCode::OK,
        Json(StartResponse {
            session_id: req.session_id,
            script: rendered.key,
            instructions,
            greeting,
        }),
    )
        .into_response()
}

fn conflict(session_id: &str) -> Response {
    tracing::warn!(session_id, "Session already active");
    error(
        StatusCode::CONFLICT,
        format!("Session {session_id} is already active"),
    )
}

/// POST /api/sessions/{id}/tools: run one agent tool against the session.
pub async fn handle_tool(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ToolRequest>,
) -> Response {
    if let Err(resp) = check_auth(&headers, &state.config.api.token) {
        return resp;
    }

    let Some(handle) = state.sessions.get(&session_id).await else {
        return error(
            StatusCode::NOT_FOUND,
            format!("No active session {session_id}"),
        );
    };

    let call = match ToolCall::parse(&req.name, req.arguments) {
        Ok(call) => call,
        Err(e) => {
            tracing::warn!(session_id = %session_id, tool = %req.name, "Rejected tool call: {e}");
            return error(
                StatusCode::BAD_REQUEST,
                format!("Invalid tool call '{}': {e}", req.name),
            );
        }
    };

    tracing::info!(session_id = %session_id, tool = %req.name, "Running tool");

    let env = ToolEnv {
        client: &state.client,
        library: &state.library,
        agent: &state.config.agent,
    };
    let mut ctx = handle.lock().await;
    if ctx.is_finished() {
        return error(
            StatusCode::NOT_FOUND,
            format!("Session {session_id} has ended"),
        );
    }
    let output = tools::run(call, &mut ctx, &env).await;

    (StatusCode::OK, Json(ToolResponse { output })).into_response()
}

/// POST /api/sessions/{id}/end: close the session and persist its outcome.
pub async fn handle_end(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<EndRequest>,
) -> Response {
    if let Err(resp) = check_auth(&headers, &state.config.api.token) {
        return resp;
    }

    let Some(handle) = state.sessions.remove(&session_id).await else {
        return error(
            StatusCode::NOT_FOUND,
            format!("No active session {session_id}"),
        );
    };

    let Some(finished) = handle.lock().await.finish() else {
        return error(
            StatusCode::NOT_FOUND,
            format!("Session {session_id} has ended"),
        );
    };

    let report = finished
        .flush(
            &state.client,
            &state.config.agent.agent_id,
            req.disposition.as_deref(),
            req.notes.as_deref(),
        )
        .await;

    (StatusCode::OK, Json(report)).into_response()
}
