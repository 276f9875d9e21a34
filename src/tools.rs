use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::json;

use crate::backend::{Communication, FollowUp, LeadClient};
use crate::config::AgentConfig;
use crate::disposition::{self, disposition_to_status};
use crate::lead::{BusinessType, InterestLevel, LeadStatus};
use crate::qualification::is_qualified_for_upsell;
use crate::script::{select_script, ScriptLibrary};
use crate::session::{Sentiment, SessionContext, Speaker};

/// A tool invocation from the voice runtime, as `{ "name": ..., "arguments": {...} }`.
#[derive(Debug, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    LoadLeadContext {},
    UpdateDisposition {
        disposition: String,
        #[serde(default)]
        notes: String,
        #[serde(default)]
        next_action: Option<String>,
    },
    ScheduleCallback {
        callback_date: String,
        callback_time: String,
        #[serde(default)]
        timezone: Option<String>,
        #[serde(default = "default_callback_reason")]
        reason: String,
    },
    ScheduleDemo {
        demo_date: String,
        demo_time: String,
        attendee_email: String,
        attendee_name: String,
        business_name: String,
    },
    SendSms {
        message: String,
        #[serde(default)]
        include_info_link: bool,
    },
    EscalateToSpecialist {
        reason: String,
        #[serde(default)]
        urgency: Urgency,
    },
    HandleVoicemail {
        #[serde(default = "default_true")]
        leave_message: bool,
    },
    AnalyzeSentiment {
        sentiment: Sentiment,
        #[serde(default)]
        indicators: String,
        #[serde(default)]
        should_escalate: bool,
    },
    GetRecommendedScript {
        #[serde(default)]
        business_type: Option<BusinessType>,
        #[serde(default)]
        interest_level: Option<InterestLevel>,
    },
    AddToDncList {
        #[serde(default = "default_dnc_reason")]
        reason: String,
    },
    LogTranscriptSegment {
        speaker: Speaker,
        text: String,
    },
    CheckUpsellQualification {
        races_per_year: u32,
        workouts_per_week: u32,
    },
}

fn default_callback_reason() -> String {
    "Follow-up call requested".to_string()
}

fn default_dnc_reason() -> String {
    "Requested removal".to_string()
}

fn default_true() -> bool {
    true
}

impl ToolCall {
    /// Parse a tool name and its arguments. Missing or null arguments count as `{}`.
    pub fn parse(name: &str, arguments: serde_json::Value) -> Result<Self, serde_json::Error> {
        let arguments = if arguments.is_null() {
            json!({})
        } else {
            arguments
        };
        serde_json::from_value(json!({ "name": name, "arguments": arguments }))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
}

impl Urgency {
    fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
        }
    }

    fn response_window(self) -> &'static str {
        match self {
            Urgency::High => "2 hours",
            Urgency::Medium => "24 hours",
            Urgency::Low => "48 hours",
        }
    }
}

/// Shared, read-only collaborators a tool may use.
pub struct ToolEnv<'a> {
    pub client: &'a LeadClient,
    pub library: &'a ScriptLibrary,
    pub agent: &'a AgentConfig,
}

/// Run one tool against a session. Always produces text for the agent to act on;
/// backend failures degrade to an acknowledgement instead of an error.
pub async fn run(call: ToolCall, ctx: &mut SessionContext, env: &ToolEnv<'_>) -> String {
    ctx.touch();

    match call {
        ToolCall::LoadLeadContext {} => load_lead_context(ctx, env).await,
        ToolCall::UpdateDisposition {
            disposition,
            notes,
            next_action,
        } => update_disposition(ctx, env, &disposition, &notes, next_action.as_deref()).await,
        ToolCall::ScheduleCallback {
            callback_date,
            callback_time,
            timezone,
            reason,
        } => {
            let tz = timezone.unwrap_or_else(|| env.agent.default_timezone.clone());
            schedule_callback(ctx, env, &callback_date, &callback_time, tz, reason).await
        }
        ToolCall::ScheduleDemo {
            demo_date,
            demo_time,
            attendee_email,
            attendee_name,
            business_name,
        } => {
            schedule_demo(
                ctx,
                env,
                &demo_date,
                &demo_time,
                attendee_email,
                attendee_name,
                business_name,
            )
            .await
        }
        ToolCall::SendSms {
            message,
            include_info_link,
        } => send_sms(ctx, env, message, include_info_link).await,
        ToolCall::EscalateToSpecialist { reason, urgency } => {
            escalate(ctx, env, &reason, urgency).await
        }
        ToolCall::HandleVoicemail { leave_message } => {
            handle_voicemail(ctx, env, leave_message).await
        }
        ToolCall::AnalyzeSentiment {
            sentiment,
            indicators,
            should_escalate,
        } => analyze_sentiment(ctx, sentiment, indicators, should_escalate),
        ToolCall::GetRecommendedScript {
            business_type,
            interest_level,
        } => recommended_script(ctx, env, business_type, interest_level),
        ToolCall::AddToDncList { reason } => add_to_dnc(ctx, env, &reason).await,
        ToolCall::LogTranscriptSegment { speaker, text } => {
            ctx.transcript_mut().push_turn(speaker, text);
            "Logged.".to_string()
        }
        ToolCall::CheckUpsellQualification {
            races_per_year,
            workouts_per_week,
        } => upsell_check(ctx, races_per_year, workouts_per_week),
    }
}

async fn load_lead_context(ctx: &mut SessionContext, env: &ToolEnv<'_>) -> String {
    let Some(lead_id) = ctx.lead_id.clone() else {
        return "No lead ID provided. This appears to be an inbound call without lead context."
            .to_string();
    };

    match env.client.fetch_lead(&lead_id).await {
        Ok(lead) => {
            ctx.lead = lead;
            ctx.lead.summary()
        }
        Err(e) => {
            tracing::warn!(session_id = %ctx.session_id, lead_id = %lead_id, "Failed to load lead: {e}");
            "Could not load lead information. Proceed with discovery questions.".to_string()
        }
    }
}

async fn update_disposition(
    ctx: &mut SessionContext,
    env: &ToolEnv<'_>,
    disposition: &str,
    notes: &str,
    next_action: Option<&str>,
) -> String {
    let status = disposition_to_status(disposition);
    if !disposition::is_known(disposition) {
        tracing::warn!(session_id = %ctx.session_id, disposition, "Unknown disposition, recording as contacted");
    }
    ctx.disposition = Some(disposition.to_string());

    let Some(lead_id) = ctx.lead_id.clone() else {
        tracing::info!(session_id = %ctx.session_id, disposition, "Disposition (no lead): {notes}");
        return format!("Logged disposition: {disposition}. Note: No lead ID to update in database.");
    };

    let reason = Some(notes).filter(|n| !n.is_empty());
    let entry = Communication {
        channel: "call".to_string(),
        direction: ctx.direction.as_str().to_string(),
        call_duration: ctx.call_duration_secs(),
        disposition: Some(disposition.to_string()),
        call_summary: reason.map(str::to_string),
        next_action: next_action.map(str::to_string),
        agent_id: env.agent.agent_id.clone(),
        transcript: None,
        sentiment_score: None,
    };

    let result = async {
        env.client.update_status(&lead_id, status, reason).await?;
        env.client.log_communication(&lead_id, &entry).await
    }
    .await;

    match result {
        Ok(()) => {
            tracing::info!(session_id = %ctx.session_id, lead_id = %lead_id, disposition, status = %status, "Disposition recorded");
            format!("Successfully logged: {disposition}. Lead status updated to {status}.")
        }
        Err(e) => {
            tracing::error!(session_id = %ctx.session_id, lead_id = %lead_id, "Error updating disposition: {e}");
            format!("Logged locally: {disposition} - {notes}. Database update failed.")
        }
    }
}

/// `YYYY-MM-DD` and 24-hour `HH:MM` into the backend's `YYYY-MM-DDTHH:MM:SS`.
fn scheduled_for(date: &str, time: &str) -> Option<String> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M").ok()?;
    Some(date.and_time(time).format("%Y-%m-%dT%H:%M:%S").to_string())
}

async fn schedule_callback(
    ctx: &mut SessionContext,
    env: &ToolEnv<'_>,
    date: &str,
    time: &str,
    timezone: String,
    reason: String,
) -> String {
    let Some(when) = scheduled_for(date, time) else {
        return format!(
            "'{date} {time}' is not a valid date and time. Confirm the callback date \
             (YYYY-MM-DD) and time (HH:MM, 24-hour) with the prospect."
        );
    };

    let Some(lead_id) = ctx.lead_id.clone() else {
        tracing::info!(session_id = %ctx.session_id, %when, "Callback requested (no lead): {reason}");
        return format!("I've noted a callback for {date} at {time}. We'll reach out then!");
    };

    let follow_up = FollowUp::callback(when, reason, timezone.clone());
    match env.client.schedule_follow_up(&lead_id, &follow_up).await {
        Ok(()) => format!(
            "Callback scheduled for {date} at {time} ({timezone}). You'll receive a reminder."
        ),
        Err(e) => {
            tracing::error!(session_id = %ctx.session_id, lead_id = %lead_id, "Error scheduling callback: {e}");
            format!("I've noted your request for a callback on {date} at {time}.")
        }
    }
}

async fn schedule_demo(
    ctx: &mut SessionContext,
    env: &ToolEnv<'_>,
    date: &str,
    time: &str,
    attendee_email: String,
    attendee_name: String,
    business_name: String,
) -> String {
    let Some(when) = scheduled_for(date, time) else {
        return format!(
            "'{date} {time}' is not a valid date and time. Confirm the demo date \
             (YYYY-MM-DD) and time (HH:MM, 24-hour) with the prospect."
        );
    };

    ctx.disposition = Some("demo_scheduled".to_string());
    let confirmation = format!(
        "Demo scheduled for {date} at {time}. A calendar invite will be sent to {attendee_email}."
    );

    let Some(lead_id) = ctx.lead_id.clone() else {
        tracing::info!(session_id = %ctx.session_id, %when, attendee = %attendee_name, business = %business_name, "Demo requested (no lead)");
        return confirmation;
    };

    let email = attendee_email.clone();
    let follow_up = FollowUp::demo(when, attendee_email, attendee_name, business_name);
    let result = async {
        env.client
            .update_status(&lead_id, LeadStatus::DemoScheduled, None)
            .await?;
        env.client.schedule_follow_up(&lead_id, &follow_up).await
    }
    .await;

    match result {
        Ok(()) => confirmation,
        Err(e) => {
            tracing::error!(session_id = %ctx.session_id, lead_id = %lead_id, "Error scheduling demo: {e}");
            format!(
                "I've noted your demo request for {date} at {time}. Our team will send a \
                 calendar invite to {email}."
            )
        }
    }
}

async fn send_sms(
    ctx: &mut SessionContext,
    env: &ToolEnv<'_>,
    message: String,
    include_info_link: bool,
) -> String {
    let has_phone = ctx
        .lead
        .phone
        .as_deref()
        .is_some_and(|p| !p.trim().is_empty());
    let Some(lead_id) = ctx.lead_id.clone() else {
        if !has_phone {
            return "Cannot send SMS - no phone number available.".to_string();
        }
        tracing::info!(session_id = %ctx.session_id, message_len = message.len(), "SMS queued (no lead)");
        return "I'll send that information via text right now.".to_string();
    };

    let mut full_message = message;
    if include_info_link {
        full_message.push_str("\n\nLearn more: ");
        full_message.push_str(&env.agent.info_link);
    }

    match env.client.send_sms(&lead_id, &full_message).await {
        Ok(()) => "SMS sent successfully! They should receive it momentarily.".to_string(),
        Err(e) => {
            tracing::error!(session_id = %ctx.session_id, lead_id = %lead_id, "Error sending SMS: {e}");
            "I'll make sure our team sends that information to you via text.".to_string()
        }
    }
}

async fn escalate(
    ctx: &mut SessionContext,
    env: &ToolEnv<'_>,
    reason: &str,
    urgency: Urgency,
) -> String {
    if let Some(lead_id) = ctx.lead_id.clone() {
        if let Err(e) = env
            .client
            .escalate(&lead_id, reason, urgency.as_str())
            .await
        {
            tracing::error!(session_id = %ctx.session_id, lead_id = %lead_id, "Error creating escalation: {e}");
            return "I've noted your questions. One of our licensed specialists will follow up \
                    with you soon."
                .to_string();
        }
    }

    tracing::info!(session_id = %ctx.session_id, urgency = urgency.as_str(), "Escalation: {reason}");
    format!(
        "I've flagged this for our licensed specialist team. They'll reach out within {} to \
         answer your detailed questions.",
        urgency.response_window()
    )
}

async fn handle_voicemail(
    ctx: &mut SessionContext,
    env: &ToolEnv<'_>,
    leave_message: bool,
) -> String {
    let (disposition, notes) = if leave_message {
        (
            "left_voicemail",
            "Voicemail detected. Left standard follow-up message.",
        )
    } else {
        (
            "no_answer",
            "Voicemail detected. No message left per configuration.",
        )
    };

    if ctx.lead_id.is_some() {
        update_disposition(ctx, env, disposition, notes, None).await;
    } else {
        ctx.disposition = Some(disposition.to_string());
    }

    if !leave_message {
        return "Voicemail detected. Hanging up without leaving a message.".to_string();
    }

    tracing::info!(session_id = %ctx.session_id, lead_id = ?ctx.lead_id, "Leaving voicemail");
    format!(
        "Voicemail detected. Leave this message: Hi, this is {persona} from {company}. I'm \
         following up on your recent inquiry about offering insurance coverage to your members. \
         We help gyms and fitness businesses earn extra revenue by offering same-day coverage. \
         Please give us a call back at your convenience, or reply to our email. Thanks, and have \
         a great day!",
        persona = env.agent.persona,
        company = env.agent.company,
    )
}

fn analyze_sentiment(
    ctx: &mut SessionContext,
    sentiment: Sentiment,
    indicators: String,
    should_escalate: bool,
) -> String {
    tracing::info!(
        session_id = %ctx.session_id,
        sentiment = sentiment.as_str(),
        score = sentiment.score(),
        "Sentiment: {indicators}"
    );
    ctx.transcript_mut().record_sentiment(sentiment, indicators);

    let label = sentiment.as_str();
    if should_escalate || sentiment == Sentiment::VeryNegative {
        format!(
            "Sentiment recorded: {label}. WARNING: Consider escalating or offering to connect \
             with a manager."
        )
    } else {
        format!("Sentiment recorded: {label}. Continue with empathy and active listening.")
    }
}

struct ValueProps {
    main_value: &'static str,
    pain_point: &'static str,
    revenue_example: &'static str,
}

fn value_props(business_type: Option<BusinessType>) -> ValueProps {
    match business_type {
        Some(BusinessType::Gym) => ValueProps {
            main_value: "day-pass and drop-in coverage for non-members",
            pain_point: "liability exposure from daily visitors",
            revenue_example:
                "Partners with 50+ daily visitors typically earn $500-1500/month in commissions",
        },
        Some(BusinessType::Climbing) => ValueProps {
            main_value: "first-timer and visitor accident protection",
            pain_point: "high-risk activity liability concerns",
            revenue_example: "Climbing gyms see 60-70% opt-in rates due to perceived risk",
        },
        Some(BusinessType::Rental) => ValueProps {
            main_value: "equipment damage and injury coverage bundled",
            pain_point: "equipment damage disputes and liability claims",
            revenue_example: "Rental shops reduce damage disputes by 80% with our coverage",
        },
        Some(BusinessType::Adventure) => ValueProps {
            main_value: "high-risk activity coverage on demand",
            pain_point: "finding affordable coverage for adventure activities",
            revenue_example: "Adventure operators see the highest opt-in rates at 75%+",
        },
        Some(BusinessType::Other) | None => ValueProps {
            main_value: "flexible same-day coverage for your participants",
            pain_point: "liability exposure and participant safety",
            revenue_example: "Partners typically earn 15-25% commission on every policy",
        },
    }
}

fn interest_approach(level: InterestLevel) -> &'static str {
    match level {
        InterestLevel::Hot => "Move quickly to demo/proposal. They're ready to buy.",
        InterestLevel::Warm => "Focus on specific benefits. Answer questions thoroughly.",
        InterestLevel::Cold => "Start with rapport building. Understand their pain points first.",
    }
}

fn recommended_script(
    ctx: &mut SessionContext,
    env: &ToolEnv<'_>,
    business_type: Option<BusinessType>,
    interest_level: Option<InterestLevel>,
) -> String {
    let business_type = business_type.or(ctx.lead.business_type);
    let interest_level = interest_level.unwrap_or_else(|| ctx.lead.interest());
    let script = select_script(
        env.library,
        business_type,
        interest_level,
        ctx.lead.state.as_deref(),
    );
    let rendered = script.render(&ctx.lead);
    let props = value_props(business_type);

    let mut out = format!(
        "RECOMMENDED APPROACH for {} ({} lead) - script: {}\n\n\
         Strategy: {}\n\n\
         Value:\n\
         1. Main Value: \"{}\"\n\
         2. Address Pain Point: \"{}\"\n\
         3. Revenue Example: \"{}\"\n",
        business_type
            .map(BusinessType::as_str)
            .unwrap_or("any")
            .to_uppercase(),
        interest_level.as_str(),
        rendered.name,
        interest_approach(interest_level),
        props.main_value,
        props.pain_point,
        props.revenue_example,
    );

    if !rendered.key_points.is_empty() {
        out.push_str("\nKey Talking Points:\n");
        for point in &rendered.key_points {
            out.push_str(&format!("- {point}\n"));
        }
    }
    if !rendered.objection_handlers.is_empty() {
        out.push_str("\nObjection Handlers:\n");
        for (objection, rebuttal) in &rendered.objection_handlers {
            out.push_str(&format!("- \"{objection}\" -> {rebuttal}\n"));
        }
    }
    if let Some(ref closing) = rendered.closing {
        out.push_str(&format!("\nClose: {closing}\n"));
    }

    out
}

async fn add_to_dnc(ctx: &mut SessionContext, env: &ToolEnv<'_>, reason: &str) -> String {
    ctx.disposition = Some("dnc".to_string());

    if let Some(lead_id) = ctx.lead_id.clone() {
        let status_reason = format!("DNC requested: {reason}");
        if let Err(e) = env
            .client
            .update_status(&lead_id, LeadStatus::Dnc, Some(&status_reason))
            .await
        {
            tracing::error!(session_id = %ctx.session_id, lead_id = %lead_id, "Error adding to DNC: {e}");
            return "I've noted your request. You won't receive any further calls from us."
                .to_string();
        }
    }

    tracing::info!(session_id = %ctx.session_id, lead_id = ?ctx.lead_id, "DNC added: {reason}");
    "I've removed you from our call list. You won't receive any further calls from us. I \
     apologize for any inconvenience."
        .to_string()
}

fn upsell_check(ctx: &SessionContext, races_per_year: u32, workouts_per_week: u32) -> String {
    let qualified = is_qualified_for_upsell(races_per_year, workouts_per_week);
    tracing::info!(
        session_id = %ctx.session_id,
        races_per_year,
        workouts_per_week,
        qualified,
        "Upsell qualification"
    );

    if qualified {
        format!(
            "Qualified for upsell: {races_per_year} races per year and {workouts_per_week} \
             workouts per week. Present the upsell offer."
        )
    } else {
        format!(
            "Not qualified for upsell: {races_per_year} races per year and {workouts_per_week} \
             workouts per week. Do not present the upsell offer."
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::lead::Lead;
    use crate::session::Direction;
    use httpmock::Method::{PATCH, POST};
    use httpmock::MockServer;

    struct Fixture {
        client: LeadClient,
        library: ScriptLibrary,
        agent: AgentConfig,
    }

    impl Fixture {
        fn new(base_url: String) -> Self {
            Self {
                client: LeadClient::new(&BackendConfig {
                    base_url,
                    api_key: String::new(),
                    timeout_secs: 2,
                }),
                library: ScriptLibrary::builtin(),
                agent: AgentConfig::default(),
            }
        }

        fn env(&self) -> ToolEnv<'_> {
            ToolEnv {
                client: &self.client,
                library: &self.library,
                agent: &self.agent,
            }
        }
    }

    fn session(lead_id: Option<&str>, lead: Lead) -> SessionContext {
        SessionContext::new(
            "room-1".into(),
            lead_id.map(str::to_string),
            lead,
            Direction::Outbound,
            ScriptLibrary::builtin().default_script().clone(),
        )
    }

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall::parse(name, args).unwrap()
    }

    #[test]
    fn parse_accepts_missing_arguments() {
        assert!(matches!(
            ToolCall::parse("load_lead_context", serde_json::Value::Null).unwrap(),
            ToolCall::LoadLeadContext {}
        ));
        match call("handle_voicemail", json!({})) {
            ToolCall::HandleVoicemail { leave_message } => assert!(leave_message),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_unknown_tool_and_negative_counts() {
        assert!(ToolCall::parse("launch_rocket", json!({})).is_err());
        assert!(ToolCall::parse(
            "check_upsell_qualification",
            json!({"races_per_year": -1, "workouts_per_week": 3})
        )
        .is_err());
    }

    #[test]
    fn scheduled_for_validates() {
        assert_eq!(
            scheduled_for("2026-11-02", "14:30").as_deref(),
            Some("2026-11-02T14:30:00")
        );
        assert_eq!(scheduled_for("2026-13-02", "14:30"), None);
        assert_eq!(scheduled_for("2026-11-02", "2pm"), None);
    }

    #[tokio::test]
    async fn upsell_tool_reports_decision() {
        let fx = Fixture::new("http://127.0.0.1:9".into());
        let mut ctx = session(None, Lead::default());
        let yes = run(
            call(
                "check_upsell_qualification",
                json!({"races_per_year": 2, "workouts_per_week": 2}),
            ),
            &mut ctx,
            &fx.env(),
        )
        .await;
        assert!(yes.starts_with("Qualified for upsell"));

        let no = run(
            call(
                "check_upsell_qualification",
                json!({"races_per_year": 1, "workouts_per_week": 5}),
            ),
            &mut ctx,
            &fx.env(),
        )
        .await;
        assert!(no.starts_with("Not qualified"));
    }

    #[tokio::test]
    async fn disposition_without_lead_is_local() {
        let fx = Fixture::new("http://127.0.0.1:9".into());
        let mut ctx = session(None, Lead::default());
        let out = run(
            call(
                "update_disposition",
                json!({"disposition": "callback_requested", "notes": "call Tuesday"}),
            ),
            &mut ctx,
            &fx.env(),
        )
        .await;
        assert!(out.contains("No lead ID"));
        assert_eq!(ctx.disposition.as_deref(), Some("callback_requested"));
    }

    #[tokio::test]
    async fn disposition_updates_backend() {
        let server = MockServer::start_async().await;
        let patch = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/api/admin/leads/lead_7")
                    .body_includes(r#""status":"lost""#);
                then.status(200);
            })
            .await;
        let comm = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/admin/leads/lead_7/communications")
                    .body_includes(r#""disposition":"not_interested""#);
                then.status(201);
            })
            .await;

        let fx = Fixture::new(server.base_url());
        let mut ctx = session(Some("lead_7"), Lead::default());
        let out = run(
            call(
                "update_disposition",
                json!({"disposition": "not_interested", "notes": "Has a provider"}),
            ),
            &mut ctx,
            &fx.env(),
        )
        .await;

        assert_eq!(
            out,
            "Successfully logged: not_interested. Lead status updated to lost."
        );
        patch.assert_calls(1);
        comm.assert_calls(1);
    }

    #[tokio::test]
    async fn backend_failure_degrades_to_local_log() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PATCH).path("/api/admin/leads/lead_7");
                then.status(503);
            })
            .await;

        let fx = Fixture::new(server.base_url());
        let mut ctx = session(Some("lead_7"), Lead::default());
        let out = run(
            call("update_disposition", json!({"disposition": "qualified", "notes": "n"})),
            &mut ctx,
            &fx.env(),
        )
        .await;
        assert_eq!(out, "Logged locally: qualified - n. Database update failed.");
    }

    #[tokio::test]
    async fn invalid_callback_time_asks_to_confirm() {
        let fx = Fixture::new("http://127.0.0.1:9".into());
        let mut ctx = session(Some("lead_1"), Lead::default());
        let out = run(
            call(
                "schedule_callback",
                json!({"callback_date": "next tuesday", "callback_time": "14:00"}),
            ),
            &mut ctx,
            &fx.env(),
        )
        .await;
        assert!(out.contains("not a valid date and time"));
    }

    #[tokio::test]
    async fn sms_without_phone_or_lead_is_refused() {
        let fx = Fixture::new("http://127.0.0.1:9".into());
        let mut ctx = session(None, Lead::default());
        let out = run(
            call("send_sms", json!({"message": "Here's the link"})),
            &mut ctx,
            &fx.env(),
        )
        .await;
        assert_eq!(out, "Cannot send SMS - no phone number available.");
    }

    #[tokio::test]
    async fn sms_appends_info_link() {
        let server = MockServer::start_async().await;
        let sms = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/admin/leads/lead_3/sms")
                    .body_includes("Learn more: https://dailyeventinsurance.com/partners");
                then.status(200);
            })
            .await;

        let fx = Fixture::new(server.base_url());
        let mut ctx = session(Some("lead_3"), Lead::default());
        let out = run(
            call(
                "send_sms",
                json!({"message": "Great talking!", "include_info_link": true}),
            ),
            &mut ctx,
            &fx.env(),
        )
        .await;
        assert!(out.starts_with("SMS sent successfully"));
        sms.assert_calls(1);
    }

    #[tokio::test]
    async fn escalation_window_follows_urgency() {
        let fx = Fixture::new("http://127.0.0.1:9".into());
        let mut ctx = session(None, Lead::default());
        let out = run(
            call(
                "escalate_to_specialist",
                json!({"reason": "coverage limits", "urgency": "high"}),
            ),
            &mut ctx,
            &fx.env(),
        )
        .await;
        assert!(out.contains("within 2 hours"));
    }

    #[tokio::test]
    async fn voicemail_records_disposition() {
        let fx = Fixture::new("http://127.0.0.1:9".into());
        let mut ctx = session(None, Lead::default());
        let out = run(call("handle_voicemail", json!({})), &mut ctx, &fx.env()).await;
        assert!(out.contains("Hi, this is Sarah from Daily Event Insurance"));
        assert_eq!(ctx.disposition.as_deref(), Some("left_voicemail"));

        let out = run(
            call("handle_voicemail", json!({"leave_message": false})),
            &mut ctx,
            &fx.env(),
        )
        .await;
        assert!(out.contains("Hanging up"));
        assert_eq!(ctx.disposition.as_deref(), Some("no_answer"));
    }

    #[tokio::test]
    async fn sentiment_and_transcript_accumulate_in_session() {
        let fx = Fixture::new("http://127.0.0.1:9".into());
        let mut ctx = session(None, Lead::default());

        run(
            call(
                "log_transcript_segment",
                json!({"speaker": "prospect", "text": "We already have insurance"}),
            ),
            &mut ctx,
            &fx.env(),
        )
        .await;
        let out = run(
            call(
                "analyze_sentiment",
                json!({"sentiment": "very_negative", "indicators": "raised voice"}),
            ),
            &mut ctx,
            &fx.env(),
        )
        .await;

        assert!(out.contains("WARNING"));
        assert_eq!(ctx.transcript().turns().len(), 1);
        assert_eq!(ctx.transcript().average_sentiment(), Some(-1.0));
    }

    #[tokio::test]
    async fn recommended_script_uses_lead_region() {
        let fx = Fixture::new("http://127.0.0.1:9".into());
        let lead = Lead {
            state: Some("CA".into()),
            ..Lead::default()
        };
        let mut ctx = session(None, lead);
        let out = run(
            call(
                "get_recommended_script",
                json!({"business_type": "gym", "interest_level": "cold"}),
            ),
            &mut ctx,
            &fx.env(),
        )
        .await;

        assert!(out.starts_with("RECOMMENDED APPROACH for GYM (cold lead)"));
        assert!(out.contains("50% commission on every policy"));
        assert!(out.contains("Fully compliant with California insurance regulations"));
        assert!(out.contains("day-pass and drop-in coverage"));
    }

    #[tokio::test]
    async fn dnc_marks_session() {
        let server = MockServer::start_async().await;
        let patch = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/api/admin/leads/lead_2")
                    .body_includes(r#""statusReason":"DNC requested: Requested removal""#);
                then.status(200);
            })
            .await;

        let fx = Fixture::new(server.base_url());
        let mut ctx = session(Some("lead_2"), Lead::default());
        let out = run(call("add_to_dnc_list", json!({})), &mut ctx, &fx.env()).await;
        assert!(out.starts_with("I've removed you from our call list"));
        assert_eq!(ctx.disposition.as_deref(), Some("dnc"));
        patch.assert_calls(1);
    }
}
