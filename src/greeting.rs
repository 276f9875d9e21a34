use chrono::{Local, Timelike};

use crate::config::AgentConfig;
use crate::lead::Lead;
use crate::script::RenderedScript;
use crate::session::Direction;

fn time_salutation(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good morning",
        12..=16 => "Good afternoon",
        17..=20 => "Good evening",
        _ => "Hi",
    }
}

/// Instruction telling the agent how to open the call.
///
/// Outbound calls to a known lead use the script's opening line; outbound calls
/// without a name use a generic introduction; inbound callers get a
/// time-of-day welcome.
pub fn select_greeting(
    direction: Direction,
    lead: &Lead,
    script: &RenderedScript,
    agent: &AgentConfig,
) -> String {
    select_greeting_for_hour(direction, lead, script, agent, Local::now().hour())
}

fn select_greeting_for_hour(
    direction: Direction,
    lead: &Lead,
    script: &RenderedScript,
    agent: &AgentConfig,
    hour: u32,
) -> String {
    let persona = &agent.persona;
    let company = &agent.company;

    match direction {
        Direction::Outbound if lead.has_first_name() => {
            let name = lead.first_name_or_default();
            let opening = script.opening.clone().unwrap_or_else(|| {
                format!(
                    "You recently submitted an inquiry about offering insurance coverage at {}. \
                     Do you have a quick moment?",
                    lead.business_name_or_default()
                )
            });
            format!(
                "Greet {name} warmly. Introduce yourself as {persona} calling from {company}, \
                 then say: '{opening}'"
            )
        }
        Direction::Outbound => format!(
            "Introduce yourself warmly. Say: 'Hi, this is {persona} calling from {company}. \
             We help gyms, climbing facilities, and rental businesses offer same-day insurance \
             to their members. I'm following up on an inquiry we received. Do you have a quick \
             moment?'"
        ),
        Direction::Inbound => format!(
            "Greet the caller warmly. Say: '{}, thank you for calling {company}! This is \
             {persona}. How can I help you today?'",
            time_salutation(hour)
        ),
    }
}
