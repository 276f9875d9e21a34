use crate::lead::LeadStatus;

/// Call outcomes accepted from the voice agent, paired with the lead status each one
/// moves the lead to. The set is the union of what the different agent personas send.
const STATUS_TABLE: &[(&str, LeadStatus)] = &[
    ("reached", LeadStatus::Contacted),
    ("reached_qualified", LeadStatus::Qualified),
    ("qualified", LeadStatus::Qualified),
    ("demo_scheduled", LeadStatus::DemoScheduled),
    ("proposal_sent", LeadStatus::ProposalSent),
    ("voicemail", LeadStatus::Contacted),
    ("left_voicemail", LeadStatus::Contacted),
    ("no_answer", LeadStatus::Contacted),
    ("busy", LeadStatus::Contacted),
    ("callback_requested", LeadStatus::Contacted),
    ("not_interested", LeadStatus::Lost),
    ("bad_fit", LeadStatus::Lost),
    ("dnc", LeadStatus::Dnc),
    ("do_not_call", LeadStatus::Dnc),
];

/// Map a disposition label to the lead status it implies.
///
/// Unrecognized labels map to `Contacted` so the call-logging path is never blocked.
pub fn disposition_to_status(disposition: &str) -> LeadStatus {
    let normalized = disposition.trim().to_ascii_lowercase();
    STATUS_TABLE
        .iter()
        .find(|(label, _)| *label == normalized)
        .map(|(_, status)| *status)
        .unwrap_or(LeadStatus::Contacted)
}

/// Whether the label is one of the known dispositions.
pub fn is_known(disposition: &str) -> bool {
    let normalized = disposition.trim().to_ascii_lowercase();
    STATUS_TABLE.iter().any(|(label, _)| *label == normalized)
}
