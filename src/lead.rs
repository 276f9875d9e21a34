use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Participant count assumed when the lead never reported one.
pub const DEFAULT_ESTIMATED_PARTICIPANTS: u32 = 100;

/// Kind of business a lead runs.
/// Matching is case-insensitive; anything unrecognised is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum BusinessType {
    Gym,
    Climbing,
    Rental,
    Adventure,
    Other,
}

impl From<String> for BusinessType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "gym" => BusinessType::Gym,
            "climbing" => BusinessType::Climbing,
            "rental" => BusinessType::Rental,
            "adventure" => BusinessType::Adventure,
            _ => BusinessType::Other,
        }
    }
}

impl BusinessType {
    pub fn as_str(self) -> &'static str {
        match self {
            BusinessType::Gym => "gym",
            BusinessType::Climbing => "climbing",
            BusinessType::Rental => "rental",
            BusinessType::Adventure => "adventure",
            BusinessType::Other => "other",
        }
    }
}

/// How far along a lead is in showing interest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum InterestLevel {
    Hot,
    Warm,
    #[default]
    Cold,
}

impl TryFrom<String> for InterestLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hot" => Ok(InterestLevel::Hot),
            "warm" => Ok(InterestLevel::Warm),
            "cold" => Ok(InterestLevel::Cold),
            _ => Err(format!("unknown interest level '{value}'")),
        }
    }
}

impl InterestLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            InterestLevel::Hot => "hot",
            InterestLevel::Warm => "warm",
            InterestLevel::Cold => "cold",
        }
    }
}

/// Lifecycle status of a lead in the sales pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    DemoScheduled,
    ProposalSent,
    Lost,
    Dnc,
}

impl LeadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::DemoScheduled => "demo_scheduled",
            LeadStatus::ProposalSent => "proposal_sent",
            LeadStatus::Lost => "lost",
            LeadStatus::Dnc => "dnc",
        }
    }
}

impl TryFrom<String> for LeadStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let status = match value.trim().to_ascii_lowercase().as_str() {
            "new" => LeadStatus::New,
            "contacted" => LeadStatus::Contacted,
            "qualified" => LeadStatus::Qualified,
            "demo_scheduled" => LeadStatus::DemoScheduled,
            "proposal_sent" => LeadStatus::ProposalSent,
            "lost" => LeadStatus::Lost,
            "dnc" => LeadStatus::Dnc,
            _ => return Err(format!("unknown lead status '{value}'")),
        };
        Ok(status)
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lead record as served by the backend. Every attribute may be missing.
///
/// Typed attributes the backend fills with values we don't know read as `None`,
/// so one odd field never costs the rest of the record.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Lead {
    pub id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub business_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub business_type: Option<BusinessType>,
    #[serde(deserialize_with = "lenient")]
    pub interest_level: Option<InterestLevel>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub status: Option<LeadStatus>,
    pub source: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub estimated_participants: Option<u32>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

impl Lead {
    /// Minimal lead built from the names the runtime passes in job metadata,
    /// used when there is no lead id or the backend could not be reached.
    pub fn from_hints(first_name: Option<String>, business_name: Option<String>) -> Self {
        Self {
            first_name: first_name.filter(|s| !s.trim().is_empty()),
            business_name: business_name.filter(|s| !s.trim().is_empty()),
            ..Self::default()
        }
    }

    pub fn interest(&self) -> InterestLevel {
        self.interest_level.unwrap_or_default()
    }

    pub fn participants(&self) -> u32 {
        self.estimated_participants
            .unwrap_or(DEFAULT_ESTIMATED_PARTICIPANTS)
    }

    pub fn has_first_name(&self) -> bool {
        non_empty(&self.first_name).is_some()
    }

    pub fn first_name_or_default(&self) -> &str {
        non_empty(&self.first_name).unwrap_or("there")
    }

    pub fn business_name_or_default(&self) -> &str {
        non_empty(&self.business_name).unwrap_or("your business")
    }

    pub fn state_or_default(&self) -> &str {
        non_empty(&self.state).unwrap_or("your state")
    }

    pub fn email_or_default(&self) -> &str {
        non_empty(&self.email).unwrap_or("your email")
    }

    /// Multi-line summary read back to the agent by `load_lead_context`.
    pub fn summary(&self) -> String {
        let dash = |v: &Option<String>| non_empty(v).unwrap_or("").to_string();
        format!(
            "Lead Information:\n\
             - Name: {} {}\n\
             - Business: {} ({})\n\
             - Email: {}\n\
             - Phone: {}\n\
             - Location: {}, {}\n\
             - Interest Level: {}\n\
             - Status: {}\n\
             - Source: {}\n\
             - Estimated Daily Visitors: {}",
            dash(&self.first_name),
            dash(&self.last_name),
            non_empty(&self.business_name).unwrap_or("Unknown"),
            self.business_type
                .map(BusinessType::as_str)
                .unwrap_or("Unknown type"),
            dash(&self.email),
            dash(&self.phone),
            dash(&self.city),
            dash(&self.state),
            self.interest().as_str(),
            self.status.unwrap_or(LeadStatus::New),
            non_empty(&self.source).unwrap_or("Unknown"),
            self.estimated_participants
                .map(|n| n.to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
        )
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_backend_shape() {
        let lead: Lead = serde_json::from_str(
            r#"{
                "id": "lead_1",
                "firstName": "Dana",
                "businessName": "Summit Fitness",
                "businessType": "gym",
                "interestLevel": "warm",
                "state": "CA",
                "status": "demo_scheduled",
                "estimatedParticipants": 320
            }"#,
        )
        .unwrap();

        assert_eq!(lead.business_type, Some(BusinessType::Gym));
        assert_eq!(lead.interest(), InterestLevel::Warm);
        assert_eq!(lead.status, Some(LeadStatus::DemoScheduled));
        assert_eq!(lead.participants(), 320);
    }

    #[test]
    fn unknown_business_type_becomes_other() {
        let lead: Lead = serde_json::from_str(r#"{"businessType": "yoga"}"#).unwrap();
        assert_eq!(lead.business_type, Some(BusinessType::Other));
    }

    #[test]
    fn enum_fields_ignore_case() {
        let lead: Lead = serde_json::from_str(
            r#"{"businessType": "Climbing", "interestLevel": "Hot", "status": "Contacted"}"#,
        )
        .unwrap();
        assert_eq!(lead.business_type, Some(BusinessType::Climbing));
        assert_eq!(lead.interest(), InterestLevel::Hot);
        assert_eq!(lead.status, Some(LeadStatus::Contacted));
    }

    #[test]
    fn unknown_values_do_not_lose_the_record() {
        let lead: Lead = serde_json::from_str(
            r#"{
                "firstName": "Dana",
                "businessType": "gym",
                "interestLevel": "lukewarm",
                "state": "CA",
                "status": "converted",
                "estimatedParticipants": "lots"
            }"#,
        )
        .unwrap();
        assert_eq!(lead.first_name.as_deref(), Some("Dana"));
        assert_eq!(lead.business_type, Some(BusinessType::Gym));
        assert_eq!(lead.state.as_deref(), Some("CA"));
        assert_eq!(lead.interest_level, None);
        assert_eq!(lead.interest(), InterestLevel::Cold);
        assert_eq!(lead.status, None);
        assert_eq!(lead.estimated_participants, None);
    }

    #[test]
    fn blank_first_name_is_not_a_name() {
        let lead: Lead = serde_json::from_str(r#"{"firstName": ""}"#).unwrap();
        assert!(!lead.has_first_name());
        assert_eq!(lead.first_name_or_default(), "there");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let lead: Lead = serde_json::from_str(r#"{"businessType": null}"#).unwrap();
        assert_eq!(lead.business_type, None);
        assert_eq!(lead.interest(), InterestLevel::Cold);
        assert_eq!(lead.participants(), DEFAULT_ESTIMATED_PARTICIPANTS);
        assert_eq!(lead.first_name_or_default(), "there");
        assert_eq!(lead.business_name_or_default(), "your business");
    }

    #[test]
    fn blank_hints_are_ignored() {
        let lead = Lead::from_hints(Some("  ".into()), Some("Boulder Barn".into()));
        assert_eq!(lead.first_name, None);
        assert_eq!(lead.business_name_or_default(), "Boulder Barn");
    }

    #[test]
    fn summary_lists_key_fields() {
        let lead = Lead {
            first_name: Some("Dana".into()),
            business_name: Some("Summit Fitness".into()),
            business_type: Some(BusinessType::Gym),
            ..Lead::default()
        };
        let summary = lead.summary();
        assert!(summary.contains("Summit Fitness (gym)"));
        assert!(summary.contains("Interest Level: cold"));
        assert!(summary.contains("Estimated Daily Visitors: Unknown"));
    }
}
