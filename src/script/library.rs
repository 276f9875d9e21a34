use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use super::{ObjectionHandlers, Region, Script};
use crate::lead::{BusinessType, InterestLevel};

/// Key of the compiled-in fallback script.
pub const BUILTIN_DEFAULT_KEY: &str = "cold_any";

/// Immutable catalog of scripts, kept in insertion order.
///
/// Always holds exactly one default script (any business type, cold interest,
/// no region); construction fails otherwise.
#[derive(Debug, Clone)]
pub struct ScriptLibrary {
    scripts: Vec<Script>,
    default_index: usize,
}

/// On-disk catalog shape:
///
/// ```toml
/// default = "cold_any"
///
/// [[script]]
/// key = "cold_any"
/// name = "Cold Lead - Any Business"
/// interest_level = "cold"
/// ```
#[derive(Deserialize)]
struct CatalogFile {
    default: String,
    #[serde(rename = "script", default)]
    scripts: Vec<Script>,
}

impl ScriptLibrary {
    pub fn new(scripts: Vec<Script>, default_key: &str) -> Result<Self, LibraryError> {
        let mut seen = HashSet::new();
        for script in &scripts {
            if !seen.insert(script.key.as_str()) {
                return Err(LibraryError::DuplicateKey(script.key.clone()));
            }
        }

        let default_index = scripts
            .iter()
            .position(|s| s.key == default_key)
            .ok_or_else(|| LibraryError::MissingDefault(default_key.to_string()))?;

        let default = &scripts[default_index];
        if default.business_type.is_some()
            || default.interest_level != Some(InterestLevel::Cold)
            || default.region.is_some()
        {
            return Err(LibraryError::InvalidDefault(default_key.to_string()));
        }

        Ok(Self {
            scripts,
            default_index,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, LibraryError> {
        let file: CatalogFile =
            toml::from_str(contents).map_err(|e| LibraryError::Parse(e.to_string()))?;
        Self::new(file.scripts, &file.default)
    }

    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LibraryError::Read(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    pub fn scripts(&self) -> &[Script] {
        &self.scripts
    }

    pub fn default_script(&self) -> &Script {
        &self.scripts[self.default_index]
    }

    pub fn get(&self, key: &str) -> Option<&Script> {
        self.scripts.iter().find(|s| s.key == key)
    }

    /// First overlay registered for the region.
    pub fn overlay(&self, region: Region) -> Option<&Script> {
        self.scripts.iter().find(|s| s.region == Some(region))
    }

    /// Scripts usable as a base, in catalog order (region overlays excluded).
    pub(crate) fn base_scripts(&self) -> impl Iterator<Item = &Script> {
        self.scripts.iter().filter(|s| s.region.is_none())
    }

    /// The compiled-in catalog.
    pub fn builtin() -> Self {
        let scripts = builtin_scripts();
        let default_index = scripts
            .iter()
            .position(|s| s.key == BUILTIN_DEFAULT_KEY)
            .unwrap_or(0);
        Self {
            scripts,
            default_index,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Failed to read script catalog {0}")]
    Read(String),
    #[error("Failed to parse script catalog: {0}")]
    Parse(String),
    #[error("Duplicate script key: {0}")]
    DuplicateKey(String),
    #[error("Default script '{0}' is not in the catalog")]
    MissingDefault(String),
    #[error("Default script '{0}' must target any business type, cold interest and no region")]
    InvalidDefault(String),
}

fn points(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn handlers(items: &[(&str, &str)]) -> ObjectionHandlers {
    items.iter().copied().collect()
}

fn builtin_scripts() -> Vec<Script> {
    vec![
        Script {
            key: "cold_gym".into(),
            name: "Cold Lead - Gym".into(),
            business_type: Some(BusinessType::Gym),
            interest_level: Some(InterestLevel::Cold),
            region: None,
            system_prompt: Some(
                "For cold gym leads:\n\
                 1. Be respectful of their time - they're busy\n\
                 2. Lead with the revenue opportunity\n\
                 3. Ask about their member volume to calculate potential earnings\n\
                 4. Mention competitor success stories"
                    .into(),
            ),
            opening: Some(
                "Hi, is this {first_name}? Great! I'm reaching out because we help fitness \
                 facilities like {business_name} add a new revenue stream through same-day \
                 coverage for members. I know you're busy - do you have just 60 seconds?"
                    .into(),
            ),
            key_points: points(&[
                "Zero cost to implement",
                "50% commission on every policy",
                "100 members = $250/month passive income",
                "Members appreciate the coverage option",
            ]),
            objection_handlers: handlers(&[
                (
                    "already have insurance",
                    "Perfect - this doesn't replace your liability coverage. It's optional \
                     coverage your members can purchase for specific activities. Many gyms with \
                     great insurance still offer this as an extra layer of protection.",
                ),
                (
                    "not interested",
                    "I understand. Before I go, can I just ask - do you have many members who \
                     participate in higher-risk activities like weightlifting or group classes?",
                ),
                (
                    "too expensive",
                    "There's actually no cost to you at all. We handle everything - you just \
                     earn 50% of each $4.99 policy your members purchase.",
                ),
            ]),
            closing: Some(
                "Based on your {estimated_participants} monthly members, you're looking at about \
                 ${projected_revenue} in additional monthly revenue with zero overhead. Can I set \
                 up a quick 10-minute demo to show you how simple it is?"
                    .into(),
            ),
        },
        Script {
            key: "warm_climbing".into(),
            name: "Warm Lead - Climbing Gym".into(),
            business_type: Some(BusinessType::Climbing),
            interest_level: Some(InterestLevel::Warm),
            region: None,
            system_prompt: Some(
                "For warm climbing gym leads:\n\
                 1. Reference their previous interest\n\
                 2. Climbing gyms often have higher liability concerns - address this\n\
                 3. Mention our waiver integration\n\
                 4. Push toward scheduling a demo"
                    .into(),
            ),
            opening: Some(
                "Hi {first_name}! Following up - you had looked at our partner program for \
                 {business_name}. I wanted to personally reach out and see if you had any \
                 questions I could answer."
                    .into(),
            ),
            key_points: points(&[
                "Climbing-specific coverage for falls and injuries",
                "Integrates with your existing waiver system",
                "Popular with other climbing gyms in {state}",
                "Real-time policy issuance",
            ]),
            objection_handlers: handlers(&[
                (
                    "need to think about it",
                    "Absolutely, take your time. What specific questions do you have that I \
                     could help address now?",
                ),
                (
                    "need to talk to partner",
                    "Of course! Would it be helpful if I set up a call with both of you? I'm \
                     flexible on timing.",
                ),
            ]),
            closing: Some(
                "We have several climbing gyms in {state} already earning with us. The fastest \
                 way to see if it's right for {business_name} is a quick 10-minute screen share. \
                 How's Thursday or Friday this week?"
                    .into(),
            ),
        },
        Script {
            key: "hot_any".into(),
            name: "Hot Lead - Any Business".into(),
            business_type: None,
            interest_level: Some(InterestLevel::Hot),
            region: None,
            system_prompt: Some(
                "For hot leads:\n\
                 1. They're ready to move - don't over-sell\n\
                 2. Focus on next steps and removing friction\n\
                 3. Offer to send the agreement immediately\n\
                 4. Get commitment on implementation timeline"
                    .into(),
            ),
            opening: Some(
                "Hi {first_name}! I noticed you've been looking at our partner program and \
                 wanted to personally connect. Looks like {business_name} would be a great fit - \
                 what questions can I answer?"
                    .into(),
            ),
            key_points: points(&[
                "Fast onboarding - live in 48 hours",
                "Dedicated partner success manager",
                "Monthly commission payouts via ACH",
                "Marketing materials included",
            ]),
            objection_handlers: handlers(&[
                (
                    "want to see the agreement first",
                    "Absolutely! I can send that over right now. It's a straightforward 2-page \
                     partner agreement. What email should I use?",
                ),
                (
                    "worried about customer complaints",
                    "Great question. We handle all customer service. Your members contact us \
                     directly for any claims or questions.",
                ),
            ]),
            closing: Some(
                "Based on {estimated_participants} monthly participants, you're looking at \
                 ${projected_revenue} monthly. I can have the partner agreement in your inbox in \
                 5 minutes. Should I send it to {email}?"
                    .into(),
            ),
        },
        Script {
            key: BUILTIN_DEFAULT_KEY.into(),
            name: "Cold Lead - Any Business".into(),
            business_type: None,
            interest_level: Some(InterestLevel::Cold),
            region: None,
            system_prompt: Some(
                "For cold leads:\n\
                 1. Start with rapport building\n\
                 2. Understand their pain points before pitching\n\
                 3. Get the four discovery items: business type, daily visitors, current \
                 insurance, timeline"
                    .into(),
            ),
            opening: Some(
                "Hi {first_name}, you recently submitted an inquiry about offering insurance \
                 coverage at {business_name}. Do you have a quick moment?"
                    .into(),
            ),
            key_points: points(&[
                "Same-day liability coverage for members and visitors ($5-15/day)",
                "15-25% commission on every policy sold",
                "Zero implementation cost - setup takes 2-3 hours",
                "Reduces claims against your existing liability policy",
            ]),
            objection_handlers: handlers(&[
                (
                    "we already have insurance",
                    "That's great - liability coverage is essential. This is participant \
                     accident coverage your members purchase themselves, and it protects YOUR \
                     policy by reducing claims against it.",
                ),
                (
                    "our members won't pay for it",
                    "When coverage is optional and affordable - $5-15 per session - members who \
                     want extra protection are happy to pay. It's especially popular with \
                     first-timers and visitors.",
                ),
                (
                    "we don't have time to implement",
                    "Setup takes about 2-3 hours with our team handling most of the technical \
                     work. After that, it runs automatically.",
                ),
            ]),
            closing: Some(
                "Based on what you've shared, a quick 15-minute demo would show exactly how this \
                 works for {business_name}. When works for you?"
                    .into(),
            ),
        },
        Script {
            key: "california_specific".into(),
            name: "California Leads".into(),
            business_type: None,
            interest_level: None,
            region: Some(Region::California),
            system_prompt: Some(
                "California-specific notes:\n\
                 1. Reference California insurance regulations (we're fully compliant)\n\
                 2. Mention California-based partners like ClimbX San Diego, Summit Fitness LA\n\
                 3. Be aware of the stricter liability environment in CA\n\
                 4. Mention our California-specific policy language"
                    .into(),
            ),
            opening: None,
            key_points: points(&[
                "Fully compliant with California insurance regulations",
                "Working with ClimbX in San Diego and Summit Fitness in LA",
                "California-specific policy language",
                "Understands CA's liability environment",
            ]),
            objection_handlers: ObjectionHandlers::default(),
            closing: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_default_satisfies_invariant() {
        let lib = ScriptLibrary::builtin();
        let default = lib.default_script();
        assert_eq!(default.key, BUILTIN_DEFAULT_KEY);
        assert_eq!(default.business_type, None);
        assert_eq!(default.interest_level, Some(InterestLevel::Cold));

        // Revalidating the built-in catalog through the checked constructor must succeed.
        ScriptLibrary::new(lib.scripts().to_vec(), BUILTIN_DEFAULT_KEY).unwrap();
    }

    #[test]
    fn builtin_has_california_overlay() {
        let lib = ScriptLibrary::builtin();
        let overlay = lib.overlay(Region::California).unwrap();
        assert_eq!(overlay.key, "california_specific");
        assert!(lib.base_scripts().all(|s| s.region.is_none()));
    }

    #[test]
    fn rejects_missing_default() {
        let lib = ScriptLibrary::builtin();
        let err = ScriptLibrary::new(lib.scripts().to_vec(), "nope").unwrap_err();
        assert!(matches!(err, LibraryError::MissingDefault(_)));
    }

    #[test]
    fn rejects_default_with_filters() {
        let lib = ScriptLibrary::builtin();
        let err = ScriptLibrary::new(lib.scripts().to_vec(), "cold_gym").unwrap_err();
        assert!(matches!(err, LibraryError::InvalidDefault(_)));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let lib = ScriptLibrary::builtin();
        let mut scripts = lib.scripts().to_vec();
        scripts.push(lib.default_script().clone());
        let err = ScriptLibrary::new(scripts, BUILTIN_DEFAULT_KEY).unwrap_err();
        assert!(matches!(err, LibraryError::DuplicateKey(_)));
    }

    #[test]
    fn parses_toml_catalog() {
        let lib = ScriptLibrary::from_toml_str(
            r#"
default = "fallback"

[[script]]
key = "warm_rental"
name = "Warm Rental"
business_type = "rental"
interest_level = "warm"
key_points = ["Equipment damage and injury coverage bundled"]

[script.objection_handlers]
"too busy" = "Setup takes an afternoon."
"already have insurance" = "This covers day visitors your policy doesn't."

[[script]]
key = "fallback"
name = "Fallback"
interest_level = "cold"
"#,
        )
        .unwrap();

        assert_eq!(lib.scripts().len(), 2);
        assert_eq!(lib.default_script().key, "fallback");
        let rental = lib.get("warm_rental").unwrap();
        assert_eq!(rental.business_type, Some(BusinessType::Rental));
        assert_eq!(rental.objection_handlers["too busy"], "Setup takes an afternoon.");
        let order: Vec<&str> = rental
            .objection_handlers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(order, vec!["too busy", "already have insurance"]);
    }

    #[test]
    fn example_catalog_is_valid() {
        let lib = ScriptLibrary::from_toml_str(include_str!("../../scripts.example.toml")).unwrap();
        assert!(lib.overlay(Region::California).is_some());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = ScriptLibrary::from_toml_str("default = ").unwrap_err();
        assert!(matches!(err, LibraryError::Parse(_)));
    }
}
