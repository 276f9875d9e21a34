pub mod library;
pub mod select;

use std::fmt;
use std::ops::Index;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::lead::{BusinessType, InterestLevel, Lead};

pub use library::{LibraryError, ScriptLibrary};
pub use select::select_script;

/// Partner commission per participant per month, in cents.
/// Half of a $4.99 policy, rounded so 100 members earn $250.
const REVENUE_PER_PARTICIPANT_CENTS: u64 = 250;

/// Geographic regions that carry their own script overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    California,
}

impl Region {
    /// Resolve a lead's free-form state field. Unknown states have no overlay.
    pub fn from_state(state: &str) -> Option<Self> {
        match state.trim().to_ascii_lowercase().as_str() {
            "california" | "ca" => Some(Region::California),
            _ => None,
        }
    }
}

/// A bundle of conversational content for one kind of lead.
///
/// `None` filters mean "any". Overlay scripts usually leave most fields empty
/// and are merged onto a base script rather than used alone.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Script {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub business_type: Option<BusinessType>,
    #[serde(default)]
    pub interest_level: Option<InterestLevel>,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub opening: Option<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub objection_handlers: ObjectionHandlers,
    #[serde(default)]
    pub closing: Option<String>,
}

/// Objection to rebuttal pairs, kept in the order they were written.
/// Inserting an existing objection replaces its rebuttal in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectionHandlers(Vec<(String, String)>);

impl ObjectionHandlers {
    pub fn insert(&mut self, objection: String, rebuttal: String) {
        match self.0.iter_mut().find(|(k, _)| *k == objection) {
            Some(entry) => entry.1 = rebuttal,
            None => self.0.push((objection, rebuttal)),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (String, String)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ObjectionHandlers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut handlers = ObjectionHandlers::default();
        for (k, v) in iter {
            handlers.insert(k.into(), v.into());
        }
        handlers
    }
}

impl<'a> IntoIterator for &'a ObjectionHandlers {
    type Item = &'a (String, String);
    type IntoIter = std::slice::Iter<'a, (String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Index<&str> for ObjectionHandlers {
    type Output = String;

    fn index(&self, objection: &str) -> &String {
        match self.0.iter().find(|(k, _)| k == objection) {
            Some((_, rebuttal)) => rebuttal,
            None => panic!("no handler for objection '{objection}'"),
        }
    }
}

impl Serialize for ObjectionHandlers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ObjectionHandlers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HandlersVisitor;

        impl<'de> Visitor<'de> for HandlersVisitor {
            type Value = ObjectionHandlers;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of objection = rebuttal")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut handlers = ObjectionHandlers::default();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    handlers.insert(k, v);
                }
                Ok(handlers)
            }
        }

        deserializer.deserialize_map(HandlersVisitor)
    }
}

impl Script {
    /// Resolve every template placeholder against the lead.
    pub fn render(&self, lead: &Lead) -> RenderedScript {
        let vars = TemplateVars::from_lead(lead);
        RenderedScript {
            key: self.key.clone(),
            name: self.name.clone(),
            system_prompt: self.system_prompt.as_deref().map(|t| vars.fill(t)),
            opening: self.opening.as_deref().map(|t| vars.fill(t)),
            key_points: self.key_points.iter().map(|t| vars.fill(t)).collect(),
            objection_handlers: self
                .objection_handlers
                .iter()
                .map(|(k, v)| (k.clone(), vars.fill(v)))
                .collect(),
            closing: self.closing.as_deref().map(|t| vars.fill(t)),
        }
    }
}

/// A script with all placeholders filled for a specific lead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedScript {
    pub key: String,
    pub name: String,
    pub system_prompt: Option<String>,
    pub opening: Option<String>,
    pub key_points: Vec<String>,
    pub objection_handlers: ObjectionHandlers,
    pub closing: Option<String>,
}

impl RenderedScript {
    /// Session instructions: the persona prompt followed by this script's content.
    pub fn instructions(&self, persona_prompt: &str) -> String {
        let mut out = String::from(persona_prompt.trim_end());

        if let Some(ref prompt) = self.system_prompt {
            out.push_str("\n\n## LEAD-SPECIFIC GUIDANCE\n");
            out.push_str(prompt.trim());
        }
        if let Some(ref opening) = self.opening {
            out.push_str("\n\n## OPENING\n");
            out.push_str(opening);
        }
        if !self.key_points.is_empty() {
            out.push_str("\n\n## KEY TALKING POINTS\n");
            for point in &self.key_points {
                out.push_str("- ");
                out.push_str(point);
                out.push('\n');
            }
            out.truncate(out.trim_end().len());
        }
        if !self.objection_handlers.is_empty() {
            out.push_str("\n\n## OBJECTIONS\n");
            for (objection, rebuttal) in &self.objection_handlers {
                out.push_str(&format!("**\"{objection}\"**\n> {rebuttal}\n"));
            }
            out.truncate(out.trim_end().len());
        }
        if let Some(ref closing) = self.closing {
            out.push_str("\n\n## CLOSE\n");
            out.push_str(closing);
        }

        out
    }
}

struct TemplateVars<'a> {
    first_name: &'a str,
    business_name: &'a str,
    state: &'a str,
    email: &'a str,
    participants: u32,
}

impl<'a> TemplateVars<'a> {
    fn from_lead(lead: &'a Lead) -> Self {
        Self {
            first_name: lead.first_name_or_default(),
            business_name: lead.business_name_or_default(),
            state: lead.state_or_default(),
            email: lead.email_or_default(),
            participants: lead.participants(),
        }
    }

    fn value(&self, name: &str) -> Option<String> {
        let value = match name {
            "first_name" => self.first_name.to_string(),
            "business_name" => self.business_name.to_string(),
            "state" => self.state.to_string(),
            "email" => self.email.to_string(),
            "estimated_participants" => group_thousands(u64::from(self.participants)),
            "projected_revenue" => group_thousands(projected_monthly_revenue(self.participants)),
            _ => return None,
        };
        Some(value)
    }

    /// Single pass over the template: substituted text is never rescanned, and
    /// unknown `{names}` are left as written.
    fn fill(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let resolved = after
                .find('}')
                .and_then(|close| self.value(&after[..close]).map(|v| (close, v)));
            match resolved {
                Some((close, value)) => {
                    out.push_str(&value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }
}

/// Projected monthly commission in whole dollars for a participant count.
pub fn projected_monthly_revenue(participants: u32) -> u64 {
    u64::from(participants) * REVENUE_PER_PARTICIPANT_CENTS / 100
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
