use super::library::ScriptLibrary;
use super::{Region, Script};
use crate::lead::{BusinessType, InterestLevel};

/// Pick the script for a lead.
///
/// Order: region overlay (merged onto the base when one is found), then an exact
/// business type and interest match, then an any-type match for the interest,
/// then the library default. Never fails.
pub fn select_script(
    library: &ScriptLibrary,
    business_type: Option<BusinessType>,
    interest_level: InterestLevel,
    region: Option<&str>,
) -> Script {
    let overlay = region
        .and_then(Region::from_state)
        .and_then(|r| library.overlay(r));

    let base = find_base(library, business_type, interest_level);

    match overlay {
        Some(overlay) => merge(base, overlay),
        None => base.clone(),
    }
}

/// Steps 2-4 of selection. The default makes this total, so the region step
/// always merges onto a base.
fn find_base(
    library: &ScriptLibrary,
    business_type: Option<BusinessType>,
    interest_level: InterestLevel,
) -> &Script {
    if let Some(bt) = business_type {
        if let Some(exact) = library
            .base_scripts()
            .find(|s| s.business_type == Some(bt) && s.interest_level == Some(interest_level))
        {
            return exact;
        }
    }

    library
        .base_scripts()
        .find(|s| s.business_type.is_none() && s.interest_level == Some(interest_level))
        .unwrap_or_else(|| library.default_script())
}

/// Lay `overlay` over `base` and return the result; neither input is modified.
///
/// Present overlay values replace base values, except talking points, which are
/// appended after the base's, and objection handlers, which are merged by key
/// with the overlay winning.
pub fn merge(base: &Script, overlay: &Script) -> Script {
    let mut merged = base.clone();

    merged.key = format!("{}+{}", base.key, overlay.key);
    if !overlay.name.is_empty() {
        merged.name = overlay.name.clone();
    }
    if overlay.business_type.is_some() {
        merged.business_type = overlay.business_type;
    }
    if overlay.interest_level.is_some() {
        merged.interest_level = overlay.interest_level;
    }
    if overlay.region.is_some() {
        merged.region = overlay.region;
    }
    if let Some(text) = present(&overlay.system_prompt) {
        merged.system_prompt = Some(text.to_string());
    }
    if let Some(text) = present(&overlay.opening) {
        merged.opening = Some(text.to_string());
    }
    if let Some(text) = present(&overlay.closing) {
        merged.closing = Some(text.to_string());
    }

    merged
        .key_points
        .extend(overlay.key_points.iter().cloned());
    for (objection, rebuttal) in &overlay.objection_handlers {
        merged
            .objection_handlers
            .insert(objection.clone(), rebuttal.clone());
    }

    merged
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}
