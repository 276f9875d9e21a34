const MIN_RACES_PER_YEAR: u32 = 2;
const MIN_WORKOUTS_PER_WEEK: u32 = 2;

/// Upsell eligibility from self-reported activity frequency. Both thresholds are inclusive.
///
/// Counts are unsigned, so negative input is rejected at the tool boundary
/// when the arguments are deserialized.
pub fn is_qualified_for_upsell(races_per_year: u32, workouts_per_week: u32) -> bool {
    races_per_year >= MIN_RACES_PER_YEAR && workouts_per_week >= MIN_WORKOUTS_PER_WEEK
}
