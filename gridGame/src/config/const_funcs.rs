use crate::config::constants::*;

/// Fixed cost of one MW installed for one week, in EUR.
///
/// Capital cost is spread evenly over the cost recovery period and added to
/// the yearly fixed O&M before both are converted to EUR per MW per week.
pub fn weekly_capacity_cost(capex_usd_per_kw: f64, lifetime_years: f64, fixed_om_usd_per_kw_year: f64) -> f64 {
    let yearly_usd_per_kw = capex_usd_per_kw / lifetime_years + fixed_om_usd_per_kw_year;
    yearly_usd_per_kw * USD_TO_EUR * KW_PER_MW / WEEKS_PER_YEAR
}

/// Scale a weekly fixed cost to a profile of `duration_hours`.
pub fn profile_cost_scale(duration_hours: f64) -> f64 {
    duration_hours / HOURS_PER_WEEK
}

/// Per-week seed so that results do not depend on worker scheduling order.
pub fn week_seed(base_seed: u64, week: u32) -> u64 {
    base_seed ^ (week as u64).wrapping_mul(WEEK_SEED_STRIDE)
}
