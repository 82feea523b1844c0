//! Merit-order dispatch of a capacity vector against a weekly profile.
//!
//! Every timestep is dispatched independently: priority sources (intermittent
//! and firm renewable) first, then dispatchable sources in ascending unit
//! cost. Whatever demand is left after all deliverable capacity is used is a
//! shortfall; whatever deliverable capacity is left unused is surplus.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::analysis::windows::{find_windows, Window};
use crate::config::const_funcs::profile_cost_scale;
use crate::config::constants::WINDOW_TOLERANCE_MW;
use crate::config::game_config::ObjectiveConfig;
use crate::error::Result;
use crate::models::capacity::CapacityVector;
use crate::models::profile::Profile;
use crate::models::source::SourceSet;

/// Week totals for a single source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceTotals {
    /// MW
    pub installed: f64,
    /// MWh
    pub dispatched: f64,
    /// MWh of deliverable energy left unused.
    pub surplus: f64,
    /// EUR, operating cost of dispatched energy.
    pub cost: f64,
    /// EUR, fixed cost of installed capacity.
    pub capacity_cost: f64,
    /// tCO2e
    pub emissions: f64,
    /// EUR, priced emissions.
    pub carbon_cost: f64,
}

/// Aggregate outcome of dispatching one capacity vector over one profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub cost: f64,
    pub capacity_cost: f64,
    pub carbon_cost: f64,
    pub emissions: f64,
    /// MWh of unmet demand.
    pub shortfall: f64,
    pub surplus: f64,
    /// MWh of demand over the profile.
    pub demand: f64,
    /// `cost + capacity_cost + carbon_cost`, the quantity the solver minimises.
    pub objective: f64,
    pub blackout_steps: usize,
    pub sources: BTreeMap<String, SourceTotals>,
}

impl Score {
    /// Demand met at every timestep.
    pub fn is_feasible(&self) -> bool {
        self.shortfall == 0.0
    }

    /// MWh of demand actually served.
    pub fn served(&self) -> f64 {
        self.demand - self.shortfall
    }

    /// Objective per MWh served; `None` when nothing was served.
    pub fn cost_per_mwh(&self) -> Option<f64> {
        let served = self.served();
        if served > 0.0 {
            Some(self.objective / served)
        } else {
            None
        }
    }
}

/// Objective and shortfall only, for the search loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub objective: f64,
    pub shortfall: f64,
}

/// Dispatch of one timestep, values per source in catalogue order (MW).
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchStep {
    pub timestamp: NaiveDateTime,
    pub demand: f64,
    pub dispatched: Vec<f64>,
    pub surplus: Vec<f64>,
    pub shortfall: f64,
}

impl DispatchStep {
    pub fn is_blackout(&self) -> bool {
        self.shortfall > 0.0
    }

    pub fn total_surplus(&self) -> f64 {
        self.surplus.iter().sum()
    }
}

/// Full per-timestep dispatch together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub sources: Vec<String>,
    pub step_hours: f64,
    pub steps: Vec<DispatchStep>,
    pub score: Score,
}

impl DispatchReport {
    fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.steps.iter().map(|s| s.timestamp).collect()
    }

    /// Contiguous runs of unmet demand.
    pub fn blackout_windows(&self) -> Vec<Window> {
        let shortfall: Vec<f64> = self.steps.iter().map(|s| s.shortfall).collect();
        find_windows(&shortfall, &self.timestamps(), self.step_hours, 0.0)
    }

    /// Contiguous runs of curtailed or idle capacity.
    pub fn surplus_windows(&self) -> Vec<Window> {
        let surplus: Vec<f64> = self.steps.iter().map(DispatchStep::total_surplus).collect();
        find_windows(&surplus, &self.timestamps(), self.step_hours, WINDOW_TOLERANCE_MW)
    }
}

/// A profile and source set prepared for repeated dispatch.
pub struct Dispatcher<'a> {
    sources: &'a SourceSet,
    profile: &'a Profile,
    order: Vec<usize>,
    availability: Vec<Option<&'a [f64]>>,
    /// EUR per MWh: unit cost plus priced emissions.
    marginal_rates: Vec<f64>,
    carbon_prices: Vec<f64>,
    /// EUR per MW installed over the whole profile.
    capacity_rates: Vec<f64>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(sources: &'a SourceSet, profile: &'a Profile, objective: &ObjectiveConfig) -> Result<Self> {
        profile.validate(sources)?;

        let scale = profile_cost_scale(profile.duration_hours());
        let availability = sources
            .iter()
            .map(|s| {
                if s.class.uses_availability() {
                    profile.availability_for(&s.name)
                } else {
                    None
                }
            })
            .collect();
        let carbon_prices: Vec<f64> = sources.iter().map(|s| objective.carbon_price(s)).collect();
        let marginal_rates = sources
            .iter()
            .zip(&carbon_prices)
            .map(|(s, price)| s.unit_cost + s.emissions_intensity * price)
            .collect();
        let capacity_rates = sources.iter().map(|s| s.capacity_cost * scale).collect();

        Ok(Self {
            sources,
            profile,
            order: sources.merit_order(),
            availability,
            marginal_rates,
            carbon_prices,
            capacity_rates,
        })
    }

    pub fn sources(&self) -> &'a SourceSet {
        self.sources
    }

    pub fn profile(&self) -> &'a Profile {
        self.profile
    }

    pub fn marginal_rates(&self) -> &[f64] {
        &self.marginal_rates
    }

    pub fn capacity_rates(&self) -> &[f64] {
        &self.capacity_rates
    }

    /// Dispatch order as catalogue indices.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Share of installed capacity deliverable at step `t`.
    pub fn availability_at(&self, source: usize, t: usize) -> f64 {
        match self.availability[source] {
            Some(factors) => factors[t],
            None => 1.0,
        }
    }

    /// Fill `dispatched` for step `t` and return the unmet demand in MW.
    fn dispatch_step(&self, t: usize, caps: &[f64], dispatched: &mut [f64]) -> f64 {
        let mut remaining = self.profile.demand[t];
        for &i in &self.order {
            let deliverable = caps[i] * self.availability_at(i, t);
            let used = deliverable.min(remaining);
            dispatched[i] = used;
            remaining -= used;
        }
        remaining.max(0.0)
    }

    /// Objective and shortfall of a dense, already validated capacity vector.
    pub fn evaluate_dense(&self, caps: &[f64]) -> Evaluation {
        let dt = self.profile.step_hours;
        let mut dispatched = vec![0.0; caps.len()];
        let mut energy_cost = 0.0;
        let mut shortfall = 0.0;

        for t in 0..self.profile.len() {
            shortfall += self.dispatch_step(t, caps, &mut dispatched) * dt;
            energy_cost += dispatched
                .iter()
                .zip(&self.marginal_rates)
                .map(|(mw, rate)| mw * rate)
                .sum::<f64>()
                * dt;
        }

        let fixed_cost: f64 = caps.iter().zip(&self.capacity_rates).map(|(mw, rate)| mw * rate).sum();
        Evaluation {
            objective: energy_cost + fixed_cost,
            shortfall,
        }
    }

    fn run(&self, caps: &[f64], mut on_step: impl FnMut(usize, &[f64], f64)) -> Score {
        let dt = self.profile.step_hours;
        let n = caps.len();
        let mut dispatched = vec![0.0; n];
        let mut energy = vec![0.0; n];
        let mut surplus = vec![0.0; n];
        let mut score = Score {
            demand: self.profile.total_demand(),
            ..Score::default()
        };

        for t in 0..self.profile.len() {
            let short = self.dispatch_step(t, caps, &mut dispatched);
            if short > 0.0 {
                score.blackout_steps += 1;
            }
            score.shortfall += short * dt;
            for i in 0..n {
                energy[i] += dispatched[i] * dt;
                surplus[i] += (caps[i] * self.availability_at(i, t) - dispatched[i]).max(0.0) * dt;
            }
            on_step(t, &dispatched, short);
        }

        for (i, source) in self.sources.iter().enumerate() {
            let emissions = energy[i] * source.emissions_intensity;
            let totals = SourceTotals {
                installed: caps[i],
                dispatched: energy[i],
                surplus: surplus[i],
                cost: energy[i] * source.unit_cost,
                capacity_cost: caps[i] * self.capacity_rates[i],
                emissions,
                carbon_cost: emissions * self.carbon_prices[i],
            };
            score.cost += totals.cost;
            score.capacity_cost += totals.capacity_cost;
            score.carbon_cost += totals.carbon_cost;
            score.emissions += totals.emissions;
            score.surplus += totals.surplus;
            score.sources.insert(source.name.clone(), totals);
        }
        score.objective = score.cost + score.capacity_cost + score.carbon_cost;
        score
    }

    pub fn score_dense(&self, caps: &[f64]) -> Score {
        self.run(caps, |_, _, _| {})
    }

    pub fn score(&self, capacity: &CapacityVector) -> Result<Score> {
        let caps = capacity.to_dense(self.sources)?;
        Ok(self.score_dense(&caps))
    }

    pub fn report(&self, capacity: &CapacityVector) -> Result<DispatchReport> {
        let caps = capacity.to_dense(self.sources)?;
        let mut steps = Vec::with_capacity(self.profile.len());
        let score = self.run(&caps, |t, dispatched, shortfall| {
            let surplus = (0..caps.len())
                .map(|i| (caps[i] * self.availability_at(i, t) - dispatched[i]).max(0.0))
                .collect();
            steps.push(DispatchStep {
                timestamp: self.profile.timestamps[t],
                demand: self.profile.demand[t],
                dispatched: dispatched.to_vec(),
                surplus,
                shortfall,
            });
        });
        Ok(DispatchReport {
            sources: self.sources.iter().map(|s| s.name.clone()).collect(),
            step_hours: self.profile.step_hours,
            steps,
            score,
        })
    }
}

/// Score a candidate capacity vector with the default objective.
pub fn evaluate(sources: &SourceSet, capacity: &CapacityVector, profile: &Profile) -> Result<Score> {
    evaluate_with(sources, capacity, profile, &ObjectiveConfig::default())
}

pub fn evaluate_with(
    sources: &SourceSet,
    capacity: &CapacityVector,
    profile: &Profile,
    objective: &ObjectiveConfig,
) -> Result<Score> {
    Dispatcher::new(sources, profile, objective)?.score(capacity)
}

pub fn dispatch_report(
    sources: &SourceSet,
    capacity: &CapacityVector,
    profile: &Profile,
    objective: &ObjectiveConfig,
) -> Result<DispatchReport> {
    Dispatcher::new(sources, profile, objective)?.report(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridError;
    use crate::models::source::{Source, SourceClass};
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn mixed_sources() -> SourceSet {
        SourceSet::new(vec![
            Source::new("wind", SourceClass::Intermittent, 0.0, 0.0),
            Source::new("coal", SourceClass::Dispatchable, 30.0, 1.0),
            Source::new("gas", SourceClass::Dispatchable, 20.0, 0.5),
        ])
        .unwrap()
    }

    fn mixed_profile() -> Profile {
        Profile::from_demand(1, start(), 1.0, vec![100.0, 120.0, 80.0, 150.0])
            .with_availability("wind", vec![0.5, 0.0, 1.0, 0.25])
    }

    #[test]
    fn single_source_scores_energy_times_cost() {
        let sources = SourceSet::new(vec![Source::new("gas", SourceClass::Dispatchable, 1.0, 0.0)]).unwrap();
        let profile = Profile::from_demand(1, start(), 1.0, vec![100.0; 10]);
        let score = evaluate(&sources, &CapacityVector::new().with("gas", 100.0), &profile).unwrap();
        assert_eq!(score.cost, 1000.0);
        assert_eq!(score.shortfall, 0.0);
        assert!(score.is_feasible());
        assert_eq!(score.objective, 1000.0);
    }

    #[test]
    fn cheaper_dispatchable_goes_first() {
        let sources = mixed_sources();
        let profile = Profile::from_demand(1, start(), 1.0, vec![50.0]).with_availability("wind", vec![0.0]);
        let caps = CapacityVector::new().with("coal", 50.0).with("gas", 50.0);
        let score = evaluate_with(&sources, &caps, &profile, &ObjectiveConfig::cost_only()).unwrap();
        assert_eq!(score.sources["gas"].dispatched, 50.0);
        assert_eq!(score.sources["coal"].dispatched, 0.0);
        assert_eq!(score.sources["coal"].surplus, 50.0);
        assert_eq!(score.cost, 1000.0);
    }

    #[test]
    fn intermittent_dispatched_before_dispatchable() {
        let sources = mixed_sources();
        let caps = CapacityVector::new().with("wind", 100.0).with("gas", 200.0);
        let report = dispatch_report(&sources, &caps, &mixed_profile(), &ObjectiveConfig::default()).unwrap();
        let wind = 0;
        let gas = 2;
        assert_eq!(report.steps[0].dispatched[wind], 50.0);
        assert_eq!(report.steps[0].dispatched[gas], 50.0);
        // Full wind covers the 80 MW step and leaves 20 MW curtailed
        assert_eq!(report.steps[2].dispatched[wind], 80.0);
        assert_eq!(report.steps[2].surplus[wind], 20.0);
        assert_eq!(report.steps[2].dispatched[gas], 0.0);
    }

    #[test]
    fn shortfall_when_capacity_is_insufficient() {
        let sources = mixed_sources();
        let caps = CapacityVector::new().with("gas", 100.0);
        let report = dispatch_report(&sources, &caps, &mixed_profile(), &ObjectiveConfig::default()).unwrap();
        assert_eq!(report.score.shortfall, 20.0 + 50.0);
        assert_eq!(report.score.blackout_steps, 2);
        assert!(!report.score.is_feasible());
        assert!(report.steps[1].is_blackout());
        assert_eq!(report.steps[1].dispatched[2], 100.0);
        assert_eq!(report.blackout_windows().len(), 2);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let sources = mixed_sources();
        let caps = CapacityVector::new().with("wind", 73.3).with("gas", 61.7).with("coal", 12.9);
        let a = evaluate(&sources, &caps, &mixed_profile()).unwrap();
        let b = evaluate(&sources, &caps, &mixed_profile()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fast_path_matches_full_score() {
        let sources = SourceSet::default_catalog();
        let profile = Profile::from_demand(1, start(), 1.0, vec![100.0, 140.0, 90.0])
            .with_availability("solar", vec![0.0, 0.6, 0.3])
            .with_availability("wind", vec![0.4, 0.2, 0.9]);
        let objective = ObjectiveConfig::default();
        let dispatcher = Dispatcher::new(&sources, &profile, &objective).unwrap();
        let caps = vec![40.0, 80.0, 20.0, 50.0, 10.0];
        let fast = dispatcher.evaluate_dense(&caps);
        let full = dispatcher.score_dense(&caps);
        assert!((fast.objective - full.objective).abs() < 1e-6 * full.objective.abs().max(1.0));
        assert_eq!(fast.shortfall, full.shortfall);
    }

    #[test]
    fn more_capacity_never_adds_shortfall() {
        let sources = mixed_sources();
        let profile = mixed_profile();
        let mut previous = f64::INFINITY;
        for wind in [0.0, 25.0, 50.0, 100.0, 200.0, 400.0] {
            let caps = CapacityVector::new().with("wind", wind).with("gas", 60.0);
            let score = evaluate(&sources, &caps, &profile).unwrap();
            assert!(score.shortfall <= previous);
            previous = score.shortfall;
        }
    }

    #[test]
    fn capacity_cost_scales_with_profile_length() {
        let sources = SourceSet::new(vec![
            Source::new("gas", SourceClass::Dispatchable, 0.0, 0.0).with_capacity_cost(168.0),
        ])
        .unwrap();
        let profile = Profile::from_demand(1, start(), 1.0, vec![10.0; 84]);
        let score = evaluate(&sources, &CapacityVector::new().with("gas", 10.0), &profile).unwrap();
        assert!((score.capacity_cost - 840.0).abs() < 1e-9);
    }

    #[test]
    fn carbon_cost_uses_tax_flag() {
        let sources = SourceSet::new(vec![
            Source::new("gas", SourceClass::Dispatchable, 0.0, 1.0).with_carbon_tax(true),
        ])
        .unwrap();
        let profile = Profile::from_demand(1, start(), 1.0, vec![1.0]);
        let objective = ObjectiveConfig {
            social_carbon_cost: 10.0,
            carbon_tax: 5.0,
            ..ObjectiveConfig::default()
        };
        let score = evaluate_with(&sources, &CapacityVector::new().with("gas", 1.0), &profile, &objective).unwrap();
        assert_eq!(score.emissions, 1.0);
        assert_eq!(score.carbon_cost, 15.0);
        assert_eq!(score.objective, 15.0);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let sources = mixed_sources();
        let negative = CapacityVector::new().with("gas", -5.0);
        assert!(matches!(
            evaluate(&sources, &negative, &mixed_profile()),
            Err(GridError::InvalidInput(_))
        ));

        let empty = Profile::from_demand(1, start(), 1.0, Vec::new());
        assert!(matches!(
            evaluate(&sources, &CapacityVector::new(), &empty),
            Err(GridError::InvalidInput(_))
        ));
    }

    #[test]
    fn cost_per_mwh_uses_served_energy() {
        let sources = mixed_sources();
        let caps = CapacityVector::new().with("gas", 200.0);
        let score = evaluate_with(&sources, &caps, &mixed_profile(), &ObjectiveConfig::cost_only()).unwrap();
        assert!((score.cost_per_mwh().unwrap() - 20.0).abs() < 1e-12);
    }
}
