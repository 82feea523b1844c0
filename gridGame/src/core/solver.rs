//! Search for the cheapest capacity vector that meets demand at every step.
//!
//! The search runs a bounded Nelder-Mead over capacities normalised to
//! `[0, 1]`, minimising the objective plus a shortfall penalty. Each restart's
//! result is pushed back to exact feasibility along the line towards the upper
//! bounds, then trimmed source by source from the most expensive end of the
//! merit order. Restarts after the first draw their starting point from a
//! seeded `StdRng`, so a fixed seed gives a fixed answer.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::constants::*;
use crate::config::game_config::SolverConfig;
use crate::core::dispatch::{Dispatcher, Evaluation, Score};
use crate::error::{GridError, Result};
use crate::models::capacity::{CapacityBounds, CapacityVector};
use crate::models::profile::Profile;
use crate::models::source::SourceSet;
use crate::utils::logging::{self, OperationCategory};

/// Best capacity found for a profile, with search statistics.
#[derive(Debug, Clone)]
pub struct Solution {
    pub capacity: CapacityVector,
    pub score: Score,
    pub restarts: usize,
    pub evaluations: usize,
}

/// Minimise the objective over `bounds` subject to zero shortfall.
pub fn solve(
    profile: &Profile,
    sources: &SourceSet,
    bounds: &CapacityBounds,
    config: &SolverConfig,
) -> Result<(CapacityVector, Score)> {
    let solution = solve_from(profile, sources, bounds, config, None)?;
    Ok((solution.capacity, solution.score))
}

/// As [`solve`], with an optional extra starting point such as a previous optimum.
pub fn solve_from(
    profile: &Profile,
    sources: &SourceSet,
    bounds: &CapacityBounds,
    config: &SolverConfig,
    warm_start: Option<&CapacityVector>,
) -> Result<Solution> {
    let _timing = logging::start_timing("solve", OperationCategory::Solve);
    config.validate()?;
    let dispatcher = Dispatcher::new(sources, profile, &config.objective)?;
    let dense_bounds = bounds.to_dense(sources)?;
    let warm = warm_start.map(|w| w.to_dense(sources)).transpose()?;

    let mut search = Search::new(dispatcher, &dense_bounds, config);

    let at_upper = search.evaluate(&search.upper.clone());
    if at_upper.shortfall > 0.0 {
        // Shortfall never grows with capacity, so nothing inside the bounds is feasible.
        info!(
            "Week {}: infeasible even at upper bounds (shortfall {:.3} MWh)",
            profile.week, at_upper.shortfall
        );
        return Err(GridError::Infeasible {
            restarts: 0,
            best_shortfall: at_upper.shortfall,
        });
    }

    let solution = search.run(warm.as_deref())?;
    info!(
        "Week {}: objective {:.2} EUR after {} restarts and {} evaluations",
        profile.week, solution.score.objective, solution.restarts, solution.evaluations
    );
    Ok(solution)
}

struct Search<'a> {
    dispatcher: Dispatcher<'a>,
    config: &'a SolverConfig,
    lower: Vec<f64>,
    /// Finite upper bounds, clamped to the largest capacity that can still be dispatched.
    upper: Vec<f64>,
    /// EUR per MWh of shortfall.
    penalty: f64,
    evaluations: usize,
}

impl<'a> Search<'a> {
    fn new(dispatcher: Dispatcher<'a>, bounds: &[(f64, f64)], config: &'a SolverConfig) -> Self {
        let ceilings = useful_ceilings(&dispatcher);
        let lower: Vec<f64> = bounds.iter().map(|&(lo, _)| lo).collect();
        let upper = bounds
            .iter()
            .zip(&ceilings)
            .map(|(&(lo, hi), &ceiling)| hi.min(ceiling).max(lo))
            .collect();

        let step_hours = dispatcher.profile().step_hours;
        let max_marginal = dispatcher.marginal_rates().iter().copied().fold(0.0, f64::max);
        let max_fixed = dispatcher.capacity_rates().iter().copied().fold(0.0, f64::max);
        let penalty = config.penalty_multiplier * (1.0 + max_marginal + max_fixed / step_hours);

        Self {
            dispatcher,
            config,
            lower,
            upper,
            penalty,
            evaluations: 0,
        }
    }

    fn evaluate(&mut self, caps: &[f64]) -> Evaluation {
        self.evaluations += 1;
        self.dispatcher.evaluate_dense(caps)
    }

    fn to_caps(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&xi, (&lo, &hi))| lo + xi * (hi - lo))
            .collect()
    }

    fn to_unit(&self, caps: &[f64]) -> Vec<f64> {
        caps.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&c, (&lo, &hi))| if hi > lo { ((c - lo) / (hi - lo)).clamp(0.0, 1.0) } else { 0.0 })
            .collect()
    }

    fn penalised(&mut self, x: &[f64]) -> f64 {
        let caps = self.to_caps(x);
        let eval = self.evaluate(&caps);
        eval.objective + self.penalty * eval.shortfall
    }

    fn starting_points(&self, warm: Option<&[f64]>) -> Vec<Vec<f64>> {
        let n = self.lower.len();
        let mut starts = vec![vec![1.0; n]];
        if let Some(warm) = warm {
            starts.push(self.to_unit(warm));
        }
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        while starts.len() < self.config.restarts + usize::from(warm.is_some()) {
            starts.push((0..n).map(|_| rng.gen_range(0.0..=1.0)).collect());
        }
        starts
    }

    fn run(&mut self, warm: Option<&[f64]>) -> Result<Solution> {
        let starts = self.starting_points(warm);
        let restarts = starts.len();
        let mut best: Option<(Vec<f64>, Evaluation)> = None;
        let mut best_shortfall = f64::INFINITY;

        for (restart, start) in starts.into_iter().enumerate() {
            let x = self.nelder_mead(start);
            let caps = self.to_caps(&x);
            let Some(mut caps) = self.repair(caps) else {
                let shortfall = self.evaluate(&self.to_caps(&x)).shortfall;
                best_shortfall = best_shortfall.min(shortfall);
                debug!("restart {}: no feasible point, shortfall {:.3} MWh", restart, shortfall);
                continue;
            };
            let eval = self.trim(&mut caps);
            debug!("restart {}: objective {:.4}", restart, eval.objective);

            let improves = match &best {
                Some((_, current)) => eval.objective < current.objective,
                None => true,
            };
            if improves {
                best = Some((caps, eval));
            }
        }

        match best {
            Some((caps, _)) => {
                let sources = self.dispatcher.sources();
                Ok(Solution {
                    capacity: CapacityVector::from_dense(sources, &caps),
                    score: self.dispatcher.score_dense(&caps),
                    restarts,
                    evaluations: self.evaluations,
                })
            }
            None => Err(GridError::Infeasible {
                restarts,
                best_shortfall,
            }),
        }
    }

    /// Bounded Nelder-Mead on the penalised objective; points are projected onto the unit box.
    fn nelder_mead(&mut self, start: Vec<f64>) -> Vec<f64> {
        let n = start.len();
        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        let f0 = self.penalised(&start);
        simplex.push((start.clone(), f0));
        for i in 0..n {
            let mut vertex = start.clone();
            vertex[i] += if vertex[i] + INITIAL_SIMPLEX_STEP <= 1.0 {
                INITIAL_SIMPLEX_STEP
            } else {
                -INITIAL_SIMPLEX_STEP
            };
            let f = self.penalised(&vertex);
            simplex.push((vertex, f));
        }

        for _ in 0..self.config.max_iterations {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
            let best = simplex[0].1;
            let worst = simplex[n].1;
            if (worst - best).abs() <= self.config.tolerance * (1.0 + best.abs()) {
                break;
            }

            let centroid: Vec<f64> = (0..n)
                .map(|d| simplex[..n].iter().map(|(v, _)| v[d]).sum::<f64>() / n as f64)
                .collect();
            let toward = |from: &[f64], scale: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(from)
                    .map(|(c, p)| (c + scale * (p - c)).clamp(0.0, 1.0))
                    .collect()
            };

            let reflected = toward(&simplex[n].0, -NM_REFLECTION);
            let fr = self.penalised(&reflected);

            if fr < best {
                let expanded = toward(&reflected, NM_EXPANSION);
                let fe = self.penalised(&expanded);
                simplex[n] = if fe < fr { (expanded, fe) } else { (reflected, fr) };
            } else if fr < simplex[n - 1].1 {
                simplex[n] = (reflected, fr);
            } else {
                let contracted = if fr < worst {
                    toward(&reflected, NM_CONTRACTION)
                } else {
                    toward(&simplex[n].0, NM_CONTRACTION)
                };
                let fc = self.penalised(&contracted);
                if fc < fr.min(worst) {
                    simplex[n] = (contracted, fc);
                } else {
                    let anchor = simplex[0].0.clone();
                    for vertex in simplex.iter_mut().skip(1) {
                        for (x, a) in vertex.0.iter_mut().zip(&anchor) {
                            *x = a + NM_SHRINK * (*x - a);
                        }
                    }
                    for i in 1..=n {
                        simplex[i].1 = self.penalised(&simplex[i].0.clone());
                    }
                }
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        simplex.swap_remove(0).0
    }

    /// Move `caps` towards the upper bounds until demand is met at every step.
    fn repair(&mut self, caps: Vec<f64>) -> Option<Vec<f64>> {
        if self.evaluate(&caps).shortfall == 0.0 {
            return Some(caps);
        }
        let upper = self.upper.clone();
        if self.evaluate(&upper).shortfall > 0.0 {
            return None;
        }

        let (mut lo, mut hi) = (0.0, 1.0);
        let mut feasible = upper.clone();
        for _ in 0..self.config.trim_iterations {
            let mid = 0.5 * (lo + hi);
            let candidate = interpolate(&caps, &upper, mid);
            if self.evaluate(&candidate).shortfall == 0.0 {
                hi = mid;
                feasible = candidate;
            } else {
                lo = mid;
            }
        }
        Some(feasible)
    }

    /// Lower each source, most expensive first, while the point stays feasible
    /// and the objective does not rise.
    fn trim(&mut self, caps: &mut [f64]) -> Evaluation {
        let mut current = self.evaluate(caps);
        let order: Vec<usize> = self.dispatcher.order().iter().rev().copied().collect();

        for i in order {
            let held = caps[i];
            if held <= self.lower[i] {
                continue;
            }
            let ceiling = current.objective;

            caps[i] = self.lower[i];
            let at_lower = self.evaluate(caps);
            if accepts(at_lower, ceiling) {
                current = at_lower;
                continue;
            }

            let (mut lo, mut hi) = (self.lower[i], held);
            for _ in 0..self.config.trim_iterations {
                let mid = 0.5 * (lo + hi);
                caps[i] = mid;
                let eval = self.evaluate(caps);
                if accepts(eval, ceiling) {
                    hi = mid;
                    current = eval;
                } else {
                    lo = mid;
                }
            }
            caps[i] = hi;
        }
        current
    }
}

fn accepts(eval: Evaluation, ceiling: f64) -> bool {
    eval.shortfall == 0.0 && eval.objective <= ceiling + TRIM_OBJECTIVE_SLACK * ceiling.abs().max(1.0)
}

fn interpolate(from: &[f64], to: &[f64], theta: f64) -> Vec<f64> {
    from.iter().zip(to).map(|(a, b)| a + theta * (b - a)).collect()
}

/// Capacity above which a source can no longer raise its dispatch at any step.
///
/// Firm sources never dispatch more than peak demand. An intermittent source
/// at step `t` needs `demand / availability` to cover the whole step; steps
/// without availability do not count.
fn useful_ceilings(dispatcher: &Dispatcher) -> Vec<f64> {
    let profile = dispatcher.profile();
    dispatcher
        .sources()
        .iter()
        .enumerate()
        .map(|(i, source)| {
            if !source.class.uses_availability() {
                return profile.peak_demand();
            }
            (0..profile.len())
                .filter_map(|t| {
                    let a = dispatcher.availability_at(i, t);
                    (a > 0.0).then(|| covering_capacity(profile.demand[t], a))
                })
                .fold(0.0, f64::max)
        })
        .collect()
}

/// Smallest capacity found whose product with `availability` is at least `demand`.
///
/// `demand / availability` can round to a value that multiplies back to one
/// ulp short of demand, so it is nudged up until the dispatch sees it cover.
fn covering_capacity(demand: f64, availability: f64) -> f64 {
    let mut capacity = demand / availability;
    while capacity * availability < demand {
        capacity += capacity.abs().max(f64::MIN_POSITIVE) * f64::EPSILON;
    }
    capacity
}
