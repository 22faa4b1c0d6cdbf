//! The three allocators (spec §4.4.1-4.4.3), grounded on
//! `CoreControlApplication::compute_and_enforce_static_rules`,
//! `compute_and_enforce_dynamic_vanilla_rules` and
//! `compute_and_enforce_dynamic_leftover_rules`
//! (`include/cheferd/controller/core_control_application.hpp`), with the
//! only surviving concrete allocator body
//! (`compute_and_enforce_dynamic_rules` in the filtered `shepherd` source)
//! as the ground truth for the demand-cap / redistribute / stability-gate
//! sequence both dynamic allocators share.

use std::collections::HashMap;

/// A job is considered stable (and enforcement is skipped, signalled with
/// `-1`) once its newly-computed rate moves less than this many IOPS from
/// its previously enforced rate.
pub const IOPS_THRESHOLD: i64 = 10;

/// Sentinel rate meaning "do not (re)dispatch an enforcement rule for this
/// job this cycle" — the job's rate has not moved enough to be worth it.
pub const SKIP_ENFORCEMENT: i64 = -1;

/// A per-job rate assignment for one feedback-loop cycle. `SKIP_ENFORCEMENT`
/// must be checked by the dispatcher before building an enforcement rule.
pub type JobRates = HashMap<String, i64>;

/// `compute_and_enforce_static_rules`: one admin rule per cycle, scoped to a
/// job or a user, floor-divided evenly across every stage currently hosting
/// that job/user. No demand tracking, no stability gate — a static rule is
/// enforced every cycle it is present.
pub fn static_rate_per_stage(total_limit: i64, stage_count: usize) -> i64 {
    if stage_count == 0 {
        return 0;
    }
    total_limit / stage_count as i64
}

/// The stability-gate pass both dynamic allocators finish with: a job whose
/// newly-computed rate hasn't moved by `IOPS_THRESHOLD` from its last
/// *enforced* rate is marked [`SKIP_ENFORCEMENT`] instead, and
/// `previous_rates` is left untouched for it so the comparison stays
/// anchored to the last rate that was actually dispatched.
fn apply_stability_gate(
    mut rates: JobRates,
    jobs: &[String],
    previous_rates: &mut HashMap<String, i64>,
) -> JobRates {
    for job in jobs {
        let rate = rates[job];
        let previous = *previous_rates.get(job).unwrap_or(&0);
        if (rate - previous).abs() < IOPS_THRESHOLD {
            rates.insert(job.clone(), SKIP_ENFORCEMENT);
        } else {
            previous_rates.insert(job.clone(), rate);
        }
    }
    rates
}

/// `compute_and_enforce_dynamic_vanilla_rules`'s demand-cap ->
/// redistribute-leftover-evenly sequence, ending in the shared stability
/// gate.
fn allocate_dynamic(
    maximum_iops: i64,
    jobs: &[String],
    demand: impl Fn(&str) -> i64,
    previous_rates: &mut HashMap<String, i64>,
) -> JobRates {
    let mut rates = HashMap::with_capacity(jobs.len());
    let mut left_iops = maximum_iops;
    let mut remaining = jobs.len() as i64;

    for job in jobs {
        let demand = demand(job);
        let fair_share = if remaining > 0 { left_iops / remaining } else { 0 };
        let rate = if demand <= fair_share { demand } else { fair_share };
        rates.insert(job.clone(), rate);
        remaining -= 1;
        left_iops -= rate;
    }

    let total_jobs = jobs.len() as i64;
    if total_jobs > 0 {
        let leftover_share = left_iops / total_jobs;
        for job in jobs {
            if let Some(rate) = rates.get_mut(job) {
                *rate += leftover_share;
            }
        }
    }

    apply_stability_gate(rates, jobs, previous_rates)
}

/// `compute_and_enforce_dynamic_vanilla_rules`: demand-capped fair-share
/// allocation, driven by declared per-job demand (admin `demand` rules).
#[derive(Debug, Default)]
pub struct DynamicVanillaAllocator {
    demands: HashMap<String, i64>,
    previous_rates: HashMap<String, i64>,
}

impl DynamicVanillaAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `update_job_demands`: record a freshly-dequeued `demand` admin rule.
    pub fn record_demand(&mut self, job: impl Into<String>, demand: i64) {
        self.demands.insert(job.into(), demand);
    }

    pub fn allocate(&mut self, maximum_iops: i64, jobs: &[String]) -> JobRates {
        let demands = &self.demands;
        allocate_dynamic(
            maximum_iops,
            jobs,
            |job| *demands.get(job).unwrap_or(&0),
            &mut self.previous_rates,
        )
    }
}

/// `compute_and_enforce_dynamic_leftover_rules` (spec §4.4.3): unlike
/// DYNAMIC-VANILLA's demand cap, a job's rate here is driven by how much of
/// its *prior* allocation it actually used. A job whose last observed rate
/// fell below its prior allocation releases the unused difference into a
/// shared leftover pool and is re-allocated exactly its observed rate; the
/// pool is then split evenly across every job whose observed rate met or
/// exceeded its prior allocation. The same stability gate and `-1` skip
/// sentinel as DYNAMIC-VANILLA apply afterwards.
#[derive(Debug, Default)]
pub struct DynamicLeftoverAllocator {
    observed_rates: HashMap<String, i64>,
    previous_rates: HashMap<String, i64>,
}

impl DynamicLeftoverAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record this cycle's observed rate for a job, from telemetry
    /// collection (spec §4.4.4).
    pub fn record_observed_rate(&mut self, job: impl Into<String>, rate: i64) {
        self.observed_rates.insert(job.into(), rate);
    }

    /// `maximum_iops` only matters for a job's very first cycle, before it
    /// has a prior allocation of its own to compare against: such a job
    /// defaults to an even fair share of the system budget rather than `0`,
    /// so the first cycle doesn't manufacture phantom leftover out of every
    /// job instantly looking "over-allocated" relative to nothing.
    pub fn allocate(&mut self, maximum_iops: i64, jobs: &[String]) -> JobRates {
        let default_prior = if jobs.is_empty() {
            0
        } else {
            maximum_iops / jobs.len() as i64
        };
        // Seed any job with no prior allocation yet so the lookup below and
        // the stability gate's own lookup agree on the same baseline.
        for job in jobs {
            self.previous_rates.entry(job.clone()).or_insert(default_prior);
        }

        let mut rates = HashMap::with_capacity(jobs.len());
        let mut leftover = 0i64;
        let mut active_jobs: Vec<&String> = Vec::new();

        for job in jobs {
            let prior = self.previous_rates[job];
            let observed = *self.observed_rates.get(job).unwrap_or(&0);
            if observed < prior {
                leftover += prior - observed;
                rates.insert(job.clone(), observed);
            } else {
                rates.insert(job.clone(), prior);
                active_jobs.push(job);
            }
        }

        if !active_jobs.is_empty() {
            let share = leftover / active_jobs.len() as i64;
            for job in active_jobs {
                if let Some(rate) = rates.get_mut(job) {
                    *rate += share;
                }
            }
        }

        apply_stability_gate(rates, jobs, &mut self.previous_rates)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn jobs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn static_rate_divides_evenly_and_floors() {
        assert_eq!(static_rate_per_stage(1000, 3), 333);
        assert_eq!(static_rate_per_stage(1000, 0), 0);
        assert_eq!(static_rate_per_stage(9, 2), 4);
    }

    #[test]
    fn dynamic_vanilla_caps_demand_and_redistributes_leftover() {
        let mut allocator = DynamicVanillaAllocator::new();
        allocator.record_demand("a", 100);
        allocator.record_demand("b", 200);

        let rates = allocator.allocate(1000, &jobs(&["a", "b"]));

        // Both demands are under their (shrinking) fair share, so the
        // demand-cap pass grants them exactly what they asked for, leaving
        // 700 IOPS of slack to redistribute evenly in the second pass.
        assert_ne!(rates["a"], SKIP_ENFORCEMENT);
        assert_ne!(rates["b"], SKIP_ENFORCEMENT);
        assert_eq!(rates["a"], 100 + 350);
        assert_eq!(rates["b"], 200 + 350);
    }

    #[test]
    fn dynamic_vanilla_skips_enforcement_within_threshold() {
        let mut allocator = DynamicVanillaAllocator::new();
        allocator.record_demand("a", 500);
        let first = allocator.allocate(1000, &jobs(&["a"]));
        assert_eq!(first["a"], 1000);

        // Same demand next cycle: rate doesn't move, gate should fire.
        let second = allocator.allocate(1000, &jobs(&["a"]));
        assert_eq!(second["a"], SKIP_ENFORCEMENT);
    }

    #[test]
    fn dynamic_leftover_redistributes_only_to_fully_utilised_jobs() {
        let mut allocator = DynamicLeftoverAllocator::new();

        // First cycle: neither job has a prior allocation yet, so both
        // default to the even fair share (500 each) and, having no telemetry
        // yet either, both observe 0 — under their (phantom) prior, so both
        // release their whole share and the pool has nowhere to go.
        let first = allocator.allocate(1000, &jobs(&["a", "b"]));
        assert_eq!(first["a"], 0);
        assert_eq!(first["b"], 0);

        // Second cycle: the first cycle's slack release dropped both jobs'
        // prior allocation to 0. Both now observe 100, at-or-above that
        // prior, so both stay active -- but there's no slack left in the
        // pool to redistribute, and 0 hasn't moved, so the gate fires.
        allocator.record_observed_rate("a", 100);
        allocator.record_observed_rate("b", 100);
        let second = allocator.allocate(1000, &jobs(&["a", "b"]));
        assert_eq!(second["a"], SKIP_ENFORCEMENT);
        assert_eq!(second["b"], SKIP_ENFORCEMENT);
    }

    #[test]
    fn dynamic_leftover_releases_slack_and_grants_it_to_fully_used_jobs() {
        let mut allocator = DynamicLeftoverAllocator::new();
        // Neither job has a prior allocation yet, so both default to the
        // even fair share of 500. "a" only used 300 of that (releases 200 of
        // slack); "b" used all 500 (stays active) and should receive the
        // leftover.
        allocator.record_observed_rate("a", 300);
        allocator.record_observed_rate("b", 500);
        let rates = allocator.allocate(1000, &jobs(&["a", "b"]));
        assert_eq!(rates["a"], 300);
        assert_eq!(rates["b"], 500 + 200);
    }

    #[test]
    fn no_jobs_allocates_nothing() {
        let mut allocator = DynamicVanillaAllocator::new();
        let rates = allocator.allocate(1000, &[]);
        assert!(rates.is_empty());
    }
}
