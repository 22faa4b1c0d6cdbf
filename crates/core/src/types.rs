//! Shared value types for the core controller, grounded on the member
//! variables documented in
//! `include/cheferd/controller/core_control_application.hpp` and the
//! authoritative `cheferd::ControlType` taxonomy in
//! `include/cheferd/utils/options.hpp`.

use std::collections::HashMap;

/// `ControlType`, the `cheferd` taxonomy (spec §9 "Open questions" resolves
/// the cheferd/shepherd naming conflict in favor of cheferd's numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlType {
    Noop,
    Static,
    DynamicVanilla,
    DynamicLeftover,
    Mds,
}

impl ControlType {
    pub fn as_wire_value(self) -> i32 {
        match self {
            ControlType::Noop => 0,
            ControlType::Static => 1,
            ControlType::DynamicVanilla => 2,
            ControlType::DynamicLeftover => 3,
            ControlType::Mds => 4,
        }
    }
}

/// `job_location_tracker`: which locals/stages currently host a given job,
/// plus (spec scenario 4, "user-scope rule over two jobs") which user owns
/// each job, so a `user`-scoped admin rule can be fanned out to the jobs it
/// covers.
#[derive(Debug, Clone, Default)]
pub struct JobLocationTracker {
    // job name -> local controller addresses hosting at least one stage for it
    locations: HashMap<String, Vec<String>>,
    // job name -> owning user, as reported by the stage's connect/handshake info
    owners: HashMap<String, String>,
    // user -> jobs it owns, the reverse index a `user`-scoped rule fans out over
    owned_jobs: HashMap<String, Vec<String>>,
}

impl JobLocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, job: impl Into<String>, local_address: impl Into<String>) {
        let local_address = local_address.into();
        let entry = self.locations.entry(job.into()).or_default();
        if !entry.contains(&local_address) {
            entry.push(local_address);
        }
    }

    /// Records which user owns `job`, e.g. from the stage's reported
    /// `stage_user`. A job has exactly one owner; re-recording the same
    /// job under a different user replaces it.
    pub fn record_owner(&mut self, job: impl Into<String>, user: impl Into<String>) {
        let job = job.into();
        let user = user.into();
        if let Some(previous) = self.owners.insert(job.clone(), user.clone()) {
            if previous == user {
                return;
            }
            if let Some(jobs) = self.owned_jobs.get_mut(&previous) {
                jobs.retain(|j| j != &job);
            }
        }
        let jobs = self.owned_jobs.entry(user).or_default();
        if !jobs.contains(&job) {
            jobs.push(job);
        }
    }

    pub fn jobs_owned_by(&self, user: &str) -> &[String] {
        self.owned_jobs.get(user).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn remove_local(&mut self, local_address: &str) {
        for locals in self.locations.values_mut() {
            locals.retain(|l| l != local_address);
        }
        self.locations.retain(|_, locals| !locals.is_empty());
    }

    pub fn stage_count(&self, job: &str) -> usize {
        self.locations.get(job).map(Vec::len).unwrap_or(0)
    }

    pub fn jobs(&self) -> Vec<String> {
        let mut jobs: Vec<String> = self.locations.keys().cloned().collect();
        jobs.sort();
        jobs
    }

    pub fn locals_for(&self, job: &str) -> &[String] {
        self.locations.get(job).map(Vec::as_slice).unwrap_or(&[])
    }
}
