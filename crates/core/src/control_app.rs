//! The core control application's feedback loop, grounded on
//! `CoreControlApplication` in
//! `include/cheferd/controller/core_control_application.hpp`: admit new
//! registrations, collect telemetry, compute an allocation, dispatch
//! enforcement, sleep. One iteration is one "cycle".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ratectl_codec::{decode, AdminRule, Rule};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::allocator::{DynamicLeftoverAllocator, DynamicVanillaAllocator, SKIP_ENFORCEMENT};
use crate::local_link::{EnvRates, LocalLink};
use crate::telemetry::TelemetryStore;
use crate::types::{ControlType, JobLocationTracker};

/// `option_default_control_application_sleep`: default cycle length in
/// microseconds, matching `include/cheferd/utils/options.hpp`.
pub const DEFAULT_CYCLE_SLEEP_MICROS: u64 = 1_000_000;

/// `maximum_iops`'s default when no admin rule has ever set it.
const DEFAULT_MAXIMUM_IOPS: i64 = 0;

/// Backoff before the single retry of a failed `local_handshake`.
const LOCAL_HANDSHAKE_RETRY_BACKOFF: Duration = Duration::from_millis(100);

struct PendingQueues {
    /// Admin policy rule strings, fed by the administrator thread via
    /// `enqueue_rule_in_queue`.
    rules: Mutex<std::collections::VecDeque<String>>,
    /// Local controller addresses that have connected but not yet completed
    /// `local_handshake`.
    local_registrations: Mutex<std::collections::VecDeque<String>>,
    /// (local_address, stage_name, stage_env, stage_user) awaiting the stage
    /// bring-up handshake.
    stage_registrations: Mutex<std::collections::VecDeque<(String, String, String, String)>>,
}

impl PendingQueues {
    fn new() -> Self {
        Self {
            rules: Mutex::new(Default::default()),
            local_registrations: Mutex::new(Default::default()),
            stage_registrations: Mutex::new(Default::default()),
        }
    }
}

pub struct CoreControlApplication {
    control_type: ControlType,
    maximum_iops: Mutex<i64>,
    cycle_sleep_time: Duration,
    pending: PendingQueues,
    locals: RwLock<HashMap<String, Arc<dyn LocalLink>>>,
    job_location_tracker: Mutex<JobLocationTracker>,
    dynamic_vanilla: Mutex<DynamicVanillaAllocator>,
    dynamic_leftover: Mutex<DynamicLeftoverAllocator>,
    /// Per-job limits from STATIC admin rules (spec §4.4.1): no allocator
    /// state, just the last declared limit, floor-divided across stages at
    /// dispatch time.
    static_job_limits: Mutex<HashMap<String, i64>>,
    /// Concatenated canonical housekeeping rule strings (spec §6's
    /// housekeeping rules file), sent as-is in every `LOCAL_HANDSHAKE`.
    housekeeping_rules: Vec<String>,
    telemetry: TelemetryStore,
    next_rule_id: std::sync::atomic::AtomicU64,
    shutdown: CancellationToken,
}

impl CoreControlApplication {
    pub fn new(control_type: ControlType, cycle_sleep_time: Duration) -> Self {
        Self {
            control_type,
            maximum_iops: Mutex::new(DEFAULT_MAXIMUM_IOPS),
            cycle_sleep_time,
            pending: PendingQueues::new(),
            locals: RwLock::new(HashMap::new()),
            job_location_tracker: Mutex::new(JobLocationTracker::new()),
            dynamic_vanilla: Mutex::new(DynamicVanillaAllocator::new()),
            dynamic_leftover: Mutex::new(DynamicLeftoverAllocator::new()),
            static_job_limits: Mutex::new(HashMap::new()),
            housekeeping_rules: Vec::new(),
            telemetry: TelemetryStore::new(),
            next_rule_id: std::sync::atomic::AtomicU64::new(1),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_default_cycle(control_type: ControlType) -> Self {
        Self::new(
            control_type,
            Duration::from_micros(DEFAULT_CYCLE_SLEEP_MICROS),
        )
    }

    /// Attaches the housekeeping rule list sent with every `LOCAL_HANDSHAKE`.
    /// Called once at startup, before the application is wrapped in `Arc`.
    pub fn with_housekeeping_rules(mut self, rules: Vec<String>) -> Self {
        self.housekeeping_rules = rules;
        self
    }

    pub fn set_maximum_iops(&self, value: i64) {
        *self.maximum_iops.lock() = value;
    }

    /// `enqueue_rule_in_queue`: the administrator thread's entry point for
    /// feeding a rule into the core.
    pub fn enqueue_rule_in_queue(&self, rule: String) {
        self.pending.rules.lock().push_back(rule);
    }

    /// `register_local_controller_session`: a new local connected over
    /// `ConnectLocalToGlobal`.
    pub async fn register_local_controller_session(
        &self,
        local_address: String,
        link: Arc<dyn LocalLink>,
    ) {
        self.locals.write().await.insert(local_address.clone(), link);
        self.pending.local_registrations.lock().push_back(local_address);
    }

    /// `register_stage_session`: a new stage connected over
    /// `ConnectStageToGlobal`, fronted by the named local.
    pub fn register_stage_session(
        &self,
        local_address: String,
        stage_name: String,
        stage_env: String,
        stage_user: String,
    ) {
        self.pending
            .stage_registrations
            .lock()
            .push_back((local_address, stage_name, stage_env, stage_user));
    }

    /// `remove_stage`: drop a stage (and, transitively, its job if this was
    /// its last stage) from the location tracker, e.g. after a transport
    /// error evicts its session.
    pub fn remove_stage(&self, local_address: &str) {
        self.job_location_tracker.lock().remove_local(local_address);
    }

    /// A local that surfaced a sentinel (transport failure) is evicted: its
    /// session is dropped from `locals` and its stages vanish from the
    /// location tracker, so `active_locals` decreases by exactly one and no
    /// other local's telemetry is disturbed.
    async fn evict_locals(&self, addresses: &[String]) {
        if addresses.is_empty() {
            return;
        }
        let mut locals = self.locals.write().await;
        for address in addresses {
            locals.remove(address);
            self.remove_stage(address);
            warn!(local_address = %address, "local evicted after sentinel telemetry response");
        }
    }

    pub fn stop_feedback_loop(&self) {
        self.shutdown.cancel();
    }

    fn allocate_rule_id(&self) -> u64 {
        self.next_rule_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }

    /// `handle_local_controller_sessions`: drain pending local registrations
    /// and run the local handshake (housekeeping install) against each. A
    /// failed handshake backs off 100 ms and is retried once before the
    /// local is given up on for this cycle.
    async fn handle_local_controller_sessions(&self) {
        let addresses: Vec<String> = {
            let mut queue = self.pending.local_registrations.lock();
            queue.drain(..).collect()
        };
        if addresses.is_empty() {
            return;
        }
        let locals = self.locals.read().await;
        for address in addresses {
            let Some(link) = locals.get(&address) else {
                warn!(local_address = %address, "pending registration for unknown local");
                continue;
            };
            let mut status = link.local_handshake(&self.housekeeping_rules).await;
            if status.is_error() {
                warn!(local_address = %address, %status, "local handshake failed, retrying once");
                tokio::time::sleep(LOCAL_HANDSHAKE_RETRY_BACKOFF).await;
                status = link.local_handshake(&self.housekeeping_rules).await;
            }
            if status.is_error() {
                warn!(local_address = %address, %status, "local handshake failed after retry");
            } else {
                info!(local_address = %address, "local handshake complete");
            }
        }
    }

    /// `handle_data_plane_sessions`: drain pending stage registrations,
    /// completing the stage handshake and marking each ready.
    async fn handle_data_plane_sessions(&self) {
        let pending: Vec<(String, String, String, String)> = {
            let mut queue = self.pending.stage_registrations.lock();
            queue.drain(..).collect()
        };
        if pending.is_empty() {
            return;
        }
        let locals = self.locals.read().await;
        for (local_address, stage_name, stage_env, stage_user) in pending {
            let Some(link) = locals.get(&local_address) else {
                warn!(local_address = %local_address, "stage registration for unknown local");
                continue;
            };
            match link.stage_handshake(&stage_name, &stage_env).await {
                Ok(_identity) => {
                    let status = link.mark_stage_ready(&stage_name, &stage_env).await;
                    if status.is_ok() {
                        let mut tracker = self.job_location_tracker.lock();
                        tracker.record(stage_name.clone(), local_address.clone());
                        tracker.record_owner(stage_name.clone(), stage_user);
                        debug!(stage = %stage_name, env = %stage_env, "stage ready");
                    } else {
                        warn!(stage = %stage_name, %status, "mark_stage_ready failed");
                    }
                }
                Err(status) => warn!(stage = %stage_name, %status, "stage handshake failed"),
            }
        }
    }

    /// `update_job_demands`: drain one admin rule (the original only reads
    /// a single rule per cycle) and fold it into the relevant allocator's
    /// state.
    fn ingest_one_admin_rule(&self) {
        let rule_text = self.pending.rules.lock().pop_front();
        let Some(rule_text) = rule_text else {
            return;
        };
        match decode(&rule_text) {
            Ok(Rule::AdminPolicy(AdminRule::Demand { job, demand, .. })) => {
                self.dynamic_vanilla.lock().record_demand(job, demand);
            }
            Ok(Rule::AdminPolicy(AdminRule::Job { job, limit, .. })) => {
                // STATIC job-scope rule: applied directly in
                // `dispatch_static`, not through an allocator's running
                // state. Stage locations come from `handle_data_plane_sessions`,
                // not from the admin rule itself.
                self.static_job_limits.lock().insert(job, limit);
            }
            Ok(Rule::AdminPolicy(AdminRule::User { user, limit, .. })) => {
                // User-scope rule (spec scenario 4): fan the limit out evenly
                // (floor division, remainder dropped) across every job this
                // user owns, each becoming its own STATIC job limit.
                let jobs = self.job_location_tracker.lock().jobs_owned_by(&user).to_vec();
                if jobs.is_empty() {
                    warn!(%user, "user rule ignored: user owns no known jobs");
                } else {
                    let per_job = limit / jobs.len() as i64;
                    let mut limits = self.static_job_limits.lock();
                    for job in jobs {
                        limits.insert(job, per_job);
                    }
                }
            }
            Ok(Rule::AdminPolicy(AdminRule::Mds { limit, .. })) => {
                // MDS rules set the system-wide budget directly rather than
                // naming a job; `dispatch_static` still does the per-stage
                // floor division against whatever jobs are registered.
                *self.maximum_iops.lock() = limit;
            }
            Ok(other) => debug!(?other, "admin rule ignored by this control type"),
            Err(error) => warn!(%error, rule = %rule_text, "malformed admin rule"),
        }
    }

    /// One feedback-loop cycle (spec §4.4): admit, collect, compute,
    /// dispatch. Split out from [`Self::execute_feedback_loop`] so tests can
    /// drive a single cycle deterministically.
    pub async fn run_one_cycle(&self) {
        self.handle_local_controller_sessions().await;
        self.handle_data_plane_sessions().await;
        self.ingest_one_admin_rule();

        let jobs = self.job_location_tracker.lock().jobs();
        if jobs.is_empty() {
            return;
        }
        let maximum_iops = *self.maximum_iops.lock();

        match self.control_type {
            ControlType::Noop => {}
            ControlType::Static => self.dispatch_static(&jobs).await,
            ControlType::DynamicVanilla => {
                let rates = self.dynamic_vanilla.lock().allocate(maximum_iops, &jobs);
                self.dispatch_rates(rates).await;
            }
            ControlType::DynamicLeftover => {
                let failed = self.telemetry.collect(&*self.locals.read().await).await;
                self.evict_locals(&failed).await;
                for job in &jobs {
                    if let Some(observed) = self.telemetry.last_known_rate(job).await {
                        self.dynamic_leftover.lock().record_observed_rate(job.clone(), observed);
                    }
                }
                let rates = self.dynamic_leftover.lock().allocate(maximum_iops, &jobs);
                self.dispatch_rates(rates).await;
            }
            ControlType::Mds => self.dispatch_mds(&jobs, maximum_iops).await,
        }
    }

    async fn dispatch_static(&self, jobs: &[String]) {
        let limits = self.static_job_limits.lock().clone();
        let locals = self.locals.read().await;
        for job in jobs {
            let Some(limit) = limits.get(job) else {
                continue;
            };
            let stage_count = self.job_location_tracker.lock().stage_count(job);
            let per_stage = crate::allocator::static_rate_per_stage(*limit, stage_count);
            for local_address in self.job_location_tracker.lock().locals_for(job).to_vec() {
                if let Some(link) = locals.get(&local_address) {
                    let rule_id = self.allocate_rule_id();
                    let mut env_rates = EnvRates::default();
                    env_rates.rates.insert(0, per_stage);
                    let status = link
                        .create_enforcement_rule(rule_id, job, "iops", &env_rates)
                        .await;
                    if status.is_error() {
                        warn!(job = %job, %status, "static enforcement dispatch failed");
                    }
                }
            }
        }
    }

    /// MDS rules (cheferd's fourth control type) carry one system-wide
    /// budget rather than a per-job limit, so every registered job is
    /// floor-divided against its own stage count using the same `limit`.
    async fn dispatch_mds(&self, jobs: &[String], limit: i64) {
        let locals = self.locals.read().await;
        for job in jobs {
            let stage_count = self.job_location_tracker.lock().stage_count(job);
            let per_stage = crate::allocator::static_rate_per_stage(limit, stage_count);
            for local_address in self.job_location_tracker.lock().locals_for(job).to_vec() {
                if let Some(link) = locals.get(&local_address) {
                    let rule_id = self.allocate_rule_id();
                    let mut env_rates = EnvRates::default();
                    env_rates.rates.insert(0, per_stage);
                    let status = link
                        .create_enforcement_rule(rule_id, job, "iops", &env_rates)
                        .await;
                    if status.is_error() {
                        warn!(job = %job, %status, "mds enforcement dispatch failed");
                    }
                }
            }
        }
    }

    async fn dispatch_rates(&self, rates: HashMap<String, i64>) {
        let locals = self.locals.read().await;
        for (job, rate) in rates {
            if rate == SKIP_ENFORCEMENT {
                continue;
            }
            for local_address in self.job_location_tracker.lock().locals_for(&job).to_vec() {
                if let Some(link) = locals.get(&local_address) {
                    let rule_id = self.allocate_rule_id();
                    let mut env_rates = EnvRates::default();
                    env_rates.rates.insert(0, rate);
                    let status = link
                        .create_enforcement_rule(rule_id, &job, "iops", &env_rates)
                        .await;
                    if status.is_error() {
                        warn!(job = %job, %status, "dynamic enforcement dispatch failed");
                    }
                }
            }
        }
    }

    /// `operator()`/`execute_feedback_loop`: runs cycles until
    /// [`Self::stop_feedback_loop`] is called.
    pub async fn execute_feedback_loop(self: &Arc<Self>) {
        info!(cycle_sleep = ?self.cycle_sleep_time, "feedback loop starting");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = self.run_one_cycle() => {}
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.cycle_sleep_time) => {}
            }
        }
        info!("feedback loop stopped");
    }
}
