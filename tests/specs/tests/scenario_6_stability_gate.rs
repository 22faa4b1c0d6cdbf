mod support;

use std::sync::Arc;

use ratectl_core::{ControlType, CoreControlApplication};
use support::RecordingLocal;

/// Repeat scenario 5 (DYNAMIC-VANILLA, demands 100/100/900 over jobs
/// A/B/C) until the allocator has converged, then run one more cycle with
/// no new admin rule. Expected: the allocator recomputes the same rates,
/// and because every job's rate is within the stability threshold of its
/// previous rate, no enforcement RPC is dispatched for that cycle.
#[tokio::test]
async fn converged_demands_skip_enforcement_next_cycle() {
    let app = CoreControlApplication::with_default_cycle(ControlType::DynamicVanilla);
    app.set_maximum_iops(1000);
    let local = Arc::new(RecordingLocal::default());
    app.register_local_controller_session("L1".into(), local.clone()).await;
    app.register_stage_session("L1".into(), "A".into(), "1".into(), "alice".into());
    app.register_stage_session("L1".into(), "B".into(), "1".into(), "alice".into());
    app.register_stage_session("L1".into(), "C".into(), "1".into(), "alice".into());
    app.enqueue_rule_in_queue("20|demand|A|read|100|".to_string());
    app.enqueue_rule_in_queue("20|demand|B|read|100|".to_string());
    app.enqueue_rule_in_queue("20|demand|C|read|900|".to_string());

    // Three cycles to drain the three queued demand rules and converge.
    app.run_one_cycle().await;
    app.run_one_cycle().await;
    app.run_one_cycle().await;
    let before = local.enforced().len();

    // Fourth cycle: no new admin rule, identical demands already on file.
    app.run_one_cycle().await;
    let after = local.enforced().len();

    assert_eq!(before, after, "stability gate should have skipped every job");
}
