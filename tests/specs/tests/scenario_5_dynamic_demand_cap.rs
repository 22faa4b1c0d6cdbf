mod support;

use std::sync::Arc;

use ratectl_core::{ControlType, CoreControlApplication};
use support::RecordingLocal;

/// DYNAMIC-VANILLA, `system_limit=1000`, jobs `A`, `B`, `C` each with one
/// stage. Admin rules `demand A 100`, `demand B 100`, `demand C 900` (one
/// drains per cycle, so this runs three cycles to install all three demands
/// before asserting the resulting rates). Expected: `rate[A]=100,
/// rate[B]=100, rate[C]=800`, sum <= 1000.
#[tokio::test]
async fn dynamic_demand_cap_redistributes_leftover_to_the_capped_job() {
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

    // One admin rule drains per cycle; three cycles install all three
    // demands. The third cycle is the first with every demand in place, so
    // it is the one whose dispatched rates we assert against.
    app.run_one_cycle().await;
    app.run_one_cycle().await;
    app.run_one_cycle().await;

    // Every admitted job is re-dispatched each cycle (three cycles were
    // needed just to drain all three `demand` rules in), so only the most
    // recent entry per job reflects the fully-converged allocation.
    let enforced = local.enforced();
    let rate = |name: &str| {
        enforced
            .iter()
            .rev()
            .find(|e| e.stage_name == name)
            .unwrap()
            .rate
    };
    assert_eq!(rate("A"), 100);
    assert_eq!(rate("B"), 100);
    assert_eq!(rate("C"), 800);
    assert!(rate("A") + rate("B") + rate("C") <= 1000);
}
