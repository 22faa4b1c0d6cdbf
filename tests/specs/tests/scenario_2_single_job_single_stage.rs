mod support;

use std::sync::Arc;

use ratectl_core::{ControlType, CoreControlApplication};
use support::RecordingLocal;

/// One local (`L1`), one stage `(tensor, env 1, alice)`. Admin rule
/// `1 0 job tensor read 500`. After the next cycle, `L1` observes exactly
/// one `CreateEnforcementRule` carrying the whole limit (a single stage
/// gets the whole floor-divided share), acked ok.
#[tokio::test]
async fn static_job_rule_dispatches_to_its_only_stage() {
    let app = CoreControlApplication::with_default_cycle(ControlType::Static);
    let l1 = Arc::new(RecordingLocal::default());
    app.register_local_controller_session("L1".into(), l1.clone()).await;
    app.register_stage_session("L1".into(), "tensor".into(), "1".into(), "alice".into());
    app.enqueue_rule_in_queue("20|job|tensor|read|500|".to_string());

    app.run_one_cycle().await;

    let enforced = l1.enforced();
    assert_eq!(enforced.len(), 1);
    assert_eq!(enforced[0].stage_name, "tensor");
    assert_eq!(enforced[0].operation, "iops");
    assert_eq!(enforced[0].rate, 500);
}
