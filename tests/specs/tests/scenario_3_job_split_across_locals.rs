mod support;

use std::sync::Arc;

use ratectl_core::{ControlType, CoreControlApplication};
use support::RecordingLocal;

/// `(tensor, env 1)` on `L1`, `(tensor, env 2)` on `L2`. Admin rule
/// `7 0 job tensor write 1000`. After the next cycle, both locals receive
/// their floor-divided share (1000 / 2 stages = 500) and ack ok.
#[tokio::test]
async fn job_with_two_stages_splits_evenly_across_locals() {
    let app = CoreControlApplication::with_default_cycle(ControlType::Static);
    let l1 = Arc::new(RecordingLocal::default());
    let l2 = Arc::new(RecordingLocal::default());
    app.register_local_controller_session("L1".into(), l1.clone()).await;
    app.register_local_controller_session("L2".into(), l2.clone()).await;
    app.register_stage_session("L1".into(), "tensor".into(), "1".into(), "alice".into());
    app.register_stage_session("L2".into(), "tensor".into(), "2".into(), "alice".into());
    app.enqueue_rule_in_queue("20|job|tensor|write|1000|".to_string());

    app.run_one_cycle().await;

    let e1 = l1.enforced();
    let e2 = l2.enforced();
    assert_eq!(e1.len(), 1);
    assert_eq!(e2.len(), 1);
    assert_eq!(e1[0].rate, 500);
    assert_eq!(e2[0].rate, 500);
}
