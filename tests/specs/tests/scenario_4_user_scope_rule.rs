mod support;

use std::sync::Arc;

use ratectl_core::{ControlType, CoreControlApplication};
use support::RecordingLocal;

/// User `alice` owns jobs `tensor` and `kvs`. Admin rule
/// `9 0 user alice read 1000`. After the next cycle, two derived job rules
/// each with limit 500 are applied — each job's (single) stage collectively
/// receives 500.
#[tokio::test]
async fn user_scope_rule_fans_out_evenly_across_owned_jobs() {
    let app = CoreControlApplication::with_default_cycle(ControlType::Static);
    let l1 = Arc::new(RecordingLocal::default());
    app.register_local_controller_session("L1".into(), l1.clone()).await;
    app.register_stage_session("L1".into(), "tensor".into(), "1".into(), "alice".into());
    app.register_stage_session("L1".into(), "kvs".into(), "1".into(), "alice".into());
    app.enqueue_rule_in_queue("20|user|alice|read|1000|".to_string());

    app.run_one_cycle().await;

    let mut enforced = l1.enforced();
    enforced.sort_by(|a, b| a.stage_name.cmp(&b.stage_name));
    assert_eq!(enforced.len(), 2);
    assert_eq!(enforced[0].stage_name, "kvs");
    assert_eq!(enforced[0].rate, 500);
    assert_eq!(enforced[1].stage_name, "tensor");
    assert_eq!(enforced[1].rate, 500);
}
