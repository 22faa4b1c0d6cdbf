mod support;

use std::sync::Arc;

use ratectl_core::{CoreControlApplication, ControlType};
use support::RecordingLocal;

/// Start core with `system_limit=1000`, STATIC allocator, no locals, no
/// admin rules. Run five cycles, then stop. Expected: exits cleanly, zero
/// enforcement RPCs issued.
#[tokio::test]
async fn empty_registration_issues_no_enforcement() {
    let app = Arc::new(CoreControlApplication::with_default_cycle(ControlType::Static));
    app.set_maximum_iops(1000);
    let local = Arc::new(RecordingLocal::default());

    for _ in 0..5 {
        app.run_one_cycle().await;
    }
    app.stop_feedback_loop();

    assert!(local.enforced().is_empty());
}
