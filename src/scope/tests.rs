use super::*;
use crate::util::test::{assert_send_sync, assert_sync, Event, RecordingLock};

mod loom;


#[test]
fn scope_is_send_sync() {
    assert_send_sync::<RwScope>();
    assert_send_sync::<RwScope<RecordingLock>>();
}

#[test]
fn downgrader_is_sync_with_send_guards() {
    assert_sync::<Downgrader<'_, RecordingLock>>();
}

fn recording_scope() -> RwScope<RecordingLock> {
    RwScope::with_raw_lock(RecordingLock::new())
}
