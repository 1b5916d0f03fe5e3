use super::*;
use crate::loom::{self, sync::Arc, thread};
use std::convert::Infallible;

#[test]
fn readers_share_the_lock() {
    loom::model(|| {
        let scope = Arc::new(recording_scope());
        let threads = (0..2)
            .map(|_| {
                let scope = scope.clone();
                thread::spawn(move || {
                    scope
                        .run_with_read_lock(|| {
                            assert!(scope.raw_lock().readers() >= 1);
                            Ok::<_, Infallible>(())
                        })
                        .unwrap();
                })
            })
            .collect::<Vec<_>>();

        for thread in threads {
            thread.join().expect("reader thread mustn't panic");
        }

        let lock = scope.raw_lock();
        assert_eq!(lock.count(Event::LockShared), 2);
        assert_eq!(lock.count(Event::UnlockShared), 2);
        assert!(!scope.is_locked());
    });
}

#[test]
fn downgrade_then_read() {
    loom::model(|| {
        let scope = Arc::new(recording_scope());

        scope
            .run_with_downgradable_write_lock(|downgrader| {
                downgrader.downgrade();

                // once downgraded, another reader may enter.
                let reader = {
                    let scope = scope.clone();
                    thread::spawn(move || {
                        scope.get_with_read_lock(|| Ok::<_, Infallible>(scope.raw_lock().readers()))
                    })
                };
                let readers = reader.join().unwrap().unwrap();
                assert_eq!(readers, 2);
                Ok::<_, Infallible>(())
            })
            .unwrap();

        let lock = scope.raw_lock();
        assert_eq!(lock.count(Event::UnlockExclusive), 1);
        assert_eq!(lock.count(Event::LockShared), lock.count(Event::UnlockShared));
        assert!(!scope.is_locked());
    });
}
