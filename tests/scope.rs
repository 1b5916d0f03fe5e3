#![cfg(not(loom))]

mod util;
use morel::{RawRwLock, RwScope};
use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicUsize, Ordering::SeqCst},
        mpsc, Arc, Barrier,
    },
    thread,
};

const THREADS: usize = 4;
const ITERS: usize = if cfg!(miri) { 10 } else { 200 };

#[test]
fn readers_run_concurrently() {
    util::trace_init();
    let scope = Arc::new(RwScope::new());
    let barrier = Arc::new(Barrier::new(2));

    let threads = (0..2)
        .map(|_| {
            let scope = scope.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                // both readers must be inside the scope at once to pass the
                // barrier.
                scope.run_with_read_lock(|| {
                    barrier.wait();
                    Ok::<_, Infallible>(())
                })
            })
        })
        .collect::<Vec<_>>();

    for thread in threads {
        thread.join().unwrap().unwrap();
    }
    assert!(!scope.is_locked());
}

#[test]
fn writers_exclude_everyone() {
    util::trace_init();
    let scope = Arc::new(RwScope::new());
    let writers = Arc::new(AtomicUsize::new(0));
    let readers = Arc::new(AtomicUsize::new(0));
    let total = Arc::new(AtomicUsize::new(0));

    let threads = (0..THREADS)
        .map(|i| {
            let scope = scope.clone();
            let writers = writers.clone();
            let readers = readers.clone();
            let total = total.clone();
            thread::spawn(move || {
                for _ in 0..ITERS {
                    if i % 2 == 0 {
                        scope
                            .run_with_write_lock(|| {
                                assert_eq!(writers.fetch_add(1, SeqCst), 0, "two writers at once");
                                assert_eq!(readers.load(SeqCst), 0, "writer ran with readers");
                                // non-atomic increment, only correct under mutual exclusion.
                                let n = total.load(SeqCst);
                                thread::yield_now();
                                total.store(n + 1, SeqCst);
                                writers.fetch_sub(1, SeqCst);
                                Ok::<_, Infallible>(())
                            })
                            .unwrap();
                    } else {
                        scope
                            .run_with_read_lock(|| {
                                readers.fetch_add(1, SeqCst);
                                assert_eq!(writers.load(SeqCst), 0, "reader ran with a writer");
                                readers.fetch_sub(1, SeqCst);
                                Ok::<_, Infallible>(())
                            })
                            .unwrap();
                    }
                }
            })
        })
        .collect::<Vec<_>>();

    for thread in threads {
        thread.join().unwrap();
    }
    assert_eq!(total.load(SeqCst), (THREADS / 2) * ITERS);
}

#[test]
fn downgrade_admits_readers_but_not_writers() {
    util::trace_init();
    let scope = Arc::new(RwScope::new());
    let (to_writer, from_main) = mpsc::channel::<()>();
    let (to_main, from_writer) = mpsc::channel::<&'static str>();

    let writer = {
        let scope = scope.clone();
        thread::spawn(move || {
            scope.get_with_downgradable_write_lock(|downgrader| {
                to_main.send("locked").unwrap();
                from_main.recv().unwrap();

                downgrader.downgrade();
                to_main.send("downgraded").unwrap();
                from_main.recv().unwrap();
                Ok::<_, Infallible>(downgrader.is_downgraded())
            })
        })
    };

    let lock = scope.raw_lock();

    assert_eq!(from_writer.recv().unwrap(), "locked");
    assert!(!lock.try_lock_shared(), "readers must wait for the writer");
    assert!(!lock.try_lock_exclusive(), "writers must wait for the writer");
    to_writer.send(()).unwrap();

    assert_eq!(from_writer.recv().unwrap(), "downgraded");
    assert!(scope.is_locked());
    assert!(!scope.is_locked_exclusive());
    assert!(!lock.try_lock_exclusive(), "writers must wait for the downgraded lock");
    assert!(lock.try_lock_shared(), "readers may enter the downgraded lock");
    unsafe { lock.unlock_shared() };
    to_writer.send(()).unwrap();

    assert_eq!(writer.join().unwrap(), Ok(true));
    assert!(!scope.is_locked());
    assert!(lock.try_lock_exclusive());
    unsafe { lock.unlock_exclusive() };
}

#[test]
fn lock_released_after_panic() {
    util::trace_init();
    let scope = Arc::new(RwScope::new());

    let panicked = {
        let scope = scope.clone();
        thread::spawn(move || {
            scope.run_with_write_lock(|| -> Result<(), Infallible> { panic!("oh no") })
        })
        .join()
    };
    assert!(panicked.is_err());
    assert!(!scope.is_locked());

    let value = scope.get_with_write_lock(|| Ok::<_, Infallible>("still usable"));
    assert_eq!(value, Ok("still usable"));
}
