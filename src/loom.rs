#[allow(unused_imports)]
pub(crate) use self::inner::*;

#[cfg(loom)]
mod inner {
    #![allow(dead_code)]
    #![allow(unused_imports)]

    pub(crate) use loom::{hint, model, thread};

    pub(crate) mod sync {
        pub(crate) use loom::sync::atomic;
        pub(crate) use loom::sync::Arc;

        use core::{
            fmt,
            ops::{Deref, DerefMut},
        };

        /// Mock version of `parking_lot::Mutex`, using `loom::sync::Mutex`.
        /// The API is slightly different, since the `parking_lot` mutex does
        /// not support poisoning.
        pub(crate) struct Mutex<T>(loom::sync::Mutex<T>);

        pub(crate) struct MutexGuard<'a, T>(loom::sync::MutexGuard<'a, T>);

        impl<T> Mutex<T> {
            #[track_caller]
            pub(crate) fn new(t: T) -> Self {
                Self(loom::sync::Mutex::new(t))
            }

            #[track_caller]
            pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
                MutexGuard(self.0.lock().expect("loom mutex will never poison"))
            }
        }

        impl<T: fmt::Debug> fmt::Debug for Mutex<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl<T> Deref for MutexGuard<'_, T> {
            type Target = T;
            #[inline]
            fn deref(&self) -> &Self::Target {
                self.0.deref()
            }
        }

        impl<T> DerefMut for MutexGuard<'_, T> {
            #[inline]
            fn deref_mut(&mut self) -> &mut Self::Target {
                self.0.deref_mut()
            }
        }
    }
}

#[cfg(not(loom))]
mod inner {
    #![allow(dead_code, unused_imports)]

    pub(crate) mod sync {
        pub(crate) use core::sync::atomic;
        pub(crate) use parking_lot::{Mutex, MutexGuard};
        pub(crate) use std::sync::Arc;
    }


    #[cfg(test)]
    pub(crate) fn model(f: impl FnOnce()) {
        let _trace = crate::util::test::trace_init();
        let _span = tracing::info_span!(
            "test",
            message = std::thread::current().name().unwrap_or("<unnamed>")
        )
        .entered();
        tracing::info!("started test...");
        f();
        tracing::info!("test completed successfully!");
    }
}
