//! Mutex helpers shared by the control and processing threads.

use std::sync::{Mutex, MutexGuard};

/// Lock `mutex`, recovering the guard if a previous holder panicked.
///
/// The protected state in this crate is always left consistent between
/// statements, so a poisoned lock is logged and reused instead of
/// propagating the panic into the control thread.
pub fn lock_or_recover<'a, T: ?Sized>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("{} mutex poisoned; recovering", what);
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_recovers_poisoned_lock() {
        let shared = Arc::new(Mutex::new(5));
        let clone = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison it");
        })
        .join();

        assert!(shared.is_poisoned());
        let guard = lock_or_recover(&shared, "test");
        assert_eq!(*guard, 5);
    }
}
