//! Call wrappers for the native bridge.
//!
//! Every public connection and cursor operation is composed as
//! `attached(runtime, || synchronized(&state, |state| ...))`: the calling
//! thread is attached to the runtime first, then the object's lock is taken
//! for the whole operation.

use athena_jdbc_core::{Error, Result, Runtime};
use std::sync::{Mutex, MutexGuard};

/// Attach the calling thread to `runtime` unless it already is.
pub fn attach(runtime: &dyn Runtime) -> Result<()> {
    if !runtime.is_thread_attached() {
        runtime
            .attach_current_thread()
            .map_err(|e| Error::from_native(e, None))?;
    }
    Ok(())
}

/// Run `f` with the calling thread attached to `runtime`.
pub fn attached<T>(runtime: &dyn Runtime, f: impl FnOnce() -> Result<T>) -> Result<T> {
    attach(runtime)?;
    f()
}

/// Run `f` holding `mutex`.
pub fn synchronized<S, T>(mutex: &Mutex<S>, f: impl FnOnce(&mut S) -> T) -> T {
    let mut guard = lock(mutex);
    f(&mut guard)
}

/// Lock `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
