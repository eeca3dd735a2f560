//! Single-slot capture point for asynchronously reported server errors.
//!
//! The protocol library reports errors by calling [`error_hook`] from inside
//! whatever request triggered them. Every protocol call site runs through
//! [`guarded`], which drains the slot right after the call while still
//! holding the process-wide call lock, so an error is always attributed to
//! the call that caused it and never observed by a later one.

use grabber_platform::error::{GrabError, GrabResult};
use grabber_platform::protocol::ErrorRecord;
use parking_lot::{const_mutex, const_reentrant_mutex, Mutex, ReentrantMutex};
use tracing::debug;

/// Value handed back to the protocol library: keep the connection alive
pub const HOOK_CONTINUE: i32 = 0;

static PENDING: Mutex<Option<ErrorRecord>> = const_mutex(None);

// Reentrant so that releasing a resource while unwinding a failed call can
// itself be guarded.
static CALL_LOCK: ReentrantMutex<()> = const_reentrant_mutex(());

/// Error hook installed into the protocol library. Last error wins.
pub fn error_hook(record: &ErrorRecord) -> i32 {
    let mut pending = PENDING.lock();
    if let Some(previous) = pending.replace(record.clone()) {
        debug!("pending error overwritten ({})", previous);
    }
    HOOK_CONTINUE
}

/// Run one protocol call and check-and-clear the channel afterwards.
///
/// When an error is pending the call's own result is dropped (releasing any
/// resource it holds) and the error is returned instead.
pub fn guarded<T>(call: &'static str, f: impl FnOnce() -> T) -> GrabResult<T> {
    let _turn = CALL_LOCK.lock();
    let value = f();
    let pending = PENDING.lock().take();
    match pending {
        Some(record) => {
            debug!("{} failed: {}", call, record);
            drop(value);
            Err(GrabError::Protocol { call, record })
        }
        None => Ok(value),
    }
}
