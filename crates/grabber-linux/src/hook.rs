//! Process-wide error hook slot.
//!
//! Only one hook is active at a time; installing a new one replaces the old.

use grabber_platform::protocol::{ErrorHook, ErrorRecord};
use parking_lot::{const_rwlock, RwLock};

static HOOK: RwLock<Option<ErrorHook>> = const_rwlock(None);

pub fn install(hook: ErrorHook) {
    *HOOK.write() = Some(hook);
}

/// Hand a server error to the installed hook. Without a hook the error is
/// logged and dropped; the connection is never torn down here.
pub fn report(record: &ErrorRecord) -> i32 {
    let hook = *HOOK.read();
    match hook {
        Some(hook) => hook(record),
        None => {
            tracing::error!("unhandled X11 error ({})", record);
            0
        }
    }
}
