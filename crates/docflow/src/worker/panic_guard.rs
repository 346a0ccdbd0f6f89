//! Turns a panic inside a worker into a [`WorkerError::Panic`] carrying the
//! panic message and a backtrace.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use crate::error::WorkerError;

thread_local! {
    static GUARDED: Cell<bool> = const { Cell::new(false) };
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

/// Installs a process-wide hook that records backtraces for guarded
/// threads and defers to the previous hook everywhere else.
fn install_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARDED.with(Cell::get) {
                let backtrace = Backtrace::force_capture().to_string();
                LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
            } else {
                previous(info);
            }
        }));
    });
}

/// Runs `f`, converting an unwinding panic into an error.
pub fn catch<F, T>(f: F) -> Result<T, WorkerError>
where
    F: FnOnce() -> T,
{
    install_hook();
    let was_guarded = GUARDED.with(|g| g.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    GUARDED.with(|g| g.set(was_guarded));

    result.map_err(|payload| WorkerError::Panic {
        message: panic_message(payload.as_ref()),
        backtrace: LAST_BACKTRACE
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_default(),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_value_passes_through() {
        assert_eq!(catch(|| 41 + 1).unwrap(), 42);
    }

    #[test]
    #[serial]
    fn test_panic_becomes_error() {
        let result: Result<(), _> = catch(|| panic!("disk on fire: {}", 7));
        match result {
            Err(WorkerError::Panic { message, backtrace }) => {
                assert_eq!(message, "disk on fire: 7");
                assert!(!backtrace.is_empty());
            }
            other => panic!("expected panic error, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_static_str_payload() {
        let result: Result<(), _> = catch(|| std::panic::panic_any("plain"));
        assert!(matches!(result, Err(WorkerError::Panic { message, .. }) if message == "plain"));
    }
}
