// Deferred SIGINT/SIGTERM handling so an interrupted run still tears down

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

static PROCESS_INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Where a long wait looks to learn that the operator asked to stop.
///
/// `Process` is set by the handlers from [`install`]; `Detached` is a private
/// flag, used when nothing outside the caller should be able to interrupt it.
#[derive(Debug, Clone)]
pub enum InterruptFlag {
    Process,
    Detached(Arc<AtomicBool>),
}

impl InterruptFlag {
    pub fn process() -> Self {
        InterruptFlag::Process
    }

    pub fn detached() -> Self {
        InterruptFlag::Detached(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_set(&self) -> bool {
        match self {
            InterruptFlag::Process => PROCESS_INTERRUPTED.load(Ordering::SeqCst),
            InterruptFlag::Detached(flag) => flag.load(Ordering::SeqCst),
        }
    }

    pub fn set(&self) {
        match self {
            InterruptFlag::Process => PROCESS_INTERRUPTED.store(true, Ordering::SeqCst),
            InterruptFlag::Detached(flag) => flag.store(true, Ordering::SeqCst),
        }
    }
}

impl Default for InterruptFlag {
    fn default() -> Self {
        InterruptFlag::process()
    }
}

/// Replace the default "terminate" action of SIGINT and SIGTERM with setting
/// the process flag. Handlers reset to default across exec, so the suite
/// child still dies on Ctrl-C while testenv lives on to tear down.
#[cfg(unix)]
pub fn install() -> io::Result<()> {
    extern "C" fn on_signal(_signal: libc::c_int) {
        PROCESS_INTERRUPTED.store(true, Ordering::SeqCst);
    }

    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    for signal in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: the handler only performs an atomic store, which is async-signal-safe
        let previous = unsafe { libc::signal(signal, handler) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn install() -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_flags_are_independent() {
        let first = InterruptFlag::detached();
        let second = InterruptFlag::detached();
        let shared = first.clone();

        shared.set();

        assert!(first.is_set());
        assert!(!second.is_set());
    }
}
