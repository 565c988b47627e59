//! Ctrl-C handling while external tools run
//!
//! A terminal delivers SIGINT to the whole foreground process group, so the
//! tool and pyfab are interrupted together. pyfab only records the interrupt.
//! The tool decides how to exit, after which pyfab still runs its own cleanup.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INSTALLED: OnceLock<()> = OnceLock::new();

/// Install the process-wide Ctrl-C handler. Later calls do nothing.
pub fn install() {
    INSTALLED.get_or_init(|| {
        if let Err(e) = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst)) {
            warn!("Unable to install the Ctrl-C handler: {e}");
        } else {
            debug!("Installed Ctrl-C handler");
        }
    });
}

/// Whether Ctrl-C was pressed since the last call; clears the flag.
#[must_use]
pub fn take() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}
