//! Ctrl+C routing: stops the running capture loop, or exits at the menu.

use rollcall_core::CancelToken;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exit status used when Ctrl+C arrives while no loop is running.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Clone, Default)]
pub struct Interrupt {
    token: CancelToken,
    armed: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the process-wide Ctrl+C handler.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let interrupt = self.clone();
        ctrlc::set_handler(move || {
            if interrupt.armed.load(Ordering::SeqCst) {
                interrupt.token.cancel();
            } else {
                println!();
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        })
    }

    /// Route Ctrl+C to the returned token until the guard is dropped.
    pub fn arm(&self) -> ArmGuard<'_> {
        self.token.reset();
        self.armed.store(true, Ordering::SeqCst);
        ArmGuard { interrupt: self }
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

/// Keeps Ctrl+C bound to the capture loop while alive.
pub struct ArmGuard<'a> {
    interrupt: &'a Interrupt,
}

impl ArmGuard<'_> {
    pub fn token(&self) -> &CancelToken {
        &self.interrupt.token
    }
}

impl Drop for ArmGuard<'_> {
    fn drop(&mut self) {
        self.interrupt.armed.store(false, Ordering::SeqCst);
    }
}
