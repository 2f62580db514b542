//! Cooperative shutdown on SIGINT/SIGTERM

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A stop request shared between the signal handler and the capture loop.
///
/// The handler only stores to the flag, the loop checks it between batches.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signal that is set by Ctrl-C and SIGTERM
    pub fn install() -> Result<Self, ctrlc::Error> {
        let signal = Self::new();
        let flag = signal.requested.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;
        Ok(signal)
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
