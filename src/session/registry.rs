use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::error::SessionError;

/// Tracks the single session allowed to be active at a time.
///
/// `Session::new` uses the process-wide registry; tests construct
/// sessions against a private instance so they can run concurrently.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: AtomicBool,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<SessionRegistry> {
        static GLOBAL: OnceLock<Arc<SessionRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(SessionRegistry::new())))
    }

    /// Claim the active slot. Fails if a session is already active.
    pub fn acquire(&self) -> Result<(), SessionError> {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| SessionError::AnotherSessionActive)?;
        debug!("Session slot acquired");
        Ok(())
    }

    /// Release the active slot. Called on every terminal transition;
    /// safe to call when nothing is active.
    pub fn release(&self) {
        self.active.store(false, Ordering::SeqCst);
        debug!("Session slot released");
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
