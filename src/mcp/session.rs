//! Session lifecycle state.
//!
//! A session starts [`SessionState::Uninitialized`] and moves to
//! [`SessionState::Ready`] on the first successful `initialize`. It never
//! moves back. The flag is atomic so concurrently dispatched requests can
//! read it without a lock.

use std::sync::atomic::{AtomicBool, Ordering};

/// Lifecycle state of the single client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for `initialize`. Only `initialize` and `ping` are served.
    Uninitialized,
    /// Handshake done; every method is served.
    Ready,
}

/// Process-wide session state, passed into the dispatcher.
#[derive(Debug, Default)]
pub struct Session {
    initialized: AtomicBool,
}

impl Session {
    /// Creates an uninitialized session.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.is_ready() {
            SessionState::Ready
        } else {
            SessionState::Uninitialized
        }
    }

    /// Returns `true` once `initialize` has succeeded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Marks the handshake complete. Returns `true` if this call made the
    /// transition, `false` if the session was already ready.
    pub fn mark_ready(&self) -> bool {
        !self.initialized.swap(true, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uninitialized() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(!session.is_ready());
    }

    #[test]
    fn ready_is_sticky() {
        let session = Session::new();
        assert!(session.mark_ready());
        assert!(!session.mark_ready());
        assert_eq!(session.state(), SessionState::Ready);
    }
}
