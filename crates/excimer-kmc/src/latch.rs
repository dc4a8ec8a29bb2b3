//! The latched error flag.

use std::cell::RefCell;

/// A sticky runtime error flag with a human-readable message.
///
/// Runtime consistency failures latch here instead of unwinding, and the
/// scheduling loop terminates on its next check. Interior mutability lets
/// read-only diagnostic queries (site energy at bad coordinates, status
/// dumps) latch through `&self`; the engine is single-threaded by
/// construction, so a `RefCell` suffices.
#[derive(Debug, Default)]
pub struct ErrorLatch {
    message: RefCell<Option<String>>,
}

impl ErrorLatch {
    /// Latch an error. The first message is kept; later latches only
    /// preserve the already-recorded cause.
    pub fn set(&self, message: impl Into<String>) {
        let mut slot = self.message.borrow_mut();
        if slot.is_none() {
            *slot = Some(message.into());
        }
    }

    /// Whether an error has been latched.
    pub fn is_set(&self) -> bool {
        self.message.borrow().is_some()
    }

    /// The recorded message, if any.
    pub fn message(&self) -> Option<String> {
        self.message.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_wins() {
        let latch = ErrorLatch::default();
        assert!(!latch.is_set());
        latch.set("first failure");
        latch.set("second failure");
        assert!(latch.is_set());
        assert_eq!(latch.message().as_deref(), Some("first failure"));
    }
}
