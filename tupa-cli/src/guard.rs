//! Two-step confirmation for wiping the index.

/// What a reset request resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetDecision {
    /// First request: the user must repeat it to confirm.
    Armed,
    /// Confirmed: the caller should delete every vector now.
    Execute,
}

/// Session-scoped guard in front of `IndexStore::delete_all`.
///
/// The first request arms the guard and the second executes. Any other
/// command in between disarms it, so a stray confirmation never carries
/// over.
#[derive(Debug, Default)]
pub struct ResetGuard {
    armed: bool,
}

impl ResetGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reset request.
    pub fn request(&mut self) -> ResetDecision {
        if self.armed {
            self.armed = false;
            ResetDecision::Execute
        } else {
            self.armed = true;
            ResetDecision::Armed
        }
    }

    /// Cancel a pending confirmation.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_request_executes() {
        let mut guard = ResetGuard::new();
        assert_eq!(guard.request(), ResetDecision::Armed);
        assert!(guard.is_armed());
        assert_eq!(guard.request(), ResetDecision::Execute);
        assert!(!guard.is_armed());
    }

    #[test]
    fn execution_rearms_from_scratch() {
        let mut guard = ResetGuard::new();
        guard.request();
        guard.request();
        assert_eq!(guard.request(), ResetDecision::Armed);
    }

    #[test]
    fn disarm_cancels_pending_confirmation() {
        let mut guard = ResetGuard::new();
        guard.request();
        guard.disarm();
        assert_eq!(guard.request(), ResetDecision::Armed);
    }
}
