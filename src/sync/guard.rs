use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::MemberId;

/// At most one in-flight reconciliation per member.
///
/// A second attempt for a member already being reconciled is refused rather
/// than queued; the next role-change event re-triggers a correct pass.
#[derive(Debug, Clone, Default)]
pub struct GuardMap {
    attempts: Arc<Mutex<HashMap<MemberId, usize>>>,
}

/// Exclusive claim on a member, released on drop.
#[derive(Debug)]
#[must_use = "the member is released as soon as the guard is dropped"]
pub struct MemberGuard {
    attempts: Arc<Mutex<HashMap<MemberId, usize>>>,
    member: MemberId,
}

impl GuardMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `member`.
    ///
    /// # Errors
    ///
    /// If the member is already claimed, returns the race level: how many
    /// attempts overlapped the one in flight, this one included.
    pub fn try_acquire(&self, member: MemberId) -> Result<MemberGuard, usize> {
        let mut attempts = self.attempts.lock();
        let count = attempts.entry(member).or_insert(0);
        *count += 1;
        if *count > 1 {
            return Err(*count - 1);
        }
        Ok(MemberGuard {
            attempts: Arc::clone(&self.attempts),
            member,
        })
    }

    #[must_use]
    pub fn is_held(&self, member: MemberId) -> bool {
        self.attempts.lock().contains_key(&member)
    }
}

impl MemberGuard {
    #[must_use]
    pub fn member(&self) -> MemberId {
        self.member
    }
}

impl Drop for MemberGuard {
    fn drop(&mut self) {
        self.attempts.lock().remove(&self.member);
    }
}
