//! Reconciliation of rule-governed roles and channel access.
//!
//! Two paths drive it: the member-update event path in [`event`] and the
//! moderator operations in [`manual`].

mod confirm;
mod diff;
mod event;
mod guard;
mod manual;
mod progress;

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::config::Config;
use crate::error::RoleSyncError;
use crate::platform::Platform;
use crate::store::RuleStore;
use crate::{RuleSet, Target};

pub use diff::TargetDiff;
pub use guard::{GuardMap, MemberGuard};
pub use manual::{CommandOutcome, RuleListing};
pub use progress::Progress;

/// Targets gained and lost by one member in a reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberChanges {
    pub add: BTreeSet<Target>,
    pub remove: BTreeSet<Target>,
}

impl MemberChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Result of handling one member-update event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The rules give the member the same targets as before.
    Unchanged,
    Applied(MemberChanges),
    /// Another reconciliation for the member was in flight; nothing was
    /// mutated.
    RaceAborted { level: usize },
}

/// Owns everything reconciliation needs: the platform, the rules, the
/// configuration and the per-member guards.
///
/// The rule set is only written by the moderator operations; the event path
/// takes a snapshot under a read lock and never holds it across an await.
pub struct Synchronizer<P: ?Sized> {
    platform: Arc<P>,
    rules: RwLock<RuleSet>,
    config: Config,
    guards: GuardMap,
}

impl<P: Platform + ?Sized> Synchronizer<P> {
    pub fn new(platform: Arc<P>, rules: RuleSet, config: Config) -> Self {
        Self {
            platform,
            rules: RwLock::new(rules),
            config,
            guards: GuardMap::new(),
        }
    }

    /// Build a synchronizer over the rules stored at `config.rules_path`.
    ///
    /// # Errors
    ///
    /// Returns [`RoleSyncError::StorageCorrupt`] if the stored rules cannot be
    /// read; startup must not continue with an empty set in that case.
    pub fn from_config(platform: Arc<P>, config: Config) -> Result<Self, RoleSyncError> {
        let rules = RuleSet::load(RuleStore::new(&config.rules_path))?;
        tracing::info!(rules = rules.len(), path = %config.rules_path.display(), "rules loaded");
        Ok(Self::new(platform, rules, config))
    }

    #[must_use]
    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read access to the rules. Do not hold across an await.
    pub fn rules(&self) -> RwLockReadGuard<'_, RuleSet> {
        self.rules.read()
    }

    #[must_use]
    pub fn guards(&self) -> &GuardMap {
        &self.guards
    }

    /// Live entries cloned out of the lock.
    fn live_rules(&self) -> Vec<(Target, crate::Rule)> {
        self.rules
            .read()
            .resolved(self.platform.as_ref())
            .map(|(target, rule)| (target, rule.clone()))
            .collect()
    }
}
