use std::collections::{BTreeSet, HashSet};

use tracing::{debug, error, info, warn};

use crate::error::RoleSyncError;
use crate::platform::{MemberSnapshot, PermissionSubject, Platform};
use crate::{RoleId, Target};

use super::{MemberChanges, SyncOutcome, Synchronizer};

impl<P: Platform + ?Sized> Synchronizer<P> {
    /// Reconcile one member after their roles changed.
    ///
    /// Targets are compared between what the rules gave for `before` and
    /// what they give for `after`, not against what the member actually
    /// holds: a role assigned by hand where no rule grants it is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`RoleSyncError::Platform`] if a mutation fails. The member's
    /// guard is released either way.
    pub async fn on_member_update(
        &self,
        before: &MemberSnapshot,
        after: &MemberSnapshot,
    ) -> Result<SyncOutcome, RoleSyncError> {
        let (need, have) = {
            let rules = self.rules.read();
            let granted = |roles: &HashSet<RoleId>| -> BTreeSet<Target> {
                rules
                    .resolved(self.platform.as_ref())
                    .filter(|(_, rule)| rule.evaluate(roles))
                    .map(|(target, _)| target)
                    .collect()
            };
            (granted(&after.roles), granted(&before.roles))
        };

        let changes = MemberChanges {
            add: need.difference(&have).copied().collect(),
            remove: have.difference(&need).copied().collect(),
        };
        if changes.is_empty() {
            return Ok(SyncOutcome::Unchanged);
        }

        let _guard = match self.guards.try_acquire(after.id) {
            Ok(guard) => guard,
            Err(level) => {
                warn!(
                    member = %after.id,
                    level,
                    add = ?changes.add,
                    remove = ?changes.remove,
                    "role race, automatic update aborted"
                );
                return Ok(SyncOutcome::RaceAborted { level });
            }
        };

        if self.config.log_updates {
            let mut held: Vec<RoleId> = before.roles.iter().copied().collect();
            held.sort_unstable();
            let changed: BTreeSet<RoleId> = before
                .roles
                .symmetric_difference(&after.roles)
                .copied()
                .collect();
            info!(
                member = %after.id,
                before = ?held,
                changed = ?changed,
                add = ?changes.add,
                remove = ?changes.remove,
                "automatic role update"
            );
        }

        self.apply_member_changes(after, &changes).await?;
        Ok(SyncOutcome::Applied(changes))
    }

    /// Event-feed entry point: like [`on_member_update`](Self::on_member_update)
    /// but failures are logged instead of returned, since no one is waiting
    /// on the result.
    pub async fn handle_member_update(&self, before: &MemberSnapshot, after: &MemberSnapshot) {
        match self.on_member_update(before, after).await {
            Ok(outcome) => debug!(member = %after.id, ?outcome, "member update handled"),
            Err(err) => error!(member = %after.id, error = %err, "automatic role update failed"),
        }
    }

    async fn apply_member_changes(
        &self,
        member: &MemberSnapshot,
        changes: &MemberChanges,
    ) -> Result<(), RoleSyncError> {
        let grant: Vec<RoleId> = changes.add.iter().filter_map(|t| role_of(*t)).collect();
        // Only revoke what the member still holds.
        let revoke: Vec<RoleId> = changes
            .remove
            .iter()
            .filter_map(|t| role_of(*t))
            .filter(|r| member.roles.contains(r))
            .collect();

        if !grant.is_empty() {
            self.platform.grant_roles(member.id, &grant).await?;
        }
        if !revoke.is_empty() {
            self.platform.revoke_roles(member.id, &revoke).await?;
        }

        for target in &changes.add {
            if let Target::Channel(channel) = *target {
                self.platform.allow_channel(channel, member.id).await?;
            }
        }
        for target in &changes.remove {
            if let Target::Channel(channel) = *target {
                self.platform
                    .remove_overwrite(channel, PermissionSubject::Member(member.id))
                    .await?;
            }
        }
        Ok(())
    }
}

fn role_of(target: Target) -> Option<RoleId> {
    match target {
        Target::Role(r) => Some(r),
        Target::Channel(_) => None,
    }
}
