use std::collections::BTreeSet;

use crate::platform::{MemberSnapshot, PermissionSubject, Platform, PlatformError};
use crate::{MemberId, Rule, Target};

/// Members to add to and remove from one target so that the members who
/// have it are exactly the members who need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDiff {
    pub target: Target,
    pub to_add: BTreeSet<MemberId>,
    pub to_remove: BTreeSet<MemberId>,
}

impl TargetDiff {
    #[must_use]
    pub fn compute(target: Target, have: &BTreeSet<MemberId>, need: &BTreeSet<MemberId>) -> Self {
        Self {
            target,
            to_add: need.difference(have).copied().collect(),
            to_remove: have.difference(need).copied().collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }
}

/// Members currently holding the role, or with a member overwrite on the
/// channel.
pub(crate) async fn have<P>(platform: &P, target: Target) -> Result<BTreeSet<MemberId>, PlatformError>
where
    P: Platform + ?Sized,
{
    match target {
        Target::Role(role) => Ok(platform.role_holders(role).await?.into_iter().collect()),
        Target::Channel(channel) => Ok(platform
            .channel_overwrites(channel)
            .await?
            .into_iter()
            .filter_map(|subject| match subject {
                PermissionSubject::Member(m) => Some(m),
                PermissionSubject::Role(_) => None,
            })
            .collect()),
    }
}

/// Members whose roles satisfy `rule`. No rule means nobody.
pub(crate) fn need(members: &[MemberSnapshot], rule: Option<&Rule>) -> BTreeSet<MemberId> {
    let Some(rule) = rule else {
        return BTreeSet::new();
    };
    members
        .iter()
        .filter(|m| rule.evaluate(&m.roles))
        .map(|m| m.id)
        .collect()
}
