use std::collections::BTreeSet;

use thiserror::Error;

use super::{RoleId, TargetId};

/// Adding a rule would let a governed target also be a rule input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "rule for {target} conflicts: the roles rules read must be distinct from the targets they govern (conflicting: {})",
    join_ids(.conflicts)
)]
pub struct RuleConflictError {
    pub target: TargetId,
    pub conflicts: BTreeSet<RoleId>,
}

fn join_ids(ids: &BTreeSet<RoleId>) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
