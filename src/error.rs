use std::path::PathBuf;

use thiserror::Error;

use crate::parse::RuleSyntaxError;
use crate::platform::PlatformError;
use crate::{RuleConflictError, TargetId};

/// Unified error type for rule management and synchronization.
///
/// Every variant renders as a message fit for the moderator who issued the
/// failing command.
#[derive(Debug, Error)]
pub enum RoleSyncError {
    #[error(transparent)]
    RuleSyntax(#[from] RuleSyntaxError),

    #[error(transparent)]
    RuleConflict(#[from] RuleConflictError),

    #[error("channel or role {target} not found")]
    TargetNotFound { target: TargetId },

    #[error("channel or role format not understood: `{input}`")]
    InvalidTarget { input: String },

    #[error("no rule is defined for {target}")]
    RuleNotFound { target: TargetId },

    #[error("rule storage at {} is corrupt: {reason}", .path.display())]
    StorageCorrupt { path: PathBuf, reason: String },

    #[error(
        "the rule contains a top level `or` with a role; allow that role on the channel directly and keep rules for negations and conjunctions"
    )]
    ChannelRuleTopLevelOr,

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
