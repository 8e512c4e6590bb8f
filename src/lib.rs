//! Rule-driven role and channel-access synchronization.
//!
//! Moderators attach a boolean [`Rule`] over role identifiers to a role or
//! channel; the [`Synchronizer`] keeps every member's roles and channel
//! overwrites in line with those rules as their roles change.

mod config;
mod error;
mod evaluate;
pub mod parse;
pub mod platform;
mod store;
pub mod sync;
mod types;

pub use config::{Config, ConfigError};
pub use error::RoleSyncError;
pub use parse::RuleSyntaxError;
pub use platform::{
    ConfirmationPrompt, GuildDirectory, MemberSnapshot, PermissionSubject, Platform,
    PlatformError, ProgressReport,
};
pub use store::RuleStore;
pub use sync::{CommandOutcome, MemberChanges, RuleListing, SyncOutcome, Synchronizer};
pub use types::{
    role, ChannelId, Expr, MemberId, RoleId, Rule, RuleConflictError, RuleSet, Target, TargetId,
};
