mod error;
mod expr;
mod id;
mod rule;
mod ruleset;

pub use error::RuleConflictError;
pub use expr::{role, Expr};
pub use id::{ChannelId, MemberId, RoleId, Target, TargetId};
pub use rule::Rule;
pub use ruleset::RuleSet;
