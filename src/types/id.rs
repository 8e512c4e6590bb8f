use std::fmt;
use std::str::FromStr;

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl $name {
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }
    };
}

snowflake!(
    /// Identifier of a guild role.
    RoleId
);
snowflake!(
    /// Identifier of a guild channel.
    ChannelId
);
snowflake!(
    /// Identifier of a guild member.
    MemberId
);
snowflake!(
    /// Identifier of something a rule governs: a role or a channel.
    ///
    /// Roles and channels share one identifier namespace; which one a target
    /// is gets decided by resolving it against live guild state.
    TargetId
);

impl From<RoleId> for TargetId {
    fn from(id: RoleId) -> Self {
        Self(id.0)
    }
}

impl From<ChannelId> for TargetId {
    fn from(id: ChannelId) -> Self {
        Self(id.0)
    }
}

impl From<TargetId> for RoleId {
    fn from(id: TargetId) -> Self {
        Self(id.0)
    }
}

impl TargetId {
    /// Parse a target given either as a bare integer or as a role, channel or
    /// user mention.
    ///
    /// Returns `None` when the text is neither.
    #[must_use]
    pub fn parse_mention(text: &str) -> Option<Self> {
        crate::parse::normalize_mentions(text).parse().ok()
    }
}

/// A target identifier resolved against live guild state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    Role(RoleId),
    Channel(ChannelId),
}

impl Target {
    #[must_use]
    pub fn id(self) -> TargetId {
        match self {
            Target::Role(r) => r.into(),
            Target::Channel(c) => c.into(),
        }
    }

    #[must_use]
    pub fn is_role(self) -> bool {
        matches!(self, Target::Role(_))
    }

    /// Mention syntax for display.
    #[must_use]
    pub fn mention(self) -> String {
        match self {
            Target::Role(r) => format!("<@&{r}>"),
            Target::Channel(c) => format!("<#{c}>"),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Role(r) => write!(f, "role {r}"),
            Target::Channel(c) => write!(f, "channel {c}"),
        }
    }
}
