//! The boundary to the chat platform.
//!
//! The synchronizer never talks to a chat service directly; an adapter over
//! the platform's client library implements [`Platform`] and hands it to
//! [`Synchronizer::new()`](crate::Synchronizer::new).

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::{ChannelId, MemberId, RoleId, Target, TargetId};

/// A request to the chat platform failed. Never retried by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("platform request failed: {message}")]
pub struct PlatformError {
    message: String,
}

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A member and the roles they hold at some instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSnapshot {
    pub id: MemberId,
    pub roles: HashSet<RoleId>,
}

impl MemberSnapshot {
    pub fn new(id: impl Into<MemberId>, roles: impl IntoIterator<Item = RoleId>) -> Self {
        Self {
            id: id.into(),
            roles: roles.into_iter().collect(),
        }
    }
}

/// Who a channel permission overwrite applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionSubject {
    Member(MemberId),
    Role(RoleId),
}

/// What the operator is asked to acknowledge before a manual change.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationPrompt {
    pub title: String,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub timeout: Duration,
}

impl ConfirmationPrompt {
    /// Value of the field named `name`, if present.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Incremental progress of a long batch of mutations.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub description: String,
    pub processed: usize,
    pub total: usize,
    pub elapsed: Duration,
    /// `None` until at least one item has been processed.
    pub remaining: Option<Duration>,
}

/// Synchronous lookup of identifiers in the live guild.
pub trait GuildDirectory {
    /// Resolve an identifier to the role or channel it names, if it still
    /// exists.
    fn resolve(&self, id: TargetId) -> Option<Target>;
}

/// Everything the synchronizer needs from the chat platform.
#[async_trait]
pub trait Platform: GuildDirectory + Send + Sync {
    async fn members(&self) -> Result<Vec<MemberSnapshot>, PlatformError>;

    async fn role_holders(&self, role: RoleId) -> Result<HashSet<MemberId>, PlatformError>;

    async fn channel_overwrites(
        &self,
        channel: ChannelId,
    ) -> Result<Vec<PermissionSubject>, PlatformError>;

    async fn grant_roles(&self, member: MemberId, roles: &[RoleId]) -> Result<(), PlatformError>;

    async fn revoke_roles(&self, member: MemberId, roles: &[RoleId])
        -> Result<(), PlatformError>;

    /// Overwrite the member's permissions on the channel to allow reading
    /// and sending messages.
    async fn allow_channel(
        &self,
        channel: ChannelId,
        member: MemberId,
    ) -> Result<(), PlatformError>;

    async fn remove_overwrite(
        &self,
        channel: ChannelId,
        subject: PermissionSubject,
    ) -> Result<(), PlatformError>;

    /// Show the prompt and wait for the operator to accept (`true`) or
    /// reject (`false`). The caller enforces the prompt's timeout.
    async fn confirm(&self, prompt: &ConfirmationPrompt) -> Result<bool, PlatformError>;

    async fn report_progress(&self, report: &ProgressReport) -> Result<(), PlatformError>;
}
