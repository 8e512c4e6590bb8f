use std::fmt;

use tracing::{info, warn};

use crate::error::RoleSyncError;
use crate::platform::{ConfirmationPrompt, PermissionSubject, Platform, ProgressReport};
use crate::{ChannelId, RoleId, Rule, RuleConflictError, Target, TargetId};

use super::confirm::{fix_prompt, rule_prompt};
use super::diff::{self, TargetDiff};
use super::progress::Progress;
use super::Synchronizer;

/// Result of a moderator operation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied { added: usize, removed: usize },
    /// The operator rejected the change or did not answer in time.
    Cancelled,
    NothingToDelete,
    NothingToFix,
    Cleared { overwrites: usize },
}

/// Read-only view of the live rules, with mentions rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleListing {
    pub roles: Vec<(RoleId, String)>,
    pub channels: Vec<(ChannelId, String)>,
}

impl fmt::Display for RuleListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.roles.is_empty() {
            writeln!(f, "Roles")?;
            for (role, rule) in &self.roles {
                writeln!(f, "{}: {rule}", Target::Role(*role).mention())?;
            }
        }
        if !self.channels.is_empty() {
            writeln!(f, "Channels")?;
            for (channel, rule) in &self.channels {
                writeln!(f, "{}: {rule}", Target::Channel(*channel).mention())?;
            }
        }
        Ok(())
    }
}

fn parse_target(text: &str) -> Result<TargetId, RoleSyncError> {
    TargetId::parse_mention(text).ok_or_else(|| RoleSyncError::InvalidTarget {
        input: text.to_owned(),
    })
}

impl<P: Platform + ?Sized> Synchronizer<P> {
    /// Define or replace the automatic rule of a role or channel.
    ///
    /// Asks the operator to confirm the resulting changes before touching
    /// any member, and stores the rule only once they are applied.
    ///
    /// # Errors
    ///
    /// Returns the operator-facing [`RoleSyncError`] for an unreadable or
    /// unknown target, invalid rule text, a conflict with existing rules, or
    /// a channel rule with a top-level `or` on a role.
    pub async fn set_rule(
        &self,
        target_text: &str,
        rule_text: &str,
    ) -> Result<CommandOutcome, RoleSyncError> {
        let id = parse_target(target_text)?;
        let target = self
            .platform
            .resolve(id)
            .ok_or(RoleSyncError::TargetNotFound { target: id })?;
        let rule = Rule::parse(rule_text)?;

        let conflicts = self.rules.read().collisions(id, &rule);
        if !conflicts.is_empty() {
            return Err(RuleConflictError {
                target: id,
                conflicts,
            }
            .into());
        }

        self.setup_rule(target, Some(rule)).await
    }

    /// Delete the automatic rule of a role or channel, taking the target
    /// away from everyone who has it.
    ///
    /// # Errors
    ///
    /// Returns [`RoleSyncError::InvalidTarget`] for unreadable input and
    /// platform or storage errors.
    pub async fn delete_rule(&self, target_text: &str) -> Result<CommandOutcome, RoleSyncError> {
        let id = parse_target(target_text)?;
        if !self.rules.read().contains(id) {
            return Ok(CommandOutcome::NothingToDelete);
        }

        match self.platform.resolve(id) {
            Some(target) => self.setup_rule(target, None).await,
            None => {
                self.rules.write().delete(id)?;
                warn!(target_id = %id, "deleted rule of a target that no longer exists");
                Ok(CommandOutcome::Applied {
                    added: 0,
                    removed: 0,
                })
            }
        }
    }

    /// Recompute every live rule against the whole guild and apply the
    /// differences after one confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`RoleSyncError::Platform`] if the platform fails.
    pub async fn fix(&self) -> Result<CommandOutcome, RoleSyncError> {
        let members = self.platform.members().await?;

        let mut diffs = Vec::new();
        for (target, rule) in self.live_rules() {
            let have = diff::have(self.platform.as_ref(), target).await?;
            let need = diff::need(&members, Some(&rule));
            let diff = TargetDiff::compute(target, &have, &need);
            if !diff.is_empty() {
                diffs.push(diff);
            }
        }

        if diffs.is_empty() {
            return Ok(CommandOutcome::NothingToFix);
        }

        let prompt = fix_prompt(&diffs, self.config.confirm_timeout());
        if !self.ask(&prompt).await? {
            return Ok(CommandOutcome::Cancelled);
        }

        let (mut added, mut removed) = (0, 0);
        for diff in &diffs {
            self.apply_diff(diff).await?;
            added += diff.to_add.len();
            removed += diff.to_remove.len();
        }
        info!(added, removed, targets = diffs.len(), "automatic rules fixed");
        Ok(CommandOutcome::Applied { added, removed })
    }

    /// The live rules, roles first.
    #[must_use]
    pub fn show(&self) -> RuleListing {
        let rules = self.rules.read();
        let guild = self.platform.as_ref();
        RuleListing {
            roles: rules
                .roles(guild)
                .map(|(role, rule)| (role, rule.render_with_mentions()))
                .collect(),
            channels: rules
                .channels(guild)
                .map(|(channel, rule)| (channel, rule.render_with_mentions()))
                .collect(),
        }
    }

    /// Remove every permission overwrite on a channel, whether or not a rule
    /// governs it.
    ///
    /// # Errors
    ///
    /// Returns [`RoleSyncError::TargetNotFound`] if the input does not name
    /// a live channel.
    pub async fn clear_channel(&self, channel_text: &str) -> Result<CommandOutcome, RoleSyncError> {
        let id = parse_target(channel_text)?;
        let Some(Target::Channel(channel)) = self.platform.resolve(id) else {
            return Err(RoleSyncError::TargetNotFound { target: id });
        };

        let subjects = self.platform.channel_overwrites(channel).await?;
        for subject in &subjects {
            self.platform.remove_overwrite(channel, *subject).await?;
        }
        info!(channel = %channel, overwrites = subjects.len(), "channel overwrites cleared");
        Ok(CommandOutcome::Cleared {
            overwrites: subjects.len(),
        })
    }

    /// Confirm, apply and store a rule change for one target. `None` deletes
    /// the rule, so nobody needs the target any more.
    async fn setup_rule(
        &self,
        target: Target,
        rule: Option<Rule>,
    ) -> Result<CommandOutcome, RoleSyncError> {
        if let (Target::Channel(_), Some(rule)) = (target, &rule) {
            if rule.is_top_level_or_with_role() {
                return Err(RoleSyncError::ChannelRuleTopLevelOr);
            }
        }

        let members = self.platform.members().await?;
        let have = diff::have(self.platform.as_ref(), target).await?;
        let need = diff::need(&members, rule.as_ref());
        let diff = TargetDiff::compute(target, &have, &need);

        let prompt = rule_prompt(&diff, rule.as_ref(), self.config.confirm_timeout());
        if !self.ask(&prompt).await? {
            info!(target_id = %target.id(), "rule change cancelled");
            return Ok(CommandOutcome::Cancelled);
        }

        // Another change may have been stored while the prompt was open.
        if let Some(rule) = &rule {
            let conflicts = self.rules.read().collisions(target.id(), rule);
            if !conflicts.is_empty() {
                warn!(target_id = %target.id(), ?conflicts, "rule conflicts after confirmation");
                return Err(RuleConflictError {
                    target: target.id(),
                    conflicts,
                }
                .into());
            }
        }

        self.apply_diff(&diff).await?;

        {
            let mut rules = self.rules.write();
            match rule {
                Some(rule) => {
                    rules.set(target.id(), rule)?;
                }
                None => {
                    rules.delete(target.id())?;
                }
            }
        }

        Ok(CommandOutcome::Applied {
            added: diff.to_add.len(),
            removed: diff.to_remove.len(),
        })
    }

    /// Wait for the operator's answer; no answer in time counts as a no.
    async fn ask(&self, prompt: &ConfirmationPrompt) -> Result<bool, RoleSyncError> {
        match tokio::time::timeout(prompt.timeout, self.platform.confirm(prompt)).await {
            Ok(answer) => Ok(answer?),
            Err(_) => {
                info!(title = %prompt.title, "confirmation timed out");
                Ok(false)
            }
        }
    }

    /// Removals first, then additions, one member at a time.
    async fn apply_diff(&self, diff: &TargetDiff) -> Result<(), RoleSyncError> {
        let (remove_label, add_label) = match diff.target {
            Target::Role(_) => ("Removing", "Adding"),
            Target::Channel(_) => ("Removing from", "Adding to"),
        };
        let name = diff.target.mention();
        let threshold = self.config.progress_threshold;
        let step = self.config.progress_step;

        let progress = Progress::new(
            format!("{remove_label} {name}"),
            diff.to_remove.len(),
            threshold,
            step,
        );
        self.report(progress.start()).await?;
        for (i, member) in diff.to_remove.iter().enumerate() {
            match diff.target {
                Target::Role(role) => self.platform.revoke_roles(*member, &[role]).await?,
                Target::Channel(channel) => {
                    self.platform
                        .remove_overwrite(channel, PermissionSubject::Member(*member))
                        .await?;
                }
            }
            self.report(progress.after(i + 1)).await?;
        }

        let progress = Progress::new(
            format!("{add_label} {name}"),
            diff.to_add.len(),
            threshold,
            step,
        );
        self.report(progress.start()).await?;
        for (i, member) in diff.to_add.iter().enumerate() {
            match diff.target {
                Target::Role(role) => self.platform.grant_roles(*member, &[role]).await?,
                Target::Channel(channel) => {
                    self.platform.allow_channel(channel, *member).await?;
                }
            }
            self.report(progress.after(i + 1)).await?;
        }
        Ok(())
    }

    async fn report(&self, report: Option<ProgressReport>) -> Result<(), RoleSyncError> {
        if let Some(report) = report {
            self.platform.report_progress(&report).await?;
        }
        Ok(())
    }
}
