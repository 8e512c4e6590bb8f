//! In-memory guild standing in for the chat platform.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rolesync::{
    ChannelId, ConfirmationPrompt, GuildDirectory, MemberId, MemberSnapshot, PermissionSubject,
    Platform, PlatformError, ProgressReport, RoleId, Target, TargetId,
};
use tokio::sync::{Notify, Semaphore};

/// Every mutation the synchronizer issued, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Grant(MemberId, Vec<RoleId>),
    Revoke(MemberId, Vec<RoleId>),
    Allow(ChannelId, MemberId),
    RemoveOverwrite(ChannelId, PermissionSubject),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Accept,
    Reject,
    Never,
    /// Accept once a permit is added to [`MemoryGuild::held`].
    Held,
}

#[derive(Debug)]
struct State {
    roles: HashSet<RoleId>,
    channels: HashSet<ChannelId>,
    members: BTreeMap<MemberId, HashSet<RoleId>>,
    overwrites: HashMap<ChannelId, Vec<PermissionSubject>>,
    calls: Vec<Call>,
    prompts: Vec<ConfirmationPrompt>,
    progress: Vec<ProgressReport>,
    answer: Answer,
    fail_mutations: bool,
}

/// Holds role grants until released, one permit per grant.
#[derive(Debug)]
pub struct Gate {
    pub entered: Notify,
    pub release: Semaphore,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Semaphore::new(0),
        })
    }
}

#[derive(Debug)]
pub struct MemoryGuild {
    state: Mutex<State>,
    gate: Option<Arc<Gate>>,
    held: Arc<Gate>,
}

impl MemoryGuild {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                roles: HashSet::new(),
                channels: HashSet::new(),
                members: BTreeMap::new(),
                overwrites: HashMap::new(),
                calls: Vec::new(),
                prompts: Vec::new(),
                progress: Vec::new(),
                answer: Answer::Accept,
                fail_mutations: false,
            }),
            gate: None,
            held: Gate::new(),
        }
    }

    pub fn gated(gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn with_roles(self, ids: &[u64]) -> Self {
        self.state.lock().roles.extend(ids.iter().copied().map(RoleId));
        self
    }

    pub fn with_channels(self, ids: &[u64]) -> Self {
        self.state
            .lock()
            .channels
            .extend(ids.iter().copied().map(ChannelId));
        self
    }

    pub fn with_member(self, id: u64, roles: &[u64]) -> Self {
        self.state
            .lock()
            .members
            .insert(MemberId(id), roles.iter().copied().map(RoleId).collect());
        self
    }

    pub fn with_overwrite(self, channel: u64, subject: PermissionSubject) -> Self {
        self.state
            .lock()
            .overwrites
            .entry(ChannelId(channel))
            .or_default()
            .push(subject);
        self
    }

    pub fn answer(&self, answer: Answer) {
        self.state.lock().answer = answer;
    }

    /// Gate for confirmations answered with [`Answer::Held`].
    pub fn held(&self) -> &Gate {
        &self.held
    }

    pub fn fail_mutations(&self) {
        self.state.lock().fail_mutations = true;
    }

    pub fn snapshot(&self, id: u64) -> MemberSnapshot {
        let roles = self
            .state
            .lock()
            .members
            .get(&MemberId(id))
            .cloned()
            .unwrap_or_default();
        MemberSnapshot {
            id: MemberId(id),
            roles,
        }
    }

    /// Change a member's roles by hand, returning the before/after pair an
    /// update event would carry.
    pub fn set_member_roles(&self, id: u64, roles: &[u64]) -> (MemberSnapshot, MemberSnapshot) {
        let before = self.snapshot(id);
        self.state
            .lock()
            .members
            .insert(MemberId(id), roles.iter().copied().map(RoleId).collect());
        (before, self.snapshot(id))
    }

    pub fn has_role(&self, member: u64, role: u64) -> bool {
        self.state
            .lock()
            .members
            .get(&MemberId(member))
            .is_some_and(|roles| roles.contains(&RoleId(role)))
    }

    pub fn overwrites(&self, channel: u64) -> Vec<PermissionSubject> {
        self.state
            .lock()
            .overwrites
            .get(&ChannelId(channel))
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn prompts(&self) -> Vec<ConfirmationPrompt> {
        self.state.lock().prompts.clone()
    }

    pub fn progress(&self) -> Vec<ProgressReport> {
        self.state.lock().progress.clone()
    }

    fn record(&self, call: Call) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        if state.fail_mutations {
            return Err(PlatformError::new("missing permissions"));
        }
        state.calls.push(call);
        Ok(())
    }
}

impl GuildDirectory for MemoryGuild {
    fn resolve(&self, id: TargetId) -> Option<Target> {
        let state = self.state.lock();
        if state.roles.contains(&RoleId(id.get())) {
            Some(Target::Role(RoleId(id.get())))
        } else if state.channels.contains(&ChannelId(id.get())) {
            Some(Target::Channel(ChannelId(id.get())))
        } else {
            None
        }
    }
}

#[async_trait]
impl Platform for MemoryGuild {
    async fn members(&self) -> Result<Vec<MemberSnapshot>, PlatformError> {
        Ok(self
            .state
            .lock()
            .members
            .iter()
            .map(|(id, roles)| MemberSnapshot {
                id: *id,
                roles: roles.clone(),
            })
            .collect())
    }

    async fn role_holders(&self, role: RoleId) -> Result<HashSet<MemberId>, PlatformError> {
        Ok(self
            .state
            .lock()
            .members
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(id, _)| *id)
            .collect())
    }

    async fn channel_overwrites(
        &self,
        channel: ChannelId,
    ) -> Result<Vec<PermissionSubject>, PlatformError> {
        Ok(self.overwrites(channel.get()))
    }

    async fn grant_roles(&self, member: MemberId, roles: &[RoleId]) -> Result<(), PlatformError> {
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            let permit = gate
                .release
                .acquire()
                .await
                .map_err(|_| PlatformError::new("gate closed"))?;
            permit.forget();
        }
        self.record(Call::Grant(member, roles.to_vec()))?;
        self.state
            .lock()
            .members
            .entry(member)
            .or_default()
            .extend(roles.iter().copied());
        Ok(())
    }

    async fn revoke_roles(&self, member: MemberId, roles: &[RoleId]) -> Result<(), PlatformError> {
        self.record(Call::Revoke(member, roles.to_vec()))?;
        if let Some(held) = self.state.lock().members.get_mut(&member) {
            for role in roles {
                held.remove(role);
            }
        }
        Ok(())
    }

    async fn allow_channel(&self, channel: ChannelId, member: MemberId) -> Result<(), PlatformError> {
        self.record(Call::Allow(channel, member))?;
        let mut state = self.state.lock();
        let subjects = state.overwrites.entry(channel).or_default();
        let subject = PermissionSubject::Member(member);
        if !subjects.contains(&subject) {
            subjects.push(subject);
        }
        Ok(())
    }

    async fn remove_overwrite(
        &self,
        channel: ChannelId,
        subject: PermissionSubject,
    ) -> Result<(), PlatformError> {
        self.record(Call::RemoveOverwrite(channel, subject))?;
        if let Some(subjects) = self.state.lock().overwrites.get_mut(&channel) {
            subjects.retain(|s| *s != subject);
        }
        Ok(())
    }

    async fn confirm(&self, prompt: &ConfirmationPrompt) -> Result<bool, PlatformError> {
        let answer = {
            let mut state = self.state.lock();
            state.prompts.push(prompt.clone());
            state.answer
        };
        match answer {
            Answer::Accept => Ok(true),
            Answer::Reject => Ok(false),
            Answer::Never => {
                std::future::pending::<()>().await;
                Ok(false)
            }
            Answer::Held => {
                self.held.entered.notify_one();
                let permit = self
                    .held
                    .release
                    .acquire()
                    .await
                    .map_err(|_| PlatformError::new("gate closed"))?;
                permit.forget();
                Ok(true)
            }
        }
    }

    async fn report_progress(&self, report: &ProgressReport) -> Result<(), PlatformError> {
        self.state.lock().progress.push(report.clone());
        Ok(())
    }
}
