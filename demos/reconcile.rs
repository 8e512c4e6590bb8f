//! Walk through a rule's life cycle against an in-memory guild.
//!
//! Run with `RUST_LOG=rolesync=debug cargo run --example reconcile` to see
//! the synchronizer's logs.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rolesync::{
    ChannelId, Config, ConfirmationPrompt, GuildDirectory, MemberId, MemberSnapshot,
    PermissionSubject, Platform, PlatformError, ProgressReport, RoleId, RuleSet, Synchronizer,
    Target, TargetId,
};
use tracing_subscriber::EnvFilter;

const MEMBERSHIP: u64 = 1;
const PATRON: u64 = 2;
const VIP: u64 = 10;
const LOUNGE: u64 = 20;

#[derive(Default)]
struct Guild {
    members: Mutex<BTreeMap<MemberId, HashSet<RoleId>>>,
    overwrites: Mutex<Vec<(ChannelId, PermissionSubject)>>,
}

impl Guild {
    fn snapshot(&self, id: MemberId) -> MemberSnapshot {
        let roles = self.members.lock().get(&id).cloned().unwrap_or_default();
        MemberSnapshot { id, roles }
    }
}

impl GuildDirectory for Guild {
    fn resolve(&self, id: TargetId) -> Option<Target> {
        match id.get() {
            MEMBERSHIP | PATRON | VIP => Some(Target::Role(id.into())),
            LOUNGE => Some(Target::Channel(ChannelId(LOUNGE))),
            _ => None,
        }
    }
}

#[async_trait]
impl Platform for Guild {
    async fn members(&self) -> Result<Vec<MemberSnapshot>, PlatformError> {
        Ok(self
            .members
            .lock()
            .iter()
            .map(|(id, roles)| MemberSnapshot::new(*id, roles.iter().copied()))
            .collect())
    }

    async fn role_holders(&self, role: RoleId) -> Result<HashSet<MemberId>, PlatformError> {
        Ok(self
            .members
            .lock()
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(id, _)| *id)
            .collect())
    }

    async fn channel_overwrites(
        &self,
        channel: ChannelId,
    ) -> Result<Vec<PermissionSubject>, PlatformError> {
        Ok(self
            .overwrites
            .lock()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, s)| *s)
            .collect())
    }

    async fn grant_roles(&self, member: MemberId, roles: &[RoleId]) -> Result<(), PlatformError> {
        println!("  + {member} gains {roles:?}");
        self.members
            .lock()
            .entry(member)
            .or_default()
            .extend(roles.iter().copied());
        Ok(())
    }

    async fn revoke_roles(&self, member: MemberId, roles: &[RoleId]) -> Result<(), PlatformError> {
        println!("  - {member} loses {roles:?}");
        if let Some(held) = self.members.lock().get_mut(&member) {
            held.retain(|r| !roles.contains(r));
        }
        Ok(())
    }

    async fn allow_channel(&self, channel: ChannelId, member: MemberId) -> Result<(), PlatformError> {
        println!("  + {member} may read <#{channel}>");
        self.overwrites
            .lock()
            .push((channel, PermissionSubject::Member(member)));
        Ok(())
    }

    async fn remove_overwrite(
        &self,
        channel: ChannelId,
        subject: PermissionSubject,
    ) -> Result<(), PlatformError> {
        println!("  - {subject:?} removed from <#{channel}>");
        self.overwrites
            .lock()
            .retain(|(c, s)| !(*c == channel && *s == subject));
        Ok(())
    }

    async fn confirm(&self, prompt: &ConfirmationPrompt) -> Result<bool, PlatformError> {
        println!("{}: {}", prompt.title, prompt.description);
        for (name, value) in &prompt.fields {
            println!("  {name}: {value}");
        }
        Ok(true)
    }

    async fn report_progress(&self, report: &ProgressReport) -> Result<(), PlatformError> {
        println!("  {report}");
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let guild = Arc::new(Guild::default());
    {
        let mut members = guild.members.lock();
        members.insert(MemberId(100), [RoleId(MEMBERSHIP)].into());
        members.insert(MemberId(101), [RoleId(PATRON)].into());
        members.insert(MemberId(102), HashSet::new());
    }

    let sync = Synchronizer::new(Arc::clone(&guild), RuleSet::in_memory(), Config::default());

    println!("== set VIP rule");
    let outcome = sync.set_rule("<@&10>", "<@&1> or <@&2>").await?;
    println!("=> {outcome:?}");

    println!("== set lounge rule");
    let outcome = sync.set_rule("<#20>", "1 and not 2").await?;
    println!("=> {outcome:?}");

    println!("== member 102 gets the membership role");
    let before = guild.snapshot(MemberId(102));
    guild
        .members
        .lock()
        .entry(MemberId(102))
        .or_default()
        .insert(RoleId(MEMBERSHIP));
    let after = guild.snapshot(MemberId(102));
    println!("=> {:?}", sync.on_member_update(&before, &after).await?);

    println!("== a rule that reads a governed role");
    if let Err(err) = sync.set_rule("<@&2>", "<@&10>").await {
        println!("=> refused: {err}");
    }

    println!("== rules");
    print!("{}", sync.show());

    println!("== fix");
    println!("=> {:?}", sync.fix().await?);
    Ok(())
}
