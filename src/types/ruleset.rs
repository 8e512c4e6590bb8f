use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::info;

use crate::error::RoleSyncError;
use crate::platform::GuildDirectory;
use crate::store::RuleStore;

use super::error::RuleConflictError;
use super::rule::Rule;
use super::{ChannelId, RoleId, Target, TargetId};

/// Automatic rules keyed by the role or channel they govern.
///
/// No governed target may also be read by a rule: the set of keys and the
/// set of roles referenced by rules stay disjoint, so evaluation never
/// depends on the order rules are applied in.
///
/// When backed by a [`RuleStore`], every successful `set`/`delete` rewrites
/// the whole store before returning.
///
/// # Example
///
/// ```
/// use rolesync::{Rule, RuleSet, TargetId};
///
/// let mut rules = RuleSet::in_memory();
/// rules.set(TargetId(1), Rule::parse("10 or 11").unwrap()).unwrap();
///
/// // Role 10 is read by the rule for 1, so it cannot be governed itself.
/// assert!(rules.set(TargetId(10), Rule::parse("12").unwrap()).is_err());
/// ```
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: BTreeMap<TargetId, Rule>,
    store: Option<RuleStore>,
}

impl RuleSet {
    /// A set with no backing store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the set persisted in `store`. A missing or empty store yields an
    /// empty set.
    ///
    /// # Errors
    ///
    /// Returns [`RoleSyncError::StorageCorrupt`] if the stored document cannot
    /// be read as rules or governs a role that one of its rules reads; a
    /// corrupt store is never treated as empty.
    pub fn load(store: RuleStore) -> Result<Self, RoleSyncError> {
        let rules = store.load()?;
        Ok(Self {
            rules,
            store: Some(store),
        })
    }

    #[must_use]
    pub fn get(&self, target: TargetId) -> Option<&Rule> {
        self.rules.get(&target)
    }

    #[must_use]
    pub fn contains(&self, target: TargetId) -> bool {
        self.rules.contains_key(&target)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All entries in identifier order, live or not.
    pub fn iter(&self) -> impl Iterator<Item = (TargetId, &Rule)> {
        self.rules.iter().map(|(t, r)| (*t, r))
    }

    /// Roles that would be both governed and read if `rule` were stored for
    /// `target`. Empty means the entry can be added.
    #[must_use]
    pub fn collisions(&self, target: TargetId, rule: &Rule) -> BTreeSet<RoleId> {
        let mut governed: BTreeSet<TargetId> = self.rules.keys().copied().collect();
        governed.insert(target);

        let mut read = rule.referenced_role_ids();
        for existing in self.rules.values() {
            read.extend(existing.referenced_role_ids());
        }

        read.into_iter()
            .filter(|role| governed.contains(&TargetId::from(*role)))
            .collect()
    }

    /// Store `rule` for `target`, replacing any previous rule, and persist.
    ///
    /// Returns the replaced rule.
    ///
    /// # Errors
    ///
    /// Returns [`RoleSyncError::RuleConflict`] naming every conflicting role
    /// if the entry would break disjointness. If persisting fails the
    /// in-memory set is left unchanged.
    pub fn set(&mut self, target: TargetId, rule: Rule) -> Result<Option<Rule>, RoleSyncError> {
        let conflicts = self.collisions(target, &rule);
        if !conflicts.is_empty() {
            return Err(RuleConflictError { target, conflicts }.into());
        }

        let text = rule.source_text().to_owned();
        let previous = self.rules.insert(target, rule);
        if let Err(err) = self.persist() {
            match previous {
                Some(p) => self.rules.insert(target, p),
                None => self.rules.remove(&target),
            };
            return Err(err);
        }

        info!(target_id = %target, rule = %text, "automatic rule set");
        Ok(previous)
    }

    /// Remove the rule for `target` and persist.
    ///
    /// # Errors
    ///
    /// Returns [`RoleSyncError::RuleNotFound`] without touching storage if no
    /// rule exists for `target`.
    pub fn delete(&mut self, target: TargetId) -> Result<Rule, RoleSyncError> {
        let Some(removed) = self.rules.remove(&target) else {
            return Err(RoleSyncError::RuleNotFound { target });
        };
        if let Err(err) = self.persist() {
            self.rules.insert(target, removed);
            return Err(err);
        }

        info!(target_id = %target, rule = %removed, "automatic rule deleted");
        Ok(removed)
    }

    /// Entries whose target still exists in the guild: roles first, then
    /// channels. Stale entries are skipped, not removed.
    pub fn resolved<'a, D>(&'a self, guild: &'a D) -> impl Iterator<Item = (Target, &'a Rule)> + 'a
    where
        D: GuildDirectory + ?Sized,
    {
        self.roles(guild)
            .map(|(r, rule)| (Target::Role(r), rule))
            .chain(self.channels(guild).map(|(c, rule)| (Target::Channel(c), rule)))
    }

    pub fn roles<'a, D>(&'a self, guild: &'a D) -> impl Iterator<Item = (RoleId, &'a Rule)> + 'a
    where
        D: GuildDirectory + ?Sized,
    {
        self.rules
            .iter()
            .filter_map(move |(id, rule)| match guild.resolve(*id) {
                Some(Target::Role(r)) => Some((r, rule)),
                _ => None,
            })
    }

    pub fn channels<'a, D>(
        &'a self,
        guild: &'a D,
    ) -> impl Iterator<Item = (ChannelId, &'a Rule)> + 'a
    where
        D: GuildDirectory + ?Sized,
    {
        self.rules
            .iter()
            .filter_map(move |(id, rule)| match guild.resolve(*id) {
                Some(Target::Channel(c)) => Some((c, rule)),
                _ => None,
            })
    }

    fn persist(&self) -> Result<(), RoleSyncError> {
        match &self.store {
            Some(store) => store.save(&self.rules),
            None => Ok(()),
        }
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuleSet({} rules)", self.rules.len())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct Guild(HashMap<TargetId, Target>);

    impl GuildDirectory for Guild {
        fn resolve(&self, id: TargetId) -> Option<Target> {
            self.0.get(&id).copied()
        }
    }

    fn rule(text: &str) -> Rule {
        Rule::parse(text).unwrap()
    }

    #[test]
    fn set_and_get() {
        let mut rules = RuleSet::in_memory();
        assert_eq!(rules.set(TargetId(1), rule("10 or 11")).unwrap(), None);
        assert_eq!(rules.get(TargetId(1)), Some(&rule("10 or 11")));
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn replacing_returns_previous() {
        let mut rules = RuleSet::in_memory();
        rules.set(TargetId(1), rule("10")).unwrap();
        let previous = rules.set(TargetId(1), rule("11")).unwrap();
        assert_eq!(previous, Some(rule("10")));
        assert_eq!(rules.get(TargetId(1)), Some(&rule("11")));
    }

    #[test]
    fn self_reference_conflicts() {
        let mut rules = RuleSet::in_memory();
        match rules.set(TargetId(5), rule("5")) {
            Err(RoleSyncError::RuleConflict(err)) => {
                assert_eq!(err.conflicts, [RoleId(5)].into());
            }
            other => panic!("expected RuleConflict, got {other:?}"),
        }
        assert!(rules.is_empty());
    }

    #[test]
    fn new_target_read_by_existing_rule_conflicts() {
        let mut rules = RuleSet::in_memory();
        rules.set(TargetId(1), rule("10 and 11")).unwrap();
        let conflicts = rules.collisions(TargetId(10), &rule("12"));
        assert_eq!(conflicts, [RoleId(10)].into());
    }

    #[test]
    fn new_rule_reading_existing_target_conflicts() {
        let mut rules = RuleSet::in_memory();
        rules.set(TargetId(1), rule("10")).unwrap();
        rules.set(TargetId(2), rule("11")).unwrap();
        let conflicts = rules.collisions(TargetId(3), &rule("1 or 2 or 12"));
        assert_eq!(conflicts, [RoleId(1), RoleId(2)].into());
    }

    #[test]
    fn delete_missing_is_error() {
        let mut rules = RuleSet::in_memory();
        assert!(matches!(
            rules.delete(TargetId(9)),
            Err(RoleSyncError::RuleNotFound { target }) if target == TargetId(9)
        ));
    }

    #[test]
    fn delete_frees_roles_for_reuse() {
        let mut rules = RuleSet::in_memory();
        rules.set(TargetId(1), rule("10")).unwrap();
        assert!(!rules.collisions(TargetId(10), &rule("12")).is_empty());
        rules.delete(TargetId(1)).unwrap();
        assert!(rules.collisions(TargetId(10), &rule("12")).is_empty());
    }

    #[test]
    fn resolved_skips_stale_and_orders_roles_first() {
        let mut rules = RuleSet::in_memory();
        rules.set(TargetId(1), rule("10")).unwrap();
        rules.set(TargetId(2), rule("10")).unwrap();
        rules.set(TargetId(3), rule("10")).unwrap();

        let guild = Guild(HashMap::from([
            (TargetId(1), Target::Channel(ChannelId(1))),
            (TargetId(3), Target::Role(RoleId(3))),
        ]));

        let live: Vec<Target> = rules.resolved(&guild).map(|(t, _)| t).collect();
        assert_eq!(
            live,
            vec![Target::Role(RoleId(3)), Target::Channel(ChannelId(1))]
        );
        assert_eq!(rules.len(), 3);
    }

    #[test]
    fn persisted_on_every_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yaml");

        let mut rules = RuleSet::load(RuleStore::new(&path)).unwrap();
        rules.set(TargetId(1), rule("<@&10> and not <@&11>")).unwrap();
        rules.set(TargetId(2), rule("12")).unwrap();
        rules.delete(TargetId(2)).unwrap();

        let reloaded = RuleSet::load(RuleStore::new(&path)).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get(TargetId(1)), Some(&rule("10 and not 11")));
    }

    #[test]
    fn display() {
        let mut rules = RuleSet::in_memory();
        rules.set(TargetId(1), rule("10")).unwrap();
        assert_eq!(rules.to_string(), "RuleSet(1 rules)");
    }
}
