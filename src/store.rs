use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value as Yaml;
use tracing::debug;

use crate::error::RoleSyncError;
use crate::{RoleId, Rule, TargetId};

/// The YAML document holding every automatic rule.
///
/// The document is a flat mapping from target identifier to normalized rule
/// text. It is always read and written whole: there is exactly one writer,
/// and the last fully-written file is authoritative.
#[derive(Debug, Clone)]
pub struct RuleStore {
    path: PathBuf,
}

impl RuleStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored rule, creating an empty document if none exists.
    ///
    /// # Errors
    ///
    /// Returns [`RoleSyncError::StorageCorrupt`] if the document is not a
    /// mapping of identifiers to valid rules, and [`RoleSyncError::Io`] on
    /// I/O failure.
    pub fn load(&self) -> Result<BTreeMap<TargetId, Rule>, RoleSyncError> {
        self.ensure_parent()?;
        if !self.path.exists() {
            debug!(path = %self.path.display(), "creating empty rule store");
            fs::write(&self.path, "")?;
        }

        let text = fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let doc: Yaml = serde_yaml::from_str(&text).map_err(|e| self.corrupt(e.to_string()))?;
        let mapping = match doc {
            Yaml::Mapping(m) => m,
            Yaml::Null => return Ok(BTreeMap::new()),
            _ => return Err(self.corrupt("expected a mapping of targets to rules")),
        };

        let mut rules = BTreeMap::new();
        for (key, value) in &mapping {
            let target = target_key(key)
                .ok_or_else(|| self.corrupt(format!("invalid target identifier {key:?}")))?;
            let text = match value {
                Yaml::String(s) => s.clone(),
                Yaml::Number(n) => n.to_string(),
                other => {
                    return Err(self.corrupt(format!(
                        "rule for {target} is not a string: {other:?}"
                    )));
                }
            };
            let rule = Rule::parse(&text)
                .map_err(|e| self.corrupt(format!("rule for {target}: {e}")))?;
            rules.insert(target, rule);
        }

        let conflicts = governed_and_read(&rules);
        if !conflicts.is_empty() {
            let ids: Vec<String> = conflicts.iter().map(ToString::to_string).collect();
            return Err(self.corrupt(format!(
                "roles both governed and read by rules: {}",
                ids.join(", ")
            )));
        }

        debug!(path = %self.path.display(), count = rules.len(), "loaded rules");
        Ok(rules)
    }

    /// Rewrite the whole document.
    ///
    /// The text goes to a sibling temporary file that is then renamed over the
    /// document, so readers never observe a partial write.
    ///
    /// # Errors
    ///
    /// Returns [`RoleSyncError::Io`] on I/O failure.
    pub fn save(&self, rules: &BTreeMap<TargetId, Rule>) -> Result<(), RoleSyncError> {
        let doc: BTreeMap<u64, &str> = rules
            .iter()
            .map(|(target, rule)| (target.get(), rule.source_text()))
            .collect();
        let text = serde_yaml::to_string(&doc).map_err(std::io::Error::other)?;

        self.ensure_parent()?;
        let tmp = self.path.with_extension("yaml.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), count = rules.len(), "saved rules");
        Ok(())
    }

    fn ensure_parent(&self) -> std::io::Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
            _ => Ok(()),
        }
    }

    fn corrupt(&self, reason: impl Into<String>) -> RoleSyncError {
        RoleSyncError::StorageCorrupt {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

/// Roles that are rule targets and also appear in some rule.
fn governed_and_read(rules: &BTreeMap<TargetId, Rule>) -> BTreeSet<RoleId> {
    rules
        .values()
        .flat_map(Rule::referenced_role_ids)
        .filter(|role| rules.contains_key(&TargetId::from(*role)))
        .collect()
}

fn target_key(key: &Yaml) -> Option<TargetId> {
    match key {
        Yaml::Number(n) => n.as_u64().map(TargetId),
        Yaml::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> RuleStore {
        RuleStore::new(dir.path().join("data").join("rules.yaml"))
    }

    #[test]
    fn missing_file_loads_empty_and_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().unwrap().is_empty());
        assert!(store.path().exists());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mut rules = BTreeMap::new();
        rules.insert(TargetId(100), Rule::parse("1 or 2").unwrap());
        rules.insert(TargetId(200), Rule::parse("3").unwrap());
        store.save(&rules).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, rules);
    }

    #[test]
    fn accepts_string_keys_and_numeric_rules() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_parent().unwrap();
        fs::write(store.path(), "'100': 1 and not 2\n200: 3\n").unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded[&TargetId(100)].source_text(), "1 and not 2");
        assert_eq!(loaded[&TargetId(200)].source_text(), "3");
    }

    #[test]
    fn non_mapping_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_parent().unwrap();
        fs::write(store.path(), "- 1\n- 2\n").unwrap();
        assert!(matches!(
            store.load(),
            Err(RoleSyncError::StorageCorrupt { .. })
        ));
    }

    #[test]
    fn invalid_yaml_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_parent().unwrap();
        fs::write(store.path(), "{ 1: [unclosed\n").unwrap();
        assert!(matches!(
            store.load(),
            Err(RoleSyncError::StorageCorrupt { .. })
        ));
    }

    #[test]
    fn bad_rule_text_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_parent().unwrap();
        fs::write(store.path(), "100: 1 == 2\n").unwrap();
        match store.load() {
            Err(RoleSyncError::StorageCorrupt { reason, .. }) => {
                assert!(reason.contains("rule for 100"), "{reason}");
            }
            other => panic!("expected StorageCorrupt, got {other:?}"),
        }
    }

    #[test]
    fn self_referencing_rule_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_parent().unwrap();
        fs::write(store.path(), "100: '100 or 1'\n").unwrap();
        match store.load() {
            Err(RoleSyncError::StorageCorrupt { reason, .. }) => {
                assert!(reason.ends_with("read by rules: 100"), "{reason}");
            }
            other => panic!("expected StorageCorrupt, got {other:?}"),
        }
    }

    #[test]
    fn rule_reading_another_target_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_parent().unwrap();
        fs::write(store.path(), "100: '100 or 1'\n1: '2'\n").unwrap();
        match store.load() {
            Err(RoleSyncError::StorageCorrupt { reason, .. }) => {
                assert!(reason.ends_with("read by rules: 1, 100"), "{reason}");
            }
            other => panic!("expected StorageCorrupt, got {other:?}"),
        }
    }

    #[test]
    fn no_temporary_file_is_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&BTreeMap::new()).unwrap();
        assert!(!store.path().with_extension("yaml.tmp").exists());
    }
}
