//! Version snapshots and alias generations.
//!
//! A [`VersionStore`] only ever appends: a snapshot deep-copies the locale and
//! is handed out behind an `Arc`, so no later edit to the draft can reach it.
//! [`AliasHistory`] treats rebinding the same way; each bind is a new
//! generation and earlier ones stay addressable.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use concierge_types::dialog::{BotAlias, BotVersion, KnowledgeAssociation, Locale, VersionRef};
use concierge_types::error::DialogError;
use concierge_types::unit::UnitId;

/// Append-only store of immutable bot versions, numbered from 1.
#[derive(Debug, Default)]
pub struct VersionStore {
    versions: Vec<Arc<BotVersion>>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot `locale` into the next version.
    pub fn snapshot(&mut self, locale: &Locale, created_from: &UnitId) -> Arc<BotVersion> {
        let version = Arc::new(BotVersion {
            version: VersionRef(self.versions.len() as u32 + 1),
            locale: locale.clone(),
            created_from: created_from.clone(),
            created_at: Utc::now(),
        });
        self.versions.push(Arc::clone(&version));
        tracing::debug!(
            version = %version.version,
            locale = locale.locale_id(),
            intents = locale.intents().len(),
            "bot version snapshotted"
        );
        version
    }

    pub fn get(&self, version: VersionRef) -> Option<Arc<BotVersion>> {
        let idx = (version.0 as usize).checked_sub(1)?;
        self.versions.get(idx).cloned()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Every generation of every alias, keyed by alias name.
#[derive(Debug, Default)]
pub struct AliasHistory {
    aliases: BTreeMap<String, Vec<BotAlias>>,
}

impl AliasHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to an existing version, producing the next generation.
    pub fn bind(
        &mut self,
        name: &str,
        version: VersionRef,
        versions: &VersionStore,
        knowledge_association: Option<KnowledgeAssociation>,
    ) -> Result<BotAlias, DialogError> {
        if versions.get(version).is_none() {
            return Err(DialogError::UnknownVersion(version.0));
        }

        let generations = self.aliases.entry(name.to_string()).or_default();
        let alias = BotAlias {
            name: name.to_string(),
            generation: generations.len() as u32 + 1,
            version,
            knowledge_association,
            bound_at: Utc::now(),
        };
        generations.push(alias.clone());
        tracing::debug!(alias = name, generation = alias.generation, version = %version, "alias bound");
        Ok(alias)
    }

    /// The newest generation of `name`.
    pub fn current(&self, name: &str) -> Option<&BotAlias> {
        self.aliases.get(name).and_then(|g| g.last())
    }

    pub fn generations(&self, name: &str) -> &[BotAlias] {
        self.aliases.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_types::dialog::{Intent, QNA_INTENT_SIGNATURE};

    fn locale() -> Locale {
        Locale::new("en_US", 0.4)
            .unwrap()
            .with_intent(Intent::with_utterances("WelcomeIntent", ["Hi"]))
            .unwrap()
    }

    #[test]
    fn test_snapshot_is_immune_to_draft_edits() {
        let mut store = VersionStore::new();
        let mut draft = locale();
        let v1 = store.snapshot(&draft, &UnitId::from("bot"));

        draft.add_intent(Intent::builtin(QNA_INTENT_SIGNATURE)).unwrap();
        draft.remove_intent("WelcomeIntent");

        assert_eq!(v1.version, VersionRef(1));
        assert_eq!(v1.locale, locale());
        assert_eq!(store.get(VersionRef(1)).unwrap().locale, locale());

        let v2 = store.snapshot(&draft, &UnitId::from("bot"));
        assert_eq!(v2.version, VersionRef(2));
        assert!(v2.locale.supports_knowledge());
        assert!(!v1.locale.supports_knowledge());
    }

    #[test]
    fn test_version_zero_does_not_exist() {
        let mut store = VersionStore::new();
        store.snapshot(&locale(), &UnitId::from("bot"));
        assert!(store.get(VersionRef(0)).is_none());
        assert!(store.get(VersionRef(2)).is_none());
    }

    #[test]
    fn test_alias_requires_existing_version() {
        let store = VersionStore::new();
        let mut history = AliasHistory::new();
        let err = history
            .bind("Production", VersionRef(1), &store, None)
            .unwrap_err();
        assert_eq!(err, DialogError::UnknownVersion(1));
        assert!(history.current("Production").is_none());
    }

    #[test]
    fn test_rebinding_appends_generation() {
        let mut store = VersionStore::new();
        let mut history = AliasHistory::new();
        let v1 = store.snapshot(&locale(), &UnitId::from("bot"));
        let v2 = store.snapshot(&locale(), &UnitId::from("bot"));

        let first = history.bind("Production", v1.version, &store, None).unwrap();
        let second = history.bind("Production", v2.version, &store, None).unwrap();

        assert_eq!(first.generation, 1);
        assert_eq!(second.generation, 2);
        let generations = history.generations("Production");
        assert_eq!(generations.len(), 2);
        assert_eq!(generations[0].version, VersionRef(1));
        assert_eq!(history.current("Production").unwrap().version, VersionRef(2));
    }
}
