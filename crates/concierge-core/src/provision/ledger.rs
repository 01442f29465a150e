//! Per-run Unit state table with write-once output publication.
//!
//! The ledger is the only place outputs become visible. Publishing moves a
//! Unit to `Built` and stores its outputs under the same entry lock, so a
//! reader sees either no outputs or the complete frozen map.

use std::sync::Arc;

use concierge_types::error::ProvisionError;
use concierge_types::unit::{OutputMap, UnitId, UnitState};
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct LedgerEntry {
    state: UnitState,
    outputs: Option<Arc<OutputMap>>,
}

/// Shared state table for one deployment run.
///
/// Cloning is not supported; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct UnitLedger {
    entries: DashMap<UnitId, LedgerEntry>,
}

impl UnitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a Unit as `Declared`. Re-declaring an existing Unit is a no-op.
    pub fn declare(&self, unit: &UnitId) {
        self.entries.entry(unit.clone()).or_insert(LedgerEntry {
            state: UnitState::Declared,
            outputs: None,
        });
    }

    pub fn state(&self, unit: &UnitId) -> Option<UnitState> {
        self.entries.get(unit).map(|e| e.state)
    }

    /// Move a Unit to a non-`Built` state.
    ///
    /// Returns `false` when the Unit is unknown, already terminal, or the
    /// target is `Built` (which only [`UnitLedger::publish`] may set).
    pub fn transition(&self, unit: &UnitId, state: UnitState) -> bool {
        if state == UnitState::Built {
            return false;
        }
        match self.entries.get_mut(unit) {
            Some(mut entry) if !entry.state.is_terminal() => {
                entry.state = state;
                true
            }
            _ => false,
        }
    }

    /// Freeze and publish a Unit's outputs, marking it `Built`.
    pub fn publish(&self, unit: &UnitId, outputs: OutputMap) -> Result<Arc<OutputMap>, ProvisionError> {
        let mut entry = self.entries.entry(unit.clone()).or_insert(LedgerEntry {
            state: UnitState::Declared,
            outputs: None,
        });
        if entry.outputs.is_some() || entry.state.is_terminal() {
            return Err(ProvisionError::OutputsAlreadyPublished(unit.clone()));
        }
        let frozen = Arc::new(outputs);
        entry.outputs = Some(Arc::clone(&frozen));
        entry.state = UnitState::Built;
        Ok(frozen)
    }

    /// Read-only view of a Unit's outputs; `None` unless the Unit is `Built`.
    pub fn outputs(&self, unit: &UnitId) -> Option<Arc<OutputMap>> {
        let entry = self.entries.get(unit)?;
        if entry.state == UnitState::Built {
            entry.outputs.clone()
        } else {
            None
        }
    }

    pub fn states(&self) -> Vec<(UnitId, UnitState)> {
        let mut states: Vec<_> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.state))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outputs_hidden_until_built() {
        let ledger = UnitLedger::new();
        let unit = UnitId::from("kb");
        ledger.declare(&unit);
        assert!(ledger.transition(&unit, UnitState::Building));
        assert!(ledger.outputs(&unit).is_none());

        ledger
            .publish(&unit, OutputMap::from([("knowledgeBaseId".to_string(), json!("kb-123"))]))
            .unwrap();
        assert_eq!(ledger.state(&unit), Some(UnitState::Built));
        assert_eq!(ledger.outputs(&unit).unwrap()["knowledgeBaseId"], json!("kb-123"));
    }

    #[test]
    fn test_publish_is_write_once() {
        let ledger = UnitLedger::new();
        let unit = UnitId::from("kb");
        ledger.declare(&unit);
        ledger.publish(&unit, OutputMap::new()).unwrap();
        let err = ledger.publish(&unit, OutputMap::new()).unwrap_err();
        assert_eq!(err, ProvisionError::OutputsAlreadyPublished(unit));
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let ledger = UnitLedger::new();
        let unit = UnitId::from("bot");
        ledger.declare(&unit);
        assert!(ledger.transition(&unit, UnitState::Failed));
        assert!(!ledger.transition(&unit, UnitState::Building));
        assert!(!ledger.transition(&unit, UnitState::Built));
        assert!(ledger.publish(&unit, OutputMap::new()).is_err());
        assert_eq!(ledger.state(&unit), Some(UnitState::Failed));
    }

    #[test]
    fn test_unknown_unit_transition() {
        let ledger = UnitLedger::new();
        assert!(!ledger.transition(&UnitId::from("ghost"), UnitState::Building));
        assert!(ledger.state(&UnitId::from("ghost")).is_none());
    }
}
