use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use log::debug;

use super::diagnostics_model::{DiagnosticsEvent, DiagnosticsSnapshot, FieldChange};
use crate::snapshots::EntityKind;

/// Stateful change detector for per-entity diagnostics metadata.
///
/// Only non-empty differences produce events, so ticks that leave provenance
/// and coverage untouched stay silent.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsDiffer {
    last_seen: HashMap<(EntityKind, String), DiagnosticsSnapshot>,
}

impl DiagnosticsDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares `next` against the last observation for `(kind, uuid)`.
    ///
    /// `None`, or a snapshot with no defined field, means the metadata was
    /// withdrawn: a removal event lists every previously defined field and
    /// the stored entry is dropped.
    pub fn observe(
        &mut self,
        kind: EntityKind,
        uuid: &str,
        next: Option<DiagnosticsSnapshot>,
        source: &str,
    ) -> Option<DiagnosticsEvent> {
        let key = (kind, uuid.to_string());
        let next = next.filter(|snapshot| !snapshot.is_empty());

        let Some(next) = next else {
            let previous = self.last_seen.remove(&key)?;
            let changed: BTreeMap<String, FieldChange> = previous
                .fields()
                .into_iter()
                .filter_map(|(field, value)| {
                    value.map(|previous| {
                        (
                            field.to_string(),
                            FieldChange {
                                previous: Some(previous),
                                current: None,
                            },
                        )
                    })
                })
                .collect();
            if changed.is_empty() {
                return None;
            }
            debug!("Diagnostics withdrawn for {} {}", kind, uuid);
            return Some(DiagnosticsEvent {
                kind,
                uuid: uuid.to_string(),
                source: source.to_string(),
                changed,
                snapshot: None,
                timestamp: Utc::now(),
            });
        };

        let previous_fields = self.last_seen.get(&key).map(DiagnosticsSnapshot::fields);
        let changed: BTreeMap<String, FieldChange> = next
            .fields()
            .into_iter()
            .enumerate()
            .filter_map(|(i, (field, current))| {
                let previous = previous_fields
                    .as_ref()
                    .and_then(|fields| fields[i].1.clone());
                (previous != current)
                    .then(|| (field.to_string(), FieldChange { previous, current }))
            })
            .collect();

        if changed.is_empty() {
            return None;
        }

        debug!(
            "Diagnostics changed for {} {}: {:?}",
            kind,
            uuid,
            changed.keys().collect::<Vec<_>>()
        );
        self.last_seen.insert(key, next.clone());
        Some(DiagnosticsEvent {
            kind,
            uuid: uuid.to_string(),
            source: source.to_string(),
            changed,
            snapshot: Some(next),
            timestamp: Utc::now(),
        })
    }

    /// Last observed metadata for `(kind, uuid)`.
    pub fn last_seen(&self, kind: EntityKind, uuid: &str) -> Option<DiagnosticsSnapshot> {
        self.last_seen.get(&(kind, uuid.to_string())).cloned()
    }

    /// Forgets `(kind, uuid)` without emitting anything.
    pub fn forget(&mut self, kind: EntityKind, uuid: &str) {
        self.last_seen.remove(&(kind, uuid.to_string()));
    }

    pub fn reset(&mut self) {
        self.last_seen.clear();
    }
}
