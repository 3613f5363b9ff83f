//! Hotkey dispatcher.
//!
//! Holds the registered-trigger table and answers, for a set of held keys,
//! which bindings fire and whether the event should be swallowed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::actions::ActionSpec;
use crate::config::HotkeyRecord;
use crate::error::BindingError;
use crate::trigger::{KeyToken, Trigger};

/// A hotkey ready for registration.
#[derive(Clone, Debug, PartialEq)]
pub struct HotkeyBinding {
    pub trigger: Trigger,
    pub action: ActionSpec,
    pub active: bool,
    pub suppress: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl HotkeyBinding {
    pub fn from_record(record: &HotkeyRecord) -> Result<Self, BindingError> {
        let trigger = Trigger::parse(&record.trigger)?;
        let action = match record.kind.as_str() {
            "File" | "Folder" | "run" => ActionSpec::RunPath(record.target.clone()),
            "focus" => ActionSpec::FocusWindow(record.target.clone()),
            "open_url" => ActionSpec::OpenUrl(record.target.clone()),
            other => return Err(BindingError::UnknownActionType(other.to_string())),
        };
        let created_at = record.created_at.and_then(timestamp_to_datetime);

        Ok(Self {
            trigger,
            action,
            active: record.active,
            suppress: record.suppress,
            created_at,
        })
    }
}

fn timestamp_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

/// A record that could not be turned into a binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedBinding {
    pub trigger: String,
    pub reason: String,
}

/// Convert records to active bindings, collecting the ones that were rejected.
///
/// Inactive records are dropped silently; they are not errors.
pub fn bindings_from_records(records: &[HotkeyRecord]) -> (Vec<HotkeyBinding>, Vec<SkippedBinding>) {
    let mut bindings = Vec::new();
    let mut skipped = Vec::new();

    for record in records.iter().filter(|r| r.active) {
        match HotkeyBinding::from_record(record) {
            Ok(binding) => bindings.push(binding),
            Err(e) => {
                warn!(trigger = %record.trigger, error = %e, "Skipping hotkey binding");
                skipped.push(SkippedBinding {
                    trigger: record.trigger.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    (bindings, skipped)
}

/// Outcome of a successful lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dispatch {
    pub suppress: bool,
    pub actions: Vec<ActionSpec>,
}

/// Registered triggers and their bindings.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HotkeyDispatcher {
    table: HashMap<Trigger, Vec<HotkeyBinding>>,
}

impl HotkeyDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from bindings; inactive ones never enter it.
    ///
    /// Duplicate triggers are kept in load order and all fire.
    pub fn from_bindings(bindings: impl IntoIterator<Item = HotkeyBinding>) -> Self {
        let mut table: HashMap<Trigger, Vec<HotkeyBinding>> = HashMap::new();
        for binding in bindings.into_iter().filter(|b| b.active) {
            table.entry(binding.trigger.clone()).or_default().push(binding);
        }
        debug!(trigger_count = table.len(), "Hotkey table built");
        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn contains(&self, trigger: &Trigger) -> bool {
        self.table.contains_key(trigger)
    }

    pub fn bindings_for(&self, trigger: &Trigger) -> &[HotkeyBinding] {
        self.table.get(trigger).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Registered triggers in canonical string order.
    pub fn triggers(&self) -> Vec<&Trigger> {
        let mut triggers: Vec<&Trigger> = self.table.keys().collect();
        triggers.sort_by_key(|t| t.format());
        triggers
    }

    /// Exact-match the held keys against the table.
    pub fn lookup<'a>(&self, held: impl IntoIterator<Item = &'a KeyToken>) -> Option<Dispatch> {
        let held = Trigger::from_tokens(held.into_iter().cloned());
        let bindings = self.table.get(&held)?;
        Some(Dispatch {
            suppress: bindings.iter().any(|b| b.suppress),
            actions: bindings.iter().map(|b| b.action.clone()).collect(),
        })
    }
}
