//! Task checklist models and normalization.
//!
//! Every case carries the same seven follow-up tasks. Persisted checklists
//! come in several historical shapes, so everything read from storage goes
//! through [`normalize_checklist`] before use.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of follow-up tasks tracked per case.
///
/// Declaration order is the display and CSV column order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TaskKey {
    DischargeNotes,
    PdvmNotified,
    Labs,
    Histo,
    SurgeryReport,
    Imaging,
    Culture,
}

impl TaskKey {
    /// All task keys in display order.
    pub const ALL: [TaskKey; 7] = [
        TaskKey::DischargeNotes,
        TaskKey::PdvmNotified,
        TaskKey::Labs,
        TaskKey::Histo,
        TaskKey::SurgeryReport,
        TaskKey::Imaging,
        TaskKey::Culture,
    ];

    /// Storage/wire name of the key.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKey::DischargeNotes => "dischargeNotes",
            TaskKey::PdvmNotified => "pdvmNotified",
            TaskKey::Labs => "labs",
            TaskKey::Histo => "histo",
            TaskKey::SurgeryReport => "surgeryReport",
            TaskKey::Imaging => "imaging",
            TaskKey::Culture => "culture",
        }
    }

    /// Human-readable label, also used as the CSV column header.
    pub fn label(&self) -> &'static str {
        match self {
            TaskKey::DischargeNotes => "Discharge Notes",
            TaskKey::PdvmNotified => "pDVM Notified",
            TaskKey::Labs => "Labs",
            TaskKey::Histo => "Histo",
            TaskKey::SurgeryReport => "Surgery Report",
            TaskKey::Imaging => "Imaging",
            TaskKey::Culture => "Culture",
        }
    }

    /// Map a CSV column header back to its task key.
    pub fn from_csv_column(column: &str) -> Option<TaskKey> {
        Self::ALL.into_iter().find(|key| key.label() == column)
    }
}

/// A single checklist entry. Both flags are always present.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskItem {
    /// Whether this task applies to the case
    pub required: bool,
    /// Whether the task has been completed
    pub checked: bool,
}

/// The full seven-task checklist.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TasksChecklist {
    pub discharge_notes: TaskItem,
    pub pdvm_notified: TaskItem,
    pub labs: TaskItem,
    pub histo: TaskItem,
    pub surgery_report: TaskItem,
    pub imaging: TaskItem,
    pub culture: TaskItem,
}

/// An outstanding task for card display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutstandingTask {
    pub key: TaskKey,
    pub label: &'static str,
    pub checked: bool,
}

impl TasksChecklist {
    /// Get the entry for a task.
    pub fn get(&self, key: TaskKey) -> TaskItem {
        match key {
            TaskKey::DischargeNotes => self.discharge_notes,
            TaskKey::PdvmNotified => self.pdvm_notified,
            TaskKey::Labs => self.labs,
            TaskKey::Histo => self.histo,
            TaskKey::SurgeryReport => self.surgery_report,
            TaskKey::Imaging => self.imaging,
            TaskKey::Culture => self.culture,
        }
    }

    /// Get a mutable reference to the entry for a task.
    pub fn get_mut(&mut self, key: TaskKey) -> &mut TaskItem {
        match key {
            TaskKey::DischargeNotes => &mut self.discharge_notes,
            TaskKey::PdvmNotified => &mut self.pdvm_notified,
            TaskKey::Labs => &mut self.labs,
            TaskKey::Histo => &mut self.histo,
            TaskKey::SurgeryReport => &mut self.surgery_report,
            TaskKey::Imaging => &mut self.imaging,
            TaskKey::Culture => &mut self.culture,
        }
    }

    /// Checklist for a newly created case: keeps the form's `required`
    /// selections, every task starts unchecked.
    pub fn for_new_case(form: &TasksChecklist) -> Self {
        let mut checklist = Self::default();
        for key in TaskKey::ALL {
            checklist.get_mut(key).required = form.get(key).required;
        }
        checklist
    }

    /// Required tasks that are not yet completed.
    pub fn outstanding_required(&self) -> Vec<OutstandingTask> {
        TaskKey::ALL
            .into_iter()
            .filter(|key| {
                let item = self.get(*key);
                item.required && !item.checked
            })
            .map(|key| OutstandingTask {
                key,
                label: key.label(),
                checked: self.get(key).checked,
            })
            .collect()
    }

    /// Flip the checked state, keeping `required`.
    pub fn toggle_checked(&mut self, key: TaskKey) {
        let item = self.get_mut(key);
        item.checked = !item.checked;
    }

    /// Set the required state, keeping `checked`.
    pub fn set_required(&mut self, key: TaskKey, required: bool) {
        self.get_mut(key).required = required;
    }
}

/// Decoded shape of a persisted checklist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEntryShape {
    /// `{ required, checked? }`
    Full { required: bool, checked: bool },
    /// `true` / `false` from before tasks had a required flag
    LegacyBoolean(bool),
    /// `{ checked }` without a required flag
    PartialChecked { checked: bool },
    /// Absent, null, or anything unrecognizable
    Missing,
}

impl TaskEntryShape {
    /// Classify a raw stored entry.
    pub fn decode(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Bool(checked)) => TaskEntryShape::LegacyBoolean(*checked),
            Some(Value::Object(entry)) => {
                let required = entry.get("required").and_then(Value::as_bool);
                let checked = entry.get("checked").and_then(Value::as_bool);
                match (required, checked) {
                    (Some(required), checked) => TaskEntryShape::Full {
                        required,
                        checked: checked.unwrap_or(false),
                    },
                    (None, Some(checked)) => TaskEntryShape::PartialChecked { checked },
                    (None, None) => TaskEntryShape::Missing,
                }
            }
            _ => TaskEntryShape::Missing,
        }
    }

    /// Resolve to a complete entry.
    pub fn into_item(self) -> TaskItem {
        match self {
            TaskEntryShape::Full { required, checked } => TaskItem { required, checked },
            TaskEntryShape::LegacyBoolean(checked) => TaskItem {
                required: false,
                checked,
            },
            TaskEntryShape::PartialChecked { checked } => TaskItem {
                required: false,
                checked,
            },
            TaskEntryShape::Missing => TaskItem::default(),
        }
    }
}

/// Normalize any stored checklist value into the full seven-task structure.
///
/// Total: non-object input yields the all-default checklist.
pub fn normalize_checklist(value: &Value) -> TasksChecklist {
    let mut checklist = TasksChecklist::default();
    let Some(entries) = value.as_object() else {
        return checklist;
    };

    for key in TaskKey::ALL {
        *checklist.get_mut(key) = TaskEntryShape::decode(entries.get(key.as_str())).into_item();
    }
    checklist
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_non_object_inputs() {
        for input in [Value::Null, json!(42), json!("labs"), json!([true, false])] {
            assert_eq!(normalize_checklist(&input), TasksChecklist::default());
        }
        assert_eq!(normalize_checklist(&json!({})), TasksChecklist::default());
    }

    #[test]
    fn test_normalize_mixed_shapes() {
        let stored = json!({
            "dischargeNotes": { "required": true, "checked": true },
            "pdvmNotified": true,
            "labs": { "checked": true },
            "histo": { "required": true },
            "surgeryReport": null,
            "imaging": "yes",
        });

        let checklist = normalize_checklist(&stored);
        assert_eq!(checklist.discharge_notes, TaskItem { required: true, checked: true });
        assert_eq!(checklist.pdvm_notified, TaskItem { required: false, checked: true });
        assert_eq!(checklist.labs, TaskItem { required: false, checked: true });
        assert_eq!(checklist.histo, TaskItem { required: true, checked: false });
        assert_eq!(checklist.surgery_report, TaskItem::default());
        assert_eq!(checklist.imaging, TaskItem::default());
        assert_eq!(checklist.culture, TaskItem::default());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let stored = json!({ "labs": true, "culture": { "required": true } });
        let once = normalize_checklist(&stored);
        let twice = normalize_checklist(&serde_json::to_value(once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_decode_shapes() {
        assert_eq!(TaskEntryShape::decode(None), TaskEntryShape::Missing);
        assert_eq!(
            TaskEntryShape::decode(Some(&json!(false))),
            TaskEntryShape::LegacyBoolean(false)
        );
        assert_eq!(
            TaskEntryShape::decode(Some(&json!({ "checked": false }))),
            TaskEntryShape::PartialChecked { checked: false }
        );
        assert_eq!(
            TaskEntryShape::decode(Some(&json!({ "required": false, "checked": true }))),
            TaskEntryShape::Full { required: false, checked: true }
        );
    }

    #[test]
    fn test_for_new_case_clears_checked() {
        let mut form = TasksChecklist::default();
        form.labs = TaskItem { required: true, checked: true };
        form.imaging = TaskItem { required: false, checked: true };

        let checklist = TasksChecklist::for_new_case(&form);
        assert_eq!(checklist.labs, TaskItem { required: true, checked: false });
        assert_eq!(checklist.imaging, TaskItem::default());
    }

    #[test]
    fn test_outstanding_required() {
        let mut checklist = TasksChecklist::default();
        checklist.set_required(TaskKey::Labs, true);
        checklist.set_required(TaskKey::Histo, true);
        checklist.toggle_checked(TaskKey::Histo);

        let outstanding = checklist.outstanding_required();
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].key, TaskKey::Labs);
        assert_eq!(outstanding[0].label, "Labs");
    }

    #[test]
    fn test_toggle_keeps_required() {
        let mut checklist = TasksChecklist::default();
        checklist.set_required(TaskKey::Culture, true);
        checklist.toggle_checked(TaskKey::Culture);
        assert_eq!(checklist.culture, TaskItem { required: true, checked: true });
        checklist.toggle_checked(TaskKey::Culture);
        assert_eq!(checklist.culture, TaskItem { required: true, checked: false });
    }

    #[test]
    fn test_csv_column_mapping() {
        for key in TaskKey::ALL {
            assert_eq!(TaskKey::from_csv_column(key.label()), Some(key));
        }
        assert_eq!(TaskKey::from_csv_column("Radiology"), None);
    }

    #[test]
    fn test_serialized_keys_match_as_str() {
        let value = serde_json::to_value(TasksChecklist::default()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 7);
        for key in TaskKey::ALL {
            assert!(object.contains_key(key.as_str()));
        }
    }
}
