use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{AvailabilityRecord, DeskRecord, SlotRecord, StudentRecord};

/// Everything a run reads, as exported by the import collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub desks: Vec<DeskRecord>,
    #[serde(default)]
    pub students: Vec<StudentRecord>,
    #[serde(default)]
    pub slots: Vec<SlotRecord>,
    #[serde(default)]
    pub availability: Vec<AvailabilityRecord>,
}

impl Snapshot {
    pub fn load(path: &Path) -> io::Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Write via a temp file and rename.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScheduleKind;

    const SAMPLE: &str = r#"{
        "desks": [{"id": "d1", "desk_name": "circ", "year": "2025", "term_or_break": "Spring Term", "kind": "term"}],
        "students": [{"id": "s1", "preferred_name": "Ana", "jobs": "circ,jmc", "seniority": 3,
                      "max_shifts": 4, "year": "2025", "term_or_break": "Spring Term", "kind": "term"}],
        "slots": [{"id": "sl1", "desk_id": "d1", "day_of_week": "Monday",
                   "shifts": [{"id": "sh1", "start_time": "08:00", "end_time": "10:00",
                               "max_students": 2, "students_detailed": ["Open", "Open"]}]}],
        "availability": [{"id": "a1", "student_id": "s1", "day_of_week": "Monday",
                          "time_slot": "08:00 - 10:00", "scheduled_status": "2nd Choice", "kind": "term"}]
    }"#;

    #[test]
    fn parses_store_export() {
        let snap: Snapshot = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(snap.desks[0].kind, ScheduleKind::Term);
        assert_eq!(snap.students[0].assigned_shifts, None);
        assert_eq!(snap.slots[0].shifts[0].students_detailed.len(), 2);
        assert!(snap.availability[0].scheduled_status.is_candidate());
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join("deskshift_test_snapshot");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{}.json", ulid::Ulid::new()));
        let snap: Snapshot = serde_json::from_str(SAMPLE).unwrap();
        snap.save(&path).unwrap();
        assert_eq!(Snapshot::load(&path).unwrap(), snap);
        let _ = fs::remove_file(&path);
    }
}
