use std::collections::HashMap;

use crate::model::*;

/// Lookup from (student, time key) to a candidate tier, built once per run.
#[derive(Debug, Default)]
pub struct AvailabilityIndex {
    by_student: HashMap<String, HashMap<TimeKey, Tier>>,
    len: usize,
}

impl AvailabilityIndex {
    /// Index first- and second-choice records; everything else is dropped.
    /// When a student has several records for one key, the last one wins.
    pub fn build<'a>(records: impl IntoIterator<Item = &'a AvailabilityRecord>) -> Self {
        let mut index = Self::default();
        for rec in records {
            if !rec.scheduled_status.is_candidate() {
                continue;
            }
            let prev = index
                .by_student
                .entry(rec.student_id.clone())
                .or_default()
                .insert(rec.time_key(), rec.scheduled_status.clone());
            if prev.is_none() {
                index.len += 1;
            }
        }
        index
    }

    pub fn lookup(&self, student_id: &str, key: &TimeKey) -> Option<&Tier> {
        self.by_student.get(student_id)?.get(key)
    }

    /// Distinct (student, time key) entries.
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}
