use std::collections::{HashMap, HashSet};

use crate::model::*;

/// True iff the two shifts touch at a boundary, in either order.
pub fn is_consecutive(existing: &Shift, candidate: &Shift) -> bool {
    existing.end == candidate.start || candidate.end == existing.start
}

/// Shifts a student has been given in the current run, grouped by slot key.
#[derive(Debug, Default)]
pub struct DayPlan {
    by_slot: HashMap<SlotKey, Vec<Shift>>,
}

impl DayPlan {
    /// The first shift on a slot is always allowed; later ones must touch at
    /// least one shift already taken on that slot.
    pub fn admits(&self, slot: &SlotKey, candidate: &Shift) -> bool {
        match self.by_slot.get(slot) {
            None => true,
            Some(taken) if taken.is_empty() => true,
            Some(taken) => taken.iter().any(|t| is_consecutive(t, candidate)),
        }
    }

    pub fn add(&mut self, slot: SlotKey, shift: Shift) {
        self.by_slot.entry(slot).or_default().push(shift);
    }
}

/// Time keys already consumed per student across a run.
#[derive(Debug, Default)]
pub struct BookedTimes {
    by_student: HashMap<String, HashSet<TimeKey>>,
}

impl BookedTimes {
    pub fn is_booked(&self, student_id: &str, key: &TimeKey) -> bool {
        self.by_student
            .get(student_id)
            .is_some_and(|keys| keys.contains(key))
    }

    pub fn book(&mut self, student_id: &str, key: TimeKey) {
        self.by_student
            .entry(student_id.to_string())
            .or_default()
            .insert(key);
    }
}
