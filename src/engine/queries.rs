use std::collections::HashSet;

use crate::model::*;

use super::eligibility::is_eligible;
use super::{Engine, EngineError, Store};

fn matches_filter(run: &RunSummary, filter: &HistoryFilter) -> bool {
    if let Some(year) = &filter.year
        && run.year != *year
    {
        return false;
    }
    if let Some(term) = &filter.term_or_break
        && run.term_or_break != *term
    {
        return false;
    }
    if let Some(desk) = &filter.desk
        && !run.desk_name.to_lowercase().contains(&desk.to_lowercase())
    {
        return false;
    }
    true
}

impl<S: Store> Engine<S> {
    /// Persisted run summaries matching `filter`, newest first.
    pub async fn history(&self, filter: &HistoryFilter) -> Result<Vec<RunSummary>, EngineError> {
        let mut runs = self.store.run_summaries().await?;
        runs.retain(|r| matches_filter(r, filter));
        // Reverse first so equal timestamps keep newest-inserted first.
        runs.reverse();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }

    /// Students who could cover `shift_id`: same term/break, eligible for
    /// `desk_name`, with a first- or second-choice record for the shift's
    /// time key. Each student appears at most once per tier.
    pub async fn available_students(
        &self,
        kind: ScheduleKind,
        shift_id: &str,
        term_or_break: &str,
        desk_name: &str,
    ) -> Result<AvailableStudents, EngineError> {
        let slot = self
            .store
            .slot_for_shift(shift_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Shift not found".to_string()))?;
        let shift = slot
            .shifts
            .iter()
            .find(|s| s.id == shift_id)
            .map(Shift::from)
            .ok_or_else(|| EngineError::NotFound("Shift not found".to_string()))?;
        let key = TimeKey::new(slot.key(kind), shift.time_range());

        let records = self.store.availability_at(kind, &key).await?;
        let mut ids: Vec<String> = Vec::new();
        for rec in &records {
            if !ids.contains(&rec.student_id) {
                ids.push(rec.student_id.clone());
            }
        }
        let students: Vec<StudentRecord> = self
            .store
            .students_by_ids(kind, &ids)
            .await?
            .into_iter()
            .filter(|s| {
                s.term_or_break == term_or_break && is_eligible(&Student::from(s).jobs, desk_name)
            })
            .collect();

        let mut result = AvailableStudents::default();
        let mut seen_first = HashSet::new();
        let mut seen_second = HashSet::new();
        for rec in &records {
            let (list, seen) = match rec.scheduled_status {
                Tier::FirstChoice => (&mut result.first_choice, &mut seen_first),
                Tier::SecondChoice => (&mut result.second_choice, &mut seen_second),
                _ => continue,
            };
            let Some(student) = students.iter().find(|s| s.id == rec.student_id) else {
                continue;
            };
            if !seen.insert(student.id.clone()) {
                continue;
            }
            list.push(Candidate {
                student_id: student.id.clone(),
                preferred_name: student.preferred_name.clone(),
                email: student.email.clone(),
                availability_status: rec.scheduled_status.clone(),
            });
        }
        Ok(result)
    }
}
