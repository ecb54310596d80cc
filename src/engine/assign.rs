use std::time::Instant;

use futures::future::try_join_all;
use tracing::{debug, error, info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::{self, SkipReason};

use super::availability::AvailabilityIndex;
use super::capacity::{CapacityTracker, SeatCheck};
use super::conflict::{BookedTimes, DayPlan};
use super::eligibility::{is_eligible, prefers_desk};
use super::{now_ms, Engine, EngineError, Store};

/// Check that every run parameter is present and within bounds.
pub fn validate_request(kind: ScheduleKind, req: &RunRequest) -> Result<RunConfig, EngineError> {
    let (
        Some(desk_name),
        Some(year),
        Some(term_or_break),
        Some(round_number),
        Some(set_to_max_shifts),
        Some(shifts_to_assign),
        Some(consider_preferred_desk),
    ) = (
        req.desk_name.as_deref(),
        req.year.as_deref(),
        req.term_or_break.as_deref(),
        req.round_number,
        req.set_to_max_shifts,
        req.shifts_to_assign,
        req.consider_preferred_desk,
    )
    else {
        return Err(EngineError::Validation("Missing required fields"));
    };
    if desk_name.trim().is_empty() || year.trim().is_empty() || term_or_break.trim().is_empty() {
        return Err(EngineError::Validation("Missing required fields"));
    }
    if desk_name.len() > MAX_DESK_NAME_LEN {
        return Err(EngineError::Validation("desk name too long"));
    }
    if shifts_to_assign > MAX_SHIFTS_PER_ROUND {
        return Err(EngineError::Validation("shifts_to_assign too large"));
    }
    Ok(RunConfig {
        kind,
        desk_name: desk_name.to_string(),
        year: year.to_string(),
        term_or_break: term_or_break.to_string(),
        round_number,
        set_to_max_shifts,
        shifts_to_assign,
        consider_preferred_desk,
    })
}

/// How many shifts a student may receive this round, or why none.
fn budget_for(student: &Student, cfg: &RunConfig) -> Result<u32, (SkipReason, String)> {
    let at_cap = |max: u32| {
        (
            SkipReason::AtCap,
            format!(
                "Skipping {} (already reached max_shifts limit of {max})",
                student.name
            ),
        )
    };
    let budget = if cfg.set_to_max_shifts {
        let Some(max) = student.max_shifts else {
            return Err((
                SkipReason::NoCap,
                format!("Skipping {} (no max_shifts set to fill to)", student.name),
            ));
        };
        let remaining = max.saturating_sub(student.assigned_shifts);
        if remaining == 0 {
            return Err(at_cap(max));
        }
        remaining
    } else {
        match student.max_shifts {
            Some(max) => max.min(cfg.shifts_to_assign),
            None => cfg.shifts_to_assign,
        }
    };
    if let Some(max) = student.max_shifts
        && student.assigned_shifts >= max
    {
        return Err(at_cap(max));
    }
    Ok(budget)
}

/// Mutable state threaded through one run.
struct RunState<'a> {
    cfg: &'a RunConfig,
    slots: &'a [Slot],
    index: AvailabilityIndex,
    seats: CapacityTracker,
    booked: BookedTimes,
    log: Vec<String>,
    assignments: Vec<Assignment>,
    total: u32,
}

impl RunState<'_> {
    fn skip(&mut self, reason: SkipReason, line: String) {
        debug!("{line}");
        metrics::counter!(observability::SKIPS_TOTAL, "reason" => reason.label()).increment(1);
        self.log.push(line);
    }

    fn write_failed(&mut self, target: &'static str, line: String) {
        metrics::counter!(observability::WRITE_FAILURES_TOTAL, "target" => target).increment(1);
        self.log.push(line);
    }
}

impl<S: Store> Engine<S> {
    /// Validate `req` and run one assignment round for `kind`.
    pub async fn run(&self, kind: ScheduleKind, req: &RunRequest) -> Result<RunReport, EngineError> {
        let cfg = validate_request(kind, req)?;
        self.run_config(&cfg).await
    }

    pub async fn run_config(&self, cfg: &RunConfig) -> Result<RunReport, EngineError> {
        let started = Instant::now();
        let result = self.execute(cfg).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::RUNS_TOTAL, "kind" => cfg.kind.label(), "status" => status)
            .increment(1);
        metrics::histogram!(observability::RUN_DURATION_SECONDS, "kind" => cfg.kind.label())
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(report) => info!(
                "{} run for {} round {}: {} shifts assigned",
                cfg.kind, cfg.desk_name, cfg.round_number, report.total_assigned
            ),
            Err(e) => error!("{} run for {} failed: {e}", cfg.kind, cfg.desk_name),
        }
        result
    }

    async fn execute(&self, cfg: &RunConfig) -> Result<RunReport, EngineError> {
        let kind = cfg.kind;
        let log = vec![format!(
            "Processing assignments for Desk: {}, Year: {}, Term/Break: {}",
            cfg.desk_name, cfg.year, cfg.term_or_break
        )];

        // ── Load ──────────────────────────────────────────────
        let students = self
            .store
            .students(kind, &cfg.year, &cfg.term_or_break)
            .await?;

        let desk_year = match kind {
            ScheduleKind::Term => Some(cfg.year.as_str()),
            ScheduleKind::Interim => None,
        };
        let desk = self
            .store
            .find_desk(kind, &cfg.desk_name, &cfg.term_or_break, desk_year)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!(
                    "No desk found with name {} for {}",
                    cfg.desk_name, cfg.term_or_break
                ))
            })?;

        let slots: Vec<Slot> = self
            .store
            .slots_for_desk(&desk.id)
            .await?
            .iter()
            .map(|rec| Slot::from_record(rec, kind))
            .collect();

        let mut keys: Vec<&SlotKey> = Vec::new();
        for slot in &slots {
            if !keys.contains(&&slot.key) {
                keys.push(&slot.key);
            }
        }
        let availability: Vec<AvailabilityRecord> = try_join_all(
            keys.iter()
                .map(|key| self.store.candidate_availability(kind, key)),
        )
        .await?
        .into_iter()
        .flatten()
        .collect();

        // ── Index ─────────────────────────────────────────────
        let index = AvailabilityIndex::build(&availability);
        debug!(
            "loaded {} students, {} slots, {} availability records ({} candidate keys) for desk {}",
            students.len(),
            slots.len(),
            availability.len(),
            index.len(),
            desk.id
        );
        let mut state = RunState {
            cfg,
            slots: &slots,
            index,
            seats: CapacityTracker::from_slots(&slots),
            booked: BookedTimes::default(),
            log,
            assignments: Vec::new(),
            total: 0,
        };

        // ── Rank ──────────────────────────────────────────────
        let mut ranked: Vec<Student> = students.iter().map(Student::from).collect();
        ranked.sort_by(|a, b| b.seniority.cmp(&a.seniority));

        for student in &ranked {
            self.schedule_student(&mut state, student).await;
        }

        // ── Summarize ─────────────────────────────────────────
        let total = state.total;
        state.log.push(format!("Total shifts assigned: {total}"));

        let summary = RunSummary {
            id: Ulid::new(),
            kind,
            year: cfg.year.clone(),
            term_or_break: cfg.term_or_break.clone(),
            desk_name: cfg.desk_name.clone(),
            round_number: cfg.round_number,
            set_to_max_shifts: cfg.set_to_max_shifts,
            shifts_to_assign: cfg.shifts_to_assign,
            consider_preferred_desk: cfg.consider_preferred_desk,
            log_summary: state.log.join("\n"),
            created_at: now_ms(),
        };
        if let Err(e) = self.store.insert_run_summary(&summary).await {
            error!("{}", EngineError::PersistSummary(e.to_string()));
            metrics::counter!(observability::WRITE_FAILURES_TOTAL, "target" => "summary").increment(1);
        }

        Ok(RunReport {
            message: "Assignments completed".to_string(),
            log_summary: state.log,
            assignments: state.assignments,
            total_assigned: total,
        })
    }

    async fn schedule_student(&self, state: &mut RunState<'_>, student: &Student) {
        let cfg = state.cfg;

        if !is_eligible(&student.jobs, &cfg.desk_name) {
            state.skip(
                SkipReason::Ineligible,
                format!("Skipping {} (not eligible for desk)", student.name),
            );
            return;
        }
        if cfg.consider_preferred_desk
            && !prefers_desk(student.preferred_desk.as_deref(), &cfg.desk_name)
        {
            state.skip(
                SkipReason::PreferredDesk,
                format!(
                    "Skipping {} (preferred desk mismatch: {})",
                    student.name,
                    student.preferred_desk.as_deref().unwrap_or("none")
                ),
            );
            return;
        }
        let budget = match budget_for(student, cfg) {
            Ok(b) => b,
            Err((reason, line)) => {
                state.skip(reason, line);
                return;
            }
        };

        let mut plan = DayPlan::default();
        let mut assigned = 0u32;

        for slot in state.slots {
            if assigned >= budget {
                break;
            }
            for shift in &slot.shifts {
                if assigned >= budget {
                    break;
                }
                if self.try_shift(state, student, slot, shift, &mut plan).await {
                    assigned += 1;
                }
            }
        }

        if assigned > 0 {
            self.finalize_student(state, student, assigned).await;
        }
    }

    /// Gate one candidate shift and commit it if every check passes.
    /// Returns true iff the student was seated.
    async fn try_shift(
        &self,
        state: &mut RunState<'_>,
        student: &Student,
        slot: &Slot,
        shift: &Shift,
        plan: &mut DayPlan,
    ) -> bool {
        let cfg = state.cfg;
        let range = shift.time_range();
        let key = TimeKey::new(slot.key.clone(), range.clone());

        if state.index.lookup(&student.id, &key).is_none() {
            state.skip(
                SkipReason::Unavailable,
                format!(
                    "Skipping {} (not available or not \"{FIRST_CHOICE}\" or \"{SECOND_CHOICE}\" for {key})",
                    student.name
                ),
            );
            return false;
        }
        if state.booked.is_booked(&student.id, &key) {
            state.skip(
                SkipReason::TimeBooked,
                format!("Skipping {} (already assigned to this time slot: {key})", student.name),
            );
            return false;
        }
        match state.seats.check(&shift.id, &student.name) {
            SeatCheck::Open => {}
            SeatCheck::AlreadySeated => {
                state.skip(
                    SkipReason::AlreadySeated,
                    format!("Skipping {} (already on shift {})", student.name, shift.id),
                );
                return false;
            }
            SeatCheck::Full => {
                state.skip(
                    SkipReason::Full,
                    format!(
                        "Skipping {} (no space on shift {} ({range}) on {})",
                        student.name, shift.id, slot.key
                    ),
                );
                return false;
            }
        }
        if !plan.admits(&slot.key, shift) {
            state.skip(
                SkipReason::NotConsecutive,
                format!(
                    "Skipping {} (shift {} ({range}) on {} is not consecutive with their other shifts)",
                    student.name, shift.id, slot.key
                ),
            );
            return false;
        }

        let Some(proposed) = state.seats.proposed(&shift.id, &student.name) else {
            return false;
        };
        if let Err(e) = self.store.update_shift_occupants(&shift.id, &proposed).await {
            error!("{}", EngineError::Write(format!("shift {}: {e}", shift.id)));
            state.write_failed(
                "shift",
                format!("ERROR: Failed to assign {} to shift {}", student.name, shift.id),
            );
            return false;
        }

        state.seats.commit(&shift.id, &student.name);
        plan.add(slot.key.clone(), shift.clone());
        state.total += 1;
        state.log.push(format!(
            "Assigned {} to shift {} ({range}) on {}",
            student.name, shift.id, slot.key
        ));
        metrics::counter!(observability::ASSIGNMENTS_TOTAL, "kind" => cfg.kind.label()).increment(1);
        debug!("assigned {} to {} ({key})", student.id, shift.id);
        state.assignments.push(Assignment {
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            shift_id: shift.id.clone(),
            slot_id: slot.id.clone(),
            slot_key: slot.key.clone(),
            time_range: range,
        });

        if let Err(e) = self
            .store
            .mark_availability(cfg.kind, &student.id, &key, &cfg.desk_name)
            .await
        {
            error!(
                "{}",
                EngineError::Write(format!("availability for {} at {key}: {e}", student.id))
            );
            state.write_failed(
                "availability",
                format!("ERROR: Failed to update availability for {} on {key}", student.name),
            );
        }
        state.booked.book(&student.id, key);
        true
    }

    async fn finalize_student(&self, state: &mut RunState<'_>, student: &Student, assigned: u32) {
        let naive = student.assigned_shifts.saturating_add(assigned);
        let stored = match student.max_shifts {
            Some(max) if naive > max => {
                warn!("{} would exceed max_shifts {max}; clamping", student.id);
                state.log.push(format!(
                    "ERROR: {} would exceed max_shifts limit ({max}). Adjusting assigned_shifts.",
                    student.name
                ));
                max
            }
            _ => naive,
        };

        if let Err(e) = self
            .store
            .update_assigned_shifts(state.cfg.kind, &student.id, stored)
            .await
        {
            error!(
                "{}",
                EngineError::Write(format!("assigned_shifts for {}: {e}", student.id))
            );
            state.write_failed(
                "student",
                format!("ERROR: Failed to update assigned_shifts for {}", student.name),
            );
        }
        state.log.push(format!(
            "Updated {} with +{assigned} shifts (total: {stored})",
            student.name
        ));
    }
}
