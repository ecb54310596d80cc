use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::journal::Journal;
use crate::model::*;
use crate::snapshot::Snapshot;

use super::error::StoreError;

/// The persistence collaborator. The engine reads its snapshot through this
/// trait and writes every side effect back through it, one call at a time.
#[async_trait]
pub trait Store: Send + Sync {
    async fn students(
        &self,
        kind: ScheduleKind,
        year: &str,
        term_or_break: &str,
    ) -> Result<Vec<StudentRecord>, StoreError>;

    async fn students_by_ids(
        &self,
        kind: ScheduleKind,
        ids: &[String],
    ) -> Result<Vec<StudentRecord>, StoreError>;

    /// `year` is `None` when the desk is matched on name and term/break only.
    async fn find_desk(
        &self,
        kind: ScheduleKind,
        desk_name: &str,
        term_or_break: &str,
        year: Option<&str>,
    ) -> Result<Option<DeskRecord>, StoreError>;

    /// Slots of a desk, shifts nested, in stored order.
    async fn slots_for_desk(&self, desk_id: &str) -> Result<Vec<SlotRecord>, StoreError>;

    /// The slot owning `shift_id` (with all of its shifts).
    async fn slot_for_shift(&self, shift_id: &str) -> Result<Option<SlotRecord>, StoreError>;

    /// First- and second-choice records for one slot key.
    async fn candidate_availability(
        &self,
        kind: ScheduleKind,
        slot_key: &SlotKey,
    ) -> Result<Vec<AvailabilityRecord>, StoreError>;

    /// Every record for one time key, whatever its status.
    async fn availability_at(
        &self,
        kind: ScheduleKind,
        time_key: &TimeKey,
    ) -> Result<Vec<AvailabilityRecord>, StoreError>;

    /// Replace the stored occupant list (placeholders included).
    async fn update_shift_occupants(
        &self,
        shift_id: &str,
        occupants: &[String],
    ) -> Result<(), StoreError>;

    async fn mark_availability(
        &self,
        kind: ScheduleKind,
        student_id: &str,
        time_key: &TimeKey,
        status: &str,
    ) -> Result<(), StoreError>;

    async fn update_assigned_shifts(
        &self,
        kind: ScheduleKind,
        student_id: &str,
        assigned_shifts: u32,
    ) -> Result<(), StoreError>;

    async fn insert_run_summary(&self, summary: &RunSummary) -> Result<(), StoreError>;

    async fn run_summaries(&self) -> Result<Vec<RunSummary>, StoreError>;
}

/// Record plus insertion sequence, so reads come back in load order.
struct Seq<T> {
    seq: u64,
    record: T,
}

fn ordered<T: Clone>(mut rows: Vec<(u64, T)>) -> Vec<T> {
    rows.sort_by_key(|(seq, _)| *seq);
    rows.into_iter().map(|(_, r)| r).collect()
}

/// In-process store seeded from a snapshot. Run summaries are optionally
/// appended to a journal file.
pub struct InMemoryStore {
    next_seq: AtomicU64,
    desks: DashMap<String, Seq<DeskRecord>>,
    students: DashMap<String, Seq<StudentRecord>>,
    slots: DashMap<String, Seq<SlotRecord>>,
    /// shift id → slot id
    shift_to_slot: DashMap<String, String>,
    availability: DashMap<String, Seq<AvailabilityRecord>>,
    summaries: Mutex<Vec<RunSummary>>,
    /// Appends fsync, so they run on the blocking pool.
    journal: Arc<std::sync::Mutex<Option<Journal>>>,

    fail_reads: AtomicBool,
    fail_summaries: AtomicBool,
    failing_shifts: DashSet<String>,
    failing_students: DashSet<String>,
    failing_availability: DashSet<String>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            next_seq: AtomicU64::new(0),
            desks: DashMap::new(),
            students: DashMap::new(),
            slots: DashMap::new(),
            shift_to_slot: DashMap::new(),
            availability: DashMap::new(),
            summaries: Mutex::new(Vec::new()),
            journal: Arc::new(std::sync::Mutex::new(None)),
            fail_reads: AtomicBool::new(false),
            fail_summaries: AtomicBool::new(false),
            failing_shifts: DashSet::new(),
            failing_students: DashSet::new(),
            failing_availability: DashSet::new(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        for desk in snapshot.desks {
            store.insert_desk(desk);
        }
        for student in snapshot.students {
            store.insert_student(student);
        }
        for slot in snapshot.slots {
            store.insert_slot(slot);
        }
        for rec in snapshot.availability {
            store.insert_availability(rec);
        }
        store
    }

    /// Attach a journal: previously journaled summaries are loaded, new ones
    /// are appended durably.
    pub fn with_journal(mut self, journal: Journal) -> std::io::Result<Self> {
        let replayed = Journal::replay(journal.path())?;
        debug!("journal replayed {} run summaries", replayed.len());
        self.summaries.get_mut().extend(replayed);
        self.journal = Arc::new(std::sync::Mutex::new(Some(journal)));
        Ok(self)
    }

    fn seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    // ── Seeding ──────────────────────────────────────────────

    pub fn insert_desk(&self, desk: DeskRecord) {
        let seq = self.seq();
        self.desks.insert(desk.id.clone(), Seq { seq, record: desk });
    }

    pub fn insert_student(&self, student: StudentRecord) {
        let seq = self.seq();
        self.students
            .insert(student.id.clone(), Seq { seq, record: student });
    }

    pub fn insert_slot(&self, slot: SlotRecord) {
        for shift in &slot.shifts {
            self.shift_to_slot.insert(shift.id.clone(), slot.id.clone());
        }
        let seq = self.seq();
        self.slots.insert(slot.id.clone(), Seq { seq, record: slot });
    }

    pub fn insert_availability(&self, rec: AvailabilityRecord) {
        let seq = self.seq();
        self.availability.insert(rec.id.clone(), Seq { seq, record: rec });
    }

    // ── Inspection ───────────────────────────────────────────

    pub fn student(&self, id: &str) -> Option<StudentRecord> {
        self.students.get(id).map(|e| e.record.clone())
    }

    pub fn shift(&self, shift_id: &str) -> Option<ShiftRecord> {
        let slot_id = self.shift_to_slot.get(shift_id)?.value().clone();
        let slot = self.slots.get(&slot_id)?;
        slot.record.shifts.iter().find(|s| s.id == shift_id).cloned()
    }

    pub fn availability_record(&self, id: &str) -> Option<AvailabilityRecord> {
        self.availability.get(id).map(|e| e.record.clone())
    }

    /// Current contents in load order.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            desks: ordered(self.desks.iter().map(|e| (e.seq, e.record.clone())).collect()),
            students: ordered(self.students.iter().map(|e| (e.seq, e.record.clone())).collect()),
            slots: ordered(self.slots.iter().map(|e| (e.seq, e.record.clone())).collect()),
            availability: ordered(
                self.availability
                    .iter()
                    .map(|e| (e.seq, e.record.clone()))
                    .collect(),
            ),
        }
    }

    // ── Fault injection ──────────────────────────────────────

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_summaries(&self, fail: bool) {
        self.fail_summaries.store(fail, Ordering::Relaxed);
    }

    pub fn fail_shift_writes(&self, shift_id: &str) {
        self.failing_shifts.insert(shift_id.to_string());
    }

    pub fn fail_student_writes(&self, student_id: &str) {
        self.failing_students.insert(student_id.to_string());
    }

    pub fn fail_availability_writes(&self, student_id: &str) {
        self.failing_availability.insert(student_id.to_string());
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(StoreError::new("store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn students(
        &self,
        kind: ScheduleKind,
        year: &str,
        term_or_break: &str,
    ) -> Result<Vec<StudentRecord>, StoreError> {
        self.check_read()?;
        Ok(ordered(
            self.students
                .iter()
                .filter(|e| {
                    e.record.kind == kind
                        && e.record.year == year
                        && e.record.term_or_break == term_or_break
                })
                .map(|e| (e.seq, e.record.clone()))
                .collect(),
        ))
    }

    async fn students_by_ids(
        &self,
        kind: ScheduleKind,
        ids: &[String],
    ) -> Result<Vec<StudentRecord>, StoreError> {
        self.check_read()?;
        Ok(ordered(
            ids.iter()
                .filter_map(|id| self.students.get(id))
                .filter(|e| e.record.kind == kind)
                .map(|e| (e.seq, e.record.clone()))
                .collect(),
        ))
    }

    async fn find_desk(
        &self,
        kind: ScheduleKind,
        desk_name: &str,
        term_or_break: &str,
        year: Option<&str>,
    ) -> Result<Option<DeskRecord>, StoreError> {
        self.check_read()?;
        let found = ordered(
            self.desks
                .iter()
                .filter(|e| {
                    e.record.kind == kind
                        && e.record.desk_name == desk_name
                        && e.record.term_or_break == term_or_break
                        && year.is_none_or(|y| e.record.year == y)
                })
                .map(|e| (e.seq, e.record.clone()))
                .collect(),
        );
        Ok(found.into_iter().next())
    }

    async fn slots_for_desk(&self, desk_id: &str) -> Result<Vec<SlotRecord>, StoreError> {
        self.check_read()?;
        Ok(ordered(
            self.slots
                .iter()
                .filter(|e| e.record.desk_id == desk_id)
                .map(|e| (e.seq, e.record.clone()))
                .collect(),
        ))
    }

    async fn slot_for_shift(&self, shift_id: &str) -> Result<Option<SlotRecord>, StoreError> {
        self.check_read()?;
        let Some(slot_id) = self.shift_to_slot.get(shift_id).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        Ok(self.slots.get(&slot_id).map(|e| e.record.clone()))
    }

    async fn candidate_availability(
        &self,
        kind: ScheduleKind,
        slot_key: &SlotKey,
    ) -> Result<Vec<AvailabilityRecord>, StoreError> {
        self.check_read()?;
        Ok(ordered(
            self.availability
                .iter()
                .filter(|e| {
                    e.record.kind == kind
                        && e.record.scheduled_status.is_candidate()
                        && e.record.slot_key() == *slot_key
                })
                .map(|e| (e.seq, e.record.clone()))
                .collect(),
        ))
    }

    async fn availability_at(
        &self,
        kind: ScheduleKind,
        time_key: &TimeKey,
    ) -> Result<Vec<AvailabilityRecord>, StoreError> {
        self.check_read()?;
        Ok(ordered(
            self.availability
                .iter()
                .filter(|e| e.record.kind == kind && e.record.time_key() == *time_key)
                .map(|e| (e.seq, e.record.clone()))
                .collect(),
        ))
    }

    async fn update_shift_occupants(
        &self,
        shift_id: &str,
        occupants: &[String],
    ) -> Result<(), StoreError> {
        if self.failing_shifts.contains(shift_id) {
            return Err(StoreError::new(format!("write rejected for shift {shift_id}")));
        }
        let slot_id = self
            .shift_to_slot
            .get(shift_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| StoreError::new(format!("no shift {shift_id}")))?;
        let mut slot = self
            .slots
            .get_mut(&slot_id)
            .ok_or_else(|| StoreError::new(format!("no slot {slot_id}")))?;
        let shift = slot
            .record
            .shifts
            .iter_mut()
            .find(|s| s.id == shift_id)
            .ok_or_else(|| StoreError::new(format!("no shift {shift_id}")))?;
        shift.students_detailed = occupants.to_vec();
        Ok(())
    }

    async fn mark_availability(
        &self,
        kind: ScheduleKind,
        student_id: &str,
        time_key: &TimeKey,
        status: &str,
    ) -> Result<(), StoreError> {
        if self.failing_availability.contains(student_id) {
            return Err(StoreError::new(format!(
                "availability write rejected for student {student_id}"
            )));
        }
        let mut touched = 0;
        for mut e in self.availability.iter_mut() {
            let rec = &mut e.record;
            if rec.kind == kind && rec.student_id == student_id && rec.time_key() == *time_key {
                rec.scheduled_status = Tier::from(status);
                touched += 1;
            }
        }
        if touched == 0 {
            warn!("no availability record for {student_id} at {time_key}");
        }
        Ok(())
    }

    async fn update_assigned_shifts(
        &self,
        kind: ScheduleKind,
        student_id: &str,
        assigned_shifts: u32,
    ) -> Result<(), StoreError> {
        if self.failing_students.contains(student_id) {
            return Err(StoreError::new(format!("write rejected for student {student_id}")));
        }
        let mut entry = self
            .students
            .get_mut(student_id)
            .filter(|e| e.record.kind == kind)
            .ok_or_else(|| StoreError::new(format!("no student {student_id}")))?;
        entry.record.assigned_shifts = Some(assigned_shifts);
        Ok(())
    }

    async fn insert_run_summary(&self, summary: &RunSummary) -> Result<(), StoreError> {
        if self.fail_summaries.load(Ordering::Relaxed) {
            return Err(StoreError::new("summary table unavailable"));
        }
        let journal = self.journal.clone();
        let entry = summary.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut guard = journal
                .lock()
                .map_err(|_| std::io::Error::other("journal lock poisoned"))?;
            if let Some(journal) = guard.as_mut() {
                journal.append(&entry)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| StoreError::new(e.to_string()))?
        .map_err(|e| StoreError::new(e.to_string()))?;
        self.summaries.lock().await.push(summary.clone());
        Ok(())
    }

    async fn run_summaries(&self) -> Result<Vec<RunSummary>, StoreError> {
        self.check_read()?;
        Ok(self.summaries.lock().await.clone())
    }
}
