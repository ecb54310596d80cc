use std::collections::HashMap;

use crate::model::*;

/// Outcome of asking whether a student can take a seat on a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatCheck {
    Open,
    /// Matched by display name, not id.
    AlreadySeated,
    Full,
}

#[derive(Debug, Clone)]
struct Seats {
    capacity: u32,
    occupants: Vec<String>,
}

/// Live occupant lists for every shift of the desk being scheduled.
#[derive(Debug, Default)]
pub struct CapacityTracker {
    shifts: HashMap<String, Seats>,
}

impl CapacityTracker {
    pub fn from_slots(slots: &[Slot]) -> Self {
        let shifts = slots
            .iter()
            .flat_map(|slot| &slot.shifts)
            .map(|shift| {
                (
                    shift.id.clone(),
                    Seats {
                        capacity: shift.capacity,
                        occupants: shift.occupants.clone(),
                    },
                )
            })
            .collect();
        Self { shifts }
    }

    pub fn check(&self, shift_id: &str, name: &str) -> SeatCheck {
        let Some(seats) = self.shifts.get(shift_id) else {
            debug_assert!(false, "shift {shift_id} not tracked");
            return SeatCheck::Full;
        };
        if seats.occupants.iter().any(|o| o == name) {
            SeatCheck::AlreadySeated
        } else if (seats.occupants.len() as u32) >= seats.capacity {
            SeatCheck::Full
        } else {
            SeatCheck::Open
        }
    }

    /// The stored form of the list if `name` were seated: occupants plus
    /// `name`, padded with open seats. Does not change state.
    pub fn proposed(&self, shift_id: &str, name: &str) -> Option<Vec<String>> {
        let seats = self.shifts.get(shift_id)?;
        let mut next = seats.occupants.clone();
        next.push(name.to_string());
        Some(pad_open_seats(&next, seats.capacity))
    }

    /// Seat `name`. Call only after the store accepted the write.
    pub fn commit(&mut self, shift_id: &str, name: &str) {
        if let Some(seats) = self.shifts.get_mut(shift_id) {
            seats.occupants.push(name.to_string());
        }
    }
}
