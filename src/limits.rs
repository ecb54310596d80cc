/// Seats on a shift when the store does not say otherwise.
pub const DEFAULT_MAX_OCCUPANCY: u32 = 1;

/// Placeholder the store uses for an unfilled seat in an occupant list.
pub const OPEN_SEAT: &str = "Open";

pub const FIRST_CHOICE: &str = "1st Choice";
pub const SECOND_CHOICE: &str = "2nd Choice";
pub const NOT_AVAILABLE: &str = "Not Available";

/// Upper bound on `shifts_to_assign` in a single round.
pub const MAX_SHIFTS_PER_ROUND: u32 = 64;

pub const MAX_DESK_NAME_LEN: usize = 128;
