/// True iff `desk_name` is one of the student's job tags, ignoring case and
/// surrounding whitespace.
pub fn is_eligible(jobs: &[String], desk_name: &str) -> bool {
    let desk = desk_name.to_lowercase();
    jobs.iter().any(|job| job.trim().to_lowercase() == desk)
}

/// Preferred-desk gate. A student with no preferred desk never matches.
pub fn prefers_desk(preferred_desk: Option<&str>, desk_name: &str) -> bool {
    preferred_desk.is_some_and(|p| p.to_lowercase() == desk_name.to_lowercase())
}
