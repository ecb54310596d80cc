use std::net::SocketAddr;

/// Counter: assignment runs. Labels: kind, status.
pub const RUNS_TOTAL: &str = "deskshift_runs_total";

/// Histogram: run wall time in seconds. Labels: kind.
pub const RUN_DURATION_SECONDS: &str = "deskshift_run_duration_seconds";

/// Counter: committed assignments. Labels: kind.
pub const ASSIGNMENTS_TOTAL: &str = "deskshift_assignments_total";

/// Counter: candidates passed over. Labels: reason.
pub const SKIPS_TOTAL: &str = "deskshift_skips_total";

/// Counter: failed writes to the store. Labels: target.
pub const WRITE_FAILURES_TOTAL: &str = "deskshift_write_failures_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Why a candidate was passed over. Used as the `reason` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Ineligible,
    PreferredDesk,
    AtCap,
    NoCap,
    Unavailable,
    TimeBooked,
    AlreadySeated,
    Full,
    NotConsecutive,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::Ineligible => "ineligible",
            SkipReason::PreferredDesk => "preferred_desk",
            SkipReason::AtCap => "at_cap",
            SkipReason::NoCap => "no_cap",
            SkipReason::Unavailable => "unavailable",
            SkipReason::TimeBooked => "time_booked",
            SkipReason::AlreadySeated => "already_seated",
            SkipReason::Full => "full",
            SkipReason::NotConsecutive => "not_consecutive",
        }
    }
}
