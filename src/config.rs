use std::path::PathBuf;

/// Process configuration, read from `DESKSHIFT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Store export the engine runs against.
    pub snapshot: PathBuf,
    /// Where run summaries are journaled.
    pub journal: PathBuf,
    /// If set, the mutated store is written here after a run.
    pub snapshot_out: Option<PathBuf>,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot: PathBuf::from("./data/snapshot.json"),
            journal: PathBuf::from("./data/runs.journal"),
            snapshot_out: None,
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            snapshot: lookup("DESKSHIFT_SNAPSHOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot),
            journal: lookup("DESKSHIFT_JOURNAL")
                .map(PathBuf::from)
                .unwrap_or(defaults.journal),
            snapshot_out: lookup("DESKSHIFT_SNAPSHOT_OUT").map(PathBuf::from),
            metrics_port: lookup("DESKSHIFT_METRICS_PORT").and_then(|s| s.parse().ok()),
        }
    }
}
