use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use deskshift::config::Config;
use deskshift::engine::{Engine, InMemoryStore};
use deskshift::journal::Journal;
use deskshift::model::{HistoryFilter, RunRequest, ScheduleKind};
use deskshift::snapshot::Snapshot;

const USAGE: &str = "usage:
  deskshift run <term|interim> <request.json>
  deskshift history [year] [term_or_break] [desk]
  deskshift candidates <term|interim> <shift_id> <term_or_break> <desk>";

fn parse_kind(arg: Option<&String>) -> Result<ScheduleKind, Box<dyn std::error::Error>> {
    let raw = arg.ok_or(USAGE)?;
    Ok(raw.parse::<ScheduleKind>()?)
}

fn print_json(value: &impl serde::Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    deskshift::observability::init(config.metrics_port)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let snapshot = Snapshot::load(&config.snapshot)?;
    info!(
        "loaded snapshot {}: {} desks, {} students, {} slots, {} availability records",
        config.snapshot.display(),
        snapshot.desks.len(),
        snapshot.students.len(),
        snapshot.slots.len(),
        snapshot.availability.len()
    );
    let store = InMemoryStore::from_snapshot(snapshot).with_journal(Journal::open(&config.journal)?)?;
    let engine = Engine::new(Arc::new(store));

    match command.as_str() {
        "run" => {
            let kind = parse_kind(args.get(1))?;
            let request_path = args.get(2).ok_or(USAGE)?;
            let raw = std::fs::read_to_string(Path::new(request_path))?;
            let request: RunRequest = serde_json::from_str(&raw)?;
            match engine.run(kind, &request).await {
                Ok(report) => {
                    print_json(&report)?;
                    if let Some(out) = &config.snapshot_out {
                        engine.store().snapshot().save(out)?;
                        info!("wrote updated snapshot to {}", out.display());
                    }
                }
                Err(e) => {
                    print_json(&e.response())?;
                    std::process::exit(if e.status_code() == 400 { 2 } else { 1 });
                }
            }
        }
        "history" => {
            let filter = HistoryFilter {
                year: args.get(1).cloned(),
                term_or_break: args.get(2).cloned(),
                desk: args.get(3).cloned(),
            };
            print_json(&engine.history(&filter).await?)?;
        }
        "candidates" => {
            let kind = parse_kind(args.get(1))?;
            let (Some(shift_id), Some(term), Some(desk)) = (args.get(2), args.get(3), args.get(4))
            else {
                eprintln!("{USAGE}");
                std::process::exit(2);
            };
            print_json(&engine.available_students(kind, shift_id, term, desk).await?)?;
        }
        other => {
            eprintln!("unknown command: {other}\n{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}
