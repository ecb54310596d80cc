use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::RunSummary;

/// Largest payload replay will allocate for. A bigger length prefix is
/// treated as a corrupt tail.
const MAX_ENTRY_LEN: usize = 16 * 1024 * 1024;

/// Encode a single summary to [len][bincode][crc32] format.
fn encode_summary(writer: &mut impl Write, summary: &RunSummary) -> io::Result<()> {
    let payload =
        bincode::serialize(summary).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Append-only journal of run summaries.
///
/// Format per entry: `[u32: len][bincode: RunSummary][u32: crc32]`
/// - `len` is the byte length of the bincode payload (not including the CRC).
/// - A truncated or corrupt tail is discarded on replay.
pub struct Journal {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl Journal {
    /// Open (or create) the journal at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Append one summary and fsync.
    pub fn append(&mut self, summary: &RunSummary) -> io::Result<()> {
        encode_summary(&mut self.writer, summary)?;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every valid summary from disk, oldest first.
    pub fn replay(path: &Path) -> io::Result<Vec<RunSummary>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut summaries = Vec::new();

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_ENTRY_LEN {
                break;
            }

            let mut payload = vec![0u8; len];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
                Err(e) => return Err(e),
            }

            let mut crc_buf = [0u8; 4];
            match reader.read_exact(&mut crc_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
                Err(e) => return Err(e),
            }
            if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
                break;
            }

            match bincode::deserialize::<RunSummary>(&payload) {
                Ok(summary) => summaries.push(summary),
                Err(_) => break,
            }
        }

        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScheduleKind;
    use std::fs;
    use ulid::Ulid;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("deskshift_test_journal");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{name}_{}.journal", Ulid::new()));
        let _ = fs::remove_file(&path);
        path
    }

    fn summary(desk: &str, round: i64) -> RunSummary {
        RunSummary {
            id: Ulid::new(),
            kind: ScheduleKind::Term,
            year: "2025".into(),
            term_or_break: "Spring Term".into(),
            desk_name: desk.into(),
            round_number: round,
            set_to_max_shifts: false,
            shifts_to_assign: 2,
            consider_preferred_desk: true,
            log_summary: "Processing assignments\nTotal shifts assigned: 0".into(),
            created_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append");
        let written = vec![summary("circ", 1), summary("jmc", 2)];
        {
            let mut journal = Journal::open(&path).unwrap();
            for s in &written {
                journal.append(s).unwrap();
            }
        }
        assert_eq!(Journal::replay(&path).unwrap(), written);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn reopen_appends_after_existing() {
        let path = tmp_path("reopen");
        let first = summary("circ", 1);
        let second = summary("circ", 2);
        Journal::open(&path).unwrap().append(&first).unwrap();
        Journal::open(&path).unwrap().append(&second).unwrap();
        assert_eq!(Journal::replay(&path).unwrap(), vec![first, second]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_discards_truncated_tail() {
        let path = tmp_path("truncated");
        let s = summary("circ", 1);
        Journal::open(&path).unwrap().append(&s).unwrap();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[9u8; 3]).unwrap();
        }
        assert_eq!(Journal::replay(&path).unwrap(), vec![s]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_stops_at_bad_crc() {
        let path = tmp_path("bad_crc");
        {
            let payload = bincode::serialize(&summary("circ", 1)).unwrap();
            let mut f = File::create(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEADBEEFu32.to_le_bytes()).unwrap();
        }
        assert!(Journal::replay(&path).unwrap().is_empty());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let path = tmp_path("missing");
        assert!(Journal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn replay_stops_at_oversized_length() {
        let path = tmp_path("oversized");
        let s = summary("circ", 1);
        Journal::open(&path).unwrap().append(&s).unwrap();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&u32::MAX.to_le_bytes()).unwrap();
            f.write_all(&[0u8; 32]).unwrap();
        }
        assert_eq!(Journal::replay(&path).unwrap(), vec![s]);
        let _ = fs::remove_file(&path);
    }
}
