//! JSONL activity writer
//!
//! Files are organized by day: `data/activity/2026-10-19.jsonl`

use crate::error::PersistenceResult;
use chrono::Utc;
use lendmarket_core::ActivityRecord;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

const RECORD_PREFIX: &str = "ACT_";

pub struct ActivityLog {
    base_path: PathBuf,
    counter: AtomicU64,
    current_writer: Mutex<Option<DayWriter>>,
}

struct DayWriter {
    date: String,
    writer: BufWriter<File>,
}

impl ActivityLog {
    /// Open the log directory, creating it if needed, and continue numbering
    /// after the highest record id already on disk.
    pub fn new<P: AsRef<Path>>(base_path: P) -> PersistenceResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        let counter = Self::load_counter(&base_path);

        Ok(Self {
            base_path,
            counter: AtomicU64::new(counter),
            current_writer: Mutex::new(None),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn load_counter(base_path: &Path) -> u64 {
        let mut max_id: u64 = 0;

        if let Ok(entries) = fs::read_dir(base_path) {
            for entry in entries.flatten() {
                let path = entry.path();
                if !is_jsonl(&path) {
                    continue;
                }
                let Ok(content) = fs::read_to_string(&path) else {
                    continue;
                };
                for line in content.lines() {
                    if let Ok(record) = serde_json::from_str::<ActivityRecord>(line) {
                        if let Some(num) = record
                            .record_id
                            .strip_prefix(RECORD_PREFIX)
                            .and_then(|n| n.parse::<u64>().ok())
                        {
                            max_id = max_id.max(num);
                        }
                    }
                }
            }
        }

        max_id + 1
    }

    fn file_path(&self, date: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", date))
    }

    pub fn next_record_id(&self) -> String {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}{:06}", RECORD_PREFIX, id)
    }

    fn writer(&self) -> MutexGuard<'_, Option<DayWriter>> {
        // A panic while holding the lock leaves at worst a partial line.
        self.current_writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Assign a record id and append. Returns the id.
    pub fn append(&self, mut record: ActivityRecord) -> PersistenceResult<String> {
        if record.record_id.is_empty() {
            record.record_id = self.next_record_id();
        }
        let date = record.timestamp.format("%Y-%m-%d").to_string();
        let json = serde_json::to_string(&record)?;

        let mut guard = self.writer();
        let needs_new_file = guard.as_ref().map_or(true, |w| w.date != date);
        if needs_new_file {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.file_path(&date))?;
            *guard = Some(DayWriter {
                date,
                writer: BufWriter::new(file),
            });
        }

        if let Some(ref mut w) = *guard {
            writeln!(w.writer, "{}", json)?;
            w.writer.flush()?;
        }

        Ok(record.record_id)
    }

    pub fn list_files(&self) -> PersistenceResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if is_jsonl(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn today_file(&self) -> Option<PathBuf> {
        let path = self.file_path(&Utc::now().format("%Y-%m-%d").to_string());
        path.exists().then_some(path)
    }

    pub fn flush(&self) -> PersistenceResult<()> {
        if let Some(ref mut w) = *self.writer() {
            w.writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for ActivityLog {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

pub(crate) fn is_jsonl(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "jsonl")
}
