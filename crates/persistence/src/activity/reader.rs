//! Reading the activity log back for audit views

use crate::activity::store::is_jsonl;
use crate::error::PersistenceResult;
use chrono::NaiveDate;
use lendmarket_core::ActivityRecord;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub struct ActivityReader {
    base_path: PathBuf,
}

impl ActivityReader {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn read_file(&self, path: &Path) -> PersistenceResult<Vec<ActivityRecord>> {
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    pub fn read_date(&self, date: NaiveDate) -> PersistenceResult<Vec<ActivityRecord>> {
        let path = self.base_path.join(format!("{}.jsonl", date.format("%Y-%m-%d")));
        if path.exists() {
            self.read_file(&path)
        } else {
            Ok(Vec::new())
        }
    }

    /// Inclusive on both ends
    pub fn read_range(&self, from: NaiveDate, to: NaiveDate) -> PersistenceResult<Vec<ActivityRecord>> {
        let mut all = Vec::new();
        for day in from.iter_days().take_while(|d| *d <= to) {
            all.extend(self.read_date(day)?);
        }
        Ok(all)
    }

    pub fn read_all(&self) -> PersistenceResult<Vec<ActivityRecord>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&self.base_path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| is_jsonl(p))
            .collect();
        files.sort();

        let mut all = Vec::new();
        for path in files {
            all.extend(self.read_file(&path)?);
        }
        Ok(all)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub user_id: Option<String>,
    pub reference_id: Option<String>,
    pub actions: Option<Vec<String>>,
}

impl ActivityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn reference(mut self, reference_id: &str) -> Self {
        self.reference_id = Some(reference_id.to_string());
        self
    }

    pub fn actions(mut self, actions: &[&str]) -> Self {
        self.actions = Some(actions.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn matches(&self, record: &ActivityRecord) -> bool {
        if let Some(ref user) = self.user_id {
            if record.user_id != *user {
                return false;
            }
        }
        if let Some(ref reference) = self.reference_id {
            if record.reference_id != *reference {
                return false;
            }
        }
        if let Some(ref actions) = self.actions {
            if !actions.contains(&record.action) {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, records: Vec<ActivityRecord>) -> Vec<ActivityRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityLog;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn test_reader_round_trips_log() {
        let dir = tempdir().unwrap();
        let log = ActivityLog::new(dir.path()).unwrap();
        log.append(ActivityRecord::new("bob", "loan_requested", "LOAN_1")).unwrap();
        log.append(ActivityRecord::new("alice", "offer_created", "OFR_1")).unwrap();
        log.flush().unwrap();

        let reader = ActivityReader::new(dir.path());
        let all = reader.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].record_id, "ACT_000001");

        let today = Utc::now().date_naive();
        assert_eq!(reader.read_range(today, today).unwrap().len(), 2);
        let yesterday = today.pred_opt().unwrap();
        assert!(reader.read_date(yesterday).unwrap().is_empty());
    }

    #[test]
    fn test_filter() {
        let records = vec![
            ActivityRecord::new("bob", "loan_requested", "LOAN_1"),
            ActivityRecord::new("alice", "offer_created", "OFR_1"),
            ActivityRecord::new("bob", "offer_accepted", "OFR_1"),
        ];

        assert_eq!(ActivityFilter::new().user("bob").apply(records.clone()).len(), 2);
        assert_eq!(ActivityFilter::new().reference("OFR_1").apply(records.clone()).len(), 2);
        let filtered = ActivityFilter::new()
            .user("bob")
            .actions(&["offer_accepted"])
            .apply(records);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_missing_directory_reads_empty() {
        let dir = tempdir().unwrap();
        let reader = ActivityReader::new(dir.path().join("nope"));
        assert!(reader.read_all().unwrap().is_empty());
    }
}
