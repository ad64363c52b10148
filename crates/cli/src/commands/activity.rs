//! Activity log queries

use anyhow::{bail, Result};
use chrono::NaiveDate;
use lendmarket_persistence::{ActivityFilter, ActivityReader};
use lendmarket_core::ActivityRecord;

use super::print_json;
use crate::config::MarketConfig;

#[derive(Debug, Default)]
pub struct Query {
    pub user_id: Option<String>,
    pub reference_id: Option<String>,
    pub actions: Option<Vec<String>>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl Query {
    fn filter(&self) -> ActivityFilter {
        let mut filter = ActivityFilter::new();
        if let Some(user) = &self.user_id {
            filter = filter.user(user);
        }
        if let Some(reference) = &self.reference_id {
            filter = filter.reference(reference);
        }
        if let Some(actions) = &self.actions {
            let actions: Vec<&str> = actions.iter().map(String::as_str).collect();
            filter = filter.actions(&actions);
        }
        filter
    }

    /// Read matching records; the log itself never needs the database.
    pub fn run(&self, reader: &ActivityReader) -> Result<Vec<ActivityRecord>> {
        let records = match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => bail!("--from {} is after --to {}", from, to),
            (Some(from), Some(to)) => reader.read_range(from, to)?,
            (from, to) => reader
                .read_all()?
                .into_iter()
                .filter(|r| {
                    let day = r.timestamp.date_naive();
                    from.map_or(true, |f| day >= f) && to.map_or(true, |t| day <= t)
                })
                .collect(),
        };
        Ok(self.filter().apply(records))
    }
}

pub fn show(config: &MarketConfig, query: Query, json: bool) -> Result<()> {
    let reader = ActivityReader::new(&config.activity_dir);
    let records = query.run(&reader)?;

    if json {
        return print_json(&records);
    }

    println!("🔍 Activity log ({})", config.activity_dir.display());
    if records.is_empty() {
        println!("No records found matching criteria.");
        return Ok(());
    }
    println!(
        "{:<12} {:<20} {:<12} {:<20} {}",
        "Record", "Time", "User", "Action", "Reference"
    );
    println!("{}", "-".repeat(100));
    for record in &records {
        println!(
            "{:<12} {:<20} {:<12} {:<20} {}",
            record.record_id,
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.user_id,
            record.action,
            record.reference_id
        );
    }
    println!("{} records", records.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendmarket_persistence::ActivityLog;

    #[test]
    fn test_query_filters_by_user_and_action() {
        let dir = tempfile::tempdir().unwrap();
        let log = ActivityLog::new(dir.path()).unwrap();
        log.append(ActivityRecord::new("bob", "loan_requested", "LOAN_1")).unwrap();
        log.append(ActivityRecord::new("alice", "offer_created", "OFR_1")).unwrap();
        log.append(ActivityRecord::new("bob", "offer_accepted", "OFR_1")).unwrap();
        log.flush().unwrap();

        let reader = ActivityReader::new(dir.path());
        let query = Query {
            user_id: Some("bob".into()),
            actions: Some(vec!["offer_accepted".into()]),
            ..Query::default()
        };
        let records = query.run(&reader).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reference_id, "OFR_1");

        let query = Query {
            reference_id: Some("OFR_1".into()),
            from: Some(chrono::Utc::now().date_naive()),
            ..Query::default()
        };
        assert_eq!(query.run(&reader).unwrap().len(), 2);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let reader = ActivityReader::new(dir.path());
        let query = Query {
            from: NaiveDate::from_ymd_opt(2026, 10, 20),
            to: NaiveDate::from_ymd_opt(2026, 10, 19),
            ..Query::default()
        };
        assert!(query.run(&reader).is_err());
    }
}
