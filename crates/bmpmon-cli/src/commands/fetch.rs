//! `bmpmon fetch`: read committed readings from the database.
//!
//! Only sees what a running service has flushed; buffered readings live in
//! that process's memory.

use std::path::Path;

use bmpmon_core::{ReadingStore, SqliteStore};

use super::{CliResult, format_reading};

pub fn run(db: &Path, count: usize, json: bool) -> CliResult {
    if !db.exists() {
        return Err(format!("database {} does not exist", db.display()).into());
    }

    let store = SqliteStore::open(db)?;
    let readings = store.query_recent(count)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&readings)?);
        return Ok(());
    }

    println!(
        "{} of {} stored reading(s) from {}:\n",
        readings.len(),
        store.count()?,
        db.display()
    );
    for reading in &readings {
        println!("  {}", format_reading(reading));
    }
    if readings.is_empty() {
        println!("  (none)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_database_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = run(&tmp.path().join("nope.sqlite3"), 5, false).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert!(!tmp.path().join("nope.sqlite3").exists());
    }

    #[test]
    fn test_fetch_existing_database() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("storage.sqlite3");
        drop(SqliteStore::open(&path).unwrap());
        run(&path, 5, false).unwrap();
        run(&path, 5, true).unwrap();
    }
}
