//! CSV export of a session's participant list

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{Participant, Session};

/// `Name,Drinks` then one row per participant in list order.
/// Field values are written literally, without quoting.
pub fn to_csv(people: &[Participant]) -> String {
    std::iter::once("Name,Drinks".to_string())
        .chain(people.iter().map(|p| format!("{},{}", p.name, p.drinks)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn file_name(date: NaiveDate) -> String {
    format!("drinks-session-{}.csv", date.format("%Y-%m-%d"))
}

/// Date an export is named after: the archive date for past sessions,
/// today for the live one
pub fn export_date(session: &Session, now: DateTime<Utc>) -> NaiveDate {
    session.archived_at.unwrap_or(now).date_naive()
}

/// Write a session's CSV into `dir`, returning the file path
pub fn write_session(dir: &Path, session: &Session, now: DateTime<Utc>) -> Result<PathBuf> {
    if session.people.is_empty() {
        return Err(Error::Precondition("nothing to export".into()));
    }
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name(export_date(session, now)));
    fs::write(&path, to_csv(&session.people))?;
    info!(path = %path.display(), rows = session.people.len(), "Session exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Drinks;
    use chrono::TimeZone;

    fn people() -> Vec<Participant> {
        let mut a = Participant::guest("Alice".into());
        a.drinks = Drinks::from_halves(4);
        let mut b = Participant::guest("Bob".into());
        b.drinks = Drinks::from_halves(3);
        vec![a, b]
    }

    #[test]
    fn test_csv_has_header_and_rows_in_order() {
        assert_eq!(to_csv(&people()), "Name,Drinks\nAlice,2\nBob,1.5");
        assert_eq!(to_csv(&[]), "Name,Drinks");
    }

    #[test]
    fn test_archived_session_named_by_archive_date() {
        let now = Utc.with_ymd_and_hms(2026, 5, 2, 1, 0, 0).unwrap();
        let mut session = Session::new_current(people(), None);
        assert_eq!(file_name(export_date(&session, now)), "drinks-session-2026-05-02.csv");

        session.is_current = false;
        session.archived_at = Some(Utc.with_ymd_and_hms(2026, 4, 30, 23, 0, 0).unwrap());
        assert_eq!(file_name(export_date(&session, now)), "drinks-session-2026-04-30.csv");
    }

    #[test]
    fn test_write_session_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 5, 2, 1, 0, 0).unwrap();
        let session = Session::new_current(people(), None);
        let path = write_session(dir.path(), &session, now).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "Name,Drinks\nAlice,2\nBob,1.5");
    }

    #[test]
    fn test_empty_session_not_exported() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new_current(Vec::new(), None);
        assert!(matches!(
            write_session(dir.path(), &session, Utc::now()),
            Err(Error::Precondition(_))
        ));
    }
}
