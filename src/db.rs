use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::barcode::FullCode;
use crate::error::{AttendanceError, Result};

/// Registered student. The barcode is the lookup key used when scanning.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub matric_number: String,
    pub barcode: String,
}

/// One presence mark for one student
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AttendanceEvent {
    pub id: i64,
    pub student_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// Attendance event joined with the student it belongs to
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub event: AttendanceEvent,
    pub student: Student,
}

/// Handle to the attendance database.
///
/// Owns the single connection; services borrow it per operation instead of
/// reaching for a process-wide cursor.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Enable WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a transaction; commits only when `f` returns `Ok`
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn insert_student(&self, name: &str, matric_number: &str, barcode: &FullCode) -> Result<Student> {
        insert_student(&self.conn, name, matric_number, barcode)
    }

    pub fn find_student_by_barcode(&self, barcode: &str) -> Result<Option<Student>> {
        find_student_by_barcode(&self.conn, barcode)
    }

    pub fn insert_attendance_event(&self, student_id: i64) -> Result<AttendanceEvent> {
        self.with_transaction(|conn| insert_attendance_event(conn, student_id))
    }

    pub fn count_students(&self) -> Result<i64> {
        count_students(&self.conn)
    }

    pub fn count_attendance_events(&self) -> Result<i64> {
        count_attendance_events(&self.conn)
    }

    pub fn events_for_student(&self, student_id: i64) -> Result<Vec<AttendanceEvent>> {
        get_events_for_student(&self.conn, student_id)
    }

    pub fn recent_attendance(&self, limit: usize) -> Result<Vec<AttendanceRecord>> {
        get_recent_attendance(&self.conn, limit)
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Attendance rows must point at a real student
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Students Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            matric_number TEXT NOT NULL,
            barcode TEXT UNIQUE NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Attendance Table (append-only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL REFERENCES students(id),
            timestamp TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_timestamp ON attendance(timestamp)",
        [],
    )?;

    Ok(())
}

/// Insert a student. A barcode that is already taken surfaces as
/// `DuplicateBarcode`; the UNIQUE constraint is the authority on that.
pub fn insert_student(
    conn: &Connection,
    name: &str,
    matric_number: &str,
    barcode: &FullCode,
) -> Result<Student> {
    let result = conn.execute(
        "INSERT INTO students (name, matric_number, barcode) VALUES (?1, ?2, ?3)",
        params![name, matric_number, barcode.as_str()],
    );

    match result {
        Ok(_) => Ok(Student {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            matric_number: matric_number.to_string(),
            barcode: barcode.to_string(),
        }),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(AttendanceError::DuplicateBarcode {
                barcode: barcode.to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Exact, case-sensitive barcode lookup
pub fn find_student_by_barcode(conn: &Connection, barcode: &str) -> Result<Option<Student>> {
    let student = conn
        .query_row(
            "SELECT id, name, matric_number, barcode FROM students WHERE barcode = ?1",
            params![barcode],
            student_from_row,
        )
        .optional()?;

    Ok(student)
}

/// Append an attendance event stamped with the current time.
///
/// The stamp never goes below the latest one already stored, so timestamps
/// stay non-decreasing even if the wall clock steps backwards. Call inside
/// a transaction so the read and the insert see the same state.
pub fn insert_attendance_event(conn: &Connection, student_id: i64) -> Result<AttendanceEvent> {
    let latest: Option<String> =
        conn.query_row("SELECT MAX(timestamp) FROM attendance", [], |row| row.get(0))?;

    let now = Utc::now();
    let timestamp = match latest.as_deref().map(parse_timestamp).transpose()? {
        Some(latest) if latest > now => latest,
        _ => now,
    };

    conn.execute(
        "INSERT INTO attendance (student_id, timestamp) VALUES (?1, ?2)",
        params![student_id, format_timestamp(&timestamp)],
    )?;

    Ok(AttendanceEvent {
        id: conn.last_insert_rowid(),
        student_id,
        timestamp,
    })
}

pub fn count_students(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;

    Ok(count)
}

pub fn count_attendance_events(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM attendance", [], |row| row.get(0))?;

    Ok(count)
}

/// Events for one student, oldest first
pub fn get_events_for_student(conn: &Connection, student_id: i64) -> Result<Vec<AttendanceEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, timestamp
         FROM attendance
         WHERE student_id = ?1
         ORDER BY id ASC",
    )?;

    let events = stmt
        .query_map(params![student_id], event_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Latest `limit` attendance marks, newest first
pub fn get_recent_attendance(conn: &Connection, limit: usize) -> Result<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.student_id, a.timestamp, s.id, s.name, s.matric_number, s.barcode
         FROM attendance a
         JOIN students s ON s.id = a.student_id
         ORDER BY a.id DESC
         LIMIT ?1",
    )?;

    let records = stmt
        .query_map(params![limit as i64], |row| {
            Ok(AttendanceRecord {
                event: event_from_row(row)?,
                student: Student {
                    id: row.get(3)?,
                    name: row.get(4)?,
                    matric_number: row.get(5)?,
                    barcode: row.get(6)?,
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        matric_number: row.get(2)?,
        barcode: row.get(3)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<AttendanceEvent> {
    let timestamp_str: String = row.get(2)?;

    Ok(AttendanceEvent {
        id: row.get(0)?,
        student_id: row.get(1)?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
            })?
            .with_timezone(&Utc),
    })
}

/// Fixed-width UTC form, so string order in SQLite matches time order
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            AttendanceError::Storage(rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::parse_payload;
    use chrono::Duration;

    fn code(payload: &str) -> FullCode {
        FullCode::from_payload(&parse_payload(payload).unwrap())
    }

    #[test]
    fn test_insert_and_find_student() {
        let store = Store::open_in_memory().unwrap();

        let student = store
            .insert_student("Ada Lovelace", "MAT001", &code("123456789012"))
            .unwrap();

        let found = store.find_student_by_barcode("1234567890128").unwrap().unwrap();
        assert_eq!(found, student);
        assert_eq!(found.name, "Ada Lovelace");
        assert_eq!(store.count_students().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_barcode_rejected_by_store() {
        let store = Store::open_in_memory().unwrap();
        let barcode = code("123456789012");

        store.insert_student("Ada Lovelace", "MAT001", &barcode).unwrap();
        let err = store.insert_student("Someone Else", "MAT999", &barcode).unwrap_err();

        assert!(matches!(err, AttendanceError::DuplicateBarcode { .. }));
        assert_eq!(store.count_students().unwrap(), 1);
    }

    #[test]
    fn test_other_constraint_violations_are_storage_errors() {
        let store = Store::open_in_memory().unwrap();
        // Trigger aborts surface as SQLITE_CONSTRAINT_TRIGGER, not UNIQUE
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_blocked_name BEFORE INSERT ON students
                 WHEN NEW.name = 'blocked'
                 BEGIN SELECT RAISE(ABORT, 'blocked name'); END;",
            )
            .unwrap();

        let err = store
            .insert_student("blocked", "MAT001", &code("123456789012"))
            .unwrap_err();

        assert!(matches!(err, AttendanceError::Storage(_)));
        assert_eq!(store.count_students().unwrap(), 0);
    }

    #[test]
    fn test_matric_number_not_unique() {
        let store = Store::open_in_memory().unwrap();

        store.insert_student("Ada", "MAT001", &code("111111111111")).unwrap();
        store.insert_student("Ada Again", "MAT001", &code("222222222222")).unwrap();

        assert_eq!(store.count_students().unwrap(), 2);
    }

    #[test]
    fn test_lookup_is_exact() {
        let store = Store::open_in_memory().unwrap();
        store.insert_student("Ada", "MAT001", &code("123456789012")).unwrap();

        assert!(store.find_student_by_barcode("123456789012").unwrap().is_none());
        assert!(store.find_student_by_barcode(" 1234567890128").unwrap().is_none());
        assert!(store.find_student_by_barcode("12345678901280").unwrap().is_none());
        assert!(store.find_student_by_barcode("1234567890128").unwrap().is_some());
    }

    #[test]
    fn test_attendance_requires_existing_student() {
        let store = Store::open_in_memory().unwrap();

        let err = store.insert_attendance_event(42).unwrap_err();

        assert!(matches!(err, AttendanceError::Storage(_)));
        assert_eq!(store.count_attendance_events().unwrap(), 0);
    }

    #[test]
    fn test_attendance_timestamps_non_decreasing() {
        let store = Store::open_in_memory().unwrap();
        let student = store.insert_student("Ada", "MAT001", &code("123456789012")).unwrap();

        let mut previous = None;
        for _ in 0..20 {
            let event = store.insert_attendance_event(student.id).unwrap();
            if let Some(prev) = previous {
                assert!(event.timestamp >= prev);
            }
            previous = Some(event.timestamp);
        }

        let events = store.events_for_student(student.id).unwrap();
        assert_eq!(events.len(), 20);
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_clock_step_back_does_not_reorder() {
        let store = Store::open_in_memory().unwrap();
        let student = store.insert_student("Ada", "MAT001", &code("123456789012")).unwrap();

        // Simulate an event recorded before the clock was moved back an hour
        let future = Utc::now() + Duration::hours(1);
        store
            .connection()
            .execute(
                "INSERT INTO attendance (student_id, timestamp) VALUES (?1, ?2)",
                params![student.id, format_timestamp(&future)],
            )
            .unwrap();

        let event = store.insert_attendance_event(student.id).unwrap();

        assert!(event.timestamp >= future);
    }

    #[test]
    fn test_recent_attendance_joins_student() {
        let store = Store::open_in_memory().unwrap();
        let ada = store.insert_student("Ada", "MAT001", &code("111111111111")).unwrap();
        let alan = store.insert_student("Alan", "MAT002", &code("222222222222")).unwrap();

        store.insert_attendance_event(ada.id).unwrap();
        store.insert_attendance_event(alan.id).unwrap();
        store.insert_attendance_event(ada.id).unwrap();

        let recent = store.recent_attendance(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].student, ada);
        assert_eq!(recent[1].student, alan);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let store = Store::open_in_memory().unwrap();

        let result: Result<()> = store.with_transaction(|conn| {
            insert_student(conn, "Ada", "MAT001", &code("123456789012"))?;
            Err(AttendanceError::Config {
                message: "abort".to_string(),
            })
        });

        assert!(result.is_err());
        assert_eq!(store.count_students().unwrap(), 0);
    }

    #[test]
    fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.db");

        {
            let store = Store::open(&path).unwrap();
            store.insert_student("Ada", "MAT001", &code("123456789012")).unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.count_students().unwrap(), 1);
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let a = format_timestamp(&Utc::now());
        let b = format_timestamp(&(Utc::now() + Duration::days(400)));

        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert!(a.ends_with('Z'));
        assert_eq!(parse_timestamp(&a).unwrap().to_rfc3339_opts(SecondsFormat::Micros, true), a);
    }
}
