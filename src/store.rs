use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::roster::{PlannedMark, RosterEntry};

/// Failure taxonomy for entity-store operations. SQLite constraint failures
/// are classified by extended result code so callers see the semantic
/// category rather than a driver error.
#[derive(Debug)]
pub enum StoreError {
    BadParams(String),
    BadReference(String),
    Constraint(String),
    NotFound(String),
    Db(rusqlite::Error),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::BadParams(_) => "bad_params",
            StoreError::BadReference(_) => "bad_reference",
            StoreError::Constraint(_) => "constraint_violation",
            StoreError::NotFound(_) => "not_found",
            StoreError::Db(_) => "db_query_failed",
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::BadParams(m)
            | StoreError::BadReference(m)
            | StoreError::Constraint(m)
            | StoreError::NotFound(m) => f.write_str(m),
            StoreError::Db(e) => write!(f, "{}", e),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, ref msg) = e {
            if failure.code == rusqlite::ErrorCode::ConstraintViolation {
                let text = msg
                    .clone()
                    .unwrap_or_else(|| "constraint violated".to_string());
                return if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                    StoreError::BadReference(text)
                } else {
                    StoreError::Constraint(text)
                };
            }
        }
        StoreError::Db(e)
    }
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub fullname: &'a str,
    pub role: &'a str,
    pub regno: &'a str,
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub fullname: String,
    pub role: String,
    pub regno: String,
}

#[derive(Debug, Clone)]
pub struct ClassRow {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct AttendanceRow {
    pub id: String,
    pub class_id: String,
    pub student_id: String,
    pub marked_by: String,
    pub date: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct DayStatus {
    pub date: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct RosterName {
    pub roll_number: i64,
    pub full_name: String,
}

pub fn user_exists(conn: &Connection, user_id: &str) -> Result<bool, StoreError> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [user_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?;
    Ok(found.is_some())
}

pub fn class_exists(conn: &Connection, class_id: &str) -> Result<bool, StoreError> {
    let found = conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?;
    Ok(found.is_some())
}

pub fn create_user(conn: &Connection, user: &NewUser) -> Result<UserRow, StoreError> {
    if !matches!(user.role, "teacher" | "student") {
        return Err(StoreError::BadParams(
            "role must be teacher or student".to_string(),
        ));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO users(id, username, password, fullname, role, regno)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &id,
            user.username,
            user.password,
            user.fullname,
            user.role,
            user.regno,
        ),
    )?;

    Ok(UserRow {
        id,
        username: user.username.to_string(),
        fullname: user.fullname.to_string(),
        role: user.role.to_string(),
        regno: user.regno.to_string(),
    })
}

pub fn create_class(
    conn: &Connection,
    name: &str,
    teacher_id: &str,
) -> Result<ClassRow, StoreError> {
    if !user_exists(conn, teacher_id)? {
        return Err(StoreError::BadReference("teacher not found".to_string()));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, name, teacher_id) VALUES(?, ?, ?)",
        (&id, name, teacher_id),
    )?;

    Ok(ClassRow {
        id,
        name: name.to_string(),
    })
}

pub fn create_enrollment(
    conn: &Connection,
    class_id: &str,
    student_id: &str,
    roll_number: i64,
) -> Result<String, StoreError> {
    if !class_exists(conn, class_id)? {
        return Err(StoreError::BadReference("class not found".to_string()));
    }
    if !user_exists(conn, student_id)? {
        return Err(StoreError::BadReference("student not found".to_string()));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO class_students(id, class_id, student_id, roll_number)
         VALUES(?, ?, ?, ?)",
        (&id, class_id, student_id, roll_number),
    )
    .map_err(|e| match StoreError::from(e) {
        StoreError::Constraint(_) => {
            StoreError::Constraint("student already enrolled in class".to_string())
        }
        other => other,
    })?;

    Ok(id)
}

pub fn list_classes(conn: &Connection) -> Result<Vec<ClassRow>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, name FROM classes ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ClassRow {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The roster of a class: one entry per enrolled student, roll order. A
/// class with no enrollments resolves to an empty roster, not an error.
pub fn roster_for_class(conn: &Connection, class_id: &str) -> Result<Vec<RosterEntry>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT student_id, roll_number
         FROM class_students
         WHERE class_id = ?
         ORDER BY roll_number",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            Ok(RosterEntry {
                student_id: r.get(0)?,
                roll_number: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn insert_attendance_row(
    conn: &Connection,
    class_id: &str,
    date: &str,
    marked_by: &str,
    mark: &PlannedMark,
) -> Result<(), StoreError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO attendance(id, class_id, student_id, marked_by, date, status)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &id,
            class_id,
            &mark.student_id,
            marked_by,
            date,
            mark.status.as_str(),
        ),
    )
    .map_err(|e| match StoreError::from(e) {
        StoreError::Constraint(_) => StoreError::Constraint(format!(
            "attendance already marked for class on {}",
            date
        )),
        other => other,
    })?;
    Ok(())
}

/// Writes one attendance row per planned mark inside a single transaction.
/// Either every row for the (class, date) lands or none do; a duplicate day
/// surfaces as Constraint with nothing written.
pub fn insert_attendance_batch(
    conn: &Connection,
    class_id: &str,
    date: &str,
    marked_by: &str,
    marks: &[PlannedMark],
) -> Result<usize, StoreError> {
    let tx = conn.unchecked_transaction()?;
    for mark in marks {
        insert_attendance_row(&tx, class_id, date, marked_by, mark)?;
    }
    tx.commit()?;
    Ok(marks.len())
}

pub fn attendance_for_student(
    conn: &Connection,
    student_id: &str,
) -> Result<Vec<AttendanceRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, class_id, student_id, marked_by, date, status
         FROM attendance
         WHERE student_id = ?
         ORDER BY date",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            Ok(AttendanceRow {
                id: r.get(0)?,
                class_id: r.get(1)?,
                student_id: r.get(2)?,
                marked_by: r.get(3)?,
                date: r.get(4)?,
                status: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Inclusive at both bounds. Dates are ISO text, so string comparison is
/// chronological.
pub fn attendance_for_student_in_range(
    conn: &Connection,
    student_id: &str,
    from: &str,
    to: &str,
) -> Result<Vec<DayStatus>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT date, status
         FROM attendance
         WHERE student_id = ? AND date >= ? AND date <= ?
         ORDER BY date",
    )?;
    let rows = stmt
        .query_map((student_id, from, to), |r| {
            Ok(DayStatus {
                date: r.get(0)?,
                status: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Roster joined to user records, students only. Unlike the other queries,
/// an empty result here is NotFound.
pub fn class_roster(conn: &Connection, class_id: &str) -> Result<Vec<RosterName>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT cs.roll_number, u.fullname
         FROM class_students cs
         JOIN users u ON u.id = cs.student_id
         WHERE cs.class_id = ? AND u.role = 'student'
         ORDER BY cs.roll_number",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            Ok(RosterName {
                roll_number: r.get(0)?,
                full_name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        return Err(StoreError::NotFound(
            "no students enrolled in class".to_string(),
        ));
    }
    Ok(rows)
}
