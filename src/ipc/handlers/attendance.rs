use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use crate::store::{self, StoreError};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashSet;

use super::params::{required_date, required_str};

/// Marks a whole class for one date. The caller supplies only the absentee
/// roll numbers; every other enrolled student is recorded present. All rows
/// for the call commit together or not at all.
fn attendance_mark(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, StoreError> {
    let class_id = required_str(params, "classId")?;
    let date = required_date(params, "date")?;
    let marked_by = required_str(params, "markedBy")?;
    let rolls = params
        .get("absentRollNumbers")
        .and_then(|v| v.as_array())
        .ok_or_else(|| StoreError::BadParams("missing absentRollNumbers".to_string()))?;
    let absent: HashSet<i64> = rolls.iter().filter_map(|v| v.as_i64()).collect();

    if !store::class_exists(conn, &class_id)? {
        return Err(StoreError::BadReference("class not found".to_string()));
    }
    if !store::user_exists(conn, &marked_by)? {
        return Err(StoreError::BadReference("marker not found".to_string()));
    }

    let roster_entries = store::roster_for_class(conn, &class_id)?;
    let plan = roster::reconcile(&roster_entries, &absent);
    let count = store::insert_attendance_batch(conn, &class_id, &date, &marked_by, &plan)?;

    tracing::info!(class = %class_id, date = %date, count, "attendance recorded");
    Ok(json!({ "count": count }))
}

fn attendance_student_history(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, StoreError> {
    let student_id = required_str(params, "studentId")?;

    let records: Vec<serde_json::Value> = store::attendance_for_student(conn, &student_id)?
        .into_iter()
        .map(|r| {
            json!({
                "id": r.id,
                "classId": r.class_id,
                "studentId": r.student_id,
                "markedBy": r.marked_by,
                "date": r.date,
                "status": r.status
            })
        })
        .collect();
    Ok(json!({ "records": records }))
}

fn attendance_student_history_range(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, StoreError> {
    let student_id = required_str(params, "studentId")?;
    let from = required_date(params, "from")?;
    let to = required_date(params, "to")?;

    let records: Vec<serde_json::Value> =
        store::attendance_for_student_in_range(conn, &student_id, &from, &to)?
            .into_iter()
            .map(|r| json!({ "date": r.date, "status": r.status }))
            .collect();
    Ok(json!({ "records": records }))
}

fn handle_attendance_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_mark(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_attendance_student_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_student_history(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_attendance_student_history_range(
    state: &mut AppState,
    req: &Request,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_student_history_range(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(handle_attendance_mark(state, req)),
        "attendance.studentHistory" => Some(handle_attendance_student_history(state, req)),
        "attendance.studentHistoryRange" => {
            Some(handle_attendance_student_history_range(state, req))
        }
        _ => None,
    }
}
