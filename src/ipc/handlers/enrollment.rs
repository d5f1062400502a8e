use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, StoreError};
use rusqlite::Connection;
use serde_json::json;

use super::params::{required_i64, required_str};

fn enrollment_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, StoreError> {
    let class_id = required_str(params, "classId")?;
    let student_id = required_str(params, "studentId")?;
    let roll_number = required_i64(params, "rollNumber")?;

    let enrollment_id = store::create_enrollment(conn, &class_id, &student_id, roll_number)?;
    Ok(json!({
        "enrollmentId": enrollment_id,
        "rollNumber": roll_number
    }))
}

fn handle_enrollment_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match enrollment_create(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollment.create" => Some(handle_enrollment_create(state, req)),
        _ => None,
    }
}
