use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, StoreError};
use rusqlite::Connection;
use serde_json::json;

use super::params::required_str;

fn classes_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, StoreError> {
    let name = required_str(params, "name")?;
    let teacher_id = required_str(params, "teacherId")?;

    let class = store::create_class(conn, &name, &teacher_id)?;
    Ok(json!({
        "classId": class.id,
        "name": class.name,
        "teacherId": teacher_id
    }))
}

fn classes_list(conn: &Connection) -> Result<serde_json::Value, StoreError> {
    let classes: Vec<serde_json::Value> = store::list_classes(conn)?
        .into_iter()
        .map(|c| json!({ "id": c.id, "name": c.name }))
        .collect();
    Ok(json!({ "classes": classes }))
}

fn classes_roster(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, StoreError> {
    let class_id = required_str(params, "classId")?;

    let students: Vec<serde_json::Value> = store::class_roster(conn, &class_id)?
        .into_iter()
        .map(|s| {
            json!({
                "rollNumber": s.roll_number,
                "fullName": s.full_name
            })
        })
        .collect();
    Ok(json!({ "students": students }))
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match classes_create(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };
    match classes_list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_classes_roster(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match classes_roster(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.roster" => Some(handle_classes_roster(state, req)),
        _ => None,
    }
}
