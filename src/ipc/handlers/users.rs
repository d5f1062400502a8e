use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, NewUser, StoreError};
use rusqlite::Connection;
use serde_json::json;

use super::params::required_str;

fn users_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, StoreError> {
    let username = required_str(params, "username")?;
    let password = required_str(params, "password")?;
    let fullname = required_str(params, "fullname")?;
    let role = required_str(params, "role")?;
    let regno = required_str(params, "regno")?;

    let user = store::create_user(
        conn,
        &NewUser {
            username: &username,
            password: &password,
            fullname: &fullname,
            role: &role,
            regno: &regno,
        },
    )
    .map_err(|e| match e {
        StoreError::Constraint(_) => {
            StoreError::Constraint("username already taken".to_string())
        }
        other => other,
    })?;

    // The credential never leaves the store.
    Ok(json!({
        "id": user.id,
        "username": user.username,
        "fullname": user.fullname,
        "role": user.role,
        "regno": user.regno
    }))
}

fn handle_users_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match users_create(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.create" => Some(handle_users_create(state, req)),
        _ => None,
    }
}
