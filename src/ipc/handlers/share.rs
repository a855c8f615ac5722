use super::{db_conn, render_payload_text, required_str};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store;
use chrono::Utc;
use serde_json::json;

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let row = match store::cache_load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string()),
    };
    let Some((text, _)) = row else {
        return err(&req.id, "no_data", "no grades data to share");
    };

    match store::share_create(conn, &text, Utc::now()) {
        Ok(record) => ok(
            &req.id,
            json!({
                "id": record.id,
                "createdAt": record.created_at,
                "expiresAt": record.expires_at,
            }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string()),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let payload = match store::share_get(conn, &id, Utc::now()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string()),
    };
    let Some(text) = payload else {
        return err(&req.id, "not_found", "share link expired or does not exist");
    };

    // Snapshots were valid at creation; one that no longer renders is
    // treated the same as a missing one.
    match render_payload_text(req, &text) {
        Ok(report) => ok(
            &req.id,
            json!({
                "readOnly": true,
                "report": report,
            }),
        ),
        Err(_) => err(&req.id, "not_found", "share snapshot is no longer readable"),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "share.create" => Some(handle_create(state, req)),
        "share.get" => Some(handle_get(state, req)),
        _ => None,
    }
}
