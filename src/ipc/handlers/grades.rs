use super::{db_conn, normalize_content, render_payload_text, required_str};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store;
use chrono::Utc;
use serde_json::json;

fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let raw = match required_str(req, "json") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let text = normalize_content(&raw);

    let report = match render_payload_text(req, text) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    // The cache keeps the import verbatim; typed structs are render-only.
    let now = Utc::now();
    if let Err(e) = store::cache_store(conn, text, now) {
        return err(&req.id, "db_query_failed", e.to_string());
    }

    ok(
        &req.id,
        json!({
            "imported": true,
            "report": report,
        }),
    )
}

fn handle_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let row = match store::cache_load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string()),
    };
    let Some((text, imported_at)) = row else {
        return ok(&req.id, json!({ "loaded": false }));
    };

    // A cache that no longer parses or validates is "no data", not a crash.
    // Drop it so the next load is clean.
    match render_payload_text(req, &text) {
        Ok(report) => ok(
            &req.id,
            json!({
                "loaded": true,
                "importedAt": imported_at,
                "report": report,
            }),
        ),
        Err(_) => {
            if let Err(e) = store::cache_clear(conn) {
                return err(&req.id, "db_query_failed", e.to_string());
            }
            ok(&req.id, json!({ "loaded": false, "discarded": true }))
        }
    }
}

fn handle_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match store::cache_clear(conn) {
        Ok(()) => ok(&req.id, json!({ "cleared": true })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string()),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.import" => Some(handle_import(state, req)),
        "grades.load" => Some(handle_load(state, req)),
        "grades.clear" => Some(handle_clear(state, req)),
        _ => None,
    }
}
