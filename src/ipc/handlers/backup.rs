use super::required_str;
use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;
use std::path::PathBuf;

fn handle_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first");
    };
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };

    match backup::export_workspace_bundle(&workspace, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "dbSha256": summary.db_sha256,
                "outPath": out_path.to_string_lossy(),
            }),
        ),
        Err(e) => err(&req.id, "io_failed", format!("{e:#}")),
    }
}

fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first");
    };
    let in_path = match required_str(req, "inPath") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };

    // Close the live connection before replacing the database file under it.
    state.db = None;

    let summary = match backup::import_workspace_bundle(&in_path, &workspace) {
        Ok(s) => s,
        Err(e) => {
            // Reopen whatever is left so the sidecar stays usable.
            state.db = store::open_db(&workspace).ok();
            return err(&req.id, "io_failed", format!("{e:#}"));
        }
    };

    match store::open_db(&workspace) {
        Ok(conn) => {
            state.db = Some(conn);
            ok(
                &req.id,
                json!({ "bundleFormatDetected": summary.bundle_format_detected }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_export(state, req)),
        "backup.import" => Some(handle_import(state, req)),
        _ => None,
    }
}
