pub mod backup;
pub mod core;
pub mod grades;
pub mod report;
pub mod share;

use super::error::err;
use super::types::{AppState, Request};
use crate::analysis::{self, ReportModel};
use crate::model::{self, GradesPayload};
use rusqlite::Connection;

pub(super) fn db_conn<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first"))
}

pub(super) fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key)))
}

/// Pasted or uploaded JSON comes with a BOM and stray whitespace often
/// enough to normalize unconditionally.
pub(super) fn normalize_content(content: &str) -> &str {
    content.trim_start_matches('\u{feff}').trim()
}

/// Shared parse + validate + render path for JSON text, used by import,
/// cache reload and the share viewer.
pub(super) fn render_payload_text(
    req: &Request,
    text: &str,
) -> Result<ReportModel, serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| err(&req.id, "bad_json", format!("invalid JSON: {}", e)))?;
    model::validate(&value).map_err(|e| err(&req.id, e.code(), e.message()))?;
    let payload: GradesPayload = serde_json::from_value(value)
        .map_err(|e| err(&req.id, "bad_json", format!("unexpected field type: {}", e)))?;
    let result = payload
        .result
        .as_ref()
        .ok_or_else(|| err(&req.id, "missing_result", "payload has no Result object"))?;
    Ok(analysis::build_report(result))
}
