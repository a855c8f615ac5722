use super::{normalize_content, render_payload_text, required_str};
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Renders without persisting. Needs no workspace; the share viewer and
/// one-off previews go through here.
fn handle_render(req: &Request) -> serde_json::Value {
    let raw = match required_str(req, "json") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match render_payload_text(req, normalize_content(&raw)) {
        Ok(report) => ok(&req.id, json!({ "report": report })),
        Err(resp) => resp,
    }
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "report.render" => Some(handle_render(req)),
        _ => None,
    }
}
