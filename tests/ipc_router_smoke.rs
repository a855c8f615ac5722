use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradesd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradesd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn send_line(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    line: &str,
) -> serde_json::Value {
    writeln!(stdin, "{}", line).expect("write line");
    stdin.flush().expect("flush");
    let mut out = String::new();
    reader.read_line(&mut out).expect("read response line");
    serde_json::from_str(out.trim()).expect("parse response json")
}

#[test]
fn health_unknown_method_and_bad_json() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let resp = send_line(
        &mut stdin,
        &mut reader,
        &json!({ "id": "1", "method": "health" }).to_string(),
    );
    assert_eq!(resp["ok"], json!(true));
    assert_eq!(
        resp["result"]["version"].as_str(),
        Some(env!("CARGO_PKG_VERSION"))
    );
    assert!(resp["result"]["workspacePath"].is_null());

    let resp = send_line(
        &mut stdin,
        &mut reader,
        &json!({ "id": "2", "method": "grades.refresh" }).to_string(),
    );
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("not_implemented"));

    // A line that is not a request at all still gets a structured reply.
    let resp = send_line(&mut stdin, &mut reader, "this is not json");
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("bad_json"));

    // Rendering needs no workspace.
    let payload = json!({ "Result": { "SubjectExamInfoList": [] } });
    let resp = send_line(
        &mut stdin,
        &mut reader,
        &json!({
            "id": "3",
            "method": "report.render",
            "params": { "json": payload.to_string() }
        })
        .to_string(),
    );
    assert_eq!(resp["ok"], json!(true), "render failed: {}", resp);
    assert_eq!(
        resp["result"]["report"]["statistics"]["subjectCount"],
        json!(0)
    );

    drop(stdin);
    let _ = child.wait();
}
