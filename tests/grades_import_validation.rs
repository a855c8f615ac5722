use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

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

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn error_code(resp: &serde_json::Value) -> &str {
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    resp["error"]["code"].as_str().expect("error code")
}

#[test]
fn import_failures_map_to_error_codes() {
    let workspace = temp_dir("gradesd-import-validation");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    // No workspace selected yet.
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "grades.import",
        json!({ "json": "{}" }),
    );
    assert_eq!(error_code(&resp), "no_workspace");

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(resp["ok"], json!(true));

    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "grades.import",
        json!({ "json": "not json at all" }),
    );
    assert_eq!(error_code(&resp), "bad_json");

    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "grades.import",
        json!({ "json": "{\"foo\": 1}" }),
    );
    assert_eq!(error_code(&resp), "missing_result");

    let resp = request(
        &mut stdin,
        &mut reader,
        "5",
        "grades.import",
        json!({ "json": "{\"Result\": {}}" }),
    );
    assert_eq!(error_code(&resp), "missing_subject_list");

    let resp = request(
        &mut stdin,
        &mut reader,
        "6",
        "grades.import",
        json!({ "json": "{\"Result\": {\"SubjectExamInfoList\": \"nope\"}}" }),
    );
    assert_eq!(error_code(&resp), "missing_subject_list");

    // Nothing was cached by the failed imports.
    let resp = request(&mut stdin, &mut reader, "7", "grades.load", json!({}));
    assert_eq!(resp["result"]["loaded"], json!(false));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn import_accepts_bom_and_padding() {
    let workspace = temp_dir("gradesd-import-bom");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(resp["ok"], json!(true));

    let text = format!(
        "\u{feff}  {}  \n",
        json!({ "Result": { "StudentName": "王小明", "SubjectExamInfoList": [] } })
    );
    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "grades.import",
        json!({ "json": text }),
    );
    assert_eq!(resp["ok"], json!(true), "import failed: {}", resp);
    assert_eq!(
        resp["result"]["report"]["statistics"]["averageDisplay"],
        json!("--")
    );
    assert_eq!(
        resp["result"]["report"]["statistics"]["subjectCount"],
        json!(0)
    );

    drop(stdin);
    let _ = child.wait();
}
