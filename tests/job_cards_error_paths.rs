use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_labcardd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn labcardd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn raw_line(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    line: &str,
) -> serde_json::Value {
    writeln!(stdin, "{}", line).expect("write line");
    stdin.flush().expect("flush line");
    let mut out = String::new();
    reader.read_line(&mut out).expect("read response line");
    serde_json::from_str(out.trim()).expect("parse response json")
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
    let value = raw_line(stdin, reader, &payload.to_string());
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn error_code(value: &serde_json::Value) -> &str {
    assert_eq!(value["ok"], false, "expected failure: {value}");
    value["error"]["code"].as_str().expect("error code")
}

#[test]
fn view_and_counts_require_a_load_first() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let view = request(&mut stdin, &mut reader, "1", "jobCards.view", json!({}));
    assert_eq!(error_code(&view), "no_job_cards");

    let counts = request(&mut stdin, &mut reader, "2", "jobCards.counts", json!({}));
    assert_eq!(error_code(&counts), "no_job_cards");
}

#[test]
fn unknown_method_is_not_implemented() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(&mut stdin, &mut reader, "1", "jobCards.print", json!({}));
    assert_eq!(error_code(&resp), "not_implemented");
}

#[test]
fn malformed_request_line_still_gets_a_reply() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let resp = raw_line(&mut stdin, &mut reader, "{not json");
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "bad_json");

    // The loop keeps serving after a bad line.
    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["ok"], true);
}

#[test]
fn load_rejects_missing_and_malformed_records() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let missing = request(&mut stdin, &mut reader, "1", "jobCards.load", json!({}));
    assert_eq!(error_code(&missing), "bad_params");

    let not_a_list = request(
        &mut stdin,
        &mut reader,
        "2",
        "jobCards.load",
        json!({ "records": 42 }),
    );
    assert_eq!(error_code(&not_a_list), "invalid_input");

    let backend_error = request(
        &mut stdin,
        &mut reader,
        "3",
        "jobCards.load",
        json!({ "records": { "status": "ERROR", "message": "analyst has no job cards", "data": null } }),
    );
    assert_eq!(error_code(&backend_error), "backend_error");
    assert_eq!(backend_error["error"]["message"], "analyst has no job cards");

    let bad_row = request(
        &mut stdin,
        &mut reader,
        "4",
        "jobCards.load",
        json!({ "records": [{ "id": 1 }, { "id": "seven" }] }),
    );
    assert_eq!(error_code(&bad_row), "decode_failed");
    assert_eq!(bad_row["error"]["details"]["index"], 1);

    // None of the failed loads installed a view.
    let view = request(&mut stdin, &mut reader, "5", "jobCards.view", json!({}));
    assert_eq!(error_code(&view), "no_job_cards");
}

#[test]
fn undecodable_sample_payloads_degrade_to_no_match() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "jobCards.load",
        json!({
            "records": [{
                "id": 1, "reportNo": "R1", "isApproved": true,
                "isTechanicianChecked": false, "isQualityChecked": false,
                "createdAt": "2024-01-02",
            }],
            "samples": [{ "status": "SUCCESS", "data": [{ "reportNumber": 99 }] }],
        }),
    );
    assert_eq!(resp["ok"], true);
    let result = &resp["result"];
    assert_eq!(result["unmatchedReports"], json!(["R1"]));
    assert_eq!(result["groups"][0]["sampleNumber"], "—");
}
