use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

fn send_line(stdin: &mut impl Write, json: &str) {
    writeln!(stdin, "{}", json).expect("write json line");
    stdin.flush().ok();
}

#[test]
fn e2e_stdio_full_protocol_round_trip() {
    let server_bin = env!("CARGO_BIN_EXE_portalmcpsrvr");

    // Fixture project tree
    let temp = tempfile::tempdir().expect("tempdir");
    let root = dunce::canonicalize(temp.path()).expect("canonicalize root");
    std::fs::write(root.join("server.js"), "console.log('portal up');\n").unwrap();
    std::fs::write(root.join("package.json"), "{\"name\":\"portal\"}\n").unwrap();
    std::fs::write(root.join("README.md"), "# portal\n").unwrap();
    std::fs::create_dir(root.join("scripts")).unwrap();
    std::fs::write(root.join("scripts/hello.js"), "// hello\n").unwrap();
    std::fs::create_dir(root.join("emptydir")).unwrap();
    let audit_path = root.join("ops-audit.log");

    let mut child = Command::new(server_bin)
        .arg("--root")
        .arg(&root)
        .arg("--log-level")
        .arg("error")
        .arg("--audit-log")
        .arg(&audit_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn server");

    let mut stdin = child.stdin.take().expect("stdin");
    let stdout = child.stdout.take().expect("stdout");

    // Reader thread to collect stdout lines
    let (tx, rx) = mpsc::channel::<String>();
    std::thread::spawn(move || {
        let reader = BufReader::new(stdout);
        for line in reader.lines() {
            if let Ok(l) = line {
                let _ = tx.send(l);
            } else {
                break;
            }
        }
    });

    send_line(
        &mut stdin,
        &serde_json::json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}
        })
        .to_string(),
    );
    send_line(
        &mut stdin,
        &serde_json::json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}).to_string(),
    );

    // Non-protocol noise: must produce zero output lines and not kill the loop
    send_line(&mut stdin, "this is not json");

    send_line(
        &mut stdin,
        &serde_json::json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": {"name": "read_file", "arguments": {"path": "server.js"}}
        })
        .to_string(),
    );
    send_line(
        &mut stdin,
        &serde_json::json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call",
            "params": {"name": "list_files", "arguments": {"directory": "emptydir"}}
        })
        .to_string(),
    );
    send_line(
        &mut stdin,
        &serde_json::json!({
            "jsonrpc": "2.0", "id": 5, "method": "tools/call",
            "params": {"name": "run_script", "arguments": {"script": "missing"}}
        })
        .to_string(),
    );
    send_line(
        &mut stdin,
        &serde_json::json!({"jsonrpc": "2.0", "id": 6, "method": "resources/list"}).to_string(),
    );
    let server_js_uri = format!("file://{}", root.join("server.js").display());
    send_line(
        &mut stdin,
        &serde_json::json!({
            "jsonrpc": "2.0", "id": 7, "method": "resources/read",
            "params": {"uri": server_js_uri}
        })
        .to_string(),
    );
    send_line(
        &mut stdin,
        &serde_json::json!({"jsonrpc": "2.0", "id": 8, "method": "foo/bar"}).to_string(),
    );
    send_line(
        &mut stdin,
        &serde_json::json!({
            "jsonrpc": "2.0", "id": 9, "method": "tools/call",
            "params": {"name": "write_file", "arguments": {}}
        })
        .to_string(),
    );

    // Collect responses for ids 1..=9
    let mut responses: HashMap<i64, serde_json::Value> = HashMap::new();
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while std::time::Instant::now() < deadline && responses.len() < 9 {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(line) => {
                let v: serde_json::Value = serde_json::from_str(&line).expect("json resp");
                if let Some(id) = v.get("id").and_then(|id| id.as_i64()) {
                    responses.insert(id, v);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(_) => break,
        }
    }
    assert_eq!(responses.len(), 9, "did not receive all responses");

    // initialize
    let init = &responses[&1];
    assert!(init.get("error").is_none(), "init error: {}", init);
    assert_eq!(init["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(init["result"]["serverInfo"]["name"], "portalmcpsrvr");

    // tools/list: exactly the seven fixed tools
    let tools = responses[&2]["result"]["tools"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    assert_eq!(tools.len(), 7, "tools/list: {}", responses[&2]);
    assert!(tools.iter().any(|t| t["name"] == "run_script"));

    // read_file round-trips the file content
    let read = &responses[&3];
    assert!(read.get("error").is_none(), "read_file error: {}", read);
    assert_eq!(
        read["result"]["content"][0]["text"],
        "console.log('portal up');\n"
    );
    assert!(read["result"].get("isError").is_none());

    // list_files on an empty directory
    let list = &responses[&4];
    assert_eq!(list["result"]["content"][0]["text"], "(empty directory)");
    assert!(list["result"].get("isError").is_none());

    // run_script on a missing script: error envelope, no process spawned
    let run = &responses[&5];
    assert!(run.get("error").is_none(), "run_script protocol error: {}", run);
    assert_eq!(run["result"]["isError"], serde_json::json!(true));
    assert!(run["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("missing.js"));

    // resources/list includes the fixture files
    let resources = responses[&6]["result"]["resources"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    let names: Vec<&str> = resources
        .iter()
        .filter_map(|r| r["name"].as_str())
        .collect();
    assert!(names.contains(&"server.js"), "resources: {:?}", names);
    assert!(names.contains(&"scripts/hello.js"), "resources: {:?}", names);
    assert!(names.contains(&"README.md"), "resources: {:?}", names);

    // resources/read round-trips the content
    let resource = &responses[&7];
    assert_eq!(
        resource["result"]["contents"][0]["text"],
        "console.log('portal up');\n"
    );
    assert_eq!(resource["result"]["contents"][0]["uri"], server_js_uri);

    // unknown method
    let unknown = &responses[&8];
    assert!(unknown.get("result").is_none());
    assert_eq!(unknown["error"]["code"], serde_json::json!(-32601));

    // unknown tool surfaces as a protocol error, not a tool envelope
    let unknown_tool = &responses[&9];
    assert!(unknown_tool.get("result").is_none());
    assert_eq!(unknown_tool["error"]["code"], serde_json::json!(-32603));

    // EOF shuts the server down cleanly
    drop(stdin);
    let status = child.wait().expect("wait for server");
    assert!(status.success(), "server exited with {}", status);

    // Audit log was written
    let audit = std::fs::read_to_string(&audit_path).expect("audit log");
    assert!(audit.lines().count() >= 9, "audit entries: {}", audit);
}

#[test]
fn e2e_stdio_containment_denies_escape() {
    let server_bin = env!("CARGO_BIN_EXE_portalmcpsrvr");

    let temp = tempfile::tempdir().expect("tempdir");
    let base = dunce::canonicalize(temp.path()).expect("canonicalize root");
    let root = base.join("project");
    std::fs::create_dir(&root).unwrap();
    std::fs::write(base.join("secret.txt"), "outside\n").unwrap();

    let mut child = Command::new(server_bin)
        .arg("--root")
        .arg(&root)
        .arg("--log-level")
        .arg("error")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn server");

    let mut stdin = child.stdin.take().expect("stdin");
    let stdout = child.stdout.take().expect("stdout");
    let mut reader = BufReader::new(stdout);

    // resources/read must never return content from outside the root
    let uri = format!("file://{}", base.join("secret.txt").display());
    send_line(
        &mut stdin,
        &serde_json::json!({
            "jsonrpc": "2.0", "id": 1, "method": "resources/read",
            "params": {"uri": uri}
        })
        .to_string(),
    );

    // read_file goes through the same guard
    send_line(
        &mut stdin,
        &serde_json::json!({
            "jsonrpc": "2.0", "id": 2, "method": "tools/call",
            "params": {"name": "read_file", "arguments": {"path": "../secret.txt"}}
        })
        .to_string(),
    );
    drop(stdin);

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response 1");
    let denied: serde_json::Value = serde_json::from_str(&line).expect("json resp");
    assert_eq!(denied["id"], serde_json::json!(1));
    assert!(denied.get("result").is_none(), "escape leaked: {}", denied);
    assert_eq!(denied["error"]["code"], serde_json::json!(-32603));
    assert!(denied["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Access denied"));

    line.clear();
    reader.read_line(&mut line).expect("read response 2");
    let tool_denied: serde_json::Value = serde_json::from_str(&line).expect("json resp");
    assert_eq!(tool_denied["result"]["isError"], serde_json::json!(true));
    assert!(!tool_denied["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("outside"));

    let _ = child.wait();
}
