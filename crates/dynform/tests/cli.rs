use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;

const FIELDS: &str = r#"[
  { "id": "age", "label": "Age", "widget": "text" },
  { "id": "company_name", "label": "Company Name", "widget": "integer" },
  { "id": "colour", "label": "Colour", "widget": "choice" }
]"#;

fn dynform(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dynform").expect("binary builds");
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env_remove("DYNFORM_BASE_URL")
        .env("NO_PROXY", "127.0.0.1,localhost");
    cmd
}

#[test]
fn check_prints_coerced_payload() {
    let dir = TempDir::new().unwrap();
    dir.child("fields.json").write_str(FIELDS).unwrap();
    dir.child("answers.json")
        .write_str(r#"{ "age": " 30 ", "company_name": "Acme", "colour": "red" }"#)
        .unwrap();

    dynform(&dir)
        .args(["check", "--fields", "fields.json", "--answers", "answers.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""valid": true"#))
        .stdout(predicate::str::contains(r#""age": 30"#));
}

#[test]
fn check_fails_on_invalid_answers() {
    let dir = TempDir::new().unwrap();
    dir.child("fields.json").write_str(FIELDS).unwrap();
    dir.child("answers.json")
        .write_str(r#"{ "age": "thirty", "company_name": "A" }"#)
        .unwrap();

    dynform(&dir)
        .args(["check", "--fields", "fields.json", "--answers", "answers.json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "Age must be a valid whole number (e.g., 123, -45)",
        ))
        .stdout(predicate::str::contains("Colour is required"))
        .stderr(predicate::str::contains("answers failed validation"));
}

#[test]
fn check_rejects_unknown_widget() {
    let dir = TempDir::new().unwrap();
    dir.child("fields.json")
        .write_str(r#"[{ "id": "x", "label": "X", "widget": "slider" }]"#)
        .unwrap();
    dir.child("answers.json").write_str("{}").unwrap();

    dynform(&dir)
        .args(["check", "--fields", "fields.json", "--answers", "answers.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}

#[test]
fn malformed_config_is_reported() {
    let dir = TempDir::new().unwrap();
    dir.child("dynform.toml")
        .write_str("request_timeout_ms = \"soon\"")
        .unwrap();
    dir.child("fields.json").write_str(FIELDS).unwrap();
    dir.child("answers.json").write_str("{}").unwrap();

    dynform(&dir)
        .args(["check", "--fields", "fields.json", "--answers", "answers.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dynform.toml"));
}

#[test]
fn help_lists_commands() {
    let dir = TempDir::new().unwrap();
    dynform(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fields"))
        .stdout(predicate::str::contains("choices"))
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("check"));
}

/// Blocking stub of the form service on a background thread; counts `POST /save`.
fn serve_form(fields: &'static str) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let saves = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&saves);
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else {
                return;
            };
            respond(stream, fields, &counter);
        }
    });
    (base, saves)
}

fn respond(mut stream: TcpStream, fields: &str, saves: &AtomicUsize) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).unwrap_or(0);
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let (status, body) = if head.starts_with("GET /form ") {
        ("200 OK", fields.to_string())
    } else if head.starts_with("POST /save ") {
        saves.fetch_add(1, Ordering::SeqCst);
        ("200 OK", r#"{"success":true}"#.to_string())
    } else {
        ("404 Not Found", String::new())
    };
    let response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
}

const AGE_FORM: &str = r#"[{ "id": "age", "label": "Age", "widget": "text" }]"#;

#[test]
fn submit_sends_valid_answers() {
    let (base, saves) = serve_form(AGE_FORM);
    let dir = TempDir::new().unwrap();
    dir.child("answers.json").write_str(r#"{ "age": 30 }"#).unwrap();

    dynform(&dir)
        .args(["--base-url", base.as_str(), "submit", "--answers", "answers.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Form submitted successfully!"));
    assert_eq!(saves.load(Ordering::SeqCst), 1);
}

#[test]
fn submit_refuses_answers_for_unknown_fields() {
    let (base, saves) = serve_form(AGE_FORM);
    let dir = TempDir::new().unwrap();
    dir.child("answers.json")
        .write_str(r#"{ "age": "30", "ghost": "boo" }"#)
        .unwrap();

    dynform(&dir)
        .args(["--base-url", base.as_str(), "submit", "--answers", "answers.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
    assert_eq!(saves.load(Ordering::SeqCst), 0);
}
