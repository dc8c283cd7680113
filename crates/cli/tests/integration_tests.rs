/// Integration tests for the FlatDB shell.
/// Each test provisions tables under a temp data root, pipes a command script
/// into the built binary and inspects stdout.
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const USERS: &str = "int user_id primary\nstr32 user_name\nstr64 user_email\n";
const DOCS: &str = "int doc_id primary\nstr32 doc_title\nblob doc_body\n";

fn create_table(root: &Path, name: &str, definition: &str) {
    let dir = root.join(format!("{name}.table"));
    fs::create_dir_all(dir.join("blobs")).unwrap();
    fs::write(dir.join("definition"), definition).unwrap();
    fs::write(dir.join("data"), b"").unwrap();
}

/// Helper to run shell commands and capture stdout.
fn run_cli(root: &Path, commands: &str) -> String {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let mut child = Command::new(env!("CARGO_BIN_EXE_cli"))
        .env("FLATDB_DATA_ROOT", root)
        .env("FLATDB_SYNC", "false")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn CLI");

    {
        let stdin = child.stdin.as_mut().expect("Failed to open stdin");
        stdin
            .write_all(commands.as_bytes())
            .expect("Failed to write to stdin");
        stdin.write_all(b"EXIT\n").expect("Failed to write EXIT");
    }

    let output = child.wait_with_output().expect("Failed to read output");
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_banner_and_exit() {
    let dir = tempdir().unwrap();
    let output = run_cli(dir.path(), "");

    assert!(output.contains("FlatDB started"));
    assert!(output.contains("bye"));
}

#[test]
fn test_insert_then_select() {
    let dir = tempdir().unwrap();
    create_table(dir.path(), "users", USERS);

    let output = run_cli(
        dir.path(),
        "INSERT users user_name=\"Ada Lovelace\" user_email=ada@example.com\nSELECT users\n",
    );

    assert!(output.contains("OK (user_id=1)"));
    assert!(output.contains("| user_id* | user_name"));
    assert!(output.contains("Ada Lovelace"));
    assert!(output.contains("ada@example.com"));
    assert!(output.contains("(1 rows)"));
}

#[test]
fn test_select_where() {
    let dir = tempdir().unwrap();
    create_table(dir.path(), "users", USERS);

    let commands = "INSERT users user_name=ann\nINSERT users user_name=bob\nINSERT users user_name=cid\n\
                    SELECT users WHERE user_name=bob\n";
    let output = run_cli(dir.path(), commands);

    assert!(output.contains("bob"));
    assert!(!output.contains("| ann"));
    assert!(output.contains("(1 rows)"));
}

#[test]
fn test_update_and_delete_report_counts() {
    let dir = tempdir().unwrap();
    create_table(dir.path(), "users", USERS);

    let commands = "INSERT users user_name=ann\nINSERT users user_name=bob\n\
                    UPDATE users user_email=x@example.com WHERE user_id=2\n\
                    DELETE users WHERE user_name=ann\n\
                    SELECT users\n";
    let output = run_cli(dir.path(), commands);

    assert!(output.contains("OK (1 rows)"));
    assert!(output.contains("x@example.com"));
    assert!(!output.contains("| ann"));
    assert!(output.contains("(1 rows)"));
}

#[test]
fn test_blob_column_roundtrip() {
    let dir = tempdir().unwrap();
    create_table(dir.path(), "docs", DOCS);

    let commands = "INSERT docs doc_id=1 doc_body=\"hello world\"\n\
                    UPDATE docs doc_body=goodbye WHERE doc_id=1\n\
                    SELECT docs\n";
    let output = run_cli(dir.path(), commands);

    assert!(output.contains("-> 7 bytes"));
    let blobs = fs::read_dir(dir.path().join("docs.table/blobs")).unwrap().count();
    assert_eq!(blobs, 1);
}

#[test]
fn test_truncate_empties_table() {
    let dir = tempdir().unwrap();
    create_table(dir.path(), "users", USERS);

    let output = run_cli(dir.path(), "INSERT users user_name=a\nTRUNCATE users\nSELECT users\n");

    assert!(output.contains("(0 rows)"));
    assert_eq!(fs::metadata(dir.path().join("users.table/data")).unwrap().len(), 0);
}

#[test]
fn test_schema_command() {
    let dir = tempdir().unwrap();
    create_table(dir.path(), "users", USERS);

    let output = run_cli(dir.path(), "SCHEMA users\n");

    assert!(output.contains("int user_id primary"));
    assert!(output.contains("str64 user_email"));
}

#[test]
fn test_errors_do_not_end_session() {
    let dir = tempdir().unwrap();
    create_table(dir.path(), "users", USERS);

    let commands = "SELECT ghost\nFROB\nINSERT users shoe_size=9\nINSERT users user_name=ok\nSELECT users\n";
    let output = run_cli(dir.path(), commands);

    assert!(output.contains("ERR file not found"));
    assert!(output.contains("ERR unknown command: FROB"));
    assert!(output.contains("unknown column \"shoe_size\""));
    assert!(output.contains("(1 rows)"));
    assert!(output.contains("bye"));
}

#[test]
fn test_bad_definition_reports_schema_error() {
    let dir = tempdir().unwrap();
    create_table(dir.path(), "topics", "int topic_id primary\nfooType topic_title\n");

    let output = run_cli(dir.path(), "SELECT topics\nINSERT topics topic_id=1\n");

    assert_eq!(output.matches("fooType").count(), 2);
    assert!(fs::read(dir.path().join("topics.table/data")).unwrap().is_empty());
}

#[test]
fn test_state_persists_across_sessions() {
    let dir = tempdir().unwrap();
    create_table(dir.path(), "users", USERS);

    run_cli(dir.path(), "INSERT users user_name=first\n");
    let output = run_cli(dir.path(), "INSERT users user_name=second\nSELECT users\n");

    assert!(output.contains("OK (user_id=2)"));
    assert!(output.contains("first"));
    assert!(output.contains("(2 rows)"));
}
