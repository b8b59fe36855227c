use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

use crate::fixture::{DIMS, DOCS};

struct CliOutput {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

impl CliOutput {
    fn json(&self) -> Value {
        serde_json::from_str(&self.stdout).unwrap_or_else(|err| {
            panic!("stdout is not JSON ({err})\nstdout: {}\nstderr: {}", self.stdout, self.stderr)
        })
    }
}

struct CliEnv {
    dir: TempDir,
    config_path: PathBuf,
}

impl CliEnv {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        let db_path = dir.path().join("docs.db");
        let config = format!(
            r#"[engine]
enabled = true
database_path = "{}"
channel = "dedicated"
embedding_dims = {DIMS}

[remote]
url = "https://docs.example.co"
anon_key = "anon-key"

[network]
save_data = false
effective_type = "4g"
"#,
            db_path.display().to_string().replace('\\', "/")
        );
        std::fs::write(&config_path, config).unwrap();
        Self { dir, config_path }
    }

    fn run(&self, args: &[&str]) -> CliOutput {
        let output = Command::new(env!("CARGO_BIN_EXE_docsearch"))
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .current_dir(self.dir.path())
            .env_remove("RUST_LOG")
            .output()
            .expect("run docsearch");
        CliOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }

    fn write_docs(&self) -> PathBuf {
        let path = self.dir.path().join("docs.json");
        std::fs::write(&path, DOCS).unwrap();
        path
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn config_json_masks_anon_key() {
    let env = CliEnv::new();
    let output = env.run(&["--json", "config"]);

    assert_eq!(output.exit_code, 0, "stderr: {}", output.stderr);
    let json = output.json();
    assert_eq!(json["remote"]["anon_key"], "********");
    assert_eq!(json["engine"]["channel"], "dedicated");
    assert_eq!(json["ranking"]["result_limit"], 10);
}

#[test]
fn config_key_lookup() {
    let env = CliEnv::new();
    let output = env.run(&["config", "network.effective_type"]);

    assert_eq!(output.exit_code, 0, "stderr: {}", output.stderr);
    assert_eq!(output.stdout.trim(), "4g");
}

#[test]
fn config_unknown_key_is_structured_error() {
    let env = CliEnv::new();
    let output = env.run(&["--json", "config", "engine.nope"]);

    assert_ne!(output.exit_code, 0);
    let json = output.json();
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[test]
fn ingest_then_local_search() {
    let env = CliEnv::new();
    let docs = env.write_docs();

    let ingested = env.run(&["--json", "ingest", arg(&docs)]);
    assert_eq!(ingested.exit_code, 0, "stderr: {}", ingested.stderr);
    let json = ingested.json();
    assert_eq!(json["stats"]["pages"], 3);
    assert_eq!(json["total_pages"], 3);

    let searched = env.run(&["--json", "search", "PGRST116", "--local-only"]);
    assert_eq!(searched.exit_code, 0, "stderr: {}", searched.stderr);
    let json = searched.json();
    assert_eq!(json["query"], "PGRST116");
    assert_eq!(json["state"]["status"], "results");
    assert_eq!(json["state"]["results"][0]["path"], "/reference/errors");
    assert_eq!(json["state"]["results"][0]["type"], "reference");
}

#[test]
fn ingest_rejects_unknown_page_type() {
    let env = CliEnv::new();
    let docs = env.path("bad.json");
    std::fs::write(
        &docs,
        r#"{ "pages": [ { "path": "/x", "type": "blog", "meta": { "title": "X" } } ] }"#,
    )
    .unwrap();

    let output = env.run(&["ingest", arg(&docs)]);
    assert_ne!(output.exit_code, 0);
    assert!(output.stderr.contains("unknown type"), "stderr: {}", output.stderr);
}

#[test]
fn empty_query_is_rejected() {
    let env = CliEnv::new();
    let output = env.run(&["--json", "search", "   "]);

    assert_ne!(output.exit_code, 0);
    assert_eq!(output.json()["error"]["code"], "SEARCH_QUERY_INVALID");
}
