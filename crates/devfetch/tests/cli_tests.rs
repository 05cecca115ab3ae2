//! End-to-end tests for the devfetch binary.

use assert_cmd::Command;
use predicates::prelude::*;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BINARY: &[u8] = b"#!/bin/sh\necho hello\n";

fn devfetch() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("devfetch").unwrap();
    cmd.env_remove("GITHUB_TOKEN")
        .env_remove("GH_TOKEN")
        .env_remove("DEVFETCH_MANIFEST")
        .env_remove("RUST_LOG");
    cmd
}

fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn write_manifest(dir: &Path, server: &str, sha256: &str) -> std::path::PathBuf {
    let manifest = format!(
        r#"
[settings]
cache_dir = "{cache}"
max_attempts = 2
initial_delay_ms = 10

[[tool]]
name = "hello"
version = "1.2.3"
artifact = "{server}/dl/{{tag}}/hello"
sha256 = "{sha256}"
install_path = "{dest}"
"#,
        cache = dir.join("cache").display(),
        dest = dir.join("bin/hello").display(),
    );
    let path = dir.join("devfetch.toml");
    fs::write(&path, manifest).unwrap();
    path
}

#[test]
fn test_version_command() {
    devfetch()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "devfetch {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_platform_json_envelope() {
    let output = devfetch().args(["platform", "--json"]).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(matches!(json["data"]["arch"].as_str(), Some("amd64" | "arm64")));
    assert!(matches!(json["data"]["arch_gnu"].as_str(), Some("x86_64" | "aarch64")));
}

#[test]
fn test_missing_subcommand_is_config_error() {
    devfetch().assert().code(2);
}

#[test]
fn test_unreachable_index_without_fallback_exits_3() {
    devfetch()
        .args(["resolve", "--index", "http://127.0.0.1:9/releases/latest"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("127.0.0.1:9"));
}

#[test]
fn test_unreachable_index_uses_fallback() {
    devfetch()
        .args([
            "resolve",
            "--index",
            "http://127.0.0.1:9/releases/latest",
            "--fallback",
            "1.20.0",
        ])
        .assert()
        .success()
        .stdout(predicate::str::diff("v1.20.0\n"));
}

#[test]
fn test_missing_manifest_is_config_error() {
    let dir = TempDir::new().unwrap();
    devfetch()
        .current_dir(dir.path())
        .args(["install", "--manifest"])
        .arg(dir.path().join("absent.toml"))
        .assert()
        .code(2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_resolve_from_index() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"tag_name": "2.3.4"}"#))
        .mount(&server)
        .await;

    devfetch()
        .args(["resolve", "--json", "--index"])
        .arg(format!("{}/releases/latest", server.uri()))
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""version":"v2.3.4""#))
        .stdout(predicate::str::contains(r#""source":"index""#));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_manifest_install() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dl/v1.2.3/hello"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BINARY))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(dir.path(), &server.uri(), &sha256_hex(BINARY));

    let output = devfetch()
        .args(["install", "--json", "--manifest"])
        .arg(&manifest)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["data"]["installed"][0]["name"], "hello");
    assert_eq!(json["data"]["installed"][0]["verified"], true);
    assert_eq!(fs::read(dir.path().join("bin/hello")).unwrap(), BINARY);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_checksum_mismatch_exits_5_and_keeps_destination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dl/v1.2.3/hello"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BINARY))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(dir.path(), &server.uri(), &sha256_hex(b"something else"));
    fs::create_dir_all(dir.path().join("bin")).unwrap();
    fs::write(dir.path().join("bin/hello"), b"old").unwrap();

    devfetch()
        .args(["install", "--manifest"])
        .arg(&manifest)
        .assert()
        .code(5)
        .stderr(predicate::str::contains("hello"));

    assert_eq!(fs::read(dir.path().join("bin/hello")).unwrap(), b"old");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_exhausted_download_exits_4() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dl/v1.0.0/tool"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = devfetch()
        .args(["get", "tool", "--json", "--version", "1.0.0", "--max-attempts", "2"])
        .args(["--initial-delay-ms", "1", "--artifact"])
        .arg(format!("{}/dl/{{tag}}/tool", server.uri()))
        .arg("--dest")
        .arg(dir.path().join("tool"))
        .arg("--cache-dir")
        .arg(dir.path().join("cache"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(4));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["error"]["code"], "fetch");
    let message = json["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("tool: fetch step failed"), "{message}");
    assert!(message.contains("after 2 attempt(s): HTTP 503"), "{message}");
    assert!(!dir.path().join("tool").exists());
}
