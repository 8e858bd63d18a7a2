//! CLI integration tests
//!
//! These tests run the `appjar` binary against jars written to a temporary
//! directory.

use appjar::archive::Archive;
use appjar::classfile::builder::{ClassBuilder, Op};
use appjar::classfile::{ACC_PUBLIC, ACC_STATIC};
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn appjar() -> Command {
    Command::cargo_bin("appjar").unwrap()
}

fn write_jar(dir: &Path, name: &str, files: &[(&str, Vec<u8>)]) -> PathBuf {
    let mut archive = Archive::new();
    for (path, bytes) in files {
        archive.data.write(path, bytes.clone()).unwrap();
    }
    let path = dir.join(name);
    archive.save_to(&path).unwrap();
    path
}

fn main_class() -> Vec<u8> {
    ClassBuilder::new("app/Main")
        .no_super_class()
        .method(
            ACC_PUBLIC | ACC_STATIC,
            "main",
            "([Ljava/lang/String;)V",
            vec![Op::InvokeStatic("lib/Util", "help", "()V"), Op::Return],
        )
        .build()
}

fn library() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        (
            "lib/Util.class",
            ClassBuilder::new("lib/Util")
                .no_super_class()
                .method(ACC_STATIC, "help", "()V", vec![Op::Return])
                .method(ACC_STATIC, "unused", "()V", vec![Op::Return])
                .build(),
        ),
        ("lib/Dead.class", ClassBuilder::new("lib/Dead").no_super_class().build()),
        ("META-INF/services/x.Service", b"lib.Impl".to_vec()),
    ]
}

struct Project {
    dir: TempDir,
    project: PathBuf,
    lib: PathBuf,
}

fn project() -> Project {
    let dir = tempfile::tempdir().unwrap();
    let project = write_jar(dir.path(), "project.jar", &[("app/Main.class", main_class())]);
    let lib = write_jar(dir.path(), "lib.jar", &library());
    Project { dir, project, lib }
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_help() {
    appjar()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--strip"))
        .stdout(predicate::str::contains("--dependency"));
}

#[test]
fn test_version() {
    appjar()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_inputs_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    appjar()
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("dependencies or project_jar"));
}

#[test]
fn test_space_in_pattern_list_is_rejected() {
    let p = project();
    appjar()
        .arg(p.dir.path())
        .args(["--project-jar"])
        .arg(&p.project)
        .args(["--remove", "META-INF/*.SF, META-INF/*.DSA x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid space character"));
}

// ============================================================================
// Build
// ============================================================================

#[test]
fn test_merge_and_strip() {
    let p = project();
    let out = p.dir.path().join("out/app.jar");
    appjar()
        .arg(p.dir.path())
        .args(["--main", "app.Main", "--strip", "--quiet"])
        .arg("--dependency")
        .arg(format!("g:lib:1={}", p.lib.display()))
        .arg("--project-jar")
        .arg(&p.project)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    let built = Archive::load(&out).unwrap();
    assert!(built.data.is_file("app/Main.class"));
    assert!(built.data.is_file("lib/Util.class"));
    assert!(!built.data.exists("lib/Dead.class"));
    assert!(built.data.is_file("META-INF/services/x.Service"));
    assert_eq!(built.manifest.get("Main-Class"), Some("app.Main"));

    let log = std::fs::read_to_string(p.dir.path().join("out/application-strip.log")).unwrap();
    assert!(log.contains("- lib.Dead\n"));
    assert!(log.contains("* lib.Util\n  - void lib.Util.unused()\n"));
}

#[test]
fn test_duplicates_fail_with_origins() {
    let p = project();
    let other = write_jar(p.dir.path(), "other.jar", &library());
    appjar()
        .arg(p.dir.path())
        .arg("--dependency")
        .arg(format!("g:lib:1={}", p.lib.display()))
        .arg("--dependency")
        .arg(format!("g:other:1={}", other.display()))
        .arg("--project-jar")
        .arg(&p.project)
        .args(["--output-dir"])
        .arg(p.dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("[g:lib:1, g:other:1]"))
        .stderr(predicate::str::contains("lib/Util.class"));

    assert!(!p.dir.path().join("out/application.jar").exists());
}

#[test]
fn test_missing_entry_point() {
    let p = project();
    appjar()
        .arg(p.dir.path())
        .args(["--main", "app.Nope"])
        .arg("--project-jar")
        .arg(&p.project)
        .arg("--output-dir")
        .arg(p.dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("app.Nope"));
}

#[test]
fn test_json_report_and_why() {
    let p = project();
    let report = p.dir.path().join("report.json");
    appjar()
        .arg(p.dir.path())
        .args(["--main", "app.Main", "--strip", "--format", "json"])
        .arg("--dependency")
        .arg(format!("g:lib:1={}", p.lib.display()))
        .arg("--project-jar")
        .arg(&p.project)
        .arg("--output-dir")
        .arg(p.dir.path().join("out"))
        .arg("--report")
        .arg(&report)
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["main_class"], "app.Main");
    assert_eq!(json["merge"]["sources"], 2);
    assert_eq!(json["strip"]["log"]["deleted"][0], "lib.Dead");

    appjar()
        .arg(p.dir.path())
        .args(["--main", "app.Main", "--strip", "--why", "lib.Util.help"])
        .arg("--dependency")
        .arg(format!("g:lib:1={}", p.lib.display()))
        .arg("--project-jar")
        .arg(&p.project)
        .arg("--output-dir")
        .arg(p.dir.path().join("out"))
        .assert()
        .success()
        .stdout(predicate::str::contains("is reachable:"));
}

#[test]
fn test_config_file() {
    let p = project();
    let config = p.dir.path().join("appjar.yml");
    std::fs::write(
        &config,
        format!(
            "name: tool\nmain: app.Main\noutput_dir: {out}\nproject_jar: {project}\ndependencies:\n  - label: g:lib:1\n    path: {lib}\nmerge:\n  remove: META-INF/services/**\n",
            out = p.dir.path().join("dist").display(),
            project = p.project.display(),
            lib = p.lib.display(),
        ),
    )
    .unwrap();

    appjar().arg(p.dir.path()).arg("--quiet").assert().success();

    let built = Archive::load(&p.dir.path().join("dist/tool.jar")).unwrap();
    assert!(!built.data.exists("META-INF/services/x.Service"));
    assert!(built.data.is_file("lib/Dead.class"));
    assert_eq!(built.manifest.get("Implementation-Title"), Some("tool"));
}
