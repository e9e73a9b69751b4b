use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A diamond workspace: `app` depends on `lib1` and `lib2`, both of which
/// depend on `core`. Every package has a `build` script that appends its own
/// name to a shared log file, so batch order is observable after the fact.
fn scaffold_diamond() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::write(
        root.join("package.json"),
        r#"{ "name": "root", "private": true, "workspaces": ["packages/*"] }"#,
    )
    .unwrap();
    fs::write(root.join("package-lock.json"), "{}").unwrap();
    fs::write(root.join(".gitignore"), "ignored/\n").unwrap();

    let members: &[(&str, &[&str])] = &[
        ("core", &[]),
        ("lib1", &["core"]),
        ("lib2", &["core"]),
        ("app", &["lib1", "lib2"]),
    ];
    for (name, deps) in members {
        let dir = root.join("packages").join(name);
        fs::create_dir_all(&dir).unwrap();
        let deps_json = deps
            .iter()
            .map(|d| format!("\"{d}\": \"*\""))
            .collect::<Vec<_>>()
            .join(", ");
        fs::write(
            dir.join("package.json"),
            format!(
                r#"{{ "name": "{name}", "scripts": {{ "build": "node -e \"require('fs').appendFileSync('{log}', '{name}\\n')\"" }}, "dependencies": {{ {deps_json} }} }}"#,
                log = root.join("build.log").display().to_string().replace('\\', "\\\\"),
            ),
        )
        .unwrap();
        fs::write(dir.join("index.js"), "module.exports = {};\n").unwrap();
    }
    tmp
}

fn build_log_lines(root: &std::path::Path) -> Vec<String> {
    fs::read_to_string(root.join("build.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn build_runs_every_package_in_dependency_order() {
    let tmp = scaffold_diamond();

    Command::cargo_bin("wsu")
        .unwrap()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .success();

    let lines = build_log_lines(tmp.path());
    assert_eq!(lines.len(), 4);
    let core_pos = lines.iter().position(|l| l == "core").unwrap();
    let app_pos = lines.iter().position(|l| l == "app").unwrap();
    let lib1_pos = lines.iter().position(|l| l == "lib1").unwrap();
    let lib2_pos = lines.iter().position(|l| l == "lib2").unwrap();
    assert!(core_pos < lib1_pos && core_pos < lib2_pos);
    assert!(lib1_pos < app_pos && lib2_pos < app_pos);
}

#[test]
fn second_build_is_fully_cached_and_reruns_nothing() {
    let tmp = scaffold_diamond();

    Command::cargo_bin("wsu")
        .unwrap()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .success();
    assert_eq!(build_log_lines(tmp.path()).len(), 4);

    Command::cargo_bin("wsu")
        .unwrap()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .success();

    // no new lines appended: every package was a cache hit
    assert_eq!(build_log_lines(tmp.path()).len(), 4);
}

#[test]
fn source_change_cascades_a_full_rebuild_downstream() {
    let tmp = scaffold_diamond();

    Command::cargo_bin("wsu")
        .unwrap()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .success();
    assert_eq!(build_log_lines(tmp.path()).len(), 4);

    fs::write(
        tmp.path().join("packages").join("core").join("index.js"),
        "module.exports = { changed: true };\n",
    )
    .unwrap();

    Command::cargo_bin("wsu")
        .unwrap()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .success();

    let lines = build_log_lines(tmp.path());
    assert_eq!(lines.len(), 8, "core, lib1, lib2, and app must all rebuild");
    let rebuilt: Vec<&str> = lines[4..].iter().map(String::as_str).collect();
    assert_eq!(rebuilt, vec!["core", "lib1", "lib2", "app"]);
}

#[test]
fn ignored_files_do_not_invalidate_the_cache() {
    let tmp = scaffold_diamond();

    Command::cargo_bin("wsu")
        .unwrap()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .success();
    assert_eq!(build_log_lines(tmp.path()).len(), 4);

    let ignored_dir = tmp.path().join("packages").join("lib1").join("ignored");
    fs::create_dir_all(&ignored_dir).unwrap();
    fs::write(ignored_dir.join("scratch.txt"), "not part of the build").unwrap();

    Command::cargo_bin("wsu")
        .unwrap()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .success();

    assert_eq!(
        build_log_lines(tmp.path()).len(),
        4,
        "a file under a gitignored directory must not trigger a rebuild"
    );
}

#[test]
fn a_dependency_cycle_is_reported_and_nothing_is_spawned() {
    let tmp = scaffold_diamond();

    let app_manifest = tmp.path().join("packages").join("app").join("package.json");
    fs::write(
        &app_manifest,
        r#"{ "name": "app", "scripts": { "build": "echo app" }, "dependencies": { "lib1": "*", "lib2": "*" } }"#,
    )
    .unwrap();
    let core_manifest = tmp.path().join("packages").join("core").join("package.json");
    fs::write(
        &core_manifest,
        r#"{ "name": "core", "scripts": { "build": "echo core" }, "dependencies": { "app": "*" } }"#,
    )
    .unwrap();

    Command::cargo_bin("wsu")
        .unwrap()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cycle"));

    assert!(
        !tmp.path().join("build.log").is_file(),
        "no build script should have run once a cycle was detected"
    );
}

#[test]
fn parallel_run_reports_the_one_failure_and_keeps_going() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::write(
        root.join("package.json"),
        r#"{ "name": "root", "private": true, "workspaces": ["packages/*"] }"#,
    )
    .unwrap();
    fs::write(root.join("package-lock.json"), "{}").unwrap();

    for (name, script) in [("a", "echo a"), ("b", "echo b"), ("c", "exit 1")] {
        let dir = root.join("packages").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("package.json"),
            format!(r#"{{ "name": "{name}", "scripts": {{ "test": "{script}" }} }}"#),
        )
        .unwrap();
    }

    Command::cargo_bin("wsu")
        .unwrap()
        .current_dir(root)
        .args(["run", "test", "--concurrency", "3"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn sequential_run_stops_at_the_first_failure() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::write(
        root.join("package.json"),
        r#"{ "name": "root", "private": true, "workspaces": ["packages/*"] }"#,
    )
    .unwrap();
    fs::write(root.join("package-lock.json"), "{}").unwrap();

    // Alphabetical package order matters here: "a" fails, "z" must never run.
    for (name, script) in [("a", "exit 1"), ("z", "echo z")] {
        let dir = root.join("packages").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("package.json"),
            format!(r#"{{ "name": "{name}", "scripts": {{ "test": "{script}" }} }}"#),
        )
        .unwrap();
    }

    Command::cargo_bin("wsu")
        .unwrap()
        .current_dir(root)
        .args(["run", "test", "--sequential"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn cache_status_and_clear_round_trip() {
    let tmp = scaffold_diamond();

    Command::cargo_bin("wsu")
        .unwrap()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .success();

    Command::cargo_bin("wsu")
        .unwrap()
        .current_dir(tmp.path())
        .args(["cache", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4 valid"));

    Command::cargo_bin("wsu")
        .unwrap()
        .current_dir(tmp.path())
        .args(["cache", "clear"])
        .assert()
        .success();

    Command::cargo_bin("wsu")
        .unwrap()
        .current_dir(tmp.path())
        .args(["cache", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 valid"));
}
