use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn cli_shows_help() {
    let mut cmd = Command::cargo_bin("eustat").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("eustat"));
}

#[test]
fn data_rejects_malformed_filter() {
    let mut cmd = Command::cargo_bin("eustat").unwrap();
    cmd.args(["--base-url", "http://127.0.0.1:9", "data", "nama_10_gdp", "-f", "geo"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("expected DIM=V1,V2"));
}

#[test]
fn huge_cache_hours_do_not_overflow() {
    let mut cmd = Command::cargo_bin("eustat").unwrap();
    cmd.args([
        "--base-url",
        "http://127.0.0.1:9",
        "--cache-hours",
        "18446744073709551615",
        "data",
        "nama_10_gdp",
        "-f",
        "geo",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("expected DIM=V1,V2"))
        .stderr(predicate::str::contains("overflow").not());
}

// Live test (opt-in): cargo test --features online
#[cfg(feature = "online")]
#[test]
fn fetch_online_gdp() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("gdp.csv");
    let mut cmd = Command::cargo_bin("eustat").unwrap();
    cmd.args([
        "data",
        "nama_10_gdp",
        "-f",
        "geo=SE,NO",
        "-f",
        "unit=CP_MEUR",
        "-f",
        "na_item=B1GQ",
        "--since",
        "2020",
        "--until",
        "2021",
        "--out",
    ])
    .arg(&out);
    cmd.assert().success();
    assert!(out.exists());
}
