use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn nos(state: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("nos-token").unwrap();
    cmd.env_remove("NOS_SK_HEX")
        .env_remove("NOS_STATE")
        .env_remove("RUST_LOG")
        .arg("--state")
        .arg(state);
    cmd
}

#[test]
fn genesis_distribute_and_query() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");
    let keys = dir.path().join("keys");

    nos(&state)
        .args(["keygen", "--out-dir"])
        .arg(&keys)
        .assert()
        .success()
        .stdout(predicate::str::contains("address 0x"));
    let sk = fs::read_to_string(keys.join("sk.hex")).unwrap();
    let owner = fs::read_to_string(keys.join("address")).unwrap();

    nos(&state)
        .args(["--sk-hex", &sk, "address"])
        .assert()
        .success()
        .stdout(predicate::str::contains(owner.as_str()));

    let config = dir.path().join("genesis.toml");
    fs::write(
        &config,
        "[token]\nsymbol = \"TST\"\ndecimals = 0\n\n[supply]\ncreator = 1000\npool = 500\n",
    )
    .unwrap();
    nos(&state)
        .args(["--sk-hex", &sk, "genesis", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"call\": \"genesis\""));

    nos(&state)
        .args(["query", "supply"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"circulating\": 1500"))
        .stdout(predicate::str::contains("1500 TST"));

    let recipient = format!("0x{}", "07".repeat(32));
    nos(&state)
        .args(["--sk-hex", &sk, "distribute", "--recipient", &recipient, "--amount", "100"])
        .assert()
        .success();

    nos(&state)
        .args(["query", "pool"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"pool\": 400"));
    nos(&state)
        .args(["query", "balance", "--owner", &recipient])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"balance\": 100"));
    nos(&state)
        .args(["--sk-hex", &sk, "query", "balance"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"balance\": 1000"));
}

#[test]
fn rejected_call_exits_with_code_two() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");
    let owner_sk = "11".repeat(32);
    let other_sk = "22".repeat(32);

    nos(&state)
        .args(["--sk-hex", &owner_sk, "genesis"])
        .assert()
        .success();

    nos(&state)
        .args(["--sk-hex", &other_sk, "set-transfer-fee", "--bps", "100"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not hold the owner capability"));

    nos(&state)
        .args(["query", "fees"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"transfer_fee_bps\": 0"));
}

#[test]
fn calls_need_a_key() {
    let dir = tempfile::tempdir().unwrap();
    nos(&dir.path().join("state.json"))
        .args(["set-transfer-fee", "--bps", "1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--sk-hex"));
}

#[test]
fn key_and_state_come_from_the_environment() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("env-state.json");
    let sk = "33".repeat(32);

    Command::cargo_bin("nos-token")
        .unwrap()
        .env("NOS_SK_HEX", &sk)
        .env("NOS_STATE", &state)
        .arg("genesis")
        .assert()
        .success();
    assert!(state.exists());

    Command::cargo_bin("nos-token")
        .unwrap()
        .env("NOS_SK_HEX", &sk)
        .env("NOS_STATE", &state)
        .args(["query", "balance"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"balance\": 10000000000000000000"));
}

#[test]
fn missing_genesis_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");
    nos(&state)
        .args(["--sk-hex", &"44".repeat(32), "genesis", "--config"])
        .arg(dir.path().join("typo.toml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("loading genesis config"));
    assert!(!state.exists());
}
