#![cfg(feature = "cli")]

use std::process::Command;

fn ctxnet() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ctxnet"));
    cmd.arg("--log-level").arg("error");
    cmd
}

#[test]
fn demo_reports_every_client_updated_on_main_loop() {
    let output = ctxnet()
        .args(["--format", "json", "demo", "--clients", "3", "--value", "42", "--index", "1"])
        .output()
        .expect("demo should run");

    assert!(output.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("demo output should be json");
    assert_eq!(report["channel"], "ctxnet:color_update");
    let clients = report["clients"].as_array().expect("clients array");
    assert_eq!(clients.len(), 3);
    for client in clients {
        assert_eq!(client["colors"], serde_json::json!([0, 42, 0, 0]));
        assert_eq!(client["handled"], 1);
        assert_eq!(client["on_main_loop"], true);
        assert!(client["disconnect_reason"].is_null());
    }
}

#[test]
fn out_of_range_index_disconnects_clients() {
    let output = ctxnet()
        .args(["--format", "json", "demo", "--clients", "1", "--index", "9"])
        .output()
        .expect("demo should run");

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let reason = report["clients"][0]["disconnect_reason"]
        .as_str()
        .expect("client should be disconnected");
    assert!(reason.starts_with("Channel ctxnet:color_update error: color index 9"));
}

#[test]
fn passthrough_packets_are_larger() {
    let size = |passthrough: bool| {
        let mut cmd = ctxnet();
        cmd.args(["--format", "json", "demo", "--clients", "1"]);
        if passthrough {
            cmd.arg("--passthrough");
        }
        let output = cmd.output().expect("demo should run");
        let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        report["packet_bytes"].as_u64().expect("packet size")
    };

    assert_eq!(size(false), 6);
    assert_eq!(size(true), 14);
}

#[test]
fn varint_prints_both_encodings() {
    let output = ctxnet()
        .args(["--format", "json", "varint", "-1", "64"])
        .output()
        .expect("varint should run");

    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[0]["compact"], "40");
    assert_eq!(rows[0]["passthrough"], "ff ff ff ff 0f");
    assert_eq!(rows[1]["compact"], "c0 00");
}
