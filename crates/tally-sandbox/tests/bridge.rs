//! End-to-end bridge tests against a real sandbox interpreter.
//!
//! These exercise the spawned subprocess, so they skip (pass trivially)
//! when `uv` is not on the PATH.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tally_sandbox::bridge::{Bridge, BridgeConfig, BridgeError, PrimitiveError};

fn uv_available() -> bool {
    std::process::Command::new("uv")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

macro_rules! require_uv {
    () => {
        if !uv_available() {
            eprintln!("uv not available, skipping bridge test");
            return;
        }
    };
}

fn spawn_bridge() -> Bridge {
    Bridge::spawn(BridgeConfig::default()).expect("spawn bridge")
}

#[tokio::test]
async fn simple_arithmetic() {
    require_uv!();
    let bridge = spawn_bridge();

    let result = bridge.run_script("2 + 3", &[]).await.unwrap();
    assert_eq!(result, json!(5));

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn primitive_callback_with_args() {
    require_uv!();
    let bridge = spawn_bridge();

    bridge.register_primitive(
        "add",
        Arc::new(|args, _kwargs| {
            let a = args[0].as_f64().unwrap_or(0.0);
            let b = args[1].as_f64().unwrap_or(0.0);
            Ok(json!(a + b))
        }),
    );

    let result = bridge
        .run_script("add(10, 20)", &["add".to_string()])
        .await
        .unwrap();
    assert_eq!(result.as_f64(), Some(30.0));

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn primitive_callback_with_kwargs() {
    require_uv!();
    let bridge = spawn_bridge();

    bridge.register_primitive(
        "greet",
        Arc::new(|_args, kwargs| {
            let name = kwargs
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(json!(format!("hello {name}")))
        }),
    );

    let result = bridge
        .run_script(r#"greet(name="world")"#, &["greet".to_string()])
        .await
        .unwrap();
    assert_eq!(result, json!("hello world"));

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn null_result_resumes_script() {
    require_uv!();
    let bridge = spawn_bridge();

    // A primitive whose logical answer is none: the response still carries
    // an explicit null result, so the script resumes instead of starving.
    bridge.register_primitive("fetch_nothing", Arc::new(|_args, _kwargs| Ok(Value::Null)));

    let result = bridge
        .run_script(
            "x = fetch_nothing()\nx is None",
            &["fetch_nothing".to_string()],
        )
        .await
        .unwrap();
    assert_eq!(result, json!(true));

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn script_error_propagates() {
    require_uv!();
    let bridge = spawn_bridge();

    let err = bridge.run_script("x = 1 / 0", &[]).await.unwrap_err();
    assert!(matches!(err, BridgeError::Script(_)));

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn handler_error_becomes_script_exception() {
    require_uv!();
    let bridge = spawn_bridge();

    bridge.register_primitive(
        "explode",
        Arc::new(|_args, _kwargs| Err(PrimitiveError::new("validation failed: boom"))),
    );

    let err = bridge
        .run_script("explode()", &["explode".to_string()])
        .await
        .unwrap_err();
    let BridgeError::Script(message) = err else {
        panic!("expected Script error, got {err}");
    };
    assert!(message.contains("validation failed: boom"));

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_primitive_fails_run() {
    require_uv!();
    let bridge = spawn_bridge();

    // Whitelisted but never registered on the host side.
    let err = bridge
        .run_script("nonexistent()", &["nonexistent".to_string()])
        .await
        .unwrap_err();
    let BridgeError::Script(message) = err else {
        panic!("expected Script error, got {err}");
    };
    assert!(message.contains("unknown primitive"));

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn pipelined_runs_keep_their_answers() {
    require_uv!();
    let bridge = Arc::new(spawn_bridge());

    bridge.register_primitive(
        "ping",
        Arc::new(|args, _kwargs| {
            let x = args[0].as_str().unwrap_or_default();
            Ok(json!(format!("pong-{x}")))
        }),
    );

    let mut handles = Vec::new();
    for i in 0..3 {
        let bridge = Arc::clone(&bridge);
        handles.push(tokio::spawn(async move {
            let script = format!(r#"ping("{i}")"#);
            bridge.run_script(&script, &["ping".to_string()]).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result, json!(format!("pong-{i}")), "run {i} got a mixed-up answer");
    }

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn sequential_runs_are_fast_enough() {
    require_uv!();
    let bridge = spawn_bridge();

    bridge.register_primitive(
        "ping",
        Arc::new(|args, _kwargs| Ok(json!(format!("pong-{}", args[0].as_str().unwrap_or(""))))),
    );

    // Warm-up covers interpreter startup cost.
    bridge
        .run_script(r#"ping("warm")"#, &["ping".to_string()])
        .await
        .unwrap();

    let rounds = 100;
    let started = Instant::now();
    for i in 0..rounds {
        let script = format!(r#"ping("{i}")"#);
        let result = bridge
            .run_script(&script, &["ping".to_string()])
            .await
            .unwrap();
        assert_eq!(result, json!(format!("pong-{i}")));
    }
    let per_call = started.elapsed() / rounds;
    assert!(
        per_call < Duration::from_millis(100),
        "per-call latency {per_call:?} exceeds 100ms"
    );

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn blocked_script_times_out() {
    require_uv!();
    let bridge = Bridge::spawn(BridgeConfig {
        run_timeout: Duration::from_secs(2),
    })
    .expect("spawn bridge");

    let started = Instant::now();
    let err = bridge
        .run_script("while True:\n    x = 1", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Timeout(_)), "got {err}");
    assert!(started.elapsed() < Duration::from_secs(10));

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn sandbox_refuses_escape_hatches() {
    require_uv!();
    let bridge = spawn_bridge();

    for script in [
        r#"open("/etc/passwd")"#,
        r#"eval("1+1")"#,
        r#"__import__("os")"#,
        r#"exec("print(1)")"#,
    ] {
        let err = bridge.run_script(script, &[]).await.unwrap_err();
        assert!(
            matches!(err, BridgeError::Script(_)),
            "{script} should fail, got {err}"
        );
    }

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_is_idempotent_and_fails_later_runs() {
    require_uv!();
    let bridge = spawn_bridge();

    bridge.shutdown().await.unwrap();
    bridge.shutdown().await.unwrap();

    let err = bridge.run_script("1 + 1", &[]).await.unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Terminated | BridgeError::ChildExited
    ));
}
