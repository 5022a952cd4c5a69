#![allow(dead_code)]

use nftel_client::ClientConfig;
use serde_json::Value;
use serde_json::json;
use wiremock::MockServer;

/// Config pointed at `server` with retries enabled and no back-off.
pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig {
        base_url: server.uri(),
        retry_delay_ms: 0,
        ..ClientConfig::default()
    }
}

pub fn summary_body(window_days: Option<u32>) -> Value {
    json!({
        "generated_at_utc": "2026-03-01T12:00:00+00:00",
        "window_days": window_days,
        "cards": {
            "process_completed_rows": 120,
            "distinct_runs": 4,
            "distinct_processes": 3,
            "success_rows": 105,
            "failure_rows": 15,
            "failure_pct": 12.5,
            "retried_rows": 12,
            "retry_pct": 10.0,
            "retry_success_pct": 75.0,
            "latest_process_completed_utc": "2026-03-01T11:58:10"
        },
        "event_mix": [
            { "event": "process_completed", "rows": 120 },
            { "event": "process_started", "rows": 124 }
        ],
        "top_failures": [
            { "process": "ALIGN", "total_completed": 80, "failed": 10, "failure_pct": 12.5 }
        ],
        "top_retries": [
            {
                "process": "ALIGN",
                "total_completed": 80,
                "retried": 8,
                "retried_pct": 10.0,
                "retried_success": 6,
                "retried_failed": 2
            }
        ],
        "top_failure_exit_codes": [
            { "exit_code": "137", "failures": 9 },
            { "exit_code": "1", "failures": 6 }
        ]
    })
}

pub fn retries_body(window_days: Option<u32>) -> Value {
    json!({
        "generated_at_utc": "2026-03-01T12:00:00+00:00",
        "window_days": window_days,
        "summary": {
            "process_completed_rows": 400,
            "retried_rows": 40,
            "retried_pct": 10.0,
            "retry_success_rows": 30,
            "retry_failure_rows": 10,
            "retry_success_pct": 75.0
        },
        "by_attempt": [
            { "attempt": 2, "rows": 36, "success": 28, "failed": 8 },
            { "attempt": 3, "rows": 4, "success": 2, "failed": 2 }
        ],
        "by_process": [
            {
                "process": "ALIGN",
                "total_completed": 200,
                "retried": 30,
                "retried_pct": 15.0,
                "retried_success": 24,
                "retried_failed": 6,
                "max_attempt": 3
            }
        ]
    })
}

pub fn failures_body(window_days: Option<u32>) -> Value {
    json!({
        "generated_at_utc": "2026-03-01T12:00:00+00:00",
        "window_days": window_days,
        "rows": [
            {
                "process": "ALIGN",
                "total_completed": 80,
                "success": 70,
                "failed": 10,
                "failure_pct": 12.5,
                "modal_failure_exit_code": "137"
            },
            {
                "process": "CALL",
                "total_completed": 0,
                "success": 0,
                "failed": 0,
                "failure_pct": null,
                "modal_failure_exit_code": null
            }
        ]
    })
}
