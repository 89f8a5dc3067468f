use std::env;
use std::sync::{Mutex, OnceLock};

use gatekeep_cli::commands::{config, doctor, migrate, seed};
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_success_with_valid_env() {
    let dir = TempDir::new().expect("temp dir");
    with_env(&[("GATEKEEP_DATABASE_URL", database_url(&dir).as_str())], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_env() {
    with_env(&[("GATEKEEP_DATABASE_MAX_CONNECTIONS", "0")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn migrate_reports_unreachable_database() {
    let dir = TempDir::new().expect("temp dir");
    let url = format!("sqlite://{}/missing/gatekeep.db?mode=ro", dir.path().display());
    let vars = [("GATEKEEP_DATABASE_URL", url.as_str()), ("GATEKEEP_DATABASE_TIMEOUT_SECS", "1")];
    with_env(&vars, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 4, "expected db connectivity failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "db_connectivity");
    });
}

#[test]
fn seed_lists_demo_documents() {
    let dir = TempDir::new().expect("temp dir");
    with_env(&[("GATEKEEP_DATABASE_URL", database_url(&dir).as_str())], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.starts_with("demo dataset ready (4 inserted, 0 already present)"));
        assert!(message.contains("  - purchase_order: po-demo-001 (created by user-buyer-01)"));
        assert!(message.contains("  - sale_order: so-demo-001 (created by user-sales-01)"));
        assert!(message.contains("  - production: prod-demo-001 (created by user-planner-01)"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = TempDir::new().expect("temp dir");
    with_env(&[("GATEKEEP_DATABASE_URL", database_url(&dir).as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let payload = parse_payload(&second.output);
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.starts_with("demo dataset ready (0 inserted, 4 already present)"));
    });
}

#[test]
fn doctor_flags_missing_schema_until_migrated() {
    let dir = TempDir::new().expect("temp dir");
    with_env(&[("GATEKEEP_DATABASE_URL", database_url(&dir).as_str())], || {
        let before = doctor::run(true);
        assert_eq!(before.exit_code, 1);
        let report = parse_payload(&before.output);
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(check_status(&report, "database_connectivity"), "pass");
        assert_eq!(check_status(&report, "schema_presence"), "fail");

        assert_eq!(migrate::run().exit_code, 0);

        let after = doctor::run(true);
        assert_eq!(after.exit_code, 0);
        let report = parse_payload(&after.output);
        assert_eq!(report["overall_status"], "pass");
        assert_eq!(check_status(&report, "schema_presence"), "pass");
    });
}

#[test]
fn doctor_skips_database_checks_when_config_is_invalid() {
    with_env(&[("GATEKEEP_LOG_LEVEL", "chatty")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation:"));
        assert!(result.output.contains("- [skip] database_connectivity:"));
        assert!(result.output.contains("- [skip] schema_presence:"));
    });
}

#[test]
fn config_attributes_env_and_default_sources() {
    with_env(&[("GATEKEEP_SERVER_PORT", "9090"), ("GATEKEEP_LOG_FORMAT", "json")], || {
        let output = config::run();

        assert!(output.contains("- server.port = 9090 (source: env (GATEKEEP_SERVER_PORT))"));
        assert!(output.contains("- logging.format = Json (source: env (GATEKEEP_LOG_FORMAT))"));
        assert!(output.contains("- database.max_connections = 5 (source: default)"));
    });
}

fn check_status<'a>(report: &'a Value, name: &str) -> &'a str {
    report["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .and_then(|check| check["status"].as_str())
        .unwrap_or("absent")
}

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}/gatekeep.db?mode=rwc", dir.path().display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "GATEKEEP_DATABASE_URL",
        "GATEKEEP_DATABASE_MAX_CONNECTIONS",
        "GATEKEEP_DATABASE_TIMEOUT_SECS",
        "GATEKEEP_SERVER_BIND_ADDRESS",
        "GATEKEEP_SERVER_PORT",
        "GATEKEEP_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "GATEKEEP_LOGGING_LEVEL",
        "GATEKEEP_LOGGING_FORMAT",
        "GATEKEEP_LOG_LEVEL",
        "GATEKEEP_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
