// tests/config_loading.rs

use std::io::Write;

use tempfile::NamedTempFile;

use pipedag::config::loader::load_and_validate;
use pipedag::dag::graph_from_pipeline;
use pipedag::errors::{GraphError, PipedagError};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

const VALID_PIPELINE: &str = r#"
[engine]
retry_limit = 2
retry_delay_secs = 1
max_parallel_tasks = 4

[connection]
dsn_env = "PIPEDAG_DSN"

[task.create_tables]
kind = "sql"
statements = ["CREATE TABLE IF NOT EXISTS staging_events (ts BIGINT)"]

[task.stage_events]
kind = "stage"
table = "staging_events"
source = "s3://bucket/log_data"
json_paths = "s3://bucket/log_json_path.json"
depends_on = ["create_tables"]

[task.load_users]
kind = "dimension"
table = "users"
select = "SELECT DISTINCT userid FROM staging_events"
mode = "replace"
depends_on = ["stage_events"]
retry_limit = 0

[task.quality_checks]
kind = "quality"
depends_on = ["load_users"]

[[task.quality_checks.check]]
query = "select count(*) from users where userid is null"
expected = 0
"#;

#[test]
fn valid_pipeline_parses_and_builds_a_graph() {
    let file = write_config(VALID_PIPELINE);
    let cfg = load_and_validate(file.path()).expect("valid pipeline");

    assert_eq!(cfg.engine.retry_limit, 2);
    assert_eq!(cfg.engine.max_parallel_tasks, Some(4));
    assert_eq!(cfg.task.len(), 4);
    assert_eq!(cfg.task["load_users"].retry_limit, Some(0));

    let graph = graph_from_pipeline(&cfg).expect("graph builds");
    assert_eq!(graph.len(), 4);
    assert_eq!(
        graph.dependencies_of("stage_events"),
        &["create_tables".to_string()]
    );
}

#[test]
fn engine_defaults_apply_when_section_is_absent() {
    let file = write_config(
        r#"
[task.only]
kind = "noop"
"#,
    );
    let cfg = load_and_validate(file.path()).expect("valid pipeline");

    assert_eq!(cfg.engine.retry_limit, 3);
    assert_eq!(cfg.engine.retry_delay_secs, 300);
    assert_eq!(cfg.engine.max_parallel_tasks, None);
    assert!(cfg.engine.fail_run_on_skip);
}

#[test]
fn pipeline_without_tasks_is_rejected() {
    let file = write_config("[engine]\nretry_limit = 1\n");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, PipedagError::Config(_)), "got: {err}");
}

#[test]
fn zero_worker_pool_is_rejected() {
    let file = write_config(
        r#"
[engine]
max_parallel_tasks = 0

[task.only]
kind = "noop"
"#,
    );
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, PipedagError::Config(_)), "got: {err}");
}

#[test]
fn unknown_task_kind_is_a_parse_error() {
    let file = write_config(
        r#"
[task.only]
kind = "mystery"
"#,
    );
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, PipedagError::Toml(_)), "got: {err}");
}

#[test]
fn stage_task_without_table_fails_graph_construction() {
    let file = write_config(
        r#"
[task.stage_events]
kind = "stage"
source = "s3://bucket/log_data"
"#,
    );
    let cfg = load_and_validate(file.path()).expect("parses fine");
    let err = graph_from_pipeline(&cfg).unwrap_err();
    assert!(matches!(err, PipedagError::Config(_)), "got: {err}");
}

#[test]
fn quality_task_without_checks_fails_graph_construction() {
    let file = write_config(
        r#"
[task.quality_checks]
kind = "quality"
"#,
    );
    let cfg = load_and_validate(file.path()).expect("parses fine");
    let err = graph_from_pipeline(&cfg).unwrap_err();
    assert!(matches!(err, PipedagError::Config(_)), "got: {err}");
}

#[test]
fn unknown_dependency_is_reported_by_name() {
    let file = write_config(
        r#"
[task.loader]
kind = "noop"
depends_on = ["ghost"]
"#,
    );
    let cfg = load_and_validate(file.path()).expect("parses fine");
    let err = graph_from_pipeline(&cfg).unwrap_err();
    match err {
        PipedagError::Graph(GraphError::UnknownTask(name)) => assert_eq!(name, "ghost"),
        other => panic!("expected UnknownTask, got: {other}"),
    }
}

#[test]
fn dependency_cycle_is_rejected_before_any_execution() {
    let file = write_config(
        r#"
[task.a]
kind = "noop"
depends_on = ["b"]

[task.b]
kind = "noop"
depends_on = ["a"]
"#,
    );
    let cfg = load_and_validate(file.path()).expect("parses fine");
    let err = graph_from_pipeline(&cfg).unwrap_err();
    assert!(
        matches!(err, PipedagError::Graph(GraphError::Cycle(_))),
        "got: {err}"
    );
}
