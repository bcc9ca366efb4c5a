// tests/cli.rs

use std::io::Write;

use clap::Parser;
use tempfile::{Builder, NamedTempFile};

use runtask::build_request;
use runtask::cli::CliArgs;
use runtask::config::default_definition_path;
use runtask::errors::RunTaskError;
use runtask::types::LaunchType;
use runtask_test_utils::MapEnv;

fn definition_file(contents: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

const ONE_CONTAINER: &str = r#"
family = "report"

[[container]]
name = "app"
command = ["./report"]
"#;

const TWO_CONTAINERS: &str = r#"
family = "shop"

[[container]]
name = "web"
command = ["serve"]

[[container]]
name = "worker"
command = ["work"]
"#;

fn parse(args: &[&str]) -> CliArgs {
    let mut argv = vec!["runtask"];
    argv.extend_from_slice(args);
    CliArgs::try_parse_from(argv).unwrap()
}

#[test]
fn defaults() {
    let args = parse(&[]);

    assert_eq!(args.file, default_definition_path());
    assert_eq!(args.cluster, "default");
    assert_eq!(args.log_group, "runtask");
    assert_eq!(args.count, 1);
    assert_eq!(args.poll_interval_ms, 1000);
    assert_eq!(args.effective_launch_type(), LaunchType::Standard);
    assert!(args.overrides.is_empty());
    assert!(!args.dry_run);
}

#[test]
fn repeatable_flags_and_fargate_shorthand() {
    let args = parse(&[
        "-o",
        "worker:./migrate --all",
        "--override",
        "web:serve --port 80",
        "-e",
        "FOO=bar",
        "--env",
        "HOME",
        "--subnet",
        "subnet-1",
        "--subnet",
        "subnet-2",
        "--fargate",
    ]);

    assert_eq!(args.overrides.len(), 2);
    assert_eq!(args.overrides[0].service.as_deref(), Some("worker"));
    assert_eq!(args.overrides[1].command, vec!["serve", "--port", "80"]);
    assert_eq!(args.env, vec!["FOO=bar", "HOME"]);
    assert_eq!(args.subnets, vec!["subnet-1", "subnet-2"]);
    assert_eq!(args.effective_launch_type(), LaunchType::Serverless);
}

#[test]
fn zero_count_is_rejected_by_the_parser() {
    let argv = vec!["runtask", "--count", "0"];
    assert!(CliArgs::try_parse_from(argv).is_err());
}

#[test]
fn build_request_resolves_everything_before_submission() {
    let file = definition_file(TWO_CONTAINERS);
    let path = file.path().to_str().unwrap();
    let args = parse(&[
        "-f",
        path,
        "-n",
        "nightly",
        "-c",
        "batch",
        "--count",
        "2",
        "-o",
        "worker:./migrate --all",
        "-e",
        "FOO=bar",
        "-e",
        "TOKEN",
        "--security-group",
        "sg-1",
    ]);
    let env = MapEnv::new().with("TOKEN", "s3cret");

    let request = build_request(&args, &env).unwrap();

    assert_eq!(request.definition.family, "shop");
    assert_eq!(request.cluster, "batch");
    assert_eq!(request.count, 2);
    assert_eq!(request.stream_prefix, "nightly");
    assert_eq!(request.overrides.len(), 1);
    assert_eq!(request.overrides[0].name, "worker");
    let env_pairs: Vec<(&str, &str)> = request.overrides[0]
        .environment
        .iter()
        .map(|v| (v.name.as_str(), v.value.as_str()))
        .collect();
    assert_eq!(env_pairs, vec![("FOO", "bar"), ("TOKEN", "s3cret")]);
    let network = request.network.unwrap();
    assert!(network.subnets.is_empty());
    assert_eq!(network.security_groups, vec!["sg-1"]);
}

#[test]
fn unnamed_run_gets_a_generated_prefix() {
    let file = definition_file(ONE_CONTAINER);
    let args = parse(&["-f", file.path().to_str().unwrap(), "-o", "./report --full"]);

    let request = build_request(&args, &MapEnv::new()).unwrap();

    assert!(request.stream_prefix.starts_with("run_task_"), "got: {}", request.stream_prefix);
    assert_eq!(request.overrides[0].name, "app");
    assert!(request.network.is_none());
}

#[test]
fn ambiguous_override_is_a_configuration_error() {
    let file = definition_file(TWO_CONTAINERS);
    let args = parse(&["-f", file.path().to_str().unwrap(), "-o", "./migrate"]);

    match build_request(&args, &MapEnv::new()) {
        Err(err @ RunTaskError::AmbiguousOverride(2)) => {
            assert!(err.is_config());
            assert_eq!(err.exit_code(), 1);
        }
        other => panic!("Expected AmbiguousOverride, got: {:?}", other.map(|r| r.cluster)),
    }
}

#[test]
fn missing_host_variable_is_a_configuration_error() {
    let file = definition_file(ONE_CONTAINER);
    let args = parse(&["-f", file.path().to_str().unwrap(), "-e", "NOT_SET_ANYWHERE"]);

    match build_request(&args, &MapEnv::new()) {
        Err(err @ RunTaskError::MissingEnv(_)) => {
            assert!(err.is_config());
            assert_eq!(err.to_string(), "missing environment variable \"NOT_SET_ANYWHERE\"");
        }
        other => panic!("Expected MissingEnv, got: {:?}", other.map(|r| r.cluster)),
    }
}

#[test]
fn missing_definition_file_is_a_configuration_error() {
    let args = parse(&["-f", "/nonexistent/runtask/definition.toml"]);

    let err = build_request(&args, &MapEnv::new()).unwrap_err();
    assert!(matches!(err, RunTaskError::IoError(_)), "got: {err:?}");
    assert!(err.is_config());
}
