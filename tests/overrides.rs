// tests/overrides.rs

use runtask::config::EnvVar;
use runtask::errors::RunTaskError;
use runtask::overrides::{resolve_env, resolve_overrides, resolve_target, OverrideSpec};
use runtask_test_utils::{init_tracing, MapEnv};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn entries(list: &[&str]) -> Vec<String> {
    names(list)
}

#[test]
fn explicit_target_ignores_container_count() {
    let spec = OverrideSpec::new(Some("worker"), &["./migrate"]);

    // Zero, one and many containers all give the explicit name back.
    for containers in [names(&[]), names(&["app"]), names(&["app", "web", "db"])] {
        let target = resolve_target(&spec, &containers).unwrap();
        assert_eq!(target, "worker");
    }
}

#[test]
fn missing_target_defaults_to_single_container() {
    init_tracing();
    let spec = OverrideSpec::new(None, &["./migrate"]);

    let target = resolve_target(&spec, &names(&["app"])).unwrap();
    assert_eq!(target, "app");
}

#[test]
fn missing_target_with_many_containers_is_a_config_error() {
    let spec = OverrideSpec::new(None, &["./migrate"]);

    match resolve_target(&spec, &names(&["app", "worker"])) {
        Err(RunTaskError::AmbiguousOverride(count)) => assert_eq!(count, 2),
        other => panic!("Expected AmbiguousOverride, got: {:?}", other),
    }
}

#[test]
fn key_value_entries_never_consult_the_environment() {
    // Host environment has a different value; it must not be used.
    let env = MapEnv::new().with("FOO", "from-host");

    let resolved = resolve_env(&entries(&["FOO=bar", "EMPTY=", "URL=a=b"]), &env).unwrap();
    assert_eq!(
        resolved,
        vec![
            EnvVar::new("FOO", "bar"),
            EnvVar::new("EMPTY", ""),
            EnvVar::new("URL", "a=b"),
        ]
    );
}

#[test]
fn bare_key_is_looked_up_in_host_environment() {
    let env = MapEnv::new().with("HOME", "/home/runner");

    let resolved = resolve_env(&entries(&["HOME"]), &env).unwrap();
    assert_eq!(resolved, vec![EnvVar::new("HOME", "/home/runner")]);
}

#[test]
fn bare_key_absent_from_host_environment_fails() {
    let env = MapEnv::new();

    match resolve_env(&entries(&["FOO=bar", "NOPE"]), &env) {
        Err(RunTaskError::MissingEnv(name)) => assert_eq!(name, "NOPE"),
        other => panic!("Expected MissingEnv, got: {:?}", other),
    }

    let err = resolve_env(&entries(&["NOPE"]), &env).unwrap_err();
    assert!(err.to_string().contains("missing environment variable"));
}

#[test]
fn duplicates_are_passed_through_in_order() {
    let env = MapEnv::new();
    let resolved = resolve_env(&entries(&["A=1", "A=2"]), &env).unwrap();
    assert_eq!(resolved, vec![EnvVar::new("A", "1"), EnvVar::new("A", "2")]);
}

#[test]
fn override_for_worker_carries_resolved_env() {
    let env = MapEnv::new().with("HOME", "/root");
    let specs = vec![OverrideSpec::new(Some("worker"), &["./migrate"])];

    let overrides = resolve_overrides(
        &specs,
        &entries(&["FOO=bar", "HOME"]),
        &names(&["app", "worker"]),
        &env,
    )
    .unwrap();

    assert_eq!(overrides.len(), 1);
    let worker = &overrides[0];
    assert_eq!(worker.name, "worker");
    assert_eq!(worker.command, vec!["./migrate".to_string()]);
    assert_eq!(
        worker.environment,
        vec![EnvVar::new("FOO", "bar"), EnvVar::new("HOME", "/root")]
    );
    assert!(overrides.iter().all(|o| o.name != "app"));
}

#[test]
fn overrides_without_command_are_skipped() {
    let env = MapEnv::new();
    let specs = vec![
        OverrideSpec::new(Some("app"), &[]),
        // Would be ambiguous, but has no command so is never resolved.
        OverrideSpec::new(None, &[]),
    ];

    let overrides =
        resolve_overrides(&specs, &entries(&["FOO=bar"]), &names(&["app", "web"]), &env).unwrap();
    assert!(overrides.is_empty());
}

#[test]
fn missing_env_fails_even_without_command_overrides() {
    let env = MapEnv::new();
    let result = resolve_overrides(&[], &entries(&["NOPE"]), &names(&["app"]), &env);
    assert!(matches!(result, Err(RunTaskError::MissingEnv(_))));
}

#[test]
fn parses_service_and_command() {
    let spec: OverrideSpec = "worker:./migrate --all".parse().unwrap();
    assert_eq!(spec, OverrideSpec::new(Some("worker"), &["./migrate", "--all"]));
    assert_eq!(spec.to_string(), "worker:./migrate --all");
}

#[test]
fn parses_command_without_service() {
    let spec: OverrideSpec = "rake db:migrate".parse().unwrap();
    assert_eq!(spec, OverrideSpec::new(None, &["rake", "db:migrate"]));

    let spec: OverrideSpec = ":echo hi".parse().unwrap();
    assert_eq!(spec, OverrideSpec::new(None, &["echo", "hi"]));
}

#[test]
fn empty_override_is_rejected() {
    let result = "   ".parse::<OverrideSpec>();
    assert!(matches!(result, Err(RunTaskError::InvalidOverride(_))));
}
