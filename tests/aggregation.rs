// tests/aggregation.rs

use proptest::prelude::*;

use runtask::engine::aggregate_exit_code;
use runtask::errors::RunTaskError;
use runtask_test_utils::builders::stopped_task;

#[test]
fn first_non_zero_exit_code_wins() {
    let tasks = vec![
        stopped_task("t1", &[("a", Some(0)), ("b", Some(0))]),
        stopped_task("t2", &[("c", Some(5)), ("d", Some(0))]),
    ];

    let result = aggregate_exit_code(tasks).unwrap();
    assert_eq!(result.exit_code, 5);
    assert_eq!(result.failed_container.as_deref(), Some("c"));
    assert!(!result.is_success());
    assert_eq!(result.tasks.len(), 2);
}

#[test]
fn all_zero_is_success() {
    let tasks = vec![stopped_task("t1", &[("a", Some(0)), ("b", Some(0))])];

    let result = aggregate_exit_code(tasks).unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.failed_container, None);
    assert!(result.is_success());
}

#[test]
fn later_failures_do_not_replace_the_first() {
    let tasks = vec![stopped_task(
        "t1",
        &[("a", Some(2)), ("b", Some(1)), ("c", Some(0))],
    )];

    let result = aggregate_exit_code(tasks).unwrap();
    assert_eq!(result.exit_code, 2);
    assert_eq!(result.failed_container.as_deref(), Some("a"));
}

#[test]
fn container_without_exit_code_fails_with_its_reason() {
    let tasks = vec![stopped_task("t1", &[("a", Some(0)), ("b", None)])];

    match aggregate_exit_code(tasks) {
        Err(RunTaskError::Finalization(reason)) => assert_eq!(reason, "stopped before start"),
        other => panic!("Expected Finalization, got: {:?}", other),
    }
}

#[test]
fn no_tasks_means_success() {
    let result = aggregate_exit_code(Vec::new()).unwrap();
    assert_eq!(result.exit_code, 0);
}

proptest! {
    #[test]
    fn result_is_first_non_zero_in_enumeration_order(
        codes in proptest::collection::vec(
            prop_oneof![3 => Just(0i32), 1 => -5i32..200],
            1..12,
        ),
    ) {
        let names: Vec<String> = (0..codes.len()).map(|i| format!("c{i}")).collect();
        let containers: Vec<(&str, Option<i32>)> = names
            .iter()
            .zip(codes.iter())
            .map(|(n, c)| (n.as_str(), Some(*c)))
            .collect();

        let result = aggregate_exit_code(vec![stopped_task("t", &containers)]).unwrap();

        let expected = codes.iter().position(|c| *c != 0);
        match expected {
            Some(i) => {
                prop_assert_eq!(result.exit_code, codes[i]);
                prop_assert_eq!(result.failed_container, Some(names[i].clone()));
            }
            None => {
                prop_assert_eq!(result.exit_code, 0);
                prop_assert_eq!(result.failed_container, None);
            }
        }
    }
}
