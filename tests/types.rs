// tests/types.rs

use runtask::backend::{Container, Task};
use runtask::types::{LaunchType, Status};

fn container(status: Status) -> Container {
    Container {
        name: "app".to_string(),
        id: "c1".to_string(),
        status,
        exit_code: None,
        reason: None,
    }
}

#[test]
fn launch_type_accepts_both_spellings() {
    assert_eq!("standard".parse::<LaunchType>().unwrap(), LaunchType::Standard);
    assert_eq!("EC2".parse::<LaunchType>().unwrap(), LaunchType::Standard);
    assert_eq!("fargate".parse::<LaunchType>().unwrap(), LaunchType::Serverless);
    assert_eq!(LaunchType::Serverless.to_string(), "serverless");
    assert!("spot".parse::<LaunchType>().is_err());
}

#[test]
fn status_is_shared_by_tasks_and_containers() {
    assert_eq!(Status::Stopped.to_string(), "STOPPED");
    assert_eq!(serde_json::to_string(&Status::Running).unwrap(), "\"RUNNING\"");

    let task = Task {
        id: "t1".to_string(),
        status: Status::Stopped,
        containers: vec![container(Status::Stopped), container(Status::Running)],
    };
    assert!(!task.is_stopped());

    let task = Task {
        containers: vec![container(Status::Stopped)],
        ..task
    };
    assert!(task.is_stopped());
}
