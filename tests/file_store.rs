// tests/file_store.rs

use std::fs;
use std::sync::Arc;

use runtask::backend::{FileLogStore, LogBackend, LogCursor};
use tempfile::tempdir;
use tokio::task::JoinSet;

#[tokio::test]
async fn appended_entries_come_back_in_order_from_the_cursor() {
    let dir = tempdir().unwrap();
    let store = FileLogStore::new(dir.path());

    store.ensure_group("runtask").await.unwrap();
    for msg in ["one", "two", "three"] {
        store.append_event("runtask", "run1/app/t1", msg).await.unwrap();
    }

    let page = store
        .fetch_events("runtask", "run1/app/t1", LogCursor::start())
        .await
        .unwrap();
    let messages: Vec<&str> = page.events.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["one", "two", "three"]);
    let after_three = page.next;

    let page = store
        .fetch_events("runtask", "run1/app/t1", after_three)
        .await
        .unwrap();
    assert!(page.events.is_empty());
    assert_eq!(page.next, after_three);

    store.append_event("runtask", "run1/app/t1", "four").await.unwrap();
    let page = store
        .fetch_events("runtask", "run1/app/t1", page.next)
        .await
        .unwrap();
    assert_eq!(page.events.len(), 1);
    assert_eq!(page.events[0].message, "four");
}

#[tokio::test]
async fn stream_names_become_nested_files_under_the_group() {
    let dir = tempdir().unwrap();
    let store = FileLogStore::new(dir.path());

    store.append_event("runtask", "run1/app/t1", "hi").await.unwrap();

    let path = dir.path().join("runtask/run1/app/t1.jsonl");
    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.contains("\"message\":\"hi\""));
}

#[tokio::test]
async fn unwritten_stream_reads_as_empty() {
    let dir = tempdir().unwrap();
    let store = FileLogStore::new(dir.path());

    let page = store
        .fetch_events("runtask", "run1/app/never", LogCursor(7))
        .await
        .unwrap();
    assert!(page.events.is_empty());
    assert_eq!(page.next, LogCursor(7));
}

#[tokio::test]
async fn fetches_are_paged() {
    let dir = tempdir().unwrap();
    let store = FileLogStore::new(dir.path()).with_page_size(2);
    for i in 0..5 {
        store
            .append_event("g", "s", &format!("line {i}"))
            .await
            .unwrap();
    }

    let mut cursor = LogCursor::start();
    let mut sizes = Vec::new();
    loop {
        let page = store.fetch_events("g", "s", cursor).await.unwrap();
        if page.events.is_empty() {
            break;
        }
        sizes.push(page.events.len());
        cursor = page.next;
    }
    assert_eq!(sizes, vec![2, 2, 1]);

    let len = fs::metadata(dir.path().join("g/s.jsonl")).unwrap().len();
    assert_eq!(cursor, LogCursor(len));
}

#[tokio::test]
async fn trailing_partial_line_is_picked_up_once_complete() {
    let dir = tempdir().unwrap();
    let store = FileLogStore::new(dir.path());
    store.append_event("g", "s", "complete").await.unwrap();

    let path = dir.path().join("g/s.jsonl");
    let mut contents = fs::read_to_string(&path).unwrap();
    contents.push_str("{\"timestamp\":1,\"mess");
    fs::write(&path, &contents).unwrap();

    let page = store.fetch_events("g", "s", LogCursor::start()).await.unwrap();
    assert_eq!(page.events.len(), 1);

    let again = store.fetch_events("g", "s", page.next).await.unwrap();
    assert!(again.events.is_empty());
    assert_eq!(again.next, page.next);

    contents.push_str("age\":\"late\"}\n");
    fs::write(&path, &contents).unwrap();

    let finished = store.fetch_events("g", "s", page.next).await.unwrap();
    assert_eq!(finished.events.len(), 1);
    assert_eq!(finished.events[0].message, "late");
}

#[tokio::test]
async fn later_fetches_do_not_rescan_consumed_lines() {
    let dir = tempdir().unwrap();
    let store = FileLogStore::new(dir.path());
    store.append_event("g", "s", "first").await.unwrap();

    let page = store.fetch_events("g", "s", LogCursor::start()).await.unwrap();
    assert_eq!(page.events.len(), 1);

    // Corrupting already consumed bytes must not affect reads past the cursor.
    let path = dir.path().join("g/s.jsonl");
    let mut bytes = fs::read(&path).unwrap();
    bytes[0] = b'#';
    fs::write(&path, bytes).unwrap();
    store.append_event("g", "s", "second").await.unwrap();

    let next = store.fetch_events("g", "s", page.next).await.unwrap();
    assert_eq!(next.events.len(), 1);
    assert_eq!(next.events[0].message, "second");
}

#[tokio::test]
async fn concurrent_appends_to_one_stream_keep_whole_lines() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FileLogStore::new(dir.path()));

    let mut appends = JoinSet::new();
    for i in 0..50 {
        let store = Arc::clone(&store);
        appends.spawn(async move {
            store
                .append_event("g", "s", &format!("entry {i} {}", "x".repeat(200)))
                .await
        });
    }
    while let Some(done) = appends.join_next().await {
        done.unwrap().unwrap();
    }

    let page = store.fetch_events("g", "s", LogCursor::start()).await.unwrap();
    assert_eq!(page.events.len(), 50);
}

#[tokio::test]
async fn names_that_escape_the_root_are_rejected() {
    let dir = tempdir().unwrap();
    let store = FileLogStore::new(dir.path());

    assert!(store.ensure_group("").await.is_err());
    assert!(store.ensure_group("../outside").await.is_err());
    assert!(store.append_event("g", "/etc/passwd", "x").await.is_err());
    assert!(store.append_event("g", "a/../../b", "x").await.is_err());
    assert!(
        store
            .fetch_events("..", "s", LogCursor::start())
            .await
            .is_err()
    );
}
