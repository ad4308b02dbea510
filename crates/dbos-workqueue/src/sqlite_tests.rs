use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tempfile::tempdir;

use super::*;
use crate::queue::RateLimit;

fn enqueued(id: &str, created_at_ms: i64) -> WorkflowRecord {
    WorkflowRecord::enqueued(Some(id.to_string()), "f", "q", json!({"n": created_at_ms}))
        .with_created_at(created_at_ms)
}

#[tokio::test]
async fn test_insert_and_get_roundtrip() {
    let store = SqliteWorkflowStore::in_memory().await.unwrap();
    let record = enqueued("a", 10);

    assert!(store.insert_workflow(&record).await.unwrap());
    assert!(!store.insert_workflow(&record).await.unwrap());

    let loaded = store.get_workflow("a").await.unwrap().unwrap();
    assert_eq!(loaded, record);
    assert!(store.get_workflow("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_admission_respects_fifo_and_concurrency() {
    let store = SqliteWorkflowStore::in_memory().await.unwrap();
    for (id, at) in [("c", 30), ("b", 20), ("a2", 10), ("a1", 10)] {
        store.insert_workflow(&enqueued(id, at)).await.unwrap();
    }
    let queue = Queue::new("q", Some(3), None).unwrap();

    let started = store.start_queued_workflows(&queue, "e1", 1_000).await.unwrap();
    assert_eq!(started, vec!["a1", "a2", "b"]);
    assert!(store.start_queued_workflows(&queue, "e2", 1_001).await.unwrap().is_empty());

    let record = store.get_workflow("a1").await.unwrap().unwrap();
    assert_eq!(record.status, WorkflowStatus::Pending);
    assert_eq!(record.executor_id.as_deref(), Some("e1"));
    assert_eq!(record.started_at_ms, Some(1_000));
    assert_eq!(store.count_by_status("q", WorkflowStatus::Enqueued).await.unwrap(), 1);
}

#[tokio::test]
async fn test_admission_unbounded_promotes_all() {
    let store = SqliteWorkflowStore::in_memory().await.unwrap();
    for i in 0..5 {
        store.insert_workflow(&enqueued(&format!("w{}", i), i)).await.unwrap();
    }
    let started = store
        .start_queued_workflows(&Queue::unbounded("q").unwrap(), "e1", 100)
        .await
        .unwrap();
    assert_eq!(started.len(), 5);
}

#[tokio::test]
async fn test_admission_rate_limit() {
    let store = SqliteWorkflowStore::in_memory().await.unwrap();
    for i in 0..4 {
        store.insert_workflow(&enqueued(&format!("w{}", i), i)).await.unwrap();
    }
    let queue = Queue::new("q", None, Some(RateLimit::new(1, 2.0))).unwrap();

    assert_eq!(store.start_queued_workflows(&queue, "e1", 10_000).await.unwrap(), vec!["w0"]);
    assert!(store.start_queued_workflows(&queue, "e1", 11_999).await.unwrap().is_empty());
    assert_eq!(store.start_queued_workflows(&queue, "e1", 12_000).await.unwrap(), vec!["w1"]);
}

#[tokio::test]
async fn test_outcome_and_transitions() {
    let store = SqliteWorkflowStore::in_memory().await.unwrap();
    store.insert_workflow(&enqueued("a", 1)).await.unwrap();

    let err = store.record_outcome("a", Ok(json!(1))).await.unwrap_err();
    assert!(matches!(err, QueueError::InvalidTransition { .. }));

    store
        .start_queued_workflows(&Queue::unbounded("q").unwrap(), "e1", 5)
        .await
        .unwrap();
    assert!(store.claim_workflow("a", "e2").await.unwrap());
    store.record_outcome("a", Ok(json!({"ok": true}))).await.unwrap();

    let record = store.get_workflow("a").await.unwrap().unwrap();
    assert_eq!(record.status, WorkflowStatus::Success);
    assert_eq!(record.output, Some(json!({"ok": true})));
    assert_eq!(record.executor_id.as_deref(), Some("e2"));

    assert!(!store.claim_workflow("a", "e3").await.unwrap());
    assert!(store.record_outcome("a", Err("late".into())).await.is_err());
    assert!(matches!(
        store.claim_workflow("missing", "e1").await,
        Err(QueueError::WorkflowNotFound(_))
    ));
    assert!(matches!(
        store.record_outcome("missing", Ok(json!(null))).await,
        Err(QueueError::WorkflowNotFound(_))
    ));
}

#[tokio::test]
async fn test_find_pending_workflows() {
    let store = SqliteWorkflowStore::in_memory().await.unwrap();
    for (id, owner, at) in [("w1", "executor-1", 1), ("w2", "executor-2", 2), ("w3", "executor-1", 3)] {
        let executor = dbos_config::ExecutorConfig {
            executor_id: owner.to_string(),
            ..Default::default()
        };
        let record = WorkflowRecord::started(Some(id.to_string()), "f", json!(null), &executor)
            .with_created_at(at);
        store.insert_workflow(&record).await.unwrap();
    }
    store.record_outcome("w3", Ok(json!(null))).await.unwrap();

    let ids = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    assert_eq!(store.find_pending_workflows(&ids(&["executor-1"])).await.unwrap(), vec!["w1"]);
    assert_eq!(
        store
            .find_pending_workflows(&ids(&["executor-2", "executor-1"]))
            .await
            .unwrap(),
        vec!["w1", "w2"]
    );
    assert!(store.find_pending_workflows(&[]).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_file_admission_promotes_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dbos.sqlite");

    let seed = SqliteWorkflowStore::open(&path, Duration::from_secs(10)).await.unwrap();
    for i in 0..30 {
        seed.insert_workflow(&enqueued(&format!("w{:02}", i), i)).await.unwrap();
    }

    let queue = Arc::new(Queue::new("q", Some(12), None).unwrap());
    let mut handles = Vec::new();
    for executor in 0..4 {
        let store = SqliteWorkflowStore::open(&path, Duration::from_secs(10)).await.unwrap();
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            let mut mine = Vec::new();
            for tick in 0..3 {
                let ids = store
                    .start_queued_workflows(&queue, &format!("e{}", executor), 1_000 + tick)
                    .await
                    .unwrap();
                mine.extend(ids);
            }
            mine
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id), "workflow promoted twice");
        }
    }
    assert_eq!(seen.len(), 12);
    assert_eq!(seed.count_by_status("q", WorkflowStatus::Pending).await.unwrap(), 12);
}
