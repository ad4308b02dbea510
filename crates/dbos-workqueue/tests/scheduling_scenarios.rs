//! End-to-end scheduling scenarios across one or more executors.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::tempdir;

use dbos_config::ExecutorConfig;
use dbos_workqueue::{
    DispatcherState, FnWorkflow, MemoryWorkflowStore, Queue, RateLimit, SqliteWorkflowStore,
    WorkflowContext, WorkflowFunction, WorkflowRecord, WorkflowRuntime, WorkflowStatus,
    WorkflowStore,
};

const TICK: Duration = Duration::from_millis(50);

fn executor(id: &str) -> ExecutorConfig {
    ExecutorConfig {
        executor_id: id.to_string(),
        ..Default::default()
    }
}

fn echo() -> Arc<dyn WorkflowFunction> {
    Arc::new(FnWorkflow::new("echo", |_ctx: WorkflowContext, input: Value| async move {
        Ok(input)
    }))
}

async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

async fn count_started(store: &dyn WorkflowStore, ids: &[String]) -> usize {
    let mut started = 0;
    for id in ids {
        let record = store.get_workflow(id).await.unwrap().unwrap();
        if record.status != WorkflowStatus::Enqueued {
            started += 1;
        }
    }
    started
}

#[tokio::test]
async fn enqueued_workflow_runs_to_completion() {
    let runtime = WorkflowRuntime::new(executor("vm-1"), Arc::new(MemoryWorkflowStore::new()))
        .with_tick_interval(TICK);
    runtime.register_workflow(echo()).unwrap();
    runtime.register_queue(Queue::unbounded("Q").unwrap()).unwrap();
    runtime.launch();

    let id = runtime
        .enqueue("Q", "echo", json!({"to": "a@b.c"}), Some("U".to_string()))
        .await
        .unwrap();

    let store = runtime.store();
    let done = wait_until(Duration::from_secs(5), || {
        let store = store.clone();
        async move {
            store.get_workflow("U").await.unwrap().map(|r| r.status) == Some(WorkflowStatus::Success)
        }
    })
    .await;
    assert!(done, "workflow {} did not finish", id);

    let record = runtime.get_workflow("U").await.unwrap().unwrap();
    assert_eq!(record.output, Some(json!({"to": "a@b.c"})));
    assert_eq!(record.executor_id.as_deref(), Some("vm-1"));
    runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_cap_holds_across_executors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dbos.sqlite");

    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut runtimes = Vec::new();
    for name in ["vm-a", "vm-b", "vm-c"] {
        let store = SqliteWorkflowStore::open(&path, Duration::from_secs(10)).await.unwrap();
        let runtime = WorkflowRuntime::new(executor(name), Arc::new(store)).with_tick_interval(TICK);
        runtime.register_queue(Queue::new("Q", Some(2), None).unwrap()).unwrap();

        let running = running.clone();
        let peak = peak.clone();
        runtime
            .register_workflow(Arc::new(FnWorkflow::new(
                "work",
                move |_ctx: WorkflowContext, input: Value| {
                    let running = running.clone();
                    let peak = peak.clone();
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(80)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(input)
                    }
                },
            )))
            .unwrap();
        runtimes.push(runtime);
    }

    let mut ids = Vec::new();
    for i in 0..10 {
        ids.push(runtimes[0].enqueue("Q", "work", json!(i), None).await.unwrap());
    }
    for runtime in &runtimes {
        runtime.launch();
    }

    let store = runtimes[0].store();
    let all_done = wait_until(Duration::from_secs(15), || {
        let store = store.clone();
        async move { store.count_by_status("Q", WorkflowStatus::Success).await.unwrap() == 10 }
    })
    .await;
    assert!(all_done);
    assert!(peak.load(Ordering::SeqCst) <= 2, "peak was {}", peak.load(Ordering::SeqCst));

    for runtime in &runtimes {
        runtime.shutdown().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn executor_without_functions_leaves_queue_to_others() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dbos.sqlite");

    let bare_store = SqliteWorkflowStore::open(&path, Duration::from_secs(10)).await.unwrap();
    let app_store = SqliteWorkflowStore::open(&path, Duration::from_secs(10)).await.unwrap();
    let bare = WorkflowRuntime::new(executor("bare"), Arc::new(bare_store)).with_tick_interval(TICK);
    let app = WorkflowRuntime::new(executor("app"), Arc::new(app_store)).with_tick_interval(TICK);
    for runtime in [&bare, &app] {
        runtime.register_queue(Queue::new("Q", Some(1), None).unwrap()).unwrap();
    }
    app.register_workflow(echo()).unwrap();

    assert!(!bare.hosts_workflows());
    assert!(!bare.launch());
    assert_eq!(bare.dispatcher_state(), DispatcherState::Stopped);

    for id in ["w1", "w2"] {
        app.enqueue("Q", "echo", json!(id), Some(id.to_string())).await.unwrap();
    }
    assert!(app.launch());

    let store = app.store();
    let all_done = wait_until(Duration::from_secs(10), || {
        let store = store.clone();
        async move { store.count_by_status("Q", WorkflowStatus::Success).await.unwrap() == 2 }
    })
    .await;
    assert!(all_done);

    for id in ["w1", "w2"] {
        let record = bare.get_workflow(id).await.unwrap().unwrap();
        assert_eq!(record.executor_id.as_deref(), Some("app"));
    }

    app.shutdown().await;
    bare.shutdown().await;
}

#[tokio::test]
async fn rate_limit_spreads_starts() {
    let store: Arc<dyn WorkflowStore> = Arc::new(MemoryWorkflowStore::new());
    let runtime = WorkflowRuntime::new(executor("vm-1"), store.clone()).with_tick_interval(TICK);
    runtime.register_workflow(echo()).unwrap();
    runtime
        .register_queue(Queue::new("Q", None, Some(RateLimit::new(2, 1.0))).unwrap())
        .unwrap();

    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(runtime.enqueue("Q", "echo", json!(i), None).await.unwrap());
    }
    runtime.launch();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(count_started(store.as_ref(), &ids).await, 2);

    let all_started = wait_until(Duration::from_secs(5), || {
        let store = store.clone();
        let ids = ids.clone();
        async move { count_started(store.as_ref(), &ids).await == 5 }
    })
    .await;
    assert!(all_started);

    // admission order follows enqueue order
    let mut starts = Vec::new();
    for id in &ids {
        starts.push(store.get_workflow(id).await.unwrap().unwrap().started_at_ms.unwrap());
    }
    assert!(starts.windows(2).all(|w| w[0] <= w[1]));
    runtime.shutdown().await;
}

#[tokio::test]
async fn recovery_completes_orphaned_workflow() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dbos.sqlite");

    // executor-1 started w1 and went away before finishing it
    let crashed = SqliteWorkflowStore::open(&path, Duration::from_secs(5)).await.unwrap();
    let orphan = WorkflowRecord::started(Some("w1".into()), "echo", json!("payload"), &executor("executor-1"));
    crashed.insert_workflow(&orphan).await.unwrap();
    drop(crashed);

    let store = SqliteWorkflowStore::open(&path, Duration::from_secs(5)).await.unwrap();
    let runtime = WorkflowRuntime::new(executor("executor-2"), Arc::new(store));
    runtime.register_workflow(echo()).unwrap();

    assert!(runtime
        .recover(&["executor1".to_string(), "executor2".to_string()])
        .await
        .unwrap()
        .is_empty());

    let recovered = runtime.recover(&["executor-1".to_string()]).await.unwrap();
    assert_eq!(recovered, vec!["w1"]);

    let store = runtime.store();
    let done = wait_until(Duration::from_secs(5), || {
        let store = store.clone();
        async move {
            store.get_workflow("w1").await.unwrap().map(|r| r.status) == Some(WorkflowStatus::Success)
        }
    })
    .await;
    assert!(done);

    let record = runtime.get_workflow("w1").await.unwrap().unwrap();
    assert_eq!(record.output, Some(json!("payload")));
    assert_eq!(record.executor_id.as_deref(), Some("executor-2"));
}
