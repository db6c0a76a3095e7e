//! Integration tests for the blocking `Dispatcher`.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use snapdoc_worker::{
    DispatchError, Dispatcher, DispatcherConfig, DispatcherState, Task, TaskContext,
};
use tokio::sync::Semaphore;

use common::{spawn_collector, Observed, Gauge, ScriptedTask};

fn config(workers: usize) -> DispatcherConfig {
    DispatcherConfig::default().with_workers(workers)
}

// ---------------------------------------------------------------------------
// Test: lifecycle guards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatch_before_start_is_rejected() {
    let (dispatcher, _events) = Dispatcher::new(config(1));

    assert_matches!(
        dispatcher.dispatch(ScriptedTask::new("t").boxed()).await,
        Err(DispatchError::NotRunning(DispatcherState::Created))
    );
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let (dispatcher, events) = Dispatcher::new(config(2));
    let collector = spawn_collector(events);

    dispatcher.start().await.unwrap();
    assert_matches!(dispatcher.start().await, Err(DispatchError::AlreadyStarted));

    dispatcher.stop().await.unwrap();
    collector.await.unwrap();
}

#[tokio::test]
async fn stop_before_start_is_rejected() {
    let (dispatcher, _events) = Dispatcher::new(config(1));

    assert_matches!(
        dispatcher.stop().await,
        Err(DispatchError::NotRunning(DispatcherState::Created))
    );
}

#[tokio::test]
async fn dispatch_after_stop_is_rejected() {
    let (dispatcher, events) = Dispatcher::new(config(2));
    let collector = spawn_collector(events);
    dispatcher.start().await.unwrap();
    dispatcher.stop().await.unwrap();

    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    assert_matches!(
        dispatcher.dispatch(ScriptedTask::new("late").boxed()).await,
        Err(DispatchError::NotRunning(DispatcherState::Stopped))
    );
    assert!(collector.await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Test: every task gets exactly one terminal event
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_task_gets_exactly_one_terminal_event() {
    let (dispatcher, events) = Dispatcher::new(config(3));
    let collector = spawn_collector(events);
    dispatcher.start().await.unwrap();

    for i in 0..20 {
        let task = if i % 4 == 0 {
            ScriptedTask::new(format!("t{i}")).failing("boom")
        } else {
            ScriptedTask::new(format!("t{i}")).steps(&["working"])
        };
        dispatcher.dispatch(task.boxed()).await.unwrap();
    }
    dispatcher.stop().await.unwrap();
    let seen = collector.await.unwrap();

    for i in 0..20 {
        let id = format!("t{i}");
        let terminals: Vec<_> = seen
            .iter()
            .filter(|e| e.task_id() == id && e.is_terminal())
            .collect();
        assert_eq!(terminals.len(), 1, "task {id} had {terminals:?}");
        if i % 4 == 0 {
            assert_eq!(terminals[0], &Observed::Failed(id.clone(), "boom".to_string()));
        } else {
            assert_eq!(terminals[0], &Observed::Complete(id.clone()));
        }
    }
}

// ---------------------------------------------------------------------------
// Test: each task runs once and concurrency never exceeds the pool size
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_is_bounded_by_pool_size() {
    let workers = 3;
    let (dispatcher, events) = Dispatcher::new(config(workers));
    let collector = spawn_collector(events);
    dispatcher.start().await.unwrap();

    let gauge = Arc::new(Gauge::default());
    let mut executions = Vec::new();
    for i in 0..12 {
        let task = ScriptedTask::new(format!("t{i}"))
            .delayed(Duration::from_millis(10))
            .gauged(Arc::clone(&gauge));
        executions.push(Arc::clone(&task.own_executions));
        dispatcher.dispatch(task.boxed()).await.unwrap();
    }
    dispatcher.stop().await.unwrap();
    collector.await.unwrap();

    assert_eq!(gauge.executions.load(Ordering::SeqCst), 12);
    assert!(gauge.max_running.load(Ordering::SeqCst) <= workers);
    for count in executions {
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

// ---------------------------------------------------------------------------
// Test: blocking dispatch waits for an idle worker
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatch_waits_while_all_workers_are_busy() {
    let (dispatcher, events) = Dispatcher::new(config(1));
    let collector = spawn_collector(events);
    dispatcher.start().await.unwrap();

    let gate = Arc::new(Semaphore::new(0));
    dispatcher
        .dispatch(ScriptedTask::new("busy").gated(Arc::clone(&gate)).boxed())
        .await
        .unwrap();

    let second = dispatcher.dispatch(ScriptedTask::new("waiting").boxed());
    tokio::pin!(second);
    assert!(
        tokio::time::timeout(Duration::from_millis(50), &mut second)
            .await
            .is_err(),
        "dispatch returned while the only worker was busy"
    );

    gate.add_permits(1);
    second.await.unwrap();

    dispatcher.stop().await.unwrap();
    let seen = collector.await.unwrap();
    assert!(seen.contains(&Observed::Complete("busy".to_string())));
    assert!(seen.contains(&Observed::Complete("waiting".to_string())));
}

// ---------------------------------------------------------------------------
// Test: status events keep per-task order and precede the terminal event
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_events_preserve_emission_order() {
    let (dispatcher, events) = Dispatcher::new(config(2));
    let collector = spawn_collector(events);
    dispatcher.start().await.unwrap();

    dispatcher
        .dispatch(ScriptedTask::new("a").steps(&["a1", "a2", "a3"]).boxed())
        .await
        .unwrap();
    dispatcher
        .dispatch(ScriptedTask::new("b").steps(&["b1", "b2"]).failing("bad").boxed())
        .await
        .unwrap();
    dispatcher.stop().await.unwrap();
    let seen = collector.await.unwrap();

    let for_task = |id: &str| -> Vec<Observed> {
        seen.iter().filter(|e| e.task_id() == id).cloned().collect()
    };
    assert_eq!(
        for_task("a"),
        vec![
            Observed::Status("a".into(), "a1".into()),
            Observed::Status("a".into(), "a2".into()),
            Observed::Status("a".into(), "a3".into()),
            Observed::Complete("a".into()),
        ]
    );
    assert_eq!(
        for_task("b"),
        vec![
            Observed::Status("b".into(), "b1".into()),
            Observed::Status("b".into(), "b2".into()),
            Observed::Failed("b".into(), "bad".into()),
        ]
    );
}

// ---------------------------------------------------------------------------
// Test: stop waits for tasks already handed to workers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_waits_for_in_flight_tasks() {
    let (dispatcher, events) = Dispatcher::new(config(2));
    let collector = spawn_collector(events);
    dispatcher.start().await.unwrap();

    for i in 0..2 {
        dispatcher
            .dispatch(
                ScriptedTask::new(format!("slow{i}"))
                    .delayed(Duration::from_millis(50))
                    .boxed(),
            )
            .await
            .unwrap();
    }
    dispatcher.stop().await.unwrap();

    let seen = collector.await.unwrap();
    assert_eq!(seen.iter().filter(|e| e.is_terminal()).count(), 2);
}

// ---------------------------------------------------------------------------
// Test: timeout, panic and cancellation all end in a failure event
// ---------------------------------------------------------------------------

#[tokio::test]
async fn task_exceeding_timeout_fails() {
    let (dispatcher, events) = Dispatcher::new(
        config(1).with_task_timeout(Some(Duration::from_millis(20))),
    );
    let collector = spawn_collector(events);
    dispatcher.start().await.unwrap();

    dispatcher
        .dispatch(
            ScriptedTask::new("sleepy")
                .delayed(Duration::from_secs(5))
                .boxed(),
        )
        .await
        .unwrap();
    dispatcher.stop().await.unwrap();

    let seen = collector.await.unwrap();
    assert_eq!(seen.len(), 1);
    assert_matches!(&seen[0], Observed::Failed(id, msg) if id == "sleepy" && msg.contains("timed out"));
}

struct PanickingTask;

#[async_trait]
impl Task for PanickingTask {
    fn id(&self) -> &str {
        "panics"
    }

    async fn execute(&self, _ctx: TaskContext) -> anyhow::Result<()> {
        panic!("kaboom");
    }
}

#[tokio::test]
async fn panicking_task_fails_and_worker_survives() {
    let (dispatcher, events) = Dispatcher::new(config(1));
    let collector = spawn_collector(events);
    dispatcher.start().await.unwrap();

    dispatcher.dispatch(Box::new(PanickingTask)).await.unwrap();
    dispatcher
        .dispatch(ScriptedTask::new("after").boxed())
        .await
        .unwrap();
    dispatcher.stop().await.unwrap();

    let seen = collector.await.unwrap();
    assert_matches!(&seen[0], Observed::Failed(id, msg) if id == "panics" && msg.contains("kaboom"));
    assert_eq!(seen[1], Observed::Complete("after".to_string()));
}

struct CooperativeTask;

#[async_trait]
impl Task for CooperativeTask {
    fn id(&self) -> &str {
        "coop"
    }

    async fn execute(&self, ctx: TaskContext) -> anyhow::Result<()> {
        ctx.cancelled().await;
        anyhow::bail!("cancelled during shutdown")
    }
}

#[tokio::test]
async fn shutdown_grace_cancels_cooperative_tasks() {
    let (dispatcher, events) = Dispatcher::new(
        config(1).with_shutdown_grace(Some(Duration::from_millis(20))),
    );
    let collector = spawn_collector(events);
    dispatcher.start().await.unwrap();

    dispatcher.dispatch(Box::new(CooperativeTask)).await.unwrap();
    dispatcher.stop().await.unwrap();

    let seen = collector.await.unwrap();
    assert_eq!(
        seen,
        vec![Observed::Failed(
            "coop".to_string(),
            "cancelled during shutdown".to_string()
        )]
    );
}

// ---------------------------------------------------------------------------
// Test: a vanished consumer does not wedge the pool
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dropped_event_streams_do_not_block_workers() {
    let (dispatcher, events) = Dispatcher::new(config(1));
    drop(events);
    dispatcher.start().await.unwrap();

    dispatcher
        .dispatch(ScriptedTask::new("orphan").steps(&["one", "two"]).boxed())
        .await
        .unwrap();
    dispatcher.stop().await.unwrap();

    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
}
