//! End-to-end control flow of the execution service against the in-memory
//! store.

use std::sync::Arc;
use std::time::Duration;

use jiff::SignedDuration;
use uuid::Uuid;

use crewd_engine::{
    BreakerState,EngineConfigBuilder, EngineError, ExecutionService, ExecutionStatus, InvokerError,
    MemoryStore,
};
use crewd_graph::{Edge, Node, NodeKind, ValidationConfig, WorkflowDefinition, WorkflowMetadata};

fn runnable_definition() -> WorkflowDefinition {
    let mut definition =
        WorkflowDefinition::new(Uuid::new_v4(), WorkflowMetadata::named("research"));
    let agent = Node::new(NodeKind::Agent, "researcher").with_data(serde_json::json!({
        "role": "senior researcher",
        "goal": "find sources",
        "backstory": "years in the field",
    }));
    let task = Node::new(NodeKind::Task, "gather").with_data(serde_json::json!({
        "description": "gather sources",
        "expected_output": "a source list",
    }));
    let crew = Node::new(NodeKind::Crew, "research crew").with_data(serde_json::json!({
        "process": "sequential",
        "agent_ids": [agent.id.as_uuid().to_string()],
        "task_ids": [task.id.as_uuid().to_string()],
    }));
    let agent_id = agent.id;
    let crew_id = crew.id;
    definition.push_node(agent);
    definition.push_node(task);
    definition.push_node(crew);
    definition.push_edge(Edge::new(agent_id, crew_id));
    definition
}

fn service_with(config: crewd_engine::EngineConfig) -> Arc<ExecutionService> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Arc::new(ExecutionService::new(
        Arc::new(MemoryStore::new()),
        ValidationConfig::default(),
        config,
    ))
}

fn service() -> Arc<ExecutionService> {
    service_with(
        EngineConfigBuilder::default()
            .build()
            .expect("default engine config"),
    )
}

#[tokio::test]
async fn test_run_lifecycle_end_to_end() {
    let service = service();
    let definition = runnable_definition();

    let running = service.start_run(&definition).await.unwrap();
    assert_eq!(running.status, ExecutionStatus::Running);
    assert!(running.started_at.is_some());

    service
        .lifecycle()
        .update_progress(running.id, 40.0)
        .await
        .unwrap();

    let done = service
        .complete_run(running.id, serde_json::json!({ "sources": 3 }))
        .await
        .unwrap();
    assert_eq!(done.status, ExecutionStatus::Completed);
    assert_eq!(done.progress_percentage, 100.0);
    assert!(done.duration_seconds.is_some());
    assert_eq!(service.mutex().locked_count().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_acquire_has_exactly_one_winner() {
    let service = service();
    let graph_id = Uuid::new_v4();

    // Ids reserved up front, the way start_run admits a run.
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    let a = service.clone();
    let b = service.clone();
    let (left, right) = tokio::join!(
        async move { a.mutex().validate_execution_start(graph_id, first).await },
        async move { b.mutex().validate_execution_start(graph_id, second).await },
    );

    let winners = [left.is_ok(), right.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(winners, 1);

    // The loser names the winner's execution id.
    let (loser, winner_id) = if left.is_err() {
        (left.unwrap_err(), second)
    } else {
        (right.unwrap_err(), first)
    };
    match loser {
        EngineError::ConcurrentExecution {
            blocking_execution_id,
            ..
        } => assert_eq!(blocking_execution_id, winner_id),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_sweep_times_out_orphaned_runs() {
    let service = service_with(
        EngineConfigBuilder::default()
            .orphan_timeout(SignedDuration::from_millis(5))
            .build()
            .unwrap(),
    );
    let definition = runnable_definition();
    let running = service.start_run(&definition).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let report = service.run_sweep().await.unwrap();
    assert_eq!(report.timed_out, vec![running.id]);

    let swept = service.lifecycle().get_execution(running.id).await.unwrap();
    assert_eq!(swept.status, ExecutionStatus::TimedOut);
    assert_eq!(service.mutex().locked_count().await, 0);

    // The graph is free again.
    let next = service.start_run(&definition).await.unwrap();
    assert_eq!(next.status, ExecutionStatus::Running);
}

#[tokio::test]
async fn test_fault_retry_then_success() {
    let service = service();
    let definition = runnable_definition();
    let running = service.start_run(&definition).await.unwrap();

    let decision = service
        .fail_run(running.id, InvokerError::Connection("reset".into()), 0)
        .await
        .unwrap();
    assert!(decision.should_retry);
    assert_eq!(decision.next_attempt, 1);

    let retried = service.retry_run(running.id).await.unwrap();
    assert_eq!(retried.status, ExecutionStatus::Running);

    let done = service
        .complete_run(running.id, serde_json::Value::Null)
        .await
        .unwrap();
    assert_eq!(done.status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_breaker_walkthrough_via_fault_engine() {
    let service = service_with(
        EngineConfigBuilder::default()
            .breaker_failure_threshold(2u32)
            .breaker_recovery_timeout(Duration::from_millis(10))
            .build()
            .unwrap(),
    );
    let breaker = service.fault().breaker("search");

    for _ in 0..2 {
        let result: Result<(), _> = breaker
            .call(|| async { Err(crewd_core::ExecutionError::external_service("502")) })
            .await;
        assert!(result.is_err());
    }
    assert_eq!(breaker.state(), BreakerState::Open);

    // Rejected without invoking the operation.
    let mut invoked = false;
    let result = breaker
        .call(|| {
            invoked = true;
            async { Ok(()) }
        })
        .await;
    assert!(!invoked);
    assert_eq!(result.unwrap_err().code, "external_service_unavailable");

    tokio::time::sleep(Duration::from_millis(20)).await;
    let result = breaker.call(|| async { Ok(()) }).await;
    assert!(result.is_ok());
    assert_eq!(breaker.state(), BreakerState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

#[tokio::test]
async fn test_cancel_releases_graph_for_new_runs() {
    let service = service();
    let definition = runnable_definition();
    let running = service.start_run(&definition).await.unwrap();

    let cancelled = service.cancel_run(running.id).await.unwrap();
    assert_eq!(cancelled.status, ExecutionStatus::Cancelled);

    let next = service.start_run(&definition).await.unwrap();
    assert_ne!(next.id, running.id);
    assert_eq!(next.status, ExecutionStatus::Running);
}
