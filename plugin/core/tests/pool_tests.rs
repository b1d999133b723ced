// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{read_from_archive, TestEnv};
use docker_elastic_agents_core::application::pool::PoolPolicy;
use docker_elastic_agents_core::domain::container::{AgentContainer, ContainerId};
use docker_elastic_agents_core::domain::error::AgentError;
use docker_elastic_agents_core::domain::requests::{CreateAgentRequest, ShouldAssignWorkRequest};
use std::collections::HashMap;
use std::time::Duration;

fn create_request() -> CreateAgentRequest {
    CreateAgentRequest {
        auto_register_key: Some("k1".to_string()),
        properties: HashMap::from([("resources".to_string(), "linux,docker".to_string())]),
        environment: Some("prod".to_string()),
    }
}

#[test]
fn test_should_assign_work_accepts_empty_request() {
    let env = TestEnv::new();
    let request = ShouldAssignWorkRequest::from_json("{}").unwrap();
    assert!(env.pool.should_assign_work(&request));
}

#[tokio::test]
async fn test_create_agent_registers_container() {
    let env = TestEnv::new();

    let container = env.pool.create_agent(&create_request()).await.unwrap();
    let id = container.id().unwrap().clone();

    assert_eq!(env.registry.len(), 1);
    assert!(env.registry.contains(&id));
    assert_eq!(env.engine.container_ids(), vec![id.as_str().to_string()]);
    assert_eq!(env.staging_entries(), 0);

    let uploads = env.engine.with(|s| s.uploads.clone());
    let descriptor = read_from_archive(&uploads[0].2, "autoregister.properties").unwrap();
    assert!(descriptor.contains("agent.auto.register.key=k1"));
    assert!(descriptor.contains("agent.auto.register.resources=linux, docker"));
    assert!(descriptor.contains("agent.auto.register.environments=prod"));
    assert!(descriptor.contains(&format!("agent.auto.register.elasticAgent.agentId={}", id)));
}

#[tokio::test]
async fn test_failed_creation_is_not_registered() {
    let env = TestEnv::new();
    env.engine.fail_command("mkdir", 2, "read-only file system");

    let err = env.pool.create_agent(&create_request()).await.unwrap_err();

    assert!(matches!(err, AgentError::CommandFailed { exit_code: 2, .. }));
    assert!(env.registry.is_empty());
    assert_eq!(env.staging_entries(), 0);
}

#[tokio::test]
async fn test_create_agent_respects_deadline() {
    let env = TestEnv::with_policy(PoolPolicy {
        create_deadline: Duration::from_millis(50),
        max_agent_age: Duration::from_secs(3600),
        orphan_grace: Duration::from_secs(600),
    });
    env.engine.with(|s| s.hang_on_create = true);

    let err = env.pool.create_agent(&create_request()).await.unwrap_err();

    assert!(matches!(err, AgentError::DeadlineExceeded(_)), "got {:?}", err);
    assert!(env.registry.is_empty());
}

#[tokio::test]
async fn test_terminate_agent_removes_entry() {
    let env = TestEnv::new();
    let container = env.pool.create_agent(&create_request()).await.unwrap();
    let id = container.id().unwrap().clone();

    env.pool.terminate_agent(&id).await.unwrap();

    assert!(env.registry.is_empty());
    assert!(env.engine.container_ids().is_empty());
}

#[tokio::test]
async fn test_terminate_agent_tolerates_missing_container() {
    let env = TestEnv::new();
    let container = env.pool.create_agent(&create_request()).await.unwrap();
    let id = container.id().unwrap().clone();
    env.engine.with(|s| s.stop_not_found = true);

    env.pool.terminate_agent(&id).await.unwrap();

    assert!(!env.registry.contains(&id));
}

#[tokio::test]
async fn test_terminate_unknown_agent_succeeds() {
    let env = TestEnv::new();
    env.pool
        .terminate_agent(&ContainerId::new("never-created"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_concurrent_creations_all_register() {
    let env = TestEnv::new();
    let request = create_request();

    let results = futures::future::join_all(
        (0..8).map(|_| env.pool.create_agent(&request)),
    )
    .await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(env.registry.len(), 8);
    assert_eq!(env.engine.container_ids().len(), 8);
    assert_eq!(env.staging_entries(), 0);
}

#[tokio::test]
async fn test_reconcile_evicts_vanished_containers() {
    let env = TestEnv::new();
    let container = env.pool.create_agent(&create_request()).await.unwrap();
    let id = container.id().unwrap().clone();
    env.engine.remove_out_of_band(id.as_str());

    let report = env.pool.reconcile().await.unwrap();

    assert_eq!(report.evicted, vec![id.clone()]);
    assert!(!env.registry.contains(&id));
}

#[tokio::test]
async fn test_reconcile_keeps_fresh_agents() {
    let env = TestEnv::new();
    env.pool.create_agent(&create_request()).await.unwrap();

    let report = env.pool.reconcile().await.unwrap();

    assert!(report.evicted.is_empty());
    assert!(report.reaped.is_empty());
    assert!(report.orphans_removed.is_empty());
    assert_eq!(env.registry.len(), 1);
}

#[tokio::test]
async fn test_reconcile_reaps_agents_past_max_age() {
    let env = TestEnv::new();
    let container = env.pool.create_agent(&create_request()).await.unwrap();
    let id = container.id().unwrap().clone();

    let later = Utc::now() + ChronoDuration::hours(2);
    let report = env.pool.reconcile_at(later).await.unwrap();

    assert_eq!(report.reaped, vec![id.clone()]);
    assert!(report.orphans_removed.is_empty());
    assert_eq!(report.failures, 0);
    assert!(env.registry.is_empty());
    assert!(env.engine.container_ids().is_empty());

    // Terminated exactly once
    let (stops, removes) = env
        .engine
        .with(|s| (s.stop_calls.len(), s.remove_calls.clone()));
    assert_eq!(stops, 1);
    assert_eq!(removes, vec![id.to_string()]);
}

#[tokio::test]
async fn test_reconcile_reaps_and_removes_orphans_in_one_pass() {
    let env = TestEnv::new();
    let now = Utc::now();
    let container = env.pool.create_agent(&create_request()).await.unwrap();
    let agent = container.id().unwrap().clone();
    env.engine.seed_container("orphan", now - ChronoDuration::hours(1), true);

    let report = env
        .pool
        .reconcile_at(now + ChronoDuration::hours(2))
        .await
        .unwrap();

    assert_eq!(report.reaped, vec![agent.clone()]);
    assert_eq!(report.orphans_removed, vec![ContainerId::new("orphan")]);
    assert!(report.evicted.is_empty());
    assert_eq!(report.failures, 0);

    let mut stopped: Vec<String> = env
        .engine
        .with(|s| s.stop_calls.iter().map(|(id, _)| id.clone()).collect());
    stopped.sort();
    let mut expected = vec![agent.to_string(), "orphan".to_string()];
    expected.sort();
    assert_eq!(stopped, expected);
    assert!(env.engine.container_ids().is_empty());
    assert!(env.registry.is_empty());
}

#[tokio::test]
async fn test_reconcile_caches_creation_time() {
    let env = TestEnv::new();
    let container = env.pool.create_agent(&create_request()).await.unwrap();
    let id = container.id().unwrap().clone();
    assert!(env.registry.get(&id).unwrap().created_at().is_none());

    env.pool.reconcile().await.unwrap();

    assert!(env.registry.get(&id).unwrap().created_at().is_some());
}

#[tokio::test]
async fn test_reconcile_removes_old_orphans_only() {
    let env = TestEnv::new();
    let now = Utc::now();
    env.engine.seed_container("orphan-old", now - ChronoDuration::hours(1), true);
    env.engine.seed_container("orphan-new", now - ChronoDuration::seconds(30), true);
    env.engine.seed_container("foreign", now - ChronoDuration::days(3), false);

    let report = env.pool.reconcile_at(now).await.unwrap();

    assert_eq!(report.orphans_removed, vec![ContainerId::new("orphan-old")]);
    assert_eq!(
        env.engine.container_ids(),
        vec!["foreign".to_string(), "orphan-new".to_string()]
    );
    assert!(env.registry.is_empty());
}

#[tokio::test]
async fn test_reconcile_continues_past_inspect_failure() {
    let env = TestEnv::new();
    let broken = env.pool.create_agent(&create_request()).await.unwrap();
    let broken = broken.id().unwrap().clone();
    let vanished = env.pool.create_agent(&create_request()).await.unwrap();
    let vanished = vanished.id().unwrap().clone();
    env.engine.remove_out_of_band(broken.as_str());
    env.engine.remove_out_of_band(vanished.as_str());
    env.engine
        .with(|s| s.failing_inspects.push(broken.to_string()));

    let report = env.pool.reconcile().await.unwrap();

    assert_eq!(report.failures, 1);
    assert_eq!(report.evicted, vec![vanished.clone()]);
    assert!(env.registry.contains(&broken));
    assert!(!env.registry.contains(&vanished));

    // Retried on the next pass once the engine answers again
    env.engine.with(|s| s.failing_inspects.clear());
    let report = env.pool.reconcile().await.unwrap();
    assert_eq!(report.failures, 0);
    assert_eq!(report.evicted, vec![broken.clone()]);
    assert!(env.registry.is_empty());
}

#[tokio::test]
async fn test_reconcile_fails_when_engine_unavailable() {
    let env = TestEnv::new();
    env.engine.with(|s| s.unavailable = true);

    let err = env.pool.reconcile().await.unwrap_err();
    assert!(matches!(err, AgentError::EngineUnavailable(_)));
}

#[tokio::test]
async fn test_recover_registers_labeled_containers() {
    let env = TestEnv::new();
    let created = Utc::now() - ChronoDuration::minutes(5);
    env.engine.seed_container("agent-a", created, true);
    env.engine.seed_container("agent-b", created, true);
    env.engine.seed_container("unrelated", created, false);

    let recovered = env.pool.recover().await.unwrap();

    assert_eq!(recovered, 2);
    let a = env.registry.get(&ContainerId::new("agent-a")).unwrap();
    assert_eq!(a.created_at(), Some(created));
    assert!(!env.registry.contains(&ContainerId::new("unrelated")));

    // Already registered entries are not counted twice
    assert_eq!(env.pool.recover().await.unwrap(), 0);
}

#[tokio::test]
async fn test_health_of_created_agent() {
    let env = TestEnv::new();
    let container = env.pool.create_agent(&create_request()).await.unwrap();
    let id = container.id().unwrap().clone();

    let health = env.pool.health(&id).await.unwrap();
    assert_eq!(
        serde_json::to_value(&health).unwrap(),
        serde_json::json!({ "status": "healthy" })
    );

    let err = env.pool.health(&ContainerId::new("missing")).await.unwrap_err();
    assert!(matches!(err, AgentError::NotFound(_)));
}

#[tokio::test]
async fn test_health_refuses_unowned_container() {
    let env = TestEnv::new();
    env.engine.seed_container("foreign", Utc::now(), false);

    let err = env.pool.health(&ContainerId::new("foreign")).await.unwrap_err();

    assert!(matches!(err, AgentError::NotFound(_)));
    assert!(env.engine.exec_calls().is_empty());
}

#[tokio::test]
async fn test_registry_snapshot_matches_created_agents() {
    let env = TestEnv::new();
    let first = env.pool.create_agent(&create_request()).await.unwrap();
    let second = env.pool.create_agent(&create_request()).await.unwrap();

    let snapshot = env.registry.snapshot();

    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.contains(&first));
    assert!(snapshot.contains(&second));
    assert!(!snapshot.contains(&AgentContainer::pending()));
}

#[tokio::test]
async fn test_reaper_reconciles_in_background() {
    use docker_elastic_agents_core::application::reaper::{Reaper, ReaperConfig};
    use std::sync::Arc;

    let env = TestEnv::new();
    let container = env.pool.create_agent(&create_request()).await.unwrap();
    let id = container.id().unwrap().clone();
    env.engine.remove_out_of_band(id.as_str());

    let reaper = Arc::new(Reaper::new(
        env.pool.clone(),
        ReaperConfig {
            interval: Duration::from_millis(10),
            enabled: true,
        },
    ));
    let token = reaper.shutdown_token();
    let handle = reaper.start();

    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();
    handle.await.unwrap();

    assert!(!env.registry.contains(&id));
}

#[tokio::test]
async fn test_disabled_reaper_exits_immediately() {
    use docker_elastic_agents_core::application::reaper::{Reaper, ReaperConfig};
    use std::sync::Arc;

    let env = TestEnv::new();
    let reaper = Arc::new(Reaper::new(
        env.pool.clone(),
        ReaperConfig {
            interval: Duration::from_secs(60),
            enabled: false,
        },
    ));

    reaper.start().await.unwrap();
}
