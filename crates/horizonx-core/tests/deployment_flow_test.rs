// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end deployment orchestration over the event bus.
//!
//! The listener must mirror deploy-job lifecycle events onto the owning
//! deployment: `job_started` moves it to deploying, `job_finished` settles
//! it to the job's terminal status.

mod common;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use horizonx_core::bus::{Bus, topics};
use horizonx_core::domain::events::{JobEvent, JobFinished};
use horizonx_core::domain::{
    DeploymentCreateRequest, DeploymentStatus, Event, JobStatus, JobType,
};
use horizonx_core::services::{DeploymentListener, DeploymentService};

use common::FakeDeploymentRepo;

struct Fixture {
    bus: Arc<Bus>,
    deployments: Arc<DeploymentService>,
}

async fn fixture() -> Fixture {
    let bus = Arc::new(Bus::new());
    let deployments = Arc::new(DeploymentService::new(
        Arc::new(FakeDeploymentRepo::default()),
        bus.clone(),
    ));
    let listener = Arc::new(DeploymentListener::new(deployments.clone()));
    listener.register(&bus);
    Fixture { bus, deployments }
}

fn deploy_job_event(deployment_id: i64, job_type: JobType) -> JobEvent {
    JobEvent {
        job_id: 10,
        trace_id: Uuid::new_v4(),
        server_id: Uuid::new_v4(),
        application_id: Some(1),
        deployment_id: Some(deployment_id),
        job_type,
    }
}

/// Listener handlers hand work to spawned tasks; poll until the transition
/// lands or the deadline passes.
async fn wait_for_status(
    fixture: &Fixture,
    deployment_id: i64,
    expected: DeploymentStatus,
) -> bool {
    for _ in 0..100 {
        let deployment = fixture.deployments.get(deployment_id).await.unwrap();
        if deployment.status == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_happy_path_settles_to_success() {
    let fixture = fixture().await;

    let deployment = fixture
        .deployments
        .create(DeploymentCreateRequest {
            application_id: 1,
            branch: "main".to_string(),
            deployed_by: 7,
        })
        .await
        .unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Pending);

    fixture.bus.publish(
        topics::JOB_STARTED,
        &Event::JobStarted(deploy_job_event(deployment.id, JobType::AppDeploy)),
    );
    assert!(wait_for_status(&fixture, deployment.id, DeploymentStatus::Deploying).await);

    let started = fixture.deployments.get(deployment.id).await.unwrap();
    assert!(started.started_at.is_some(), "started_at stamped on deploying");

    fixture.bus.publish(
        topics::JOB_FINISHED,
        &Event::JobFinished(JobFinished {
            job: deploy_job_event(deployment.id, JobType::AppDeploy),
            status: JobStatus::Success,
        }),
    );
    assert!(wait_for_status(&fixture, deployment.id, DeploymentStatus::Success).await);

    let finished = fixture.deployments.get(deployment.id).await.unwrap();
    assert!(finished.finished_at.is_some(), "finished_at stamped on settle");
}

#[tokio::test]
async fn test_failed_job_settles_to_failed() {
    let fixture = fixture().await;

    let deployment = fixture
        .deployments
        .create(DeploymentCreateRequest {
            application_id: 1,
            branch: "main".to_string(),
            deployed_by: 7,
        })
        .await
        .unwrap();

    fixture.bus.publish(
        topics::JOB_STARTED,
        &Event::JobStarted(deploy_job_event(deployment.id, JobType::AppDeploy)),
    );
    assert!(wait_for_status(&fixture, deployment.id, DeploymentStatus::Deploying).await);

    fixture.bus.publish(
        topics::JOB_FINISHED,
        &Event::JobFinished(JobFinished {
            job: deploy_job_event(deployment.id, JobType::AppDeploy),
            status: JobStatus::Failed,
        }),
    );
    assert!(wait_for_status(&fixture, deployment.id, DeploymentStatus::Failed).await);
}

#[tokio::test]
async fn test_non_deploy_jobs_are_ignored() {
    let fixture = fixture().await;

    let deployment = fixture
        .deployments
        .create(DeploymentCreateRequest {
            application_id: 1,
            branch: "main".to_string(),
            deployed_by: 7,
        })
        .await
        .unwrap();

    fixture.bus.publish(
        topics::JOB_STARTED,
        &Event::JobStarted(deploy_job_event(deployment.id, JobType::AppHealthCheck)),
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    let unchanged = fixture.deployments.get(deployment.id).await.unwrap();
    assert_eq!(unchanged.status, DeploymentStatus::Pending);
}

#[tokio::test]
async fn test_jobs_without_deployment_are_ignored() {
    let fixture = fixture().await;

    let deployment = fixture
        .deployments
        .create(DeploymentCreateRequest {
            application_id: 1,
            branch: "main".to_string(),
            deployed_by: 7,
        })
        .await
        .unwrap();

    let mut event = deploy_job_event(deployment.id, JobType::AppDeploy);
    event.deployment_id = None;
    fixture
        .bus
        .publish(topics::JOB_STARTED, &Event::JobStarted(event));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let unchanged = fixture.deployments.get(deployment.id).await.unwrap();
    assert_eq!(unchanged.status, DeploymentStatus::Pending);
}

#[tokio::test]
async fn test_commit_info_publishes_event() {
    use std::sync::Mutex;

    let fixture = fixture().await;

    let received = Arc::new(Mutex::new(None));
    let seen = received.clone();
    fixture
        .bus
        .subscribe(topics::DEPLOYMENT_COMMIT_INFO_RECEIVED, move |event| {
            if let Event::DeploymentCommitInfoReceived(e) = event {
                *seen.lock().unwrap() = Some((e.commit_hash.clone(), e.commit_message.clone()));
            }
        });

    let deployment = fixture
        .deployments
        .create(DeploymentCreateRequest {
            application_id: 1,
            branch: "main".to_string(),
            deployed_by: 7,
        })
        .await
        .unwrap();

    fixture
        .deployments
        .update_commit_info(deployment.id, "abcdef12", "feat: add telemetry")
        .await
        .unwrap();

    let seen = received.lock().unwrap().clone();
    assert_eq!(
        seen,
        Some(("abcdef12".to_string(), "feat: add telemetry".to_string()))
    );

    let stored = fixture.deployments.get(deployment.id).await.unwrap();
    assert_eq!(stored.commit_hash.as_deref(), Some("abcdef12"));
}
