// Test-specific lint overrides: integration tests use unwrap/expect freely.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::missing_docs_in_private_items
)]

//! Integration tests for the task workflow engine.
//!
//! Drives the full state graph (stores + workflow service) through the
//! legal and illegal edges of the status state machine, checking that
//! rejected requests leave stored state untouched and that structural and
//! authorization rejections stay distinguishable.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::mpsc;

use taskhub_core::ids::{ProjectId, TaskId, UserId};
use taskhub_core::principal::{Principal, Project};
use taskhub_core::task::{Assignee, TaskStatus};
use taskhub_core::workflow::{RequiredRole, TransitionError};
use taskhub_server::http::AppState;
use taskhub_server::notify::AssignmentNotice;
use taskhub_server::workflow::{NewTask, TransitionRequest, WorkflowError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Fixture {
    state: Arc<AppState>,
    notices: mpsc::UnboundedReceiver<AssignmentNotice>,
    owner: Principal,
    project_id: ProjectId,
}

async fn make_fixture() -> Fixture {
    let (tx, notices) = mpsc::unbounded_channel();
    let state = Arc::new(AppState::new(tx));

    let owner = Principal {
        id: UserId::new("owner-1"),
        email: "owner@x.com".into(),
        name: "Olive".into(),
    };
    let project = Project {
        id: ProjectId::new(),
        owner_id: owner.id.clone(),
        name: "Website".into(),
        description: "Marketing site".into(),
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
    };
    let project_id = project.id;
    state.projects.insert(project).await;

    Fixture {
        state,
        notices,
        owner,
        project_id,
    }
}

fn bob() -> Principal {
    Principal {
        id: UserId::new("user-bob"),
        email: "bob@x.com".into(),
        name: "Bob".into(),
    }
}

fn bob_assignee() -> Assignee {
    Assignee {
        member_id: "m-bob".into(),
        name: "Bob".into(),
        email: "bob@x.com".into(),
    }
}

fn assign_bob() -> TransitionRequest {
    TransitionRequest {
        assignee: Some(bob_assignee()),
        ..Default::default()
    }
}

async fn create_task(fx: &Fixture) -> TaskId {
    let task = fx
        .state
        .workflow
        .create_task(
            &fx.owner,
            NewTask {
                project_id: fx.project_id,
                name: "Landing page".into(),
                description: "Build the landing page".into(),
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                comment: None,
            },
        )
        .await
        .unwrap();
    task.id
}

async fn status_of(fx: &Fixture, task_id: TaskId) -> TaskStatus {
    fx.state.tasks.get(task_id).await.unwrap().status
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_a_owner_assigns_bob_via_pending_to_in_progress() {
    let fx = make_fixture().await;
    let task_id = create_task(&fx).await;

    let task = fx
        .state
        .workflow
        .transition(task_id, &fx.owner, TaskStatus::InProgress, assign_bob())
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(
        task.assignee.as_ref().map(|a| a.email.as_str()),
        Some("bob@x.com")
    );
}

#[tokio::test]
async fn scenario_b_assignee_submits_review_owner_completes() {
    let fx = make_fixture().await;
    let task_id = create_task(&fx).await;
    fx.state
        .workflow
        .transition(task_id, &fx.owner, TaskStatus::InProgress, assign_bob())
        .await
        .unwrap();

    // Bob (matched by email) submits for review.
    let task = fx
        .state
        .workflow
        .transition(
            task_id,
            &bob(),
            TaskStatus::Review,
            TransitionRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Review);

    // Owner accepts.
    let task = fx
        .state
        .workflow
        .transition(
            task_id,
            &fx.owner,
            TaskStatus::Completed,
            TransitionRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Completed);

    // Terminal: no edge leaves completed.
    for to in [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Review] {
        let err = fx
            .state
            .workflow
            .transition(task_id, &fx.owner, to, TransitionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Transition(TransitionError::Invalid { .. })
        ));
        assert_eq!(status_of(&fx, task_id).await, TaskStatus::Completed);
    }
}

#[tokio::test]
async fn scenario_c_skipping_review_is_a_structural_error() {
    let fx = make_fixture().await;
    let task_id = create_task(&fx).await;
    fx.state
        .workflow
        .transition(task_id, &fx.owner, TaskStatus::InProgress, assign_bob())
        .await
        .unwrap();

    let err = fx
        .state
        .workflow
        .transition(
            task_id,
            &bob(),
            TaskStatus::Completed,
            TransitionRequest::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WorkflowError::Transition(TransitionError::Invalid {
            from: TaskStatus::InProgress,
            to: TaskStatus::Completed,
        })
    );
    assert_eq!(status_of(&fx, task_id).await, TaskStatus::InProgress);
}

#[tokio::test]
async fn scenario_d_owner_cannot_pull_back_to_pending() {
    let fx = make_fixture().await;
    let task_id = create_task(&fx).await;
    fx.state
        .workflow
        .transition(task_id, &fx.owner, TaskStatus::InProgress, assign_bob())
        .await
        .unwrap();

    let err = fx
        .state
        .workflow
        .transition(
            task_id,
            &fx.owner,
            TaskStatus::Pending,
            TransitionRequest::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WorkflowError::Transition(TransitionError::Unauthorized {
            required: RequiredRole::AssigneeOnly,
        })
    );
    // The message names the missing role.
    assert!(err.to_string().contains("assignee"));
    assert_eq!(status_of(&fx, task_id).await, TaskStatus::InProgress);
}

// ---------------------------------------------------------------------------
// Table properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn illegal_edges_leave_stored_status_unchanged() {
    let fx = make_fixture().await;
    let task_id = create_task(&fx).await;

    // pending -> completed is not in the table.
    let err = fx
        .state
        .workflow
        .transition(
            task_id,
            &fx.owner,
            TaskStatus::Completed,
            TransitionRequest::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Transition(TransitionError::Invalid { .. })
    ));
    assert_eq!(status_of(&fx, task_id).await, TaskStatus::Pending);
}

#[tokio::test]
async fn outsider_is_rejected_on_every_table_edge() {
    let fx = make_fixture().await;
    let task_id = create_task(&fx).await;
    let carol = Principal {
        id: UserId::new("user-carol"),
        email: "carol@x.com".into(),
        name: "Carol".into(),
    };

    let err = fx
        .state
        .workflow
        .transition(task_id, &carol, TaskStatus::InProgress, assign_bob())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Transition(TransitionError::Unauthorized { .. })
    ));
    assert_eq!(status_of(&fx, task_id).await, TaskStatus::Pending);
    assert!(fx.state.tasks.get(task_id).await.unwrap().assignee.is_none());
}

#[tokio::test]
async fn unassigned_task_cannot_reach_working_states() {
    let fx = make_fixture().await;
    let task_id = create_task(&fx).await;

    for to in [TaskStatus::InProgress, TaskStatus::Review] {
        let err = fx
            .state
            .workflow
            .transition(task_id, &fx.owner, to, TransitionRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err, WorkflowError::MissingAssignee { status: to });
        assert_eq!(status_of(&fx, task_id).await, TaskStatus::Pending);
    }
}

#[tokio::test]
async fn assignment_bearing_transition_sends_notification() {
    let mut fx = make_fixture().await;
    let task_id = create_task(&fx).await;

    fx.state
        .workflow
        .transition(task_id, &fx.owner, TaskStatus::InProgress, assign_bob())
        .await
        .unwrap();

    let notice = fx.notices.try_recv().unwrap();
    assert_eq!(notice.email, "bob@x.com");
    assert_eq!(notice.task_name, "Landing page");
    assert_eq!(notice.description, "Build the landing page");
}

#[tokio::test]
async fn delete_is_owner_only_and_status_independent() {
    let fx = make_fixture().await;
    let task_id = create_task(&fx).await;
    fx.state
        .workflow
        .transition(task_id, &fx.owner, TaskStatus::InProgress, assign_bob())
        .await
        .unwrap();

    // The assignee may not delete, whatever the status.
    let err = fx
        .state
        .workflow
        .delete_task(task_id, &bob())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WorkflowError::OwnerRequired {
            action: "delete a task"
        }
    );
    assert!(fx.state.tasks.get(task_id).await.is_some());

    // The owner may, even mid-flight.
    fx.state
        .workflow
        .delete_task(task_id, &fx.owner)
        .await
        .unwrap();
    assert!(fx.state.tasks.get(task_id).await.is_none());
}

#[tokio::test]
async fn transitions_refresh_update_timestamp_and_log_comments() {
    let fx = make_fixture().await;
    let task_id = create_task(&fx).await;
    let before = fx.state.tasks.get(task_id).await.unwrap();

    let task = fx
        .state
        .workflow
        .transition(
            task_id,
            &fx.owner,
            TaskStatus::InProgress,
            TransitionRequest {
                comment: Some("kicking off".into()),
                assignee: Some(bob_assignee()),
                file: Some("uploads/brief.pdf".into()),
            },
        )
        .await
        .unwrap();

    assert!(task.updated_at >= before.updated_at);
    assert_eq!(task.latest_comment(), Some("kicking off"));
    assert_eq!(task.comments[0].author, fx.owner.id);
    assert_eq!(task.files, vec!["uploads/brief.pdf".to_string()]);
}

#[tokio::test]
async fn rework_from_review_records_default_comment() {
    let fx = make_fixture().await;
    let task_id = create_task(&fx).await;
    fx.state
        .workflow
        .transition(task_id, &fx.owner, TaskStatus::InProgress, assign_bob())
        .await
        .unwrap();
    fx.state
        .workflow
        .transition(
            task_id,
            &bob(),
            TaskStatus::Review,
            TransitionRequest::default(),
        )
        .await
        .unwrap();

    let task = fx
        .state
        .workflow
        .transition(
            task_id,
            &fx.owner,
            TaskStatus::InProgress,
            TransitionRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.latest_comment(), Some("moved back to in-progress"));
}

#[tokio::test]
async fn missing_task_and_project_report_not_found() {
    let fx = make_fixture().await;

    let err = fx
        .state
        .workflow
        .transition(
            TaskId::new(),
            &fx.owner,
            TaskStatus::InProgress,
            TransitionRequest::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err, WorkflowError::NotFound { what: "task" });

    let err = fx
        .state
        .workflow
        .create_task(
            &fx.owner,
            NewTask {
                project_id: ProjectId::new(),
                name: "Orphan".into(),
                description: "".into(),
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                comment: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, WorkflowError::NotFound { what: "project" });
}
