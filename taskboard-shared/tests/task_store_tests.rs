/// Integration tests for task operations: policy, audit and notifications
///
/// Run with: cargo test --test task_store_tests

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{count, create_task, manager, test_store, user};
use taskboard_shared::events::{ChangeKind, Subscription};
use taskboard_shared::models::activity_log::CreateActivityLog;
use taskboard_shared::models::task::{CreateTask, Task, TaskFilter, TaskStatus, UpdateTask};
use taskboard_shared::models::EntityKind;
use taskboard_shared::StoreError;
use uuid::Uuid;

fn drain(sub: &mut Subscription) -> Vec<taskboard_shared::events::ChangeEvent> {
    std::iter::from_fn(|| sub.try_recv()).collect()
}

#[tokio::test]
async fn test_non_manager_cannot_create_tasks() {
    let store = test_store().await;
    let u = user(&store, "user@example.com").await;
    let mut events = store.notifier().subscribe(EntityKind::Task);

    let result = store
        .create_task(
            u,
            CreateTask {
                title: "Sneaky".to_string(),
                created_by: u,
                ..CreateTask::default()
            },
        )
        .await;

    assert!(matches!(result, Err(StoreError::Unauthorized)));
    assert_eq!(count(&store, "tasks").await, 0);
    assert_eq!(count(&store, "activity_log").await, 0);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn test_authorization_checked_before_validation() {
    let store = test_store().await;
    let u = user(&store, "user@example.com").await;

    // invalid title and priority, but the role check comes first
    let result = store
        .create_task(
            u,
            CreateTask {
                title: String::new(),
                priority: 9,
                created_by: u,
                ..CreateTask::default()
            },
        )
        .await;

    assert!(matches!(result, Err(StoreError::Unauthorized)));
}

#[tokio::test]
async fn test_manager_cannot_create_on_behalf_of_others() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;
    let other = manager(&store, "other@example.com").await;

    let result = store
        .create_task(
            m,
            CreateTask {
                title: "Not mine".to_string(),
                created_by: other,
                ..CreateTask::default()
            },
        )
        .await;

    assert!(matches!(result, Err(StoreError::Unauthorized)));
}

#[tokio::test]
async fn test_create_rejects_invalid_columns() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;

    let cases = [
        (CreateTask { title: String::new(), ..Default::default() }, "title"),
        (CreateTask { title: "x".repeat(201), ..Default::default() }, "title"),
        (
            CreateTask { title: "ok".into(), description: Some("d".repeat(2001)), ..Default::default() },
            "description",
        ),
        (CreateTask { title: "ok".into(), priority: 0, ..Default::default() }, "priority"),
        (CreateTask { title: "ok".into(), priority: 6, ..Default::default() }, "priority"),
        (
            CreateTask { title: "ok".into(), assigned_to: Some(Uuid::new_v4()), ..Default::default() },
            "assigned_to",
        ),
    ];

    for (mut data, expected) in cases {
        data.created_by = m;
        match store.create_task(m, data).await {
            Err(StoreError::ConstraintViolation { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected violation on {}, got {:?}", expected, other),
        }
    }

    assert_eq!(count(&store, "tasks").await, 0);
    assert_eq!(count(&store, "activity_log").await, 0);
}

#[tokio::test]
async fn test_create_applies_defaults_and_audits() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;

    let task = create_task(&store, m, None, "Draft roadmap").await;
    assert_eq!(task.status, TaskStatus::Todo);
    assert_eq!(task.priority, 3);
    assert_eq!(task.created_by, m);

    let log = store.list_task_activity(m, task.id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action, "created");
    assert_eq!(log[0].user_id, Some(m));
    assert!(log[0].old_value.is_none());

    let snapshot: Task = serde_json::from_value(log[0].new_value.clone().unwrap()).unwrap();
    assert_eq!(snapshot, task);
}

#[tokio::test]
async fn test_read_visibility() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;
    let u = user(&store, "u@example.com").await;
    let outsider = manager(&store, "outsider@example.com").await;

    let task = create_task(&store, m, Some(u), "Draft roadmap").await;

    assert_eq!(store.get_task(m, task.id).await.unwrap(), task);
    assert_eq!(store.get_task(u, task.id).await.unwrap(), task);
    assert!(matches!(
        store.get_task(outsider, task.id).await,
        Err(StoreError::NotFound(_))
    ));
    // a missing task looks exactly like an invisible one
    assert!(matches!(
        store.get_task(m, Uuid::new_v4()).await,
        Err(StoreError::NotFound(_))
    ));

    assert_eq!(store.list_tasks(m, &TaskFilter::default()).await.unwrap().len(), 1);
    assert_eq!(store.list_tasks(u, &TaskFilter::default()).await.unwrap().len(), 1);
    assert!(store.list_tasks(outsider, &TaskFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_filters_and_order() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;
    let u = user(&store, "u@example.com").await;

    let first = create_task(&store, m, Some(u), "First").await;
    let second = create_task(&store, m, None, "Second").await;
    store.update_task_status(m, second.id, TaskStatus::InProgress).await.unwrap();

    let all = store.list_tasks(m, &TaskFilter::default()).await.unwrap();
    assert_eq!(
        all.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );

    let in_progress = store
        .list_tasks(m, &TaskFilter { status: Some(TaskStatus::InProgress), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(in_progress.len(), 1);
    assert_eq!(in_progress[0].id, second.id);

    let assigned = store
        .list_tasks(m, &TaskFilter { assigned_to: Some(u), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].id, first.id);
}

#[tokio::test]
async fn test_update_then_read_round_trip() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;
    let u = user(&store, "u@example.com").await;
    let task = create_task(&store, m, None, "Draft").await;

    let due = Utc.with_ymd_and_hms(2030, 5, 17, 9, 30, 0).unwrap();
    let updated = store
        .update_task(
            m,
            task.id,
            UpdateTask {
                title: Some("Final".to_string()),
                description: Some(Some("All sections".to_string())),
                priority: Some(5),
                assigned_to: Some(Some(u)),
                due_date: Some(Some(due)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let read = store.get_task(m, task.id).await.unwrap();
    assert_eq!(read, updated);
    assert_eq!(read.title, "Final");
    assert_eq!(read.description.as_deref(), Some("All sections"));
    assert_eq!(read.priority, 5);
    assert_eq!(read.assigned_to, Some(u));
    assert_eq!(read.due_date, Some(due));
    assert_eq!(read.created_by, m);
    assert_eq!(read.created_at, task.created_at);

    // explicit nulls clear nullable columns
    let cleared = store
        .update_task(
            m,
            task.id,
            UpdateTask {
                description: Some(None),
                due_date: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.description, None);
    assert_eq!(cleared.due_date, None);
    assert_eq!(cleared.title, "Final");
}

#[tokio::test]
async fn test_every_accepted_mutation_writes_one_matching_entry() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;
    let task = create_task(&store, m, None, "Audit me").await;

    let before = store.get_task(m, task.id).await.unwrap();
    let after = store
        .update_task(m, task.id, UpdateTask { priority: Some(1), ..Default::default() })
        .await
        .unwrap();

    let log = store.list_task_activity(m, task.id).await.unwrap();
    assert_eq!(log.len(), 2);

    let entry = &log[1];
    assert_eq!(entry.action, "updated");
    let old: Task = serde_json::from_value(entry.old_value.clone().unwrap()).unwrap();
    let new: Task = serde_json::from_value(entry.new_value.clone().unwrap()).unwrap();
    assert_eq!(old, before);
    assert_eq!(new, after);
}

#[tokio::test]
async fn test_assignee_completes_task_scenario() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;
    let u = user(&store, "u@example.com").await;

    let task = store
        .create_task(
            m,
            CreateTask {
                title: "Draft roadmap".to_string(),
                priority: 3,
                created_by: m,
                assigned_to: Some(u),
                ..CreateTask::default()
            },
        )
        .await
        .unwrap();

    let mut events = store.notifier().subscribe(EntityKind::Task);

    let done = store
        .update_task_status(u, task.id, TaskStatus::Completed)
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Completed);

    let log = store.list_task_activity(u, task.id).await.unwrap();
    let entry = log.last().unwrap();
    assert_eq!(entry.action, "updated");
    assert_eq!(entry.user_id, Some(u));
    assert_eq!(entry.old_value.as_ref().unwrap()["status"], "todo");
    assert_eq!(entry.new_value.as_ref().unwrap()["status"], "completed");

    let fired = drain(&mut events);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].change, ChangeKind::Update);
    assert_eq!(fired[0].record_as::<Task>().unwrap(), done);
}

#[tokio::test]
async fn test_assignee_may_edit_but_not_reassign() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;
    let u = user(&store, "u@example.com").await;
    let v = user(&store, "v@example.com").await;
    let task = create_task(&store, m, Some(u), "Shared").await;

    // no column restriction for assignees
    let renamed = store
        .update_task(u, task.id, UpdateTask { title: Some("Renamed".into()), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(renamed.title, "Renamed");

    let handoff = store
        .update_task(u, task.id, UpdateTask { assigned_to: Some(Some(v)), ..Default::default() })
        .await;
    assert!(matches!(handoff, Err(StoreError::Unauthorized)));

    let unassign = store
        .update_task(u, task.id, UpdateTask { assigned_to: Some(None), ..Default::default() })
        .await;
    assert!(matches!(unassign, Err(StoreError::Unauthorized)));

    assert_eq!(store.get_task(m, task.id).await.unwrap().assigned_to, Some(u));
}

#[tokio::test]
async fn test_update_denials() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;
    let other_manager = manager(&store, "m2@example.com").await;
    let u = user(&store, "u@example.com").await;
    let task = create_task(&store, m, Some(u), "Mine").await;

    // invisible to the other manager
    assert!(matches!(
        store.update_task_status(other_manager, task.id, TaskStatus::Completed).await,
        Err(StoreError::NotFound(_))
    ));

    // visible and editable, but invalid
    match store
        .update_task(u, task.id, UpdateTask { priority: Some(7), ..Default::default() })
        .await
    {
        Err(StoreError::ConstraintViolation { field, .. }) => assert_eq!(field, "priority"),
        other => panic!("expected priority violation, got {:?}", other),
    }

    match store
        .update_task(m, task.id, UpdateTask { assigned_to: Some(Some(Uuid::new_v4())), ..Default::default() })
        .await
    {
        Err(StoreError::ConstraintViolation { field, .. }) => assert_eq!(field, "assigned_to"),
        other => panic!("expected assigned_to violation, got {:?}", other),
    }

    assert_eq!(store.list_task_activity(m, task.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_audit_rolls_back_update() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;
    let task = create_task(&store, m, None, "Fragile").await;
    let mut events = store.notifier().subscribe(EntityKind::Task);

    sqlx::query(
        "CREATE TRIGGER reject_activity BEFORE INSERT ON activity_log \
         BEGIN SELECT RAISE(ABORT, 'activity log unavailable'); END",
    )
    .execute(store.pool())
    .await
    .unwrap();

    let result = store.update_task_status(m, task.id, TaskStatus::Completed).await;
    assert!(matches!(result, Err(StoreError::TransactionFailure(_))));

    assert_eq!(store.get_task(m, task.id).await.unwrap().status, TaskStatus::Todo);
    assert_eq!(count(&store, "activity_log").await, 1);
    assert!(drain(&mut events).is_empty());

    // same for inserts
    let created = store
        .create_task(m, CreateTask { title: "Never".into(), created_by: m, ..Default::default() })
        .await;
    assert!(matches!(created, Err(StoreError::TransactionFailure(_))));
    assert_eq!(count(&store, "tasks").await, 1);
}

#[tokio::test]
async fn test_delete_task_cascades_activity() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;
    let u = user(&store, "u@example.com").await;
    let task = create_task(&store, m, Some(u), "Temporary").await;
    store.update_task_status(u, task.id, TaskStatus::InProgress).await.unwrap();
    assert_eq!(count(&store, "activity_log").await, 2);

    assert!(matches!(
        store.delete_task(u, task.id).await,
        Err(StoreError::Unauthorized)
    ));

    let mut events = store.notifier().subscribe(EntityKind::Task);
    store.delete_task(m, task.id).await.unwrap();

    assert_eq!(count(&store, "tasks").await, 0);
    assert_eq!(count(&store, "activity_log").await, 0);
    assert!(matches!(
        store.get_task(m, task.id).await,
        Err(StoreError::NotFound(_))
    ));

    let fired = drain(&mut events);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].change, ChangeKind::Delete);

    assert!(matches!(
        store.delete_task(m, task.id).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_activity_visibility_follows_current_task() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;
    let u = user(&store, "u@example.com").await;
    let v = user(&store, "v@example.com").await;
    let task = create_task(&store, m, Some(u), "Moving").await;
    store.update_task_status(u, task.id, TaskStatus::InProgress).await.unwrap();

    assert_eq!(store.list_task_activity(u, task.id).await.unwrap().len(), 2);
    assert!(matches!(
        store.list_task_activity(v, task.id).await,
        Err(StoreError::NotFound(_))
    ));

    store
        .update_task(m, task.id, UpdateTask { assigned_to: Some(Some(v)), ..Default::default() })
        .await
        .unwrap();

    // u wrote one of the entries but no longer sees any of them
    assert!(matches!(
        store.list_task_activity(u, task.id).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(store.list_recent_activity(u, 50).await.unwrap().is_empty());
    assert_eq!(store.list_task_activity(v, task.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_recent_activity_is_newest_first_and_limited() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;
    let other = manager(&store, "other@example.com").await;

    let a = create_task(&store, m, None, "A").await;
    let b = create_task(&store, m, None, "B").await;
    create_task(&store, other, None, "Not visible").await;
    store.update_task_status(m, a.id, TaskStatus::Completed).await.unwrap();

    let recent = store.list_recent_activity(m, 10).await.unwrap();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].task_id, a.id);
    assert_eq!(recent[0].action, "updated");
    assert_eq!(recent[1].task_id, b.id);

    assert_eq!(store.list_recent_activity(m, 2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_log_activity_rules() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;
    let u = user(&store, "u@example.com").await;
    let outsider = user(&store, "o@example.com").await;
    let task = create_task(&store, m, Some(u), "Discussed").await;

    let entry = store
        .log_activity(
            u,
            CreateActivityLog {
                task_id: task.id,
                user_id: Some(u),
                action: "commented".to_string(),
                old_value: None,
                new_value: Some(serde_json::json!({"text": "On it"})),
            },
        )
        .await
        .unwrap();
    assert_eq!(entry.action, "commented");

    let impersonated = store
        .log_activity(
            u,
            CreateActivityLog {
                task_id: task.id,
                user_id: Some(m),
                action: "commented".to_string(),
                old_value: None,
                new_value: None,
            },
        )
        .await;
    assert!(matches!(impersonated, Err(StoreError::Unauthorized)));

    let foreign = store
        .log_activity(
            outsider,
            CreateActivityLog {
                task_id: task.id,
                user_id: Some(outsider),
                action: "commented".to_string(),
                old_value: None,
                new_value: None,
            },
        )
        .await;
    assert!(matches!(foreign, Err(StoreError::NotFound(_))));

    assert_eq!(store.list_task_activity(m, task.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_task_stats_cover_visible_tasks() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;
    let other = manager(&store, "other@example.com").await;

    let late = store
        .create_task(
            m,
            CreateTask {
                title: "Late".into(),
                created_by: m,
                due_date: Some(Utc::now() - Duration::days(2)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let done = create_task(&store, m, None, "Done").await;
    store.update_task_status(m, done.id, TaskStatus::Completed).await.unwrap();
    create_task(&store, other, None, "Elsewhere").await;

    let stats = store.task_stats(m).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.todo, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.in_progress, 0);
    assert_eq!(stats.overdue, 1);

    store.update_task_status(m, late.id, TaskStatus::Completed).await.unwrap();
    assert_eq!(store.task_stats(m).await.unwrap().overdue, 0);
}

#[tokio::test]
async fn test_lists_stay_within_callers_tasks() {
    let store = test_store().await;
    let m = manager(&store, "m@example.com").await;
    let other = manager(&store, "other@example.com").await;
    let u = user(&store, "u@example.com").await;

    let mine = create_task(&store, m, Some(u), "Mine").await;
    let theirs = create_task(&store, other, None, "Theirs").await;
    // newest entry overall belongs to a task m cannot see
    store.update_task_status(other, theirs.id, TaskStatus::Completed).await.unwrap();

    let listed = store.list_tasks(m, &TaskFilter::default()).await.unwrap();
    assert_eq!(listed.iter().map(|t| t.id).collect::<Vec<_>>(), vec![mine.id]);

    // filters narrow the caller's own tasks, never widen them
    let by_other = store
        .list_tasks(m, &TaskFilter { created_by: Some(other), ..Default::default() })
        .await
        .unwrap();
    assert!(by_other.is_empty());
    let completed = store
        .list_tasks(m, &TaskFilter { status: Some(TaskStatus::Completed), ..Default::default() })
        .await
        .unwrap();
    assert!(completed.is_empty());

    let as_assignee = store
        .list_tasks(u, &TaskFilter { created_by: Some(m), status: Some(TaskStatus::Todo), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(as_assignee.len(), 1);

    let recent = store.list_recent_activity(m, 1).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].task_id, mine.id);
    assert_eq!(store.list_recent_activity(m, 0).await.unwrap().len(), 0);

    let stats = store.task_stats(m).await.unwrap();
    assert_eq!(stats.total, 1);
}
