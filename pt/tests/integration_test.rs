//! Integration tests for Prontu
//!
//! These tests drive the StateManager end to end against a real database file.

use prontu::state::{StateError, StateEvent, StateManager};
use prontu::transfer::{export_plan, read_plan_document};
use prontustore::{ParentRef, PlanNode, TaskId, builtin_catalog};
use tempfile::TempDir;

fn spawn(temp: &TempDir) -> StateManager {
    StateManager::spawn(temp.path().join("data").join("prontu.db")).expect("Failed to spawn state manager")
}

fn titles(tasks: &[prontustore::Task]) -> Vec<String> {
    tasks.iter().map(|t| t.title.clone()).collect()
}

// =============================================================================
// Task lifecycle
// =============================================================================

#[tokio::test]
async fn test_add_get_delete_scenario() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = spawn(&temp);

    let train = state.add_task("Train", ParentRef::Root, false).await.unwrap();
    assert_eq!(train.id, TaskId(1));

    let stretch = state.add_task("Stretch", ParentRef::Task(train.id), false).await.unwrap();
    assert_eq!(stretch.id, TaskId(2));
    assert_eq!(stretch.parent_id.as_key(), "1");
    assert_eq!(stretch.order, 1.0);

    let children = state.get_tasks("1".parse().unwrap()).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].title, "Stretch");

    state.delete_task(TaskId(1)).await.unwrap();
    assert!(state.get_tasks(ParentRef::Root).await.unwrap().is_empty());
    assert!(state.get_tasks(ParentRef::Task(TaskId(1))).await.unwrap().is_empty());

    state.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_data_survives_restart() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    let state = spawn(&temp);
    let a = state.add_task("Ginga", ParentRef::Root, false).await.unwrap();
    state.add_task("Au", ParentRef::Task(a.id), true).await.unwrap();
    state.save_plan("Kept", "across restarts").await.unwrap();
    state.shutdown().await.unwrap();
    // Let the actor close its connection
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let state = spawn(&temp);
    let tree = state.task_tree(ParentRef::Root).await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].progress(), (1, 1));

    let plans = state.list_plans().await.unwrap();
    assert_eq!(plans.iter().filter(|p| p.is_custom).count(), 1);
    assert_eq!(
        plans.iter().filter(|p| !p.is_custom).count(),
        builtin_catalog().unwrap().len()
    );
    state.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_drag_and_drop_session() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = spawn(&temp);

    let week = state.add_task("Week", ParentRef::Root, false).await.unwrap();
    let mon = state.add_task("Mon", ParentRef::Task(week.id), false).await.unwrap();
    let wed = state.add_task("Wed", ParentRef::Task(week.id), false).await.unwrap();
    let later = state.add_task("Later", ParentRef::Root, false).await.unwrap();

    let mut week_children = state.watch_tasks(ParentRef::Task(week.id)).await.unwrap();
    let mut root_children = state.watch_tasks(ParentRef::Root).await.unwrap();
    week_children.borrow_and_update();
    root_children.borrow_and_update();

    // Drag a root task into the week, in front of Wed
    let change = state.move_task(later.id, Some(wed.id)).await.unwrap().unwrap();
    assert!(change.reparented());

    assert_eq!(titles(&week_children.borrow_and_update()), vec!["Mon", "Later", "Wed"]);
    assert_eq!(titles(&root_children.borrow_and_update()), vec!["Week"]);

    // Dropping with no target does nothing
    assert!(state.move_task(mon.id, None).await.unwrap().is_none());
    assert!(!week_children.has_changed().unwrap());

    // A task cannot be dropped inside its own subtree
    let err = state.move_task(week.id, Some(mon.id)).await.unwrap_err();
    assert!(matches!(err, StateError::Validation(_)));

    state.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_events_follow_writes() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = spawn(&temp);
    let mut events = state.subscribe_events();

    let a = state.add_task("A", ParentRef::Root, false).await.unwrap();
    state.set_completed(a.id, true).await.unwrap();
    state.clear_tasks().await.unwrap();
    state.seed_plans().await.unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        StateEvent::TaskCreated {
            id: a.id,
            parent: ParentRef::Root
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        StateEvent::TaskUpdated {
            id: a.id,
            parents: vec![ParentRef::Root]
        }
    );
    assert_eq!(events.recv().await.unwrap(), StateEvent::TasksCleared { count: 1 });
    assert_eq!(events.recv().await.unwrap(), StateEvent::PlansChanged);

    state.shutdown().await.unwrap();
}

// =============================================================================
// Plans
// =============================================================================

#[tokio::test]
async fn test_save_clear_load_cycle() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = spawn(&temp);

    let a = state.add_task("Warm-up", ParentRef::Root, false).await.unwrap();
    state.add_task("Jumping jacks", ParentRef::Task(a.id), true).await.unwrap();
    state.add_task("Roda", ParentRef::Root, false).await.unwrap();

    let plan = state.save_plan("Tuesday", "evening class").await.unwrap();
    assert_eq!(plan.task_count(), 3);
    assert_eq!(state.snapshot_tasks().await.unwrap(), plan.tasks);

    state.clear_tasks().await.unwrap();
    let root = state.load_plan(plan.id).await.unwrap();

    let top = state.get_tasks(ParentRef::Root).await.unwrap();
    assert_eq!(titles(&top), vec!["Tuesday"]);
    let tree = state.task_tree(ParentRef::Task(root)).await.unwrap();
    assert_eq!(tree.len(), 2);
    assert_eq!(tree[0].task.title, "Warm-up");
    assert!(tree[0].children[0].task.completed);

    state.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_export_import_round_trip() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = spawn(&temp);

    let original = state
        .add_plan(
            "Flow Drills",
            "ten minutes each",
            vec![PlanNode::new("Ginga").with_children(vec![PlanNode::new("Esquiva").with_completed(false)])],
        )
        .await
        .unwrap();

    let path = export_plan(&original, &temp.path().join("exports")).unwrap();
    let imported = state.import_plan(read_plan_document(&path).unwrap()).await.unwrap();

    assert_ne!(imported.id, original.id);
    assert!(imported.is_custom);
    assert_eq!(imported.title, original.title);
    assert_eq!(imported.description, original.description);
    assert_eq!(imported.tasks, original.tasks);

    state.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_restore_keeps_custom_plans() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let state = spawn(&temp);

    let builtin_before: Vec<String> = state
        .list_plans()
        .await
        .unwrap()
        .into_iter()
        .filter(|p| !p.is_custom)
        .map(|p| p.title)
        .collect();
    let mine = state.add_plan("Mine", "", vec![]).await.unwrap();

    assert!(state.seed_plans().await.unwrap());
    assert!(state.seed_plans().await.unwrap());

    let plans = state.list_plans().await.unwrap();
    let builtin_after: Vec<String> = plans.iter().filter(|p| !p.is_custom).map(|p| p.title.clone()).collect();
    assert_eq!(builtin_after, builtin_before);
    assert!(plans.iter().any(|p| p.id == mine.id));

    state.delete_plan(mine.id).await.unwrap();
    let err = state.delete_plan(mine.id).await.unwrap_err();
    assert!(matches!(err, StateError::NotFound(_)));

    state.shutdown().await.unwrap();
}
