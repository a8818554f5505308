//! StateManager - actor that owns the Database
//!
//! Processes commands via channels so every store operation runs on a single
//! owner, in arrival order. After each successful write the actor refreshes
//! the live queries the write touched and broadcasts a [`StateEvent`].

use std::path::{Path, PathBuf};

use prontustore::{
    Database, ParentRef, Plan, PlanDocument, PlanId, PlanNode, Task, TaskChange, TaskId, TaskNode, TaskPatch,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use super::live::{Invalidation, LiveQueries};
use super::messages::{StateCommand, StateError, StateResponse};

/// Event broadcast after state changes
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    /// A task was added under `parent`
    TaskCreated { id: TaskId, parent: ParentRef },
    /// A task's fields or position changed; `parents` lists the sibling groups involved
    TaskUpdated { id: TaskId, parents: Vec<ParentRef> },
    /// A task and its descendants were removed
    TasksDeleted { ids: Vec<TaskId>, parent: ParentRef },
    /// Every task was removed
    TasksCleared { count: usize },
    /// The plan list changed
    PlansChanged,
    /// The database was destroyed and recreated
    StoreReset,
}

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
    /// Broadcast sender for state change notifications
    event_tx: broadcast::Sender<StateEvent>,
}

impl StateManager {
    /// Open the database at `db_path` and spawn the actor that owns it
    pub fn spawn(db_path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        debug!(path = %path.display(), "spawn: called");
        let db = Database::open(&path)?;
        info!(path = %path.display(), schema = db.schema_version()?, "Opened database");

        let (tx, rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(64);

        let actor = StateActor {
            db,
            path,
            live: LiveQueries::default(),
            event_tx: event_tx.clone(),
        };
        tokio::spawn(actor_loop(actor, rx));

        info!("StateManager spawned");
        Ok(Self { tx, event_tx })
    }

    /// Subscribe to state change events
    pub fn subscribe_events(&self) -> broadcast::Receiver<StateEvent> {
        self.event_tx.subscribe()
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    // === Task operations ===

    /// Add a task at the end of `parent`'s children
    pub async fn add_task(&self, title: &str, parent: ParentRef, completed: bool) -> StateResponse<Task> {
        debug!(%title, %parent, completed, "add_task: called");
        let title = title.to_string();
        self.request(|reply| StateCommand::AddTask {
            title,
            parent,
            completed,
            reply,
        })
        .await
    }

    pub async fn get_task(&self, id: TaskId) -> StateResponse<Option<Task>> {
        debug!(%id, "get_task: called");
        self.request(|reply| StateCommand::GetTask { id, reply }).await
    }

    /// Get a task, returning an error if it does not exist
    pub async fn get_task_required(&self, id: TaskId) -> StateResponse<Task> {
        debug!(%id, "get_task_required: called");
        self.get_task(id)
            .await?
            .ok_or_else(|| StateError::NotFound(format!("task {}", id)))
    }

    /// Ordered children of `parent`
    pub async fn get_tasks(&self, parent: ParentRef) -> StateResponse<Vec<Task>> {
        debug!(%parent, "get_tasks: called");
        self.request(|reply| StateCommand::GetTasks { parent, reply }).await
    }

    pub async fn update_task(&self, id: TaskId, patch: TaskPatch) -> StateResponse<TaskChange> {
        debug!(%id, ?patch, "update_task: called");
        self.request(|reply| StateCommand::UpdateTask { id, patch, reply })
            .await
    }

    pub async fn set_completed(&self, id: TaskId, completed: bool) -> StateResponse<TaskChange> {
        debug!(%id, completed, "set_completed: called");
        self.update_task(id, TaskPatch::completed(completed)).await
    }

    pub async fn rename_task(&self, id: TaskId, title: &str) -> StateResponse<TaskChange> {
        debug!(%id, %title, "rename_task: called");
        self.update_task(id, TaskPatch::title(title)).await
    }

    pub async fn reorder_task(&self, id: TaskId, parent: ParentRef, order: f64) -> StateResponse<TaskChange> {
        debug!(%id, %parent, order, "reorder_task: called");
        self.request(|reply| StateCommand::ReorderTask {
            id,
            parent,
            order,
            reply,
        })
        .await
    }

    /// Drop `active` onto `over` (it lands just before `over`, under `over`'s parent)
    pub async fn move_task(&self, active: TaskId, over: Option<TaskId>) -> StateResponse<Option<TaskChange>> {
        debug!(%active, ?over, "move_task: called");
        self.request(|reply| StateCommand::MoveTask { active, over, reply })
            .await
    }

    /// Delete a task and its whole subtree
    pub async fn delete_task(&self, id: TaskId) -> StateResponse<Vec<Task>> {
        debug!(%id, "delete_task: called");
        self.request(|reply| StateCommand::DeleteTask { id, reply }).await
    }

    pub async fn clear_tasks(&self) -> StateResponse<usize> {
        debug!("clear_tasks: called");
        self.request(|reply| StateCommand::ClearTasks { reply }).await
    }

    pub async fn task_tree(&self, parent: ParentRef) -> StateResponse<Vec<TaskNode>> {
        debug!(%parent, "task_tree: called");
        self.request(|reply| StateCommand::TaskTree { parent, reply }).await
    }

    // === Plan operations ===

    pub async fn add_plan(&self, title: &str, description: &str, tasks: Vec<PlanNode>) -> StateResponse<Plan> {
        debug!(%title, "add_plan: called");
        let title = title.to_string();
        let description = description.to_string();
        self.request(|reply| StateCommand::AddPlan {
            title,
            description,
            tasks,
            reply,
        })
        .await
    }

    pub async fn get_plan(&self, id: PlanId) -> StateResponse<Option<Plan>> {
        debug!(%id, "get_plan: called");
        self.request(|reply| StateCommand::GetPlan { id, reply }).await
    }

    /// Get a plan, returning an error if it does not exist
    pub async fn get_plan_required(&self, id: PlanId) -> StateResponse<Plan> {
        debug!(%id, "get_plan_required: called");
        self.get_plan(id)
            .await?
            .ok_or_else(|| StateError::NotFound(format!("plan {}", id)))
    }

    pub async fn list_plans(&self) -> StateResponse<Vec<Plan>> {
        debug!("list_plans: called");
        self.request(|reply| StateCommand::ListPlans { reply }).await
    }

    pub async fn delete_plan(&self, id: PlanId) -> StateResponse<()> {
        debug!(%id, "delete_plan: called");
        self.request(|reply| StateCommand::DeletePlan { id, reply }).await
    }

    /// Restore the built-in catalog
    pub async fn seed_plans(&self) -> StateResponse<bool> {
        debug!("seed_plans: called");
        self.request(|reply| StateCommand::SeedPlans { reply }).await
    }

    pub async fn snapshot_tasks(&self) -> StateResponse<Vec<PlanNode>> {
        debug!("snapshot_tasks: called");
        self.request(|reply| StateCommand::SnapshotTasks { reply }).await
    }

    /// Save the current task forest as a custom plan
    pub async fn save_plan(&self, title: &str, description: &str) -> StateResponse<Plan> {
        debug!(%title, "save_plan: called");
        let title = title.to_string();
        let description = description.to_string();
        self.request(|reply| StateCommand::SavePlan {
            title,
            description,
            reply,
        })
        .await
    }

    /// Instantiate a plan under a new top-level task
    pub async fn load_plan(&self, id: PlanId) -> StateResponse<TaskId> {
        debug!(%id, "load_plan: called");
        self.request(|reply| StateCommand::LoadPlan { id, reply }).await
    }

    pub async fn import_plan(&self, doc: PlanDocument) -> StateResponse<Plan> {
        debug!(title = %doc.title, "import_plan: called");
        self.request(|reply| StateCommand::ImportPlan { doc, reply }).await
    }

    // === Live queries ===

    /// Live ordered children of `parent`; drop the receiver to unsubscribe
    pub async fn watch_tasks(&self, parent: ParentRef) -> StateResponse<watch::Receiver<Vec<Task>>> {
        debug!(%parent, "watch_tasks: called");
        self.request(|reply| StateCommand::WatchTasks { parent, reply }).await
    }

    /// Live plan list; drop the receiver to unsubscribe
    pub async fn watch_plans(&self) -> StateResponse<watch::Receiver<Vec<Plan>>> {
        debug!("watch_plans: called");
        self.request(|reply| StateCommand::WatchPlans { reply }).await
    }

    // === Administration ===

    /// Delete the database file and start over from a fresh, seeded one
    pub async fn hard_reset(&self) -> StateResponse<()> {
        debug!("hard_reset: called");
        self.request(|reply| StateCommand::HardReset { reply }).await
    }

    /// Shutdown the StateManager
    pub async fn shutdown(&self) -> StateResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

/// Everything the actor task owns
struct StateActor {
    db: Database,
    path: PathBuf,
    live: LiveQueries,
    event_tx: broadcast::Sender<StateEvent>,
}

impl StateActor {
    /// Refresh touched live queries, then announce the change
    fn publish(&mut self, invalidation: Invalidation, event: StateEvent) {
        debug!(?invalidation, ?event, "publish: called");
        if let Err(e) = self.live.refresh(&self.db, &invalidation) {
            warn!(error = %e, "Failed to refresh live queries");
        }
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Close, delete and recreate the database file.
    ///
    /// On failure the actor goes back to whatever is on disk at `path`. If
    /// even that cannot be opened, `self.db` is left on the in-memory
    /// placeholder and [`StateActor::is_detached`] reports it.
    fn hard_reset(&mut self) -> StateResponse<()> {
        info!(path = %self.path.display(), "Hard reset requested");
        let placeholder = Database::open_in_memory()?;
        let old = std::mem::replace(&mut self.db, placeholder);
        let recreated = old
            .close()
            .and_then(|()| Database::destroy(&self.path))
            .and_then(|()| Database::open(&self.path));

        match recreated {
            Ok(db) => {
                self.db = db;
                info!("Database recreated");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Hard reset failed, reopening the existing database");
                match Database::open(&self.path) {
                    Ok(db) => self.db = db,
                    Err(reopen) => error!(error = %reopen, "Failed to reopen database after failed reset"),
                }
                Err(e.into())
            }
        }
    }

    /// True when the actor no longer holds a file-backed database
    fn is_detached(&self) -> bool {
        self.db.path().is_none()
    }
}

/// The actor loop that owns the Database and processes commands
async fn actor_loop(mut actor: StateActor, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("StateManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::AddTask {
                title,
                parent,
                completed,
                reply,
            } => {
                debug!(%title, %parent, "actor_loop: AddTask command");
                let result = actor.db.add_task(&title, parent, completed).map_err(StateError::from);
                if let Ok(task) = &result {
                    actor.publish(
                        Invalidation::Parents(vec![task.parent_id]),
                        StateEvent::TaskCreated {
                            id: task.id,
                            parent: task.parent_id,
                        },
                    );
                }
                let _ = reply.send(result);
            }

            StateCommand::GetTask { id, reply } => {
                debug!(%id, "actor_loop: GetTask command");
                let _ = reply.send(actor.db.get_task(id).map_err(StateError::from));
            }

            StateCommand::GetTasks { parent, reply } => {
                debug!(%parent, "actor_loop: GetTasks command");
                let _ = reply.send(actor.db.get_tasks(&parent).map_err(StateError::from));
            }

            StateCommand::UpdateTask { id, patch, reply } => {
                debug!(%id, "actor_loop: UpdateTask command");
                let result = actor.db.update_task(id, &patch).map_err(StateError::from);
                if let Ok(change) = &result {
                    publish_change(&mut actor, change);
                }
                let _ = reply.send(result);
            }

            StateCommand::ReorderTask {
                id,
                parent,
                order,
                reply,
            } => {
                debug!(%id, %parent, order, "actor_loop: ReorderTask command");
                let result = actor.db.reorder_task(id, parent, order).map_err(StateError::from);
                if let Ok(change) = &result {
                    publish_change(&mut actor, change);
                }
                let _ = reply.send(result);
            }

            StateCommand::MoveTask { active, over, reply } => {
                debug!(%active, ?over, "actor_loop: MoveTask command");
                let result = actor.db.move_task(active, over).map_err(StateError::from);
                if let Ok(Some(change)) = &result {
                    publish_change(&mut actor, change);
                }
                let _ = reply.send(result);
            }

            StateCommand::DeleteTask { id, reply } => {
                debug!(%id, "actor_loop: DeleteTask command");
                let result = actor.db.delete_task(id).map_err(StateError::from);
                if let Ok(removed) = &result
                    && let Some(first) = removed.first()
                {
                    let mut parents = vec![first.parent_id];
                    parents.extend(removed.iter().map(|t| ParentRef::Task(t.id)));
                    actor.publish(
                        Invalidation::Parents(parents),
                        StateEvent::TasksDeleted {
                            ids: removed.iter().map(|t| t.id).collect(),
                            parent: first.parent_id,
                        },
                    );
                }
                let _ = reply.send(result);
            }

            StateCommand::ClearTasks { reply } => {
                debug!("actor_loop: ClearTasks command");
                let result = actor.db.clear_tasks().map_err(StateError::from);
                if let Ok(count) = &result {
                    actor.publish(Invalidation::AllTasks, StateEvent::TasksCleared { count: *count });
                }
                let _ = reply.send(result);
            }

            StateCommand::TaskTree { parent, reply } => {
                debug!(%parent, "actor_loop: TaskTree command");
                let _ = reply.send(actor.db.task_tree(&parent).map_err(StateError::from));
            }

            StateCommand::AddPlan {
                title,
                description,
                tasks,
                reply,
            } => {
                debug!(%title, "actor_loop: AddPlan command");
                let result = actor.db.add_plan(&title, &description, tasks).map_err(StateError::from);
                if result.is_ok() {
                    actor.publish(Invalidation::Plans, StateEvent::PlansChanged);
                }
                let _ = reply.send(result);
            }

            StateCommand::GetPlan { id, reply } => {
                debug!(%id, "actor_loop: GetPlan command");
                let _ = reply.send(actor.db.get_plan(id).map_err(StateError::from));
            }

            StateCommand::ListPlans { reply } => {
                debug!("actor_loop: ListPlans command");
                let _ = reply.send(actor.db.list_plans().map_err(StateError::from));
            }

            StateCommand::DeletePlan { id, reply } => {
                debug!(%id, "actor_loop: DeletePlan command");
                let result = actor.db.delete_plan(id).map_err(StateError::from);
                if result.is_ok() {
                    actor.publish(Invalidation::Plans, StateEvent::PlansChanged);
                }
                let _ = reply.send(result);
            }

            StateCommand::SeedPlans { reply } => {
                debug!("actor_loop: SeedPlans command");
                let result = actor.db.seed_plans().map_err(StateError::from);
                if let Ok(true) = result {
                    actor.publish(Invalidation::Plans, StateEvent::PlansChanged);
                }
                let _ = reply.send(result);
            }

            StateCommand::SnapshotTasks { reply } => {
                debug!("actor_loop: SnapshotTasks command");
                let _ = reply.send(actor.db.snapshot_tasks().map_err(StateError::from));
            }

            StateCommand::SavePlan {
                title,
                description,
                reply,
            } => {
                debug!(%title, "actor_loop: SavePlan command");
                let result = actor.db.save_plan(&title, &description).map_err(StateError::from);
                if result.is_ok() {
                    actor.publish(Invalidation::Plans, StateEvent::PlansChanged);
                }
                let _ = reply.send(result);
            }

            StateCommand::LoadPlan { id, reply } => {
                debug!(%id, "actor_loop: LoadPlan command");
                let result = actor.db.load_plan(id).map_err(StateError::from);
                if let Ok(root) = &result {
                    actor.publish(
                        Invalidation::AllTasks,
                        StateEvent::TaskCreated {
                            id: *root,
                            parent: ParentRef::Root,
                        },
                    );
                }
                let _ = reply.send(result);
            }

            StateCommand::ImportPlan { doc, reply } => {
                debug!(title = %doc.title, "actor_loop: ImportPlan command");
                let result = actor.db.import_plan(doc).map_err(StateError::from);
                if result.is_ok() {
                    actor.publish(Invalidation::Plans, StateEvent::PlansChanged);
                }
                let _ = reply.send(result);
            }

            StateCommand::WatchTasks { parent, reply } => {
                debug!(%parent, "actor_loop: WatchTasks command");
                let result = actor.live.watch_tasks(&actor.db, parent).map_err(StateError::from);
                let _ = reply.send(result);
            }

            StateCommand::WatchPlans { reply } => {
                debug!("actor_loop: WatchPlans command");
                let result = actor.live.watch_plans(&actor.db).map_err(StateError::from);
                let _ = reply.send(result);
            }

            StateCommand::HardReset { reply } => {
                debug!("actor_loop: HardReset command");
                let result = actor.hard_reset();
                if result.is_ok() {
                    actor.publish(Invalidation::Everything, StateEvent::StoreReset);
                }
                let _ = reply.send(result);
                if actor.is_detached() {
                    // Writes would only reach memory; refuse everything from here on
                    error!("No usable database, stopping StateManager");
                    break;
                }
            }

            StateCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!("StateManager shutting down");
                break;
            }
        }
    }

    if let Err(e) = actor.db.close() {
        warn!(error = %e, "Failed to close database cleanly");
    }
    debug!("StateManager actor stopped");
}

fn publish_change(actor: &mut StateActor, change: &TaskChange) {
    actor.publish(
        Invalidation::Parents(change.affected_parents()),
        StateEvent::TaskUpdated {
            id: change.after.id,
            parents: change.affected_parents(),
        },
    );
}
