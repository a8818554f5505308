//! State manager messages
//!
//! Commands and responses for the actor pattern.

use prontustore::{
    ParentRef, Plan, PlanDocument, PlanId, PlanNode, StoreError, Task, TaskChange, TaskId, TaskNode, TaskPatch,
};
use thiserror::Error;
use tokio::sync::{oneshot, watch};

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Channel error")]
    ChannelError,
}

impl StateError {
    /// Engine failures, as opposed to problems with the request itself
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<StoreError> for StateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => Self::Validation(msg),
            StoreError::NotFound(msg) => Self::NotFound(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

type Reply<T> = oneshot::Sender<StateResponse<T>>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    // Task operations
    AddTask {
        title: String,
        parent: ParentRef,
        completed: bool,
        reply: Reply<Task>,
    },
    GetTask {
        id: TaskId,
        reply: Reply<Option<Task>>,
    },
    GetTasks {
        parent: ParentRef,
        reply: Reply<Vec<Task>>,
    },
    UpdateTask {
        id: TaskId,
        patch: TaskPatch,
        reply: Reply<TaskChange>,
    },
    ReorderTask {
        id: TaskId,
        parent: ParentRef,
        order: f64,
        reply: Reply<TaskChange>,
    },
    MoveTask {
        active: TaskId,
        over: Option<TaskId>,
        reply: Reply<Option<TaskChange>>,
    },
    DeleteTask {
        id: TaskId,
        reply: Reply<Vec<Task>>,
    },
    ClearTasks {
        reply: Reply<usize>,
    },
    TaskTree {
        parent: ParentRef,
        reply: Reply<Vec<TaskNode>>,
    },

    // Plan operations
    AddPlan {
        title: String,
        description: String,
        tasks: Vec<PlanNode>,
        reply: Reply<Plan>,
    },
    GetPlan {
        id: PlanId,
        reply: Reply<Option<Plan>>,
    },
    ListPlans {
        reply: Reply<Vec<Plan>>,
    },
    DeletePlan {
        id: PlanId,
        reply: Reply<()>,
    },
    SeedPlans {
        reply: Reply<bool>,
    },
    SnapshotTasks {
        reply: Reply<Vec<PlanNode>>,
    },
    SavePlan {
        title: String,
        description: String,
        reply: Reply<Plan>,
    },
    LoadPlan {
        id: PlanId,
        reply: Reply<TaskId>,
    },
    ImportPlan {
        doc: PlanDocument,
        reply: Reply<Plan>,
    },

    // Live queries
    WatchTasks {
        parent: ParentRef,
        reply: Reply<watch::Receiver<Vec<Task>>>,
    },
    WatchPlans {
        reply: Reply<watch::Receiver<Vec<Plan>>>,
    },

    // Administration
    HardReset {
        reply: Reply<()>,
    },
    Shutdown,
}
