//! Live query registry
//!
//! A live query is a `watch` channel holding the latest result of one query
//! shape. Writes publish an [`Invalidation`]; every registered query it
//! touches is re-run and the fresh result replaces the old one. Receivers
//! dispose of a subscription by dropping it, and closed channels are pruned on
//! the next refresh.

use std::collections::HashMap;

use prontustore::{Database, ParentRef, Plan, StoreResult, Task};
use tokio::sync::watch;
use tracing::debug;

/// Shape of a live query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// Ordered children of one parent
    Children(ParentRef),
    /// All plans
    Plans,
}

/// What a write may have changed
#[derive(Debug, Clone, PartialEq)]
pub enum Invalidation {
    /// Sibling groups whose contents or order changed
    Parents(Vec<ParentRef>),
    /// Any task list may have changed
    AllTasks,
    Plans,
    Everything,
}

impl Invalidation {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match (self, key) {
            (Self::Everything, _) => true,
            (Self::AllTasks, QueryKey::Children(_)) => true,
            (Self::Parents(parents), QueryKey::Children(parent)) => parents.contains(parent),
            (Self::Plans, QueryKey::Plans) => true,
            _ => false,
        }
    }
}

enum LiveSender {
    Tasks(watch::Sender<Vec<Task>>),
    Plans(watch::Sender<Vec<Plan>>),
}

impl LiveSender {
    fn is_closed(&self) -> bool {
        match self {
            Self::Tasks(tx) => tx.is_closed(),
            Self::Plans(tx) => tx.is_closed(),
        }
    }
}

#[derive(Default)]
pub(crate) struct LiveQueries {
    queries: HashMap<QueryKey, LiveSender>,
}

impl LiveQueries {
    /// Subscribe to the children of `parent`, registering the query if needed
    pub(crate) fn watch_tasks(&mut self, db: &Database, parent: ParentRef) -> StoreResult<watch::Receiver<Vec<Task>>> {
        let key = QueryKey::Children(parent);
        if let Some(LiveSender::Tasks(tx)) = self.queries.get(&key) {
            return Ok(tx.subscribe());
        }
        let (tx, rx) = watch::channel(db.get_tasks(&parent)?);
        self.queries.insert(key, LiveSender::Tasks(tx));
        debug!(%parent, "watch_tasks: registered live query");
        Ok(rx)
    }

    /// Subscribe to the plan list, registering the query if needed
    pub(crate) fn watch_plans(&mut self, db: &Database) -> StoreResult<watch::Receiver<Vec<Plan>>> {
        if let Some(LiveSender::Plans(tx)) = self.queries.get(&QueryKey::Plans) {
            return Ok(tx.subscribe());
        }
        let (tx, rx) = watch::channel(db.list_plans()?);
        self.queries.insert(QueryKey::Plans, LiveSender::Plans(tx));
        debug!("watch_plans: registered live query");
        Ok(rx)
    }

    /// Re-run every live query touched by `invalidation`.
    ///
    /// Returns how many queries were refreshed.
    pub(crate) fn refresh(&mut self, db: &Database, invalidation: &Invalidation) -> StoreResult<usize> {
        self.prune();
        let mut refreshed = 0;
        for (key, sender) in &self.queries {
            if !invalidation.matches(key) {
                continue;
            }
            match (key, sender) {
                (QueryKey::Children(parent), LiveSender::Tasks(tx)) => {
                    tx.send_replace(db.get_tasks(parent)?);
                }
                (QueryKey::Plans, LiveSender::Plans(tx)) => {
                    tx.send_replace(db.list_plans()?);
                }
                _ => continue,
            }
            refreshed += 1;
        }
        debug!(?invalidation, refreshed, "refresh: done");
        Ok(refreshed)
    }

    /// Drop queries nobody is watching any more
    pub(crate) fn prune(&mut self) {
        let before = self.queries.len();
        self.queries.retain(|_, sender| !sender.is_closed());
        let pruned = before - self.queries.len();
        if pruned > 0 {
            debug!(pruned, "prune: dropped closed live queries");
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.queries.len()
    }
}
