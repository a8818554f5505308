//! Task domain types
//!
//! A task is one node of the to-do forest. Its parent is either the `root`
//! sentinel or another task.

use std::fmt;
use std::str::FromStr;

use rusqlite::Row;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Text form of the root sentinel
pub const ROOT: &str = "root";

/// Store-assigned task identifier (monotonic, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(StoreError::Validation(format!("invalid task id '{}'", s))),
        }
    }
}

impl ToSql for TaskId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for TaskId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_i64().map(Self)
    }
}

/// Parent of a task: the root sentinel or another task.
///
/// Persisted and compared only in its canonical text form (`"root"` or the
/// decimal id), so `"7"` and `7` can never name different sibling groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ParentRef {
    #[default]
    Root,
    Task(TaskId),
}

impl ParentRef {
    /// Canonical text form
    pub fn as_key(&self) -> String {
        match self {
            Self::Root => ROOT.to_string(),
            Self::Task(id) => id.to_string(),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }

    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::Root => None,
            Self::Task(id) => Some(*id),
        }
    }
}

impl From<TaskId> for ParentRef {
    fn from(id: TaskId) -> Self {
        Self::Task(id)
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}

impl FromStr for ParentRef {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(ROOT) {
            return Ok(Self::Root);
        }
        s.parse::<TaskId>()
            .map(Self::Task)
            .map_err(|_| StoreError::Validation(format!("invalid parent '{}': expected \"root\" or a task id", s)))
    }
}

impl TryFrom<String> for ParentRef {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ParentRef> for String {
    fn from(value: ParentRef) -> Self {
        value.as_key()
    }
}

impl ToSql for ParentRef {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_key()))
    }
}

impl FromSql for ParentRef {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse::<ParentRef>()
            .map_err(|e| FromSqlError::Other(e.to_string().into()))
    }
}

/// One persisted task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub completed: bool,
    pub parent_id: ParentRef,
    /// Sort key among siblings; fractional values are expected
    pub order: f64,
    /// Creation timestamp (Unix milliseconds), immutable
    pub created_at: i64,
}

impl Task {
    pub(crate) const COLUMNS: &'static str = "id, title, completed, parent_id, sort_order, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            completed: row.get(2)?,
            parent_id: row.get(3)?,
            order: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

/// Shallow partial update of a task. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, rename = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Default::default()
        }
    }

    pub fn position(parent: ParentRef, order: f64) -> Self {
        Self {
            parent: Some(parent),
            order: Some(order),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.completed.is_none() && self.parent.is_none() && self.order.is_none()
    }
}

/// A task row before and after an update
#[derive(Debug, Clone, PartialEq)]
pub struct TaskChange {
    pub before: Task,
    pub after: Task,
}

impl TaskChange {
    /// Sibling groups whose ordered contents may have changed
    pub fn affected_parents(&self) -> Vec<ParentRef> {
        if self.before.parent_id == self.after.parent_id {
            vec![self.after.parent_id]
        } else {
            vec![self.before.parent_id, self.after.parent_id]
        }
    }

    pub fn reparented(&self) -> bool {
        self.before.parent_id != self.after.parent_id
    }
}

/// A task together with its ordered descendants
#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    pub task: Task,
    pub children: Vec<TaskNode>,
}

impl TaskNode {
    /// (completed, total) over direct children
    pub fn progress(&self) -> (usize, usize) {
        let done = self.children.iter().filter(|c| c.task.completed).count();
        (done, self.children.len())
    }

    /// Number of nodes in this subtree, including self
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(&node.children);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_ref_canonical_form() {
        assert_eq!(ParentRef::Root.as_key(), "root");
        assert_eq!(ParentRef::Task(TaskId(42)).as_key(), "42");
        assert_eq!("root".parse::<ParentRef>().unwrap(), ParentRef::Root);
        assert_eq!("ROOT".parse::<ParentRef>().unwrap(), ParentRef::Root);
        assert_eq!(" 7 ".parse::<ParentRef>().unwrap(), ParentRef::Task(TaskId(7)));
    }

    #[test]
    fn test_parent_ref_rejects_garbage() {
        assert!(matches!("".parse::<ParentRef>(), Err(StoreError::Validation(_))));
        assert!(matches!("abc".parse::<ParentRef>(), Err(StoreError::Validation(_))));
        assert!(matches!("0".parse::<ParentRef>(), Err(StoreError::Validation(_))));
        assert!(matches!("-3".parse::<ParentRef>(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_task_serializes_with_string_parent() {
        let task = Task {
            id: TaskId(2),
            title: "Stretch".to_string(),
            completed: false,
            parent_id: ParentRef::Task(TaskId(1)),
            order: 1.0,
            created_at: 0,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["id"], 2);
        assert_eq!(json["parentId"], "1");
        assert_eq!(json["createdAt"], 0);

        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_change_affected_parents() {
        let before = Task {
            id: TaskId(3),
            title: "a".to_string(),
            completed: false,
            parent_id: ParentRef::Root,
            order: 1.0,
            created_at: 0,
        };
        let mut after = before.clone();
        after.completed = true;
        let change = TaskChange {
            before: before.clone(),
            after: after.clone(),
        };
        assert_eq!(change.affected_parents(), vec![ParentRef::Root]);
        assert!(!change.reparented());

        after.parent_id = ParentRef::Task(TaskId(1));
        let change = TaskChange { before, after };
        assert_eq!(
            change.affected_parents(),
            vec![ParentRef::Root, ParentRef::Task(TaskId(1))]
        );
        assert!(change.reparented());
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(TaskPatch::default().is_empty());
        assert!(!TaskPatch::completed(true).is_empty());
    }
}
