//! Plan domain types
//!
//! A plan is a self-contained snapshot of a task forest. Its nodes carry no
//! store identifiers, so a plan survives any change to the live task table.

use std::fmt;
use std::str::FromStr;

use rusqlite::Row;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Store-assigned plan identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub i64);

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlanId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(StoreError::Validation(format!("invalid plan id '{}'", s))),
        }
    }
}

impl ToSql for PlanId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for PlanId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_i64().map(Self)
    }
}

/// One node of a plan's embedded task forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanNode {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,

    /// Omitted entirely (never an empty array) when the node has no children
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<PlanNode>>,
}

impl PlanNode {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            completed: None,
            children: None,
        }
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn with_children(mut self, children: Vec<PlanNode>) -> Self {
        self.children = if children.is_empty() { None } else { Some(children) };
        self
    }

    pub fn children(&self) -> &[PlanNode] {
        self.children.as_deref().unwrap_or_default()
    }

    /// Number of nodes in this subtree, including self
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children());
        }
        count
    }
}

/// Count every node in a forest
pub(crate) fn forest_size(nodes: &[PlanNode]) -> usize {
    nodes.iter().map(PlanNode::size).sum()
}

/// A persisted plan record; this is also the export file shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub tasks: Vec<PlanNode>,
    /// `false` for the built-in catalog, `true` for user data
    pub is_custom: bool,
}

impl Plan {
    pub(crate) const COLUMNS: &'static str = "id, title, description, tasks, is_custom";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let tasks_json: String = row.get(3)?;
        let tasks = serde_json::from_str(&tasks_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            tasks,
            is_custom: row.get(4)?,
        })
    }

    /// Total number of template nodes
    pub fn task_count(&self) -> usize {
        forest_size(&self.tasks)
    }

    /// The importable subset of this record
    pub fn to_document(&self) -> PlanDocument {
        PlanDocument {
            title: self.title.clone(),
            description: Some(self.description.clone()),
            tasks: self.tasks.clone(),
        }
    }
}

/// An importable plan: `title` and `tasks` are required, `description` is
/// optional, and anything else in the source (`id`, `isCustom`) is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDocument {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tasks: Vec<PlanNode>,
}

impl PlanDocument {
    /// Reject documents that would produce an unusable plan
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.title.trim().is_empty() {
            return Err(StoreError::Validation("plan title must not be blank".to_string()));
        }
        validate_forest(&self.tasks)
    }
}

/// Deepest nesting a plan may hold, counting top-level nodes as depth 1.
///
/// Stored plans are read back through serde_json, whose recursion limit
/// allows roughly twice this many levels.
pub const MAX_PLAN_DEPTH: usize = 32;

/// Reject blank node titles and forests nested deeper than [`MAX_PLAN_DEPTH`]
pub(crate) fn validate_forest(nodes: &[PlanNode]) -> Result<(), StoreError> {
    let mut stack: Vec<(&PlanNode, usize)> = nodes.iter().map(|n| (n, 1)).collect();
    while let Some((node, depth)) = stack.pop() {
        if node.title.trim().is_empty() {
            return Err(StoreError::Validation("plan task titles must not be blank".to_string()));
        }
        if depth > MAX_PLAN_DEPTH {
            return Err(StoreError::Validation(format!(
                "plans can nest at most {} levels deep",
                MAX_PLAN_DEPTH
            )));
        }
        stack.extend(node.children().iter().map(|c| (c, depth + 1)));
    }
    Ok(())
}
