//! Built-in plan catalog
//!
//! Compiled into the binary from `catalog/plans.json`. Seeding replaces every
//! non-custom plan with these entries.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::plan::PlanNode;

/// Raw catalog document
pub const CATALOG_JSON: &str = include_str!("../catalog/plans.json");

/// One catalog entry, before it is stored as a non-custom plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPlan {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub tasks: Vec<PlanNode>,
}

/// Parse the built-in catalog
pub fn builtin_catalog() -> StoreResult<Vec<CatalogPlan>> {
    debug!("builtin_catalog: called");
    serde_json::from_str(CATALOG_JSON).map_err(|e| StoreError::Catalog(format!("built-in catalog is malformed: {}", e)))
}
