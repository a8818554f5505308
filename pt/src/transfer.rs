//! Plan files: export to and import from JSON documents

use std::fs;
use std::path::{Path, PathBuf};

use prontustore::{Plan, PlanDocument, StoreError, StoreResult};
use serde_json::Value;
use tracing::{debug, info};

/// File name for an exported plan: lowercase, whitespace runs as `_`
pub fn plan_file_name(title: &str) -> String {
    let mut name = String::with_capacity(title.len() + 5);
    let mut in_space = false;
    for c in title.chars() {
        if c.is_whitespace() || c == '/' || c == '\\' {
            if !in_space {
                name.push('_');
            }
            in_space = true;
        } else {
            name.extend(c.to_lowercase());
            in_space = false;
        }
    }
    name.push_str(".json");
    name
}

/// Write `plan` as pretty JSON into `dir`, returning the file path
pub fn export_plan(plan: &Plan, dir: &Path) -> StoreResult<PathBuf> {
    debug!(id = %plan.id, dir = %dir.display(), "export_plan: called");
    fs::create_dir_all(dir)?;
    let path = dir.join(plan_file_name(&plan.title));
    let json = serde_json::to_string_pretty(plan)?;
    fs::write(&path, json)?;
    info!(id = %plan.id, path = %path.display(), "Exported plan");
    Ok(path)
}

/// Read and validate a plan file
pub fn read_plan_document(path: &Path) -> StoreResult<PlanDocument> {
    debug!(path = %path.display(), "read_plan_document: called");
    let content = fs::read_to_string(path)?;
    parse_plan_document(&content)
}

/// Validate a plan document.
///
/// `title` must be a non-empty string and `tasks` an array of nodes. Any
/// other field, `id` included, is dropped.
pub fn parse_plan_document(content: &str) -> StoreResult<PlanDocument> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| StoreError::Validation(format!("plan file is not valid JSON: {}", e)))?;

    let Some(object) = value.as_object() else {
        return Err(StoreError::Validation("plan file must contain a JSON object".to_string()));
    };
    match object.get("title").and_then(Value::as_str) {
        Some(title) if !title.trim().is_empty() => {}
        _ => return Err(StoreError::Validation("plan file is missing a \"title\"".to_string())),
    }
    if !object.get("tasks").is_some_and(Value::is_array) {
        return Err(StoreError::Validation("plan file is missing a \"tasks\" array".to_string()));
    }

    let doc: PlanDocument = serde_json::from_value(value)
        .map_err(|e| StoreError::Validation(format!("plan file has malformed tasks: {}", e)))?;
    doc.validate()?;
    Ok(doc)
}
