//! Prontu - hierarchical to-do list with reusable training plans
//!
//! Tasks form an ordered forest of arbitrary depth. Plans are reusable task
//! trees: a built-in catalog of training roadmaps plus any the user saves or
//! imports. Persistence lives in the `prontustore` crate; this crate wraps it
//! in an actor with change events and live queries, and provides the `pt`
//! command line.
//!
//! # Modules
//!
//! - [`state`] - StateManager actor, change events and live queries
//! - [`transfer`] - Plan file import and export
//! - [`render`] - Terminal output for trees and plans
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod render;
pub mod state;
pub mod transfer;

pub use config::{Config, StorageConfig};
pub use state::{Invalidation, QueryKey, StateCommand, StateError, StateEvent, StateManager, StateResponse};
pub use transfer::{export_plan, parse_plan_document, plan_file_name, read_plan_document};
