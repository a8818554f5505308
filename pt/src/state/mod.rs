//! State management with actor pattern
//!
//! StateManager owns the Database and processes messages via channels,
//! keeping live queries current as writes land.

mod live;
mod manager;
mod messages;

pub use live::{Invalidation, QueryKey};
pub use manager::{StateEvent, StateManager};
pub use messages::{StateCommand, StateError, StateResponse};
