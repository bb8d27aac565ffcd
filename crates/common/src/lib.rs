//! Shared types used by every crate in the workspace.

mod types;

pub use types::AggregateId;
