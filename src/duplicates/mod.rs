//! Duplicate bookkeeping: the key-to-group index and deletion planning.

pub mod index;
pub mod planner;

pub use index::{DuplicateGroup, DuplicateIndex, GroupUpdate};
pub use planner::DeletionPlan;
