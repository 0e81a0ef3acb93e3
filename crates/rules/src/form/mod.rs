//! Live control tree materialised from a model.
//!
//! [`FormTree`] is the in-process counterpart of a form-binding layer: it
//! holds one control per field, group and array element, runs synchronous
//! validity/editability/visibility tests when values change, and publishes
//! per-control value-change streams that the
//! [`RecomputeScheduler`](crate::scheduler::RecomputeScheduler) subscribes to.

mod control;
mod effects;
mod tree;


pub use control::{ControlId, ControlKind, ControlState, StructureChange, StructureObserver};
pub use tree::FormTree;
