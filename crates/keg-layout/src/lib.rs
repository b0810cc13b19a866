//! Decide where each staged file is installed.
//!
//! A [`LayoutPlanner`] is an ordered list of glob rules, each assigning a
//! [`FileClass`](keg_resource::FileClass). The class picks the anchor tree
//! (the immutable prefix or the editable config root); platform exclusions
//! are ordinary rules whose files land in [`LayoutPlan::dropped`]. Planning is
//! read-only and deterministic: the same staging tree always yields the same
//! plan.

mod error;
mod plan;
mod planner;

pub use error::{LayoutError, Result};
pub use plan::{DropReason, DroppedFile, LayoutPlan, PlannedFile};
pub use planner::{LayoutPlanner, UnmatchedPolicy};
