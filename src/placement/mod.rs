//! Label placement for tiled vector maps.
//!
//! A [`LabelPlacement`] runs once per frame: it re-validates the labels kept
//! from the previous frame, fills gaps with candidates from the visible tiles,
//! resolves collisions between oriented boxes and hands the surviving labels to
//! the text renderer grouped by identical appearance.

mod grouping;
mod label;
mod obb;
mod pool;
mod resolver;
mod updater;

pub use grouping::group_labels;
pub use label::{FRESH, Label, bbox_overlaps, share_text, within_repeat_proximity};
pub use obb::Obb;
pub use pool::{LabelHandle, LabelIter, LabelList, LabelPool};
pub use resolver::{Rejection, Resolver, Verdict, VisibilityRadius};
pub use updater::{LabelPlacement, PassOutcome, PassStage, PassStats};
