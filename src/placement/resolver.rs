// Collision resolution between a candidate label and the active list.
//
// Filtering is two-step: `VisibilityRadius` cheaply discards labels far off
// screen, then `Resolver` runs exact box tests against accepted labels.

use super::label::{Label, bbox_overlaps, share_text, within_repeat_proximity};
use super::pool::{LabelHandle, LabelList, LabelPool};
use crate::config::PlacementConfig;

/// Squared radius around the screen center inside which labels are
/// considered at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityRadius {
    square: f32,
}

impl VisibilityRadius {
    pub fn from_square(square: f32) -> Self {
        Self { square }
    }

    /// Radius for a `width` x `height` screen. With distant labels enabled the
    /// radius grows with tilt, never below half the screen diagonal area.
    pub fn for_viewport(
        width: f32,
        height: f32,
        tilt: f32,
        max_tilt: f32,
        config: &PlacementConfig,
    ) -> Self {
        let square = if config.distant_labels {
            let ratio = if max_tilt > 0.0 { tilt / max_tilt } else { 0.0 };
            let k = (ratio * config.distance_coefficient).max(0.5);
            (width * width + height * height) * k
        } else {
            let mw = (width + config.tile_size) / 2.0;
            let mh = (height + config.tile_size) / 2.0;
            mw * mw + mh * mh
        };
        Self { square }
    }

    pub fn square(&self) -> f32 {
        self.square
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x * x + y * y <= self.square
    }

    /// A way label is kept when its center or either endpoint is inside.
    pub fn contains_way(&self, label: &Label) -> bool {
        [
            (label.x, label.y),
            (label.x1, label.y1),
            (label.x2, label.y2),
        ]
        .iter()
        .any(|(x, y)| x * x + y * y < self.square)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// A label with the same text and style holds the spot.
    SameText,
    /// Another label's box covers the candidate's.
    Overlap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The candidate may be linked; `evicted` weaker labels were released.
    Accept { evicted: u32 },
    /// The candidate must be dropped. Labels evicted before the rejection
    /// stay released.
    Reject { reason: Rejection, evicted: u32 },
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept { .. })
    }

    pub fn evicted(&self) -> u32 {
        match *self {
            Verdict::Accept { evicted } | Verdict::Reject { evicted, .. } => evicted,
        }
    }
}

enum Step {
    Skip,
    Evict,
    Reject(Rejection),
}

#[derive(Debug, Clone, Copy)]
pub struct Resolver {
    /// Widening applied to endpoint extents in the coarse pre-test.
    proximity_margin: f32,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::from_config(&PlacementConfig::default())
    }
}

impl Resolver {
    pub fn new(proximity_margin: f32) -> Self {
        Self { proximity_margin }
    }

    pub fn from_config(config: &PlacementConfig) -> Self {
        Self::new(config.proximity_margin)
    }

    /// Way-label resolution. `candidate` must be populated with projected
    /// geometry and box, and must not be on `list`.
    ///
    /// Age is compared strictly: an accepted label that is older wins, equal
    /// ages fall through to length and priority.
    pub fn resolve_way(
        &self,
        pool: &mut LabelPool,
        list: &mut LabelList,
        candidate: LabelHandle,
    ) -> Verdict {
        let mut evicted = 0;
        let mut cursor = list.head();
        while let Some(other) = cursor {
            let step = {
                self.way_step(pool.get(candidate), pool.get(other))
            };
            match step {
                Step::Skip => cursor = pool.next(other),
                Step::Evict => {
                    tracing::trace!(text = %pool.get(other).text, "evicting weaker label");
                    cursor = pool.release(list, other);
                    evicted += 1;
                }
                Step::Reject(reason) => return Verdict::Reject { reason, evicted },
            }
        }
        Verdict::Accept { evicted }
    }

    fn way_step(&self, l: &Label, o: &Label) -> Step {
        if !bbox_overlaps(l, o, self.proximity_margin) && !within_repeat_proximity(l, o) {
            return Step::Skip;
        }

        if share_text(l, o) {
            if o.active < l.active {
                return Step::Reject(Rejection::SameText);
            }
            if o.length < l.length {
                return Step::Evict;
            }
            return Step::Reject(Rejection::SameText);
        }

        if l.bbox.overlaps(&o.bbox) {
            if o.active < l.active {
                return Step::Reject(Rejection::Overlap);
            }
            if !o.is_caption() && (o.style.priority > l.style.priority || o.length < l.length) {
                return Step::Evict;
            }
            return Step::Reject(Rejection::Overlap);
        }

        Step::Skip
    }

    /// Caption resolution: the more important priority evicts, anything else
    /// touching the candidate rejects it.
    pub fn resolve_caption(
        &self,
        pool: &mut LabelPool,
        list: &mut LabelList,
        candidate: LabelHandle,
    ) -> Verdict {
        let mut evicted = 0;
        let mut cursor = list.head();
        while let Some(other) = cursor {
            let step = {
                let (l, o) = (pool.get(candidate), pool.get(other));
                if !l.bbox.overlaps(&o.bbox) {
                    Step::Skip
                } else if l.style.priority < o.style.priority {
                    Step::Evict
                } else {
                    Step::Reject(Rejection::Overlap)
                }
            };
            match step {
                Step::Skip => cursor = pool.next(other),
                Step::Evict => {
                    cursor = pool.release(list, other);
                    evicted += 1;
                }
                Step::Reject(reason) => return Verdict::Reject { reason, evicted },
            }
        }
        Verdict::Accept { evicted }
    }
}
