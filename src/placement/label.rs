use std::sync::Arc;

use super::obb::Obb;
use super::pool::LabelHandle;
use crate::ir::{LabelCandidate, PlacedLabel, TextStyle};
use crate::tiles::TileId;

/// Marks a label that has not been accepted yet; loses every age comparison.
pub const FRESH: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotState {
    Free,
    Detached,
    Listed,
}

/// Working state of one label: the candidate projected into the current
/// camera, its box and its placement bookkeeping.
#[derive(Debug, Clone)]
pub struct Label {
    pub text: Arc<str>,
    pub style: Arc<TextStyle>,
    pub x: f32,
    pub y: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub width: f32,
    pub length: f32,
    pub bbox: Obb,
    pub tile: TileId,
    /// Relabel stamp of the pass that accepted this label.
    pub active: u32,
    /// Private copy of the source candidate, immune to later tile updates.
    pub item: Option<LabelCandidate>,
    pub(crate) next: Option<LabelHandle>,
    pub(crate) slot: SlotState,
}

impl Label {
    pub(crate) fn blank(text: Arc<str>, style: Arc<TextStyle>) -> Self {
        Self {
            text,
            style,
            x: 0.0,
            y: 0.0,
            x1: 0.0,
            y1: 0.0,
            x2: 0.0,
            y2: 0.0,
            width: 0.0,
            length: 0.0,
            bbox: Obb::default(),
            tile: TileId::default(),
            active: FRESH,
            item: None,
            next: None,
            slot: SlotState::Detached,
        }
    }

    /// Take text, style and extents from a candidate. Geometry is left to the
    /// caller's projection.
    pub fn assign(&mut self, candidate: &LabelCandidate) {
        self.text = candidate.text.clone();
        self.style = candidate.style.clone();
        self.width = candidate.width;
        self.length = candidate.length;
    }

    pub fn is_caption(&self) -> bool {
        self.style.caption
    }

    pub fn next(&self) -> Option<LabelHandle> {
        self.next
    }

    /// Place the way endpoints around the projected center, keeping the
    /// candidate's segment direction and scaling its extent.
    pub fn place_endpoints(&mut self, item: &LabelCandidate, scale: f32) {
        let w = (item.x2 - item.x1) / 2.0 * scale;
        let h = (item.y2 - item.y1) / 2.0 * scale;
        self.x1 = self.x - w;
        self.y1 = self.y - h;
        self.x2 = self.x + w;
        self.y2 = self.y + h;
    }

    pub fn to_placed(&self) -> PlacedLabel {
        PlacedLabel {
            text: self.text.clone(),
            style: self.style.clone(),
            x: self.x,
            y: self.y,
            x1: self.x1,
            y1: self.y1,
            x2: self.x2,
            y2: self.y2,
            width: self.width,
            bbox: self.bbox,
            tile: self.tile,
            active: self.active,
        }
    }
}

/// Same style instance and equal text.
pub fn share_text(a: &Label, b: &Label) -> bool {
    Arc::ptr_eq(&a.style, &b.style) && (Arc::ptr_eq(&a.text, &b.text) || a.text == b.text)
}

fn span(a: f32, b: f32) -> (f32, f32) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Coarse test on the endpoint extents of both labels, widened by `add`.
pub fn bbox_overlaps(a: &Label, b: &Label, add: f32) -> bool {
    let (ax0, ax1) = span(a.x1, a.x2);
    let (ay0, ay1) = span(a.y1, a.y2);
    let (bx0, bx1) = span(b.x1, b.x2);
    let (by0, by1) = span(b.y1, b.y2);
    ax0 - add < bx1 && bx0 < ax1 + add && ay0 - add < by1 && by0 < ay1 + add
}

/// Duplicate text placed closer than the style's repeat proximity.
pub fn within_repeat_proximity(a: &Label, b: &Label) -> bool {
    let proximity = a.style.repeat_proximity.max(b.style.repeat_proximity);
    if proximity <= 0.0 || !share_text(a, b) {
        return false;
    }
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy < proximity * proximity
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_at(text: &str, style: &Arc<TextStyle>, x: f32, y: f32, half: f32) -> Label {
        let mut label = Label::blank(text.into(), style.clone());
        label.x = x;
        label.y = y;
        label.x1 = x - half;
        label.y1 = y;
        label.x2 = x + half;
        label.y2 = y;
        label
    }

    #[test]
    fn share_text_needs_same_style_instance() {
        let style = Arc::new(TextStyle::way(12.0, 1));
        let twin = Arc::new(TextStyle::way(12.0, 1));
        let a = label_at("Elm", &style, 0.0, 0.0, 10.0);
        let b = label_at("Elm", &style, 50.0, 0.0, 10.0);
        let c = label_at("Elm", &twin, 0.0, 0.0, 10.0);
        let d = label_at("Oak", &style, 0.0, 0.0, 10.0);
        assert!(share_text(&a, &b));
        assert!(!share_text(&a, &c));
        assert!(!share_text(&a, &d));
    }

    #[test]
    fn bbox_overlaps_handles_reversed_endpoints() {
        let style = Arc::new(TextStyle::way(12.0, 1));
        let a = label_at("A", &style, 0.0, 0.0, 10.0);
        let mut b = label_at("B", &style, 25.0, 0.0, 10.0);
        std::mem::swap(&mut b.x1, &mut b.x2);
        assert!(!bbox_overlaps(&a, &b, 0.0));
        assert!(bbox_overlaps(&a, &b, 6.0));
    }

    #[test]
    fn repeat_proximity_uses_center_distance() {
        let style = Arc::new(TextStyle {
            repeat_proximity: 60.0,
            ..TextStyle::way(12.0, 1)
        });
        let a = label_at("Elm", &style, 0.0, 0.0, 5.0);
        let near = label_at("Elm", &style, 50.0, 0.0, 5.0);
        let far = label_at("Elm", &style, 70.0, 0.0, 5.0);
        let other = label_at("Oak", &style, 50.0, 0.0, 5.0);
        assert!(within_repeat_proximity(&a, &near));
        assert!(!within_repeat_proximity(&a, &far));
        assert!(!within_repeat_proximity(&a, &other));
    }

    #[test]
    fn endpoints_scale_with_projection() {
        let style = Arc::new(TextStyle::way(12.0, 1));
        let item = LabelCandidate::way("Elm".into(), style.clone(), (0.0, 0.0), (10.0, 4.0), 5.0);
        let mut label = Label::blank("Elm".into(), style);
        label.x = 100.0;
        label.y = 50.0;
        label.place_endpoints(&item, 2.0);
        assert_eq!((label.x1, label.y1), (90.0, 46.0));
        assert_eq!((label.x2, label.y2), (110.0, 54.0));
    }
}
