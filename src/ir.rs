use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::placement::Obb;
use crate::tiles::TileId;

/// Rendering style shared by every candidate drawn with it.
///
/// Identity matters: two labels only group or share text when they point at
/// the same `Arc<TextStyle>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_height: f32,
    /// Drawing priority, lower values are more important.
    pub priority: i32,
    pub caption: bool,
    /// Vertical offset of a caption from its anchor.
    #[serde(default)]
    pub dy: f32,
    #[serde(default)]
    pub icon: Option<Arc<str>>,
    /// Distance under which two labels with the same text count as duplicates
    /// even when their boxes do not touch. Zero disables the check.
    #[serde(default)]
    pub repeat_proximity: f32,
}

impl TextStyle {
    pub fn way(font_height: f32, priority: i32) -> Self {
        Self {
            font_height,
            priority,
            caption: false,
            dy: 0.0,
            icon: None,
            repeat_proximity: 0.0,
        }
    }

    pub fn caption(font_height: f32, priority: i32) -> Self {
        Self {
            caption: true,
            ..Self::way(font_height, priority)
        }
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self::way(0.0, i32::MAX)
    }
}

/// A decoded label as produced by the tile decoder, in tile-local units.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCandidate {
    pub text: Arc<str>,
    pub style: Arc<TextStyle>,
    pub x: f32,
    pub y: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Rendered text width.
    pub width: f32,
    /// Length of the path segment carrying a way label.
    pub length: f32,
}

impl LabelCandidate {
    pub fn caption(text: Arc<str>, style: Arc<TextStyle>, at: (f32, f32), width: f32) -> Self {
        Self {
            text,
            style,
            x: at.0,
            y: at.1,
            x1: at.0,
            y1: at.1,
            x2: at.0,
            y2: at.1,
            width,
            length: 0.0,
        }
    }

    /// Way label centered on the segment `from`-`to`.
    pub fn way(
        text: Arc<str>,
        style: Arc<TextStyle>,
        from: (f32, f32),
        to: (f32, f32),
        width: f32,
    ) -> Self {
        let length = (to.0 - from.0).hypot(to.1 - from.1);
        Self {
            text,
            style,
            x: (from.0 + to.0) / 2.0,
            y: (from.1 + to.1) / 2.0,
            x1: from.0,
            y1: from.1,
            x2: to.0,
            y2: to.1,
            width,
            length,
        }
    }

    pub fn is_caption(&self) -> bool {
        self.style.caption
    }
}

/// A point icon decoded from a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolCandidate {
    pub x: f32,
    pub y: f32,
    pub icon: Option<Arc<str>>,
    pub billboard: bool,
    pub rotation: f32,
}

/// Everything the decoder attached to one tile for labeling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelTileData {
    pub labels: Vec<LabelCandidate>,
    pub symbols: Vec<SymbolCandidate>,
}

/// Camera pose. `x`/`y` are normalized world coordinates in `[0, 1]`,
/// `scale` is `2^zoom`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapPosition {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub bearing: f32,
    pub tilt: f32,
}

impl MapPosition {
    pub fn new(x: f64, y: f64, zoom: f64) -> Self {
        Self {
            x,
            y,
            scale: zoom.exp2(),
            bearing: 0.0,
            tilt: 0.0,
        }
    }
}

impl Default for MapPosition {
    fn default() -> Self {
        Self::new(0.5, 0.5, 0.0)
    }
}

/// Camera collaborator.
pub trait ViewportSource {
    /// Write the current pose into `pos`; returns whether it differed.
    fn map_position(&self, pos: &mut MapPosition) -> bool;
    /// Screen size in pixels.
    fn screen_size(&self) -> (f32, f32);
    fn max_tilt(&self) -> f32 {
        65.0
    }
}

/// A label accepted for the current frame, as handed to the text renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLabel {
    pub text: Arc<str>,
    pub style: Arc<TextStyle>,
    pub x: f32,
    pub y: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub width: f32,
    pub bbox: Obb,
    pub tile: TileId,
    pub active: u32,
}

impl PlacedLabel {
    pub fn is_caption(&self) -> bool {
        self.style.caption
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolPlacement {
    pub icon: Arc<str>,
    pub x: f32,
    pub y: f32,
    pub billboard: bool,
    pub rotation: f32,
}

/// Labels handed to text rasterization. Valid until the next pass.
#[derive(Debug, Clone, Default)]
pub struct TextBucket {
    pub labels: Vec<PlacedLabel>,
}

impl TextBucket {
    pub fn clear(&mut self) {
        self.labels.clear();
    }
}

/// Append-only icon list for the current frame.
#[derive(Debug, Clone, Default)]
pub struct SymbolBucket {
    pub items: Vec<SymbolPlacement>,
}

impl SymbolBucket {
    pub fn clear_items(&mut self) {
        self.items.clear();
    }

    pub fn add_symbol(&mut self, symbol: SymbolPlacement) {
        self.items.push(symbol);
    }
}

/// Per-pass work item: the pose the pass ran with and its outputs.
#[derive(Debug, Clone, Default)]
pub struct LabelTask {
    pub pos: MapPosition,
    pub text: TextBucket,
    pub symbols: SymbolBucket,
}
