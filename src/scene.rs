//! Scene files: a tile cache, named styles and a sequence of camera frames,
//! replayed through a [`LabelPlacement`] for debugging and tests.

use std::cell::Cell;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

use crate::ir::{
    LabelCandidate, LabelTask, LabelTileData, MapPosition, SymbolCandidate, TextStyle,
    ViewportSource,
};
use crate::placement::{LabelPlacement, PassOutcome};
use crate::tiles::{MapTile, TileId, TileState, TileStore};

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("invalid scene: {0}")]
    Parse(String),

    #[error("tile {tile:?}: unknown style `{style}`")]
    UnknownStyle { tile: TileId, style: String },

    #[error("tile {tile:?}: label `{text}` needs `{expected}`")]
    MissingGeometry {
        tile: TileId,
        text: String,
        expected: &'static str,
    },

    #[error("tile {0:?} is declared twice")]
    DuplicateTile(TileId),

    #[error("frame {frame}: unknown tile {tile:?}")]
    UnknownTile { frame: usize, tile: TileId },

    #[error("scene has no frames")]
    NoFrames,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewportFile {
    width: f32,
    height: f32,
    #[serde(default = "default_max_tilt")]
    max_tilt: f32,
}

fn default_max_tilt() -> f32 {
    65.0
}

fn default_state() -> TileState {
    TileState::Ready
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelFile {
    text: String,
    style: String,
    width: f32,
    #[serde(default)]
    at: Option<[f32; 2]>,
    #[serde(default)]
    path: Option<[[f32; 2]; 2]>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolFile {
    at: [f32; 2],
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    billboard: bool,
    #[serde(default)]
    rotation: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TileFile {
    x: i32,
    y: i32,
    zoom: u8,
    #[serde(default = "default_state")]
    state: TileState,
    #[serde(default)]
    labels: Vec<LabelFile>,
    #[serde(default)]
    symbols: Vec<SymbolFile>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FocusFile {
    tile: TileId,
    at: [f32; 2],
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TileUpdate {
    tile: TileId,
    state: TileState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrameFile {
    zoom: f64,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    focus: Option<FocusFile>,
    #[serde(default)]
    bearing: f32,
    #[serde(default)]
    tilt: f32,
    #[serde(default)]
    tile_zoom: Option<u8>,
    #[serde(default)]
    visible: Option<Vec<TileId>>,
    #[serde(default)]
    updates: Vec<TileUpdate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneFile {
    viewport: ViewportFile,
    #[serde(default)]
    styles: BTreeMap<String, TextStyle>,
    #[serde(default)]
    tiles: Vec<TileFile>,
    #[serde(default)]
    frames: Vec<FrameFile>,
}

/// Where a frame's camera looks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Center {
    /// Normalized world coordinates.
    World { x: f64, y: f64 },
    /// A point in tile-local units.
    Tile { tile: TileId, at: (f32, f32) },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub zoom: f64,
    pub center: Center,
    pub bearing: f32,
    pub tilt: f32,
    /// Zoom of the tiles shown; defaults to the floor of `zoom`.
    pub tile_zoom: Option<u8>,
    /// Explicit visible tiles; every stored tile at the tile zoom otherwise.
    pub visible: Option<Vec<TileId>>,
    /// Tile state changes applied before the frame runs.
    pub updates: Vec<(TileId, TileState)>,
}

impl Frame {
    pub fn position(&self, tile_size: f32) -> MapPosition {
        let (x, y) = match self.center {
            Center::World { x, y } => (x, y),
            Center::Tile { tile, at } => {
                let tile_size = f64::from(tile_size);
                let world = tile_size * 2f64.powi(i32::from(tile.zoom));
                (
                    (f64::from(tile.x) * tile_size + f64::from(at.0)) / world,
                    (f64::from(tile.y) * tile_size + f64::from(at.1)) / world,
                )
            }
        };
        MapPosition {
            bearing: self.bearing,
            tilt: self.tilt,
            ..MapPosition::new(x, y, self.zoom)
        }
    }

    pub fn tile_zoom(&self) -> u8 {
        self.tile_zoom
            .unwrap_or_else(|| self.zoom.max(0.0).floor().min(f64::from(u8::MAX)) as u8)
    }
}

/// Camera driven by the scene's frames.
#[derive(Debug)]
pub struct SceneViewport {
    width: f32,
    height: f32,
    max_tilt: f32,
    pose: Cell<MapPosition>,
}

impl SceneViewport {
    pub fn new(width: f32, height: f32, max_tilt: f32) -> Self {
        Self {
            width,
            height,
            max_tilt,
            pose: Cell::new(MapPosition::default()),
        }
    }

    pub fn set_pose(&self, pos: MapPosition) {
        self.pose.set(pos);
    }
}

impl ViewportSource for SceneViewport {
    fn map_position(&self, pos: &mut MapPosition) -> bool {
        let pose = self.pose.get();
        let changed = *pos != pose;
        *pos = pose;
        changed
    }

    fn screen_size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn max_tilt(&self) -> f32 {
        self.max_tilt
    }
}

/// Output of one replayed frame.
#[derive(Debug, Clone)]
pub struct FrameResult {
    pub outcome: PassOutcome,
    pub task: LabelTask,
}

#[derive(Debug)]
pub struct Scene {
    pub viewport: SceneViewport,
    pub store: TileStore,
    pub styles: BTreeMap<String, Arc<TextStyle>>,
    pub frames: Vec<Frame>,
}

impl Scene {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scene {}", path.display()))?;
        Ok(Self::parse(&contents)?)
    }

    /// Parse a JSON scene, falling back to JSON5.
    pub fn parse(contents: &str) -> Result<Self, SceneError> {
        let file: SceneFile = match serde_json::from_str(contents) {
            Ok(file) => file,
            Err(json_err) => {
                json5::from_str(contents).map_err(|_| SceneError::Parse(json_err.to_string()))?
            }
        };
        Self::build(file)
    }

    fn build(file: SceneFile) -> Result<Self, SceneError> {
        if file.frames.is_empty() {
            return Err(SceneError::NoFrames);
        }

        let styles: BTreeMap<String, Arc<TextStyle>> = file
            .styles
            .into_iter()
            .map(|(name, style)| (name, Arc::new(style)))
            .collect();

        let mut store = TileStore::new();
        let mut declared = HashSet::new();
        for tile_file in file.tiles {
            let id = TileId::new(tile_file.x, tile_file.y, tile_file.zoom);
            if !declared.insert(id) {
                return Err(SceneError::DuplicateTile(id));
            }
            let data = tile_data(id, &tile_file, &styles)?;
            let tile = MapTile::new(id);
            tile.set_labels(data);
            tile.set_state(tile_file.state);
            store.insert(tile);
        }

        let mut frames = Vec::with_capacity(file.frames.len());
        for (index, frame) in file.frames.into_iter().enumerate() {
            let known = |tile: &TileId| -> Result<(), SceneError> {
                if declared.contains(tile) {
                    Ok(())
                } else {
                    Err(SceneError::UnknownTile {
                        frame: index,
                        tile: *tile,
                    })
                }
            };
            for tile in frame.visible.iter().flatten() {
                known(tile)?;
            }
            for update in &frame.updates {
                known(&update.tile)?;
            }

            let center = match frame.focus {
                Some(focus) => Center::Tile {
                    tile: focus.tile,
                    at: (focus.at[0], focus.at[1]),
                },
                None => Center::World {
                    x: frame.x.unwrap_or(0.5),
                    y: frame.y.unwrap_or(0.5),
                },
            };
            frames.push(Frame {
                zoom: frame.zoom,
                center,
                bearing: frame.bearing,
                tilt: frame.tilt,
                tile_zoom: frame.tile_zoom,
                visible: frame.visible,
                updates: frame
                    .updates
                    .iter()
                    .map(|update| (update.tile, update.state))
                    .collect(),
            });
        }

        Ok(Self {
            viewport: SceneViewport::new(
                file.viewport.width,
                file.viewport.height,
                file.viewport.max_tilt,
            ),
            store,
            styles,
            frames,
        })
    }

    pub fn viewport_size(&self) -> (f32, f32) {
        self.viewport.screen_size()
    }

    /// Point the camera and the tile cache at frame `index`.
    pub fn stage_frame(&self, index: usize, tile_size: f32) -> Option<&Frame> {
        let frame = self.frames.get(index)?;
        for (tile, state) in &frame.updates {
            self.store.set_state(tile, *state);
        }
        match &frame.visible {
            Some(visible) => self.store.set_visible(visible.clone(), frame.tile_zoom()),
            None => self.store.show_zoom(frame.tile_zoom()),
        }
        self.viewport.set_pose(frame.position(tile_size));
        Some(frame)
    }

    /// Run every frame through `placement`, reusing one task as a renderer
    /// would, and snapshot the task after each pass.
    pub fn play(&self, placement: &mut LabelPlacement) -> Vec<FrameResult> {
        let tile_size = placement.config().tile_size;
        let mut task = LabelTask::default();
        let mut results = Vec::with_capacity(self.frames.len());
        for index in 0..self.frames.len() {
            self.stage_frame(index, tile_size);
            let outcome = placement.update(&self.store, &self.viewport, &mut task);
            tracing::debug!(frame = index, ?outcome, "scene frame");
            results.push(FrameResult {
                outcome,
                task: task.clone(),
            });
        }
        results
    }

    /// Release everything `placement` still holds from this scene.
    pub fn finish(&self, placement: &mut LabelPlacement) {
        placement.cleanup(&self.store);
        debug_assert_eq!(self.store.outstanding_locks(), 0);
    }
}

fn tile_data(
    id: TileId,
    tile_file: &TileFile,
    styles: &BTreeMap<String, Arc<TextStyle>>,
) -> Result<LabelTileData, SceneError> {
    let mut labels = Vec::with_capacity(tile_file.labels.len());
    for label in &tile_file.labels {
        let Some(style) = styles.get(&label.style) else {
            return Err(SceneError::UnknownStyle {
                tile: id,
                style: label.style.clone(),
            });
        };
        let text: Arc<str> = Arc::from(label.text.as_str());
        let candidate = if style.caption {
            let Some(at) = label.at else {
                return Err(SceneError::MissingGeometry {
                    tile: id,
                    text: label.text.clone(),
                    expected: "at",
                });
            };
            LabelCandidate::caption(text, style.clone(), (at[0], at[1]), label.width)
        } else {
            let Some([from, to]) = label.path else {
                return Err(SceneError::MissingGeometry {
                    tile: id,
                    text: label.text.clone(),
                    expected: "path",
                });
            };
            LabelCandidate::way(
                text,
                style.clone(),
                (from[0], from[1]),
                (to[0], to[1]),
                label.width,
            )
        };
        labels.push(candidate);
    }

    let symbols = tile_file
        .symbols
        .iter()
        .map(|symbol| SymbolCandidate {
            x: symbol.at[0],
            y: symbol.at[1],
            icon: symbol.icon.as_deref().map(Arc::from),
            billboard: symbol.billboard,
            rotation: symbol.rotation,
        })
        .collect();

    Ok(LabelTileData { labels, symbols })
}
