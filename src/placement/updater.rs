// Per-frame label placement pass.
//
// One pass walks IDLE -> COMPUTE_VISIBILITY -> CARRY_FORWARD ->
// INSERT_WAY_LABELS -> INSERT_CAPTIONS -> ORIENT_AND_GROUP -> EMIT -> IDLE.
// Labels accepted in earlier passes are re-validated first so they keep
// their place on screen; candidates from the visible tiles only fill the gaps.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use super::grouping::group_labels;
use super::label::{FRESH, Label};
use super::pool::{LabelHandle, LabelList, LabelPool};
use super::resolver::{Resolver, VisibilityRadius};
use crate::config::PlacementConfig;
use crate::ir::{LabelCandidate, LabelTask, MapPosition, SymbolPlacement, ViewportSource};
use crate::tiles::{MapTile, TileId, TileProvider, TileSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassStage {
    #[default]
    Idle,
    ComputeVisibility,
    CarryForward,
    InsertWayLabels,
    InsertCaptions,
    OrientAndGroup,
    Emit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassStats {
    /// Stamp given to labels accepted in this pass.
    pub relabel: u32,
    /// Zoom the label tiles were taken from.
    pub zoom: u8,
    /// Distinct tiles scanned for candidates.
    pub tiles: usize,
    pub carried: usize,
    pub dropped: usize,
    pub way_labels: usize,
    pub captions: usize,
    pub evicted: u32,
    pub symbols: usize,
    pub labels: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Neither tiles nor camera moved, or nothing is visible. The task was
    /// left untouched.
    Unchanged,
    /// The render zoom lies outside the configured zoom range.
    OutOfZoomRange(u8),
    Updated(PassStats),
}

impl PassOutcome {
    pub fn stats(&self) -> Option<&PassStats> {
        match self {
            PassOutcome::Updated(stats) => Some(stats),
            _ => None,
        }
    }
}

/// Camera-derived constants of one pass.
#[derive(Debug, Clone, Copy)]
struct FrameParams {
    zoom: u8,
    pos_scale: f64,
    /// Scale of tiles at `zoom` relative to the camera.
    scale: f64,
    tile_x: f64,
    tile_y: f64,
    /// Half the world width at `zoom`, for the date-line flip.
    max_x: f64,
    cos: f32,
    sin: f32,
    radius: VisibilityRadius,
}

impl FrameParams {
    /// Screen-relative origin of `id`, which must be at `self.zoom`.
    fn tile_offset(&self, id: TileId, tile_size: f64) -> (f64, f64) {
        let dx = f64::from(id.x) * tile_size - self.tile_x;
        let dy = f64::from(id.y) * tile_size - self.tile_y;
        (flip_longitude(dx, self.max_x), dy)
    }
}

fn flip_longitude(dx: f64, max: f64) -> f64 {
    if dx > max {
        dx - max * 2.0
    } else if dx < -max {
        dx + max * 2.0
    } else {
        dx
    }
}

fn project(offset: f64, local: f32, scale: f64) -> f32 {
    ((offset + f64::from(local)) * scale) as f32
}

#[derive(Debug, Default)]
pub struct LabelPlacement {
    config: PlacementConfig,
    resolver: Resolver,
    pool: LabelPool,
    labels: LabelList,
    tile_set: TileSet,
    /// Tiles the candidates are read from this pass; ancestors under the
    /// zoom limiter.
    label_tiles: Vec<Arc<MapTile>>,
    seen: HashSet<TileId>,
    order: Vec<LabelHandle>,
    /// Label acquired for a candidate that was then rejected, reused for the
    /// next candidate.
    spare: Option<LabelHandle>,
    relabel: u32,
    zoom: u8,
    stage: PassStage,
}

impl LabelPlacement {
    pub fn new(config: PlacementConfig) -> Self {
        Self {
            resolver: Resolver::from_config(&config),
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    pub fn stage(&self) -> PassStage {
        self.stage
    }

    pub fn relabel(&self) -> u32 {
        self.relabel
    }

    pub fn pool(&self) -> &LabelPool {
        &self.pool
    }

    /// Accepted labels in list order.
    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.pool.iter(&self.labels).map(|(_, label)| label)
    }

    pub fn label_count(&self) -> usize {
        self.pool.len(&self.labels)
    }

    /// Run one placement pass into `task`. Tiles taken from `tiles` are handed
    /// back before returning, whatever the outcome.
    pub fn update(
        &mut self,
        tiles: &impl TileProvider,
        viewport: &impl ViewportSource,
        task: &mut LabelTask,
    ) -> PassOutcome {
        let outcome = self.run_pass(tiles, viewport, task);
        if let Some(spare) = self.spare.take() {
            self.pool.release_and_advance(spare);
        }
        self.label_tiles.clear();
        tiles.release_tiles(&mut self.tile_set);
        self.enter(PassStage::Idle);
        outcome
    }

    /// Drop every label and tile reference.
    pub fn cleanup(&mut self, tiles: &impl TileProvider) {
        self.pool.release_all(&mut self.labels);
        if let Some(spare) = self.spare.take() {
            self.pool.release_and_advance(spare);
        }
        self.label_tiles.clear();
        tiles.release_tiles(&mut self.tile_set);
        self.stage = PassStage::Idle;
    }

    fn enter(&mut self, stage: PassStage) {
        self.stage = stage;
        trace!(?stage, relabel = self.relabel, "placement stage");
    }

    fn run_pass(
        &mut self,
        tiles: &impl TileProvider,
        viewport: &impl ViewportSource,
        task: &mut LabelTask,
    ) -> PassOutcome {
        let changed_tiles = match tiles.visible_tiles(&mut self.tile_set) {
            Some(zoom) => {
                self.zoom = zoom;
                true
            }
            None => false,
        };
        if self.tile_set.is_empty() {
            return PassOutcome::Unchanged;
        }

        let changed_pos = viewport.map_position(&mut task.pos);
        if !changed_tiles && !changed_pos {
            return PassOutcome::Unchanged;
        }
        if !self.config.zoom.contains(self.zoom) {
            debug!(zoom = self.zoom, "render zoom outside placement range");
            return PassOutcome::OutOfZoomRange(self.zoom);
        }

        // Stamps stay below FRESH.
        self.relabel = self.relabel.saturating_add(1).min(FRESH - 1);

        self.enter(PassStage::ComputeVisibility);
        let zoom = self.collect_label_tiles(tiles);
        let frame = self.compute_visibility(viewport, &task.pos, zoom);
        task.symbols.clear_items();

        let mut stats = PassStats {
            relabel: self.relabel,
            zoom,
            tiles: self.label_tiles.len(),
            ..PassStats::default()
        };

        self.enter(PassStage::CarryForward);
        self.carry_forward(&frame, &mut stats);

        self.enter(PassStage::InsertWayLabels);
        self.insert_way_labels(&frame, &mut stats);

        self.enter(PassStage::InsertCaptions);
        self.insert_captions(&frame, &mut stats);

        self.enter(PassStage::OrientAndGroup);
        self.orient_and_group(&frame, task);

        self.enter(PassStage::Emit);
        self.emit(&frame, task);

        stats.symbols = task.symbols.items.len();
        stats.labels = task.text.labels.len();
        debug!(
            relabel = stats.relabel,
            zoom = stats.zoom,
            tiles = stats.tiles,
            carried = stats.carried,
            dropped = stats.dropped,
            way_labels = stats.way_labels,
            captions = stats.captions,
            evicted = stats.evicted,
            labels = stats.labels,
            symbols = stats.symbols,
            "label pass done"
        );
        PassOutcome::Updated(stats)
    }

    /// Fill `label_tiles` and return the zoom they live at. Past the zoom
    /// limit every visible tile is replaced by its cached ancestor, each
    /// ancestor kept once in first-seen order.
    fn collect_label_tiles(&mut self, tiles: &impl TileProvider) -> u8 {
        self.label_tiles.clear();
        let limit = self.config.zoom.zoom_limit;
        if self.zoom <= limit {
            self.label_tiles.extend(self.tile_set.iter().cloned());
            return self.zoom;
        }

        self.seen.clear();
        for tile in self.tile_set.iter() {
            let Some(ancestor) = tiles.tile_at_zoom(&tile.id(), limit) else {
                continue;
            };
            if self.seen.insert(ancestor.id()) {
                self.label_tiles.push(ancestor);
            }
        }
        limit
    }

    fn compute_visibility(
        &self,
        viewport: &impl ViewportSource,
        pos: &MapPosition,
        zoom: u8,
    ) -> FrameParams {
        let (width, height) = viewport.screen_size();
        let radius =
            VisibilityRadius::for_viewport(width, height, pos.tilt, viewport.max_tilt(), &self.config);

        let zoom_scale = 2f64.powi(i32::from(zoom));
        let world = f64::from(self.config.tile_size) * zoom_scale;
        let angle = f64::from(pos.bearing).to_radians();

        FrameParams {
            zoom,
            pos_scale: pos.scale,
            scale: pos.scale / zoom_scale,
            tile_x: pos.x * world,
            tile_y: pos.y * world,
            max_x: world / 2.0,
            cos: angle.cos() as f32,
            sin: angle.sin() as f32,
            radius,
        }
    }

    fn carry_forward(&mut self, frame: &FrameParams, stats: &mut PassStats) {
        let previous = std::mem::take(&mut self.labels);
        let mut cursor = previous.head();
        while let Some(handle) = cursor {
            if self.reproject_carried(handle, frame) {
                let verdict = self
                    .resolver
                    .resolve_way(&mut self.pool, &mut self.labels, handle);
                stats.evicted += verdict.evicted();
                if verdict.is_accept() {
                    cursor = self.pool.detach(handle);
                    self.pool.push_front(&mut self.labels, handle);
                    stats.carried += 1;
                    continue;
                }
                trace!(text = %self.pool.get(handle).text, ?verdict, "carried label lost");
            }
            cursor = self.pool.release_and_advance(handle);
            stats.dropped += 1;
        }
    }

    /// Move a previously accepted label into the current camera. Returns false
    /// when the label must be dropped instead.
    fn reproject_carried(&mut self, handle: LabelHandle, frame: &FrameParams) -> bool {
        let config = &self.config;
        let label = self.pool.get_mut(handle);

        // Captions are re-placed from their tiles every pass.
        if label.is_caption() {
            return false;
        }

        let diff = i32::from(label.tile.zoom) - i32::from(frame.zoom);
        if diff.abs() > i32::from(config.carry_forward_zoom_window) {
            return false;
        }
        let div = 2f64.powi(diff);
        let sscale = frame.pos_scale / 2f64.powi(i32::from(label.tile.zoom));

        if label.width > (label.length + config.carry_forward_slack) * sscale as f32 {
            return false;
        }

        let tile_size = f64::from(config.tile_size);
        let dx = flip_longitude(
            f64::from(label.tile.x) * tile_size - frame.tile_x * div,
            frame.max_x,
        );
        let dy = f64::from(label.tile.y) * tile_size - frame.tile_y * div;

        let Some(item) = label.item.take() else {
            return false;
        };
        label.x = project(dx, item.x, sscale);
        label.y = project(dy, item.y, sscale);
        label.place_endpoints(&item, sscale as f32);
        label.item = Some(item);

        if !frame.radius.contains_way(label) {
            return false;
        }

        let width = label.width + config.min_way_dist;
        let height = label.style.font_height + config.min_way_dist;
        label.bbox.set(label.x, label.y, label.x1, label.y1, width, height);
        true
    }

    fn spare_label(&mut self) -> LabelHandle {
        *self.spare.get_or_insert_with(|| self.pool.acquire())
    }

    /// Link the spare label as accepted in this pass.
    fn accept_spare(&mut self, handle: LabelHandle, item: &LabelCandidate, tile: TileId) {
        let label = self.pool.get_mut(handle);
        label.item = Some(item.clone());
        label.tile = tile;
        label.active = self.relabel;
        self.pool.push_front(&mut self.labels, handle);
        self.spare = None;
    }

    fn insert_way_labels(&mut self, frame: &FrameParams, stats: &mut PassStats) {
        let tile_size = f64::from(self.config.tile_size);
        let scale = frame.scale as f32;

        for index in 0..self.label_tiles.len() {
            let tile = self.label_tiles[index].clone();
            if !tile.is_ready() {
                continue;
            }
            let Some(data) = tile.labels() else {
                continue;
            };
            let (dx, dy) = frame.tile_offset(tile.id(), tile_size);

            for item in data.labels.iter().filter(|item| !item.is_caption()) {
                // Path too short for the text at this scale.
                if item.width > item.length * scale {
                    continue;
                }

                let handle = self.spare_label();
                let label = self.pool.get_mut(handle);
                label.assign(item);
                label.active = FRESH;
                label.x = project(dx, item.x, frame.scale);
                label.y = project(dy, item.y, frame.scale);
                label.place_endpoints(item, scale);

                if !frame.radius.contains_way(label) {
                    continue;
                }

                let width = label.width + self.config.min_way_dist;
                let height = label.style.font_height + self.config.min_way_dist;
                label.bbox.set(label.x, label.y, label.x1, label.y1, width, height);

                if item.width >= item.length * scale {
                    continue;
                }

                let verdict = self
                    .resolver
                    .resolve_way(&mut self.pool, &mut self.labels, handle);
                stats.evicted += verdict.evicted();
                if verdict.is_accept() {
                    self.accept_spare(handle, item, tile.id());
                    stats.way_labels += 1;
                } else {
                    trace!(text = %item.text, ?verdict, "way label rejected");
                }
            }
        }
    }

    fn insert_captions(&mut self, frame: &FrameParams, stats: &mut PassStats) {
        let tile_size = f64::from(self.config.tile_size);

        for index in 0..self.label_tiles.len() {
            let tile = self.label_tiles[index].clone();
            if !tile.is_ready() {
                continue;
            }
            let Some(data) = tile.labels() else {
                continue;
            };
            let (dx, dy) = frame.tile_offset(tile.id(), tile_size);

            for item in data.labels.iter().filter(|item| item.is_caption()) {
                let handle = self.spare_label();
                let label = self.pool.get_mut(handle);
                label.assign(item);
                label.active = FRESH;
                label.x = project(dx, item.x, frame.scale);
                label.y = project(dy, item.y, frame.scale);
                if !frame.radius.contains_point(label.x, label.y) {
                    continue;
                }
                label.x1 = label.x;
                label.y1 = label.y;
                label.x2 = label.x;
                label.y2 = label.y;
                label.length = 0.0;

                let width = label.width + self.config.min_caption_dist;
                let height = label.style.font_height + self.config.min_caption_dist;
                let offset = label.style.dy;
                label.bbox.set_normalized(
                    label.x,
                    label.y,
                    frame.cos,
                    -frame.sin,
                    width,
                    height,
                    offset,
                );

                let verdict = self
                    .resolver
                    .resolve_caption(&mut self.pool, &mut self.labels, handle);
                stats.evicted += verdict.evicted();
                if verdict.is_accept() {
                    self.accept_spare(handle, item, tile.id());
                    stats.captions += 1;
                } else {
                    trace!(text = %item.text, ?verdict, "caption rejected");
                }
            }
        }
    }

    /// Point way labels along the reading direction for the current bearing
    /// and emit icons of accepted captions, then group.
    fn orient_and_group(&mut self, frame: &FrameParams, task: &mut LabelTask) {
        let mut cursor = self.labels.head();
        while let Some(handle) = cursor {
            let label = self.pool.get_mut(handle);
            cursor = label.next();

            if label.is_caption() {
                if let Some(icon) = &label.style.icon {
                    task.symbols.add_symbol(SymbolPlacement {
                        icon: icon.clone(),
                        x: label.x,
                        y: label.y,
                        billboard: true,
                        rotation: 0.0,
                    });
                }
                continue;
            }

            if frame.cos * (label.x2 - label.x1) - frame.sin * (label.y2 - label.y1) < 0.0 {
                std::mem::swap(&mut label.x1, &mut label.x2);
                std::mem::swap(&mut label.y1, &mut label.y2);
            }
        }

        group_labels(&mut self.pool, &mut self.labels, &mut self.order);
    }

    fn emit(&self, frame: &FrameParams, task: &mut LabelTask) {
        let tile_size = f64::from(self.config.tile_size);

        for tile in &self.label_tiles {
            if !tile.is_ready() {
                continue;
            }
            let Some(data) = tile.labels() else {
                continue;
            };
            let (dx, dy) = frame.tile_offset(tile.id(), tile_size);

            for symbol in &data.symbols {
                let Some(icon) = &symbol.icon else {
                    continue;
                };
                // Icons snap to whole pixels.
                let x = ((dx + f64::from(symbol.x)) * frame.scale) as i32 as f32;
                let y = ((dy + f64::from(symbol.y)) * frame.scale) as i32 as f32;
                if !frame.radius.contains_point(x, y) {
                    continue;
                }
                task.symbols.add_symbol(SymbolPlacement {
                    icon: icon.clone(),
                    x,
                    y,
                    billboard: symbol.billboard,
                    rotation: symbol.rotation,
                });
            }
        }

        task.text.clear();
        task.text
            .labels
            .extend(self.pool.iter(&self.labels).map(|(_, label)| label.to_placed()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZoomLimits;
    use crate::ir::{LabelTileData, SymbolCandidate, TextStyle};
    use crate::tiles::{MapTile, TileState, TileStore};

    const TILE: f64 = 400.0;

    struct FixedViewport {
        pos: MapPosition,
        size: (f32, f32),
    }

    impl FixedViewport {
        /// Camera centered on the middle of tile (0, 0) at `tile_zoom`,
        /// rendered at `zoom`.
        fn over_origin_tile(tile_zoom: u8, zoom: f64) -> Self {
            let world = TILE * 2f64.powi(i32::from(tile_zoom));
            Self {
                pos: MapPosition::new(200.0 / world, 200.0 / world, zoom),
                size: (800.0, 600.0),
            }
        }
    }

    impl ViewportSource for FixedViewport {
        fn map_position(&self, pos: &mut MapPosition) -> bool {
            let changed = *pos != self.pos;
            *pos = self.pos;
            changed
        }

        fn screen_size(&self) -> (f32, f32) {
            self.size
        }
    }

    fn road() -> Arc<TextStyle> {
        Arc::new(TextStyle::way(12.0, 5))
    }

    fn ready_tile(id: TileId, labels: Vec<LabelCandidate>) -> MapTile {
        let tile = MapTile::new(id);
        tile.set_labels(LabelTileData {
            labels,
            symbols: Vec::new(),
        });
        tile.set_state(TileState::Ready);
        tile
    }

    /// Horizontal way label through the center of its tile.
    fn center_way(style: &Arc<TextStyle>, text: &str, y: f32) -> LabelCandidate {
        LabelCandidate::way(text.into(), style.clone(), (150.0, y), (250.0, y), 40.0)
    }

    #[test]
    fn first_pass_places_candidates_with_current_stamp() {
        let style = road();
        let mut store = TileStore::new();
        store.insert(ready_tile(
            TileId::new(0, 0, 10),
            vec![center_way(&style, "Main St", 200.0)],
        ));
        store.show_zoom(10);
        let viewport = FixedViewport::over_origin_tile(10, 10.0);

        let mut placement = LabelPlacement::new(PlacementConfig::default());
        let mut task = LabelTask::default();
        let outcome = placement.update(&store, &viewport, &mut task);

        let stats = outcome.stats().expect("pass ran");
        assert_eq!(stats.way_labels, 1);
        assert_eq!(task.text.labels.len(), 1);
        let label = &task.text.labels[0];
        assert_eq!(label.active, placement.relabel());
        assert!(label.x.abs() < 1e-3 && label.y.abs() < 1e-3);
        assert_eq!((label.x1, label.x2), (-50.0, 50.0));
        assert_eq!(placement.stage(), PassStage::Idle);
    }

    #[test]
    fn carried_labels_survive_one_zoom_step_only() {
        let style = road();
        let mut store = TileStore::new();
        store.insert(ready_tile(
            TileId::new(0, 0, 10),
            vec![center_way(&style, "Main St", 200.0)],
        ));
        store.insert(ready_tile(TileId::new(0, 0, 11), Vec::new()));
        store.insert(ready_tile(TileId::new(0, 0, 12), Vec::new()));
        store.show_zoom(10);

        let mut placement = LabelPlacement::new(PlacementConfig::default());
        let mut task = LabelTask::default();
        placement.update(&store, &FixedViewport::over_origin_tile(10, 10.0), &mut task);
        assert_eq!(placement.label_count(), 1);

        store.show_zoom(11);
        let outcome = placement.update(&store, &FixedViewport::over_origin_tile(10, 11.0), &mut task);
        assert_eq!(outcome.stats().map(|s| s.carried), Some(1));
        let label = &task.text.labels[0];
        assert!(label.x.abs() < 1e-3);
        assert_eq!((label.x1, label.x2), (-100.0, 100.0));

        store.show_zoom(12);
        let outcome = placement.update(&store, &FixedViewport::over_origin_tile(10, 12.0), &mut task);
        let stats = outcome.stats().expect("pass ran");
        assert_eq!(stats.carried, 0);
        assert_eq!(stats.dropped, 1);
        assert!(task.text.labels.is_empty());
        assert_eq!(placement.pool().live(), 0);
    }

    #[test]
    fn labels_from_a_finer_zoom_carry_when_zooming_out() {
        let style = road();
        let mut store = TileStore::new();
        store.insert(ready_tile(
            TileId::new(0, 0, 11),
            vec![center_way(&style, "Main St", 200.0)],
        ));
        store.insert(ready_tile(TileId::new(0, 0, 10), Vec::new()));
        store.show_zoom(11);

        let mut placement = LabelPlacement::new(PlacementConfig::default());
        let mut task = LabelTask::default();
        placement.update(&store, &FixedViewport::over_origin_tile(11, 11.0), &mut task);
        assert_eq!((task.text.labels[0].x1, task.text.labels[0].x2), (-50.0, 50.0));

        store.show_zoom(10);
        let outcome = placement.update(&store, &FixedViewport::over_origin_tile(11, 10.0), &mut task);
        let stats = outcome.stats().expect("pass ran");
        assert_eq!((stats.zoom, stats.carried, stats.dropped), (10, 1, 0));
        let label = &task.text.labels[0];
        assert_eq!(label.tile, TileId::new(0, 0, 11));
        assert!(label.x.abs() < 1e-3 && label.y.abs() < 1e-3);
        assert_eq!((label.x1, label.x2), (-25.0, 25.0));
    }

    #[test]
    fn carried_labels_follow_the_camera_across_the_date_line() {
        let style = road();
        let mut store = TileStore::new();
        store.insert(ready_tile(
            TileId::new(0, 0, 1),
            vec![center_way(&style, "Main St", 200.0)],
        ));
        store.insert(ready_tile(TileId::new(1, 0, 1), Vec::new()));
        store.show_zoom(1);

        let mut placement = LabelPlacement::new(PlacementConfig::default());
        let mut task = LabelTask::default();
        let west = FixedViewport {
            pos: MapPosition::new(0.25, 0.25, 1.0),
            size: (800.0, 600.0),
        };
        placement.update(&store, &west, &mut task);
        assert!(task.text.labels[0].x.abs() < 1e-3);

        // Eight units east of the seam, seen from the far side of the world.
        let east = FixedViewport {
            pos: MapPosition::new(0.99, 0.25, 1.0),
            size: (800.0, 600.0),
        };
        let outcome = placement.update(&store, &east, &mut task);
        let stats = outcome.stats().expect("pass ran");
        assert_eq!((stats.carried, stats.way_labels), (1, 0));
        let label = &task.text.labels[0];
        assert!((label.x - 208.0).abs() < 1e-3, "x = {}", label.x);
        assert!((label.x1 - 158.0).abs() < 1e-3, "x1 = {}", label.x1);
        assert!(label.y.abs() < 1e-3);
        assert_eq!(label.active, 1);
    }

    #[test]
    fn carry_forward_is_idempotent_for_a_still_camera() {
        let style = road();
        let id = TileId::new(0, 0, 10);
        let mut store = TileStore::new();
        store.insert(ready_tile(
            id,
            vec![
                center_way(&style, "Main St", 200.0),
                center_way(&style, "Side St", 260.0),
            ],
        ));
        store.show_zoom(10);
        let viewport = FixedViewport::over_origin_tile(10, 10.0);

        let mut placement = LabelPlacement::new(PlacementConfig::default());
        let mut task = LabelTask::default();
        placement.update(&store, &viewport, &mut task);
        let mut first = task.text.labels.clone();

        // New tile data with a still camera forces another pass.
        store.set_state(&id, TileState::NewData);
        let outcome = placement.update(&store, &viewport, &mut task);
        let stats = outcome.stats().expect("pass ran");
        assert_eq!(stats.carried, 2);
        assert_eq!(stats.way_labels, 0);

        let mut second = task.text.labels.clone();
        first.sort_by(|a, b| a.text.cmp(&b.text));
        second.sort_by(|a, b| a.text.cmp(&b.text));
        assert_eq!(first, second);
    }

    #[test]
    fn still_scene_yields_unchanged_pass() {
        let style = road();
        let mut store = TileStore::new();
        store.insert(ready_tile(
            TileId::new(0, 0, 10),
            vec![center_way(&style, "Main St", 200.0)],
        ));
        store.show_zoom(10);
        let viewport = FixedViewport::over_origin_tile(10, 10.0);

        let mut placement = LabelPlacement::new(PlacementConfig::default());
        let mut task = LabelTask::default();
        assert!(placement.update(&store, &viewport, &mut task).stats().is_some());
        let stamp = placement.relabel();
        assert_eq!(placement.update(&store, &viewport, &mut task), PassOutcome::Unchanged);
        assert_eq!(placement.relabel(), stamp);
        assert_eq!(task.text.labels.len(), 1);
    }

    #[test]
    fn tile_locks_are_balanced_on_every_exit() {
        let style = road();
        let mut store = TileStore::new();
        store.insert(ready_tile(
            TileId::new(0, 0, 10),
            vec![center_way(&style, "Main St", 200.0)],
        ));
        store.show_zoom(10);
        let config = PlacementConfig {
            zoom: ZoomLimits {
                min_zoom: 0,
                max_zoom: 9,
                zoom_limit: 9,
            },
            ..PlacementConfig::default()
        };
        let viewport = FixedViewport::over_origin_tile(10, 10.0);
        let mut task = LabelTask::default();

        let mut limited = LabelPlacement::new(config);
        assert_eq!(
            limited.update(&store, &viewport, &mut task),
            PassOutcome::OutOfZoomRange(10)
        );
        assert_eq!(store.outstanding_locks(), 0);

        let mut placement = LabelPlacement::new(PlacementConfig::default());
        placement.update(&store, &viewport, &mut task);
        assert_eq!(store.outstanding_locks(), 0);
        placement.update(&store, &viewport, &mut task);
        assert_eq!(store.outstanding_locks(), 0);

        placement.cleanup(&store);
        assert_eq!(placement.pool().live(), 0);
        assert_eq!(store.outstanding_locks(), 0);
    }

    #[test]
    fn zoom_limiter_reads_each_ancestor_once() {
        let style = road();
        let mut store = TileStore::new();
        store.insert(ready_tile(
            TileId::new(0, 0, 14),
            vec![center_way(&style, "Main St", 200.0)],
        ));
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            store.insert(ready_tile(TileId::new(x, y, 16), Vec::new()));
        }
        store.show_zoom(16);
        let config = PlacementConfig {
            zoom: ZoomLimits {
                zoom_limit: 14,
                ..ZoomLimits::default()
            },
            ..PlacementConfig::default()
        };

        let mut placement = LabelPlacement::new(config);
        let mut task = LabelTask::default();
        let outcome = placement.update(&store, &FixedViewport::over_origin_tile(14, 16.0), &mut task);
        let stats = outcome.stats().expect("pass ran");
        assert_eq!(stats.zoom, 14);
        assert_eq!(stats.tiles, 1);
        assert_eq!(stats.way_labels, 1);
        assert_eq!(task.text.labels[0].tile, TileId::new(0, 0, 14));
    }

    #[test]
    fn tiles_without_ready_data_contribute_nothing() {
        let style = road();
        let mut store = TileStore::new();
        let loading = store.insert(MapTile::new(TileId::new(0, 0, 10)));
        loading.set_labels(LabelTileData {
            labels: vec![center_way(&style, "Main St", 200.0)],
            symbols: Vec::new(),
        });
        loading.set_state(TileState::Loading);
        let empty = store.insert(MapTile::new(TileId::new(1, 0, 10)));
        empty.set_state(TileState::Ready);
        store.show_zoom(10);

        let mut placement = LabelPlacement::new(PlacementConfig::default());
        let mut task = LabelTask::default();
        let outcome = placement.update(&store, &FixedViewport::over_origin_tile(10, 10.0), &mut task);
        let stats = outcome.stats().expect("pass ran");
        assert_eq!(stats.labels, 0);
        assert!(task.text.labels.is_empty());
    }

    #[test]
    fn short_paths_are_skipped_at_low_scale() {
        let style = road();
        let mut store = TileStore::new();
        // 30 units of path for 40 units of text.
        store.insert(ready_tile(
            TileId::new(0, 0, 10),
            vec![LabelCandidate::way(
                "Tiny Ln".into(),
                style,
                (185.0, 200.0),
                (215.0, 200.0),
                40.0,
            )],
        ));
        store.show_zoom(10);

        let mut placement = LabelPlacement::new(PlacementConfig::default());
        let mut task = LabelTask::default();
        placement.update(&store, &FixedViewport::over_origin_tile(10, 10.0), &mut task);
        assert!(task.text.labels.is_empty());
    }

    #[test]
    fn way_labels_read_left_to_right() {
        let style = road();
        let mut store = TileStore::new();
        store.insert(ready_tile(
            TileId::new(0, 0, 10),
            vec![LabelCandidate::way(
                "Back Rd".into(),
                style,
                (250.0, 200.0),
                (150.0, 200.0),
                40.0,
            )],
        ));
        store.show_zoom(10);

        let mut placement = LabelPlacement::new(PlacementConfig::default());
        let mut task = LabelTask::default();
        placement.update(&store, &FixedViewport::over_origin_tile(10, 10.0), &mut task);
        let label = &task.text.labels[0];
        assert!(label.x1 < label.x2);
    }

    #[test]
    fn caption_icons_and_tile_symbols_are_emitted() {
        let town = Arc::new(TextStyle {
            icon: Some("dot".into()),
            ..TextStyle::caption(14.0, 3)
        });
        let tile = MapTile::new(TileId::new(0, 0, 10));
        tile.set_labels(LabelTileData {
            labels: vec![LabelCandidate::caption(
                "Springfield".into(),
                town,
                (200.0, 200.0),
                60.0,
            )],
            symbols: vec![
                SymbolCandidate {
                    x: 210.5,
                    y: 190.0,
                    icon: Some("peak".into()),
                    billboard: false,
                    rotation: 15.0,
                },
                SymbolCandidate {
                    x: 200.0,
                    y: 200.0,
                    icon: None,
                    billboard: false,
                    rotation: 0.0,
                },
            ],
        });
        tile.set_state(TileState::Ready);
        let mut store = TileStore::new();
        store.insert(tile);
        store.show_zoom(10);

        let mut placement = LabelPlacement::new(PlacementConfig::default());
        let mut task = LabelTask::default();
        placement.update(&store, &FixedViewport::over_origin_tile(10, 10.0), &mut task);

        assert_eq!(task.text.labels.len(), 1);
        let icons: Vec<_> = task.symbols.items.iter().map(|s| s.icon.as_ref()).collect();
        assert_eq!(icons, vec!["dot", "peak"]);
        assert!(task.symbols.items[0].billboard);
        let peak = &task.symbols.items[1];
        assert_eq!((peak.x, peak.y), (10.0, -10.0));
        assert_eq!(peak.rotation, 15.0);
    }

    #[test]
    fn captions_are_not_carried_but_replaced() {
        let town = Arc::new(TextStyle::caption(14.0, 3));
        let id = TileId::new(0, 0, 10);
        let mut store = TileStore::new();
        store.insert(ready_tile(
            id,
            vec![LabelCandidate::caption(
                "Springfield".into(),
                town,
                (200.0, 200.0),
                60.0,
            )],
        ));
        store.show_zoom(10);
        let viewport = FixedViewport::over_origin_tile(10, 10.0);

        let mut placement = LabelPlacement::new(PlacementConfig::default());
        let mut task = LabelTask::default();
        placement.update(&store, &viewport, &mut task);
        store.set_state(&id, TileState::NewData);
        let outcome = placement.update(&store, &viewport, &mut task);
        let stats = outcome.stats().expect("pass ran");
        assert_eq!(stats.carried, 0);
        assert_eq!(stats.captions, 1);
        assert_eq!(task.text.labels[0].active, placement.relabel());
    }

    #[test]
    fn longitude_flips_across_the_date_line() {
        // At zoom 1 the world is 800 wide; an offset past half of it wraps.
        assert_eq!(flip_longitude(500.0, 400.0), -300.0);
        assert_eq!(flip_longitude(-500.0, 400.0), 300.0);
        assert_eq!(flip_longitude(400.0, 400.0), 400.0);
    }
}
