// Tile-set collaborator: identity, readiness and per-tile label data.
// Decoders write into `MapTile` from their own threads; the placement pass
// only ever reads snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::ir::LabelTileData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TileId {
    pub x: i32,
    pub y: i32,
    pub zoom: u8,
}

impl TileId {
    pub fn new(x: i32, y: i32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// The tile covering this one at `zoom`, or `None` when `zoom` is deeper.
    pub fn ancestor(&self, zoom: u8) -> Option<TileId> {
        if zoom > self.zoom {
            return None;
        }
        let shift = u32::from(self.zoom - zoom);
        Some(TileId {
            x: self.x >> shift,
            y: self.y >> shift,
            zoom,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum TileState {
    #[default]
    None = 0,
    Loading = 1,
    NewData = 2,
    Ready = 3,
    Cancel = 4,
}

impl TileState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Loading,
            2 => Self::NewData,
            3 => Self::Ready,
            4 => Self::Cancel,
            _ => Self::None,
        }
    }
}

#[derive(Debug)]
pub struct MapTile {
    id: TileId,
    state: AtomicU8,
    locks: AtomicU32,
    data: RwLock<Option<Arc<LabelTileData>>>,
}

impl MapTile {
    pub fn new(id: TileId) -> Self {
        Self {
            id,
            state: AtomicU8::new(TileState::None as u8),
            locks: AtomicU32::new(0),
            data: RwLock::new(None),
        }
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn state(&self) -> TileState {
        TileState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: TileState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Ready or holding freshly decoded data.
    pub fn is_ready(&self) -> bool {
        matches!(self.state(), TileState::Ready | TileState::NewData)
    }

    /// Snapshot of the decoded label data. The read lock is held only while
    /// cloning the `Arc`.
    pub fn labels(&self) -> Option<Arc<LabelTileData>> {
        self.data.read().clone()
    }

    /// Replace the tile's label data wholesale.
    pub fn set_labels(&self, data: LabelTileData) {
        *self.data.write() = Some(Arc::new(data));
    }

    pub fn lock(&self) {
        self.locks.fetch_add(1, Ordering::AcqRel);
    }

    pub fn unlock(&self) {
        let prev = self
            .locks
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if prev.is_err() {
            if cfg!(debug_assertions) {
                panic!("unlock of unlocked tile {:?}", self.id);
            }
            tracing::error!(tile = ?self.id, "unbalanced tile unlock ignored");
        }
    }

    pub fn lock_count(&self) -> u32 {
        self.locks.load(Ordering::Acquire)
    }
}

/// Tiles held by one placement pass. Every tile in the set is locked.
#[derive(Debug, Default)]
pub struct TileSet {
    tiles: Vec<Arc<MapTile>>,
}

impl TileSet {
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MapTile>> {
        self.tiles.iter()
    }

    pub fn push(&mut self, tile: Arc<MapTile>) {
        tile.lock();
        self.tiles.push(tile);
    }

    /// Unlock and forget every tile.
    pub fn release_tiles(&mut self) {
        for tile in self.tiles.drain(..) {
            tile.unlock();
        }
    }
}

/// Source of visible tiles for a placement pass.
pub trait TileProvider {
    /// Refill `set` with the currently visible tiles, locked. Returns the
    /// render zoom when the set changed since the previous call.
    fn visible_tiles(&self, set: &mut TileSet) -> Option<u8>;

    /// Hand the tiles of `set` back to the cache.
    fn release_tiles(&self, set: &mut TileSet) {
        set.release_tiles();
    }

    /// The cached tile covering `id` at `zoom`, used by the zoom limiter.
    fn tile_at_zoom(&self, id: &TileId, zoom: u8) -> Option<Arc<MapTile>>;
}

#[derive(Debug, Default)]
struct StoreView {
    visible: Vec<TileId>,
    zoom: u8,
    generation: u64,
    served: Option<u64>,
}

/// In-memory tile cache. Visibility and readiness changes bump a generation
/// counter that `visible_tiles` reports as a change.
#[derive(Debug, Default)]
pub struct TileStore {
    tiles: BTreeMap<TileId, Arc<MapTile>>,
    view: Mutex<StoreView>,
}

impl TileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tile: MapTile) -> Arc<MapTile> {
        let tile = Arc::new(tile);
        self.tiles.insert(tile.id(), tile.clone());
        self.view.lock().generation += 1;
        tile
    }

    pub fn get(&self, id: &TileId) -> Option<&Arc<MapTile>> {
        self.tiles.get(id)
    }

    /// Flip a tile's state, e.g. when its decode finished.
    pub fn set_state(&self, id: &TileId, state: TileState) -> bool {
        let Some(tile) = self.tiles.get(id) else {
            return false;
        };
        if tile.state() != state {
            tile.set_state(state);
            self.view.lock().generation += 1;
        }
        true
    }

    /// Set the visible tiles and render zoom.
    pub fn set_visible(&self, visible: Vec<TileId>, zoom: u8) {
        let mut view = self.view.lock();
        if view.visible != visible || view.zoom != zoom {
            view.visible = visible;
            view.zoom = zoom;
            view.generation += 1;
        }
    }

    /// Every stored tile at `zoom` is made visible.
    pub fn show_zoom(&self, zoom: u8) {
        let visible = self
            .tiles
            .keys()
            .filter(|id| id.zoom == zoom)
            .copied()
            .collect();
        self.set_visible(visible, zoom);
    }

    /// Total outstanding locks across the cache.
    pub fn outstanding_locks(&self) -> u32 {
        self.tiles.values().map(|tile| tile.lock_count()).sum()
    }
}

impl TileProvider for TileStore {
    fn visible_tiles(&self, set: &mut TileSet) -> Option<u8> {
        set.release_tiles();
        let mut view = self.view.lock();
        for id in &view.visible {
            if let Some(tile) = self.tiles.get(id) {
                set.push(tile.clone());
            }
        }
        if view.served == Some(view.generation) {
            return None;
        }
        view.served = Some(view.generation);
        Some(view.zoom)
    }

    fn tile_at_zoom(&self, id: &TileId, zoom: u8) -> Option<Arc<MapTile>> {
        let ancestor = id.ancestor(zoom)?;
        self.tiles.get(&ancestor).cloned()
    }
}
