use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomLimits {
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Deepest zoom at which tiles carry labels; deeper tiles borrow from
    /// their ancestor at this zoom.
    pub zoom_limit: u8,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 20,
            zoom_limit: 17,
        }
    }
}

impl ZoomLimits {
    pub fn contains(&self, zoom: u8) -> bool {
        zoom >= self.min_zoom && zoom <= self.max_zoom
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementConfig {
    /// Tile edge in screen units at the tile's own zoom.
    pub tile_size: f32,
    /// Widen the visible radius with tilt so far labels survive.
    pub distant_labels: bool,
    pub distance_coefficient: f32,
    /// Padding added to caption boxes.
    pub min_caption_dist: f32,
    /// Padding added to way label boxes.
    pub min_way_dist: f32,
    /// Extra span a carried way label may lack before it is dropped.
    pub carry_forward_slack: f32,
    /// Largest zoom difference a label is carried across.
    pub carry_forward_zoom_window: u8,
    /// Widening of the coarse endpoint test in the resolver.
    pub proximity_margin: f32,
    pub zoom: ZoomLimits,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            tile_size: 400.0,
            distant_labels: false,
            distance_coefficient: 3.0,
            min_caption_dist: 5.0,
            min_way_dist: 3.0,
            carry_forward_slack: 10.0,
            carry_forward_zoom_window: 1,
            proximity_margin: 100.0,
            zoom: ZoomLimits::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
    pub font_family: String,
    pub way_color: String,
    pub caption_color: String,
    pub box_color: String,
    pub symbol_color: String,
    pub show_boxes: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
            font_family: "sans-serif".to_string(),
            way_color: "#3B5B92".to_string(),
            caption_color: "#222222".to_string(),
            box_color: "#D9534F".to_string(),
            symbol_color: "#5CB85C".to_string(),
            show_boxes: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub placement: PlacementConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ZoomLimitsFile {
    min_zoom: Option<u8>,
    max_zoom: Option<u8>,
    zoom_limit: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PlacementConfigFile {
    tile_size: Option<f32>,
    distant_labels: Option<bool>,
    distance_coefficient: Option<f32>,
    min_caption_dist: Option<f32>,
    min_way_dist: Option<f32>,
    carry_forward_slack: Option<f32>,
    carry_forward_zoom_window: Option<u8>,
    proximity_margin: Option<f32>,
    zoom: Option<ZoomLimitsFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    width: Option<f32>,
    height: Option<f32>,
    background: Option<String>,
    font_family: Option<String>,
    way_color: Option<String>,
    caption_color: Option<String>,
    box_color: Option<String>,
    symbol_color: Option<String>,
    show_boxes: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    placement: Option<PlacementConfigFile>,
    render: Option<RenderConfigFile>,
}

fn parse_config_file(contents: &str) -> anyhow::Result<ConfigFile> {
    match serde_json::from_str(contents) {
        Ok(parsed) => Ok(parsed),
        Err(json_err) => json5::from_str(contents)
            .map_err(|_| anyhow::anyhow!("invalid config file: {json_err}")),
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed = parse_config_file(&contents)?;
    apply_config_file(&mut config, parsed);
    Ok(config)
}

fn apply_config_file(config: &mut Config, parsed: ConfigFile) {
    if let Some(placement) = parsed.placement {
        if let Some(v) = placement.tile_size {
            config.placement.tile_size = v;
        }
        if let Some(v) = placement.distant_labels {
            config.placement.distant_labels = v;
        }
        if let Some(v) = placement.distance_coefficient {
            config.placement.distance_coefficient = v;
        }
        if let Some(v) = placement.min_caption_dist {
            config.placement.min_caption_dist = v;
        }
        if let Some(v) = placement.min_way_dist {
            config.placement.min_way_dist = v;
        }
        if let Some(v) = placement.carry_forward_slack {
            config.placement.carry_forward_slack = v;
        }
        if let Some(v) = placement.carry_forward_zoom_window {
            config.placement.carry_forward_zoom_window = v;
        }
        if let Some(v) = placement.proximity_margin {
            config.placement.proximity_margin = v;
        }
        if let Some(zoom) = placement.zoom {
            if let Some(v) = zoom.min_zoom {
                config.placement.zoom.min_zoom = v;
            }
            if let Some(v) = zoom.max_zoom {
                config.placement.zoom.max_zoom = v;
            }
            if let Some(v) = zoom.zoom_limit {
                config.placement.zoom.zoom_limit = v;
            }
        }
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.width {
            config.render.width = v;
        }
        if let Some(v) = render.height {
            config.render.height = v;
        }
        if let Some(v) = render.background {
            config.render.background = v;
        }
        if let Some(v) = render.font_family {
            config.render.font_family = v;
        }
        if let Some(v) = render.way_color {
            config.render.way_color = v;
        }
        if let Some(v) = render.caption_color {
            config.render.caption_color = v;
        }
        if let Some(v) = render.box_color {
            config.render.box_color = v;
        }
        if let Some(v) = render.symbol_color {
            config.render.symbol_color = v;
        }
        if let Some(v) = render.show_boxes {
            config.render.show_boxes = v;
        }
    }
}
