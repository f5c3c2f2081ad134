use crate::ir::LabelTask;
use crate::placement::PassOutcome;
use crate::scene::FrameResult;
use crate::tiles::TileId;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct FrameDump {
    pub frame: usize,
    pub outcome: String,
    pub relabel: Option<u32>,
    pub zoom: Option<u8>,
    pub bearing: f32,
    pub tilt: f32,
    pub labels: Vec<LabelDump>,
    pub symbols: Vec<SymbolDump>,
}

#[derive(Debug, Serialize)]
pub struct LabelDump {
    pub text: String,
    pub caption: bool,
    pub priority: i32,
    pub x: f32,
    pub y: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub width: f32,
    pub corners: Vec<[f32; 2]>,
    pub tile: TileId,
    pub active: u32,
}

#[derive(Debug, Serialize)]
pub struct SymbolDump {
    pub icon: String,
    pub x: f32,
    pub y: f32,
    pub billboard: bool,
    pub rotation: f32,
}

impl FrameDump {
    pub fn from_task(frame: usize, outcome: &PassOutcome, task: &LabelTask) -> Self {
        let labels = task
            .text
            .labels
            .iter()
            .map(|label| LabelDump {
                text: label.text.to_string(),
                caption: label.is_caption(),
                priority: label.style.priority,
                x: label.x,
                y: label.y,
                x1: label.x1,
                y1: label.y1,
                x2: label.x2,
                y2: label.y2,
                width: label.width,
                corners: label.bbox.corners().iter().map(|(x, y)| [*x, *y]).collect(),
                tile: label.tile,
                active: label.active,
            })
            .collect();

        let symbols = task
            .symbols
            .items
            .iter()
            .map(|symbol| SymbolDump {
                icon: symbol.icon.to_string(),
                x: symbol.x,
                y: symbol.y,
                billboard: symbol.billboard,
                rotation: symbol.rotation,
            })
            .collect();

        let (outcome_name, relabel, zoom) = match outcome {
            PassOutcome::Updated(stats) => ("updated", Some(stats.relabel), Some(stats.zoom)),
            PassOutcome::Unchanged => ("unchanged", None, None),
            PassOutcome::OutOfZoomRange(zoom) => ("outOfZoomRange", None, Some(*zoom)),
        };

        FrameDump {
            frame,
            outcome: outcome_name.to_string(),
            relabel,
            zoom,
            bearing: task.pos.bearing,
            tilt: task.pos.tilt,
            labels,
            symbols,
        }
    }

    pub fn from_result(frame: usize, result: &FrameResult) -> Self {
        Self::from_task(frame, &result.outcome, &result.task)
    }
}

/// Write frame dumps as pretty JSON to `path`, or stdout when omitted.
pub fn write_placement_dump(path: Option<&Path>, dumps: &[FrameDump]) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, dumps)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut writer, dumps)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{PlacedLabel, TextStyle};
    use crate::placement::{Obb, PassStats};
    use std::sync::Arc;

    #[test]
    fn dump_carries_geometry_and_outcome() {
        let mut task = LabelTask::default();
        task.text.labels.push(PlacedLabel {
            text: "Elm".into(),
            style: Arc::new(TextStyle::way(12.0, 2)),
            x: 1.0,
            y: 2.0,
            x1: -9.0,
            y1: 2.0,
            x2: 11.0,
            y2: 2.0,
            width: 15.0,
            bbox: Obb::new_directed(1.0, 2.0, -9.0, 2.0, 18.0, 15.0),
            tile: TileId::new(3, 4, 10),
            active: 7,
        });
        let outcome = PassOutcome::Updated(PassStats {
            relabel: 7,
            zoom: 10,
            ..PassStats::default()
        });

        let dump = FrameDump::from_task(2, &outcome, &task);
        let value = serde_json::to_value(&dump).unwrap();
        assert_eq!(value["outcome"], "updated");
        assert_eq!(value["relabel"], 7);
        assert_eq!(value["labels"][0]["text"], "Elm");
        assert_eq!(value["labels"][0]["tile"]["zoom"], 10);
        assert_eq!(value["labels"][0]["corners"].as_array().map(Vec::len), Some(4));
    }
}
