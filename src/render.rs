use crate::config::RenderConfig;
use crate::ir::{LabelTask, PlacedLabel, SymbolPlacement};
use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

/// Debug view of one placement pass. Placement coordinates are relative to
/// the screen center in map orientation, so the map group is rotated by the
/// camera bearing.
pub fn render_svg(task: &LabelTask, config: &RenderConfig) -> String {
    let mut svg = String::new();
    let width = config.width.max(1.0);
    let height = config.height.max(1.0);
    let bearing = task.pos.bearing;

    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    );
    let _ = write!(
        svg,
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        config.background
    );

    let (cx, cy) = (width / 2.0, height / 2.0);
    let _ = write!(
        svg,
        "<path d=\"M {:.2} {cy:.2} H {:.2} M {cx:.2} {:.2} V {:.2}\" stroke=\"#CCCCCC\" stroke-width=\"0.8\"/>",
        cx - 8.0,
        cx + 8.0,
        cy - 8.0,
        cy + 8.0,
    );

    let _ = write!(
        svg,
        "<g transform=\"translate({cx:.2} {cy:.2}) rotate({bearing:.2})\">"
    );
    for label in &task.text.labels {
        if config.show_boxes {
            svg.push_str(&box_svg(label, config));
        }
        if label.is_caption() {
            svg.push_str(&caption_svg(label, bearing, config));
        } else {
            svg.push_str(&way_svg(label, config));
        }
    }
    for symbol in &task.symbols.items {
        svg.push_str(&symbol_svg(symbol, bearing, config));
    }
    svg.push_str("</g>");

    svg.push_str("</svg>");
    svg
}

fn box_svg(label: &PlacedLabel, config: &RenderConfig) -> String {
    let points = label
        .bbox
        .corners()
        .iter()
        .map(|(x, y)| format!("{x:.2},{y:.2}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "<polygon points=\"{points}\" fill=\"none\" stroke=\"{}\" stroke-width=\"0.8\" stroke-dasharray=\"3 2\"/>",
        config.box_color
    )
}

fn way_svg(label: &PlacedLabel, config: &RenderConfig) -> String {
    let angle = (label.y2 - label.y1).atan2(label.x2 - label.x1).to_degrees();
    let mut out = format!(
        "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"1\" stroke-opacity=\"0.5\"/>",
        label.x1, label.y1, label.x2, label.y2, config.way_color
    );
    let _ = write!(
        out,
        "<text x=\"{x:.2}\" y=\"{y:.2}\" transform=\"rotate({angle:.2} {x:.2} {y:.2})\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\" data-stamp=\"{}\">{}</text>",
        config.font_family,
        label.style.font_height,
        config.way_color,
        label.active,
        escape_xml(&label.text),
        x = label.x,
        y = label.y,
    );
    out
}

fn caption_svg(label: &PlacedLabel, bearing: f32, config: &RenderConfig) -> String {
    // Captions stay upright on screen.
    let (x, y) = (label.x, label.y);
    let mut out = format!(
        "<circle cx=\"{x:.2}\" cy=\"{y:.2}\" r=\"2\" fill=\"{}\"/>",
        config.caption_color
    );
    let _ = write!(
        out,
        "<text x=\"{x:.2}\" y=\"{:.2}\" transform=\"rotate({:.2} {x:.2} {y:.2})\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\" data-stamp=\"{}\">{}</text>",
        y + label.style.dy,
        -bearing,
        config.font_family,
        label.style.font_height,
        config.caption_color,
        label.active,
        escape_xml(&label.text),
    );
    out
}

fn symbol_svg(symbol: &SymbolPlacement, bearing: f32, config: &RenderConfig) -> String {
    let rotation = if symbol.billboard {
        -bearing
    } else {
        symbol.rotation
    };
    format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"6\" height=\"6\" transform=\"rotate({rotation:.2} {:.2} {:.2})\" fill=\"{}\"><title>{}</title></rect>",
        symbol.x - 3.0,
        symbol.y - 3.0,
        symbol.x,
        symbol.y,
        config.symbol_color,
        escape_xml(&symbol.icon),
    )
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = render_cfg.font_family.clone();
    if let Some(size) = usvg::Size::from_wh(render_cfg.width, render_cfg.height) {
        opt.default_size = size;
    }

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
