//! Serialized forms of pseudocode and laid-out diagrams.

use std::collections::HashMap;
use std::io::Cursor;

use anyhow::{Context, Result};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::geometry::{Point, Rect};
use crate::layout::Diagram;
use crate::pseudocode::{render_text, Line};
use crate::shape::{ShapeId, ShapeKind};

/// First id handed out to exported draw.io cells; 0 and 1 are the root cells.
const FIRST_CELL_ID: u32 = 10;
const MIN_FRAME_PADDING: f64 = 50.0;
const FRAME_PADDING_RATIO: f64 = 0.05;

/// Tab-indented pseudocode, one line per entry.
pub fn pseudocode_text(lines: &[Line]) -> String {
    render_text(lines)
}

pub fn diagram_json(diagram: &Diagram) -> Result<String> {
    serde_json::to_string_pretty(diagram).context("Failed to serialize diagram")
}

/// Region a raster or vector image of a diagram should cover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterFrame {
    /// Padded region in diagram coordinates
    pub region: Rect,
    pub padding: f64,
}

impl RasterFrame {
    /// Bounds of every shape and edge, padded by 5% of the larger side
    /// (at least 50px).
    pub fn around(diagram: &Diagram) -> RasterFrame {
        let content = diagram.bounds().unwrap_or_default();
        let padding =
            MIN_FRAME_PADDING.max(content.width().max(content.height()) * FRAME_PADDING_RATIO);
        RasterFrame {
            region: content.expand(padding),
            padding,
        }
    }

    pub fn width(&self) -> f64 {
        self.region.width()
    }

    pub fn height(&self) -> f64 {
        self.region.height()
    }

    /// Diagram point in frame-local coordinates.
    pub fn local(&self, p: Point) -> Point {
        Point::new(p.x - self.region.x0, p.y - self.region.y0)
    }
}

fn vertex_style(kind: ShapeKind, fill: &str) -> String {
    let base = match kind {
        ShapeKind::Terminal => "ellipse;fontStyle=1;",
        ShapeKind::Process => "rounded=0;",
        ShapeKind::Decision => "rhombus;",
        ShapeKind::Call => "shape=process;",
        ShapeKind::Io => "shape=parallelogram;perimeter=parallelogramPerimeter;",
        ShapeKind::Loop => "shape=hexagon;perimeter=hexagonPerimeter2;",
    };
    format!("{base}whiteSpace=wrap;html=1;fillColor={fill};strokeColor=#000000;")
}

fn edge_style(arrow_head: bool) -> &'static str {
    if arrow_head {
        "edgeStyle=orthogonalEdgeStyle;rounded=0;html=1;endArrow=classic;strokeColor=#000000;"
    } else {
        "edgeStyle=orthogonalEdgeStyle;rounded=0;html=1;endArrow=none;strokeColor=#000000;"
    }
}

/// `p` relative to `bbox`, each axis clamped to 0..1. A degenerate box
/// yields its centre.
fn relative_point(p: Point, bbox: &Rect) -> (f64, f64) {
    if bbox.width() == 0.0 || bbox.height() == 0.0 {
        return (0.5, 0.5);
    }
    (
        ((p.x - bbox.x0) / bbox.width()).clamp(0.0, 1.0),
        ((p.y - bbox.y0) / bbox.height()).clamp(0.0, 1.0),
    )
}

type XmlWriter = Cursor<Vec<u8>>;

fn write_tag_start(
    writer: &mut Writer<XmlWriter>,
    tag_name: &str,
    attrs: &[(&str, &str)],
) -> Result<()> {
    let mut elem = BytesStart::new(tag_name);
    for attr in attrs {
        elem.push_attribute(*attr);
    }
    writer.write_event(Event::Start(elem))?;
    Ok(())
}

fn write_tag_empty(
    writer: &mut Writer<XmlWriter>,
    tag_name: &str,
    attrs: &[(&str, &str)],
) -> Result<()> {
    let mut elem = BytesStart::new(tag_name);
    for attr in attrs {
        elem.push_attribute(*attr);
    }
    writer.write_event(Event::Empty(elem))?;
    Ok(())
}

fn write_tag_end(writer: &mut Writer<XmlWriter>, tag_name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(tag_name)))?;
    Ok(())
}

fn write_point(writer: &mut Writer<XmlWriter>, x: &str, y: &str, role: Option<&str>) -> Result<()> {
    match role {
        Some(role) => write_tag_empty(writer, "mxPoint", &[("x", x), ("y", y), ("as", role)]),
        None => write_tag_empty(writer, "mxPoint", &[("x", x), ("y", y)]),
    }
}

/// Render a diagram as a draw.io (diagrams.net) document. Edges with an
/// unbound endpoint have nothing to attach to and are left out.
pub fn drawio_xml(diagram: &Diagram, page_name: &str) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    write_tag_start(&mut writer, "mxfile", &[("host", "app.diagrams.net")])?;
    write_tag_start(&mut writer, "diagram", &[("id", "blockflow"), ("name", page_name)])?;
    write_tag_start(
        &mut writer,
        "mxGraphModel",
        &[
            ("dx", "1400"),
            ("dy", "800"),
            ("grid", "1"),
            ("gridSize", "10"),
            ("guides", "1"),
            ("tooltips", "1"),
            ("connect", "1"),
            ("arrows", "1"),
            ("fold", "1"),
            ("page", "1"),
            ("pageScale", "1"),
            ("pageWidth", "850"),
            ("pageHeight", "1100"),
            ("math", "0"),
            ("shadow", "0"),
        ],
    )?;
    write_tag_start(&mut writer, "root", &[])?;
    write_tag_empty(&mut writer, "mxCell", &[("id", "0")])?;
    write_tag_empty(&mut writer, "mxCell", &[("id", "1"), ("parent", "0")])?;

    let mut next_id = FIRST_CELL_ID;
    let mut vertices: HashMap<ShapeId, (String, Rect)> = HashMap::new();

    for shape in &diagram.shapes {
        let id = format!("block-{next_id}");
        next_id += 1;
        let b = shape.bbox;
        let style = vertex_style(shape.kind, &shape.fill);
        write_tag_start(
            &mut writer,
            "mxCell",
            &[
                ("id", id.as_str()),
                ("value", shape.text.as_str()),
                ("style", style.as_str()),
                ("vertex", "1"),
                ("parent", "1"),
            ],
        )?;
        let (x, y) = (format!("{:.2}", b.x0), format!("{:.2}", b.y0));
        let (w, h) = (format!("{:.2}", b.width()), format!("{:.2}", b.height()));
        write_tag_empty(
            &mut writer,
            "mxGeometry",
            &[
                ("x", x.as_str()),
                ("y", y.as_str()),
                ("width", w.as_str()),
                ("height", h.as_str()),
                ("as", "geometry"),
            ],
        )?;
        write_tag_end(&mut writer, "mxCell")?;
        vertices.insert(shape.id, (id, b));
    }

    let mut skipped = 0usize;
    for edge in &diagram.edges {
        let binding = diagram.bindings.get(edge.id);
        let ends = binding
            .and_then(|b| Some((vertices.get(&b.source?)?, vertices.get(&b.target?)?)));
        let (Some(((source_id, source_box), (target_id, target_box))), Some(first), Some(last)) =
            (ends, edge.points.first(), edge.points.last())
        else {
            skipped += 1;
            continue;
        };

        let id = format!("arrow-{next_id}");
        next_id += 1;
        let (sx, sy) = relative_point(*first, source_box);
        let (tx, ty) = relative_point(*last, target_box);
        let label = edge.label.map(|l| l.to_string()).unwrap_or_default();

        write_tag_start(
            &mut writer,
            "mxCell",
            &[
                ("id", id.as_str()),
                ("value", label.as_str()),
                ("style", edge_style(edge.arrow_head)),
                ("edge", "1"),
                ("parent", "1"),
                ("source", source_id.as_str()),
                ("target", target_id.as_str()),
            ],
        )?;
        write_tag_start(&mut writer, "mxGeometry", &[("relative", "1"), ("as", "geometry")])?;
        write_point(&mut writer, &format!("{sx:.4}"), &format!("{sy:.4}"), Some("sourcePoint"))?;
        write_point(&mut writer, &format!("{tx:.4}"), &format!("{ty:.4}"), Some("targetPoint"))?;
        let interior = edge.points.get(1..edge.points.len() - 1).unwrap_or(&[]);
        if !interior.is_empty() {
            write_tag_start(&mut writer, "Array", &[("as", "points")])?;
            for p in interior {
                write_point(&mut writer, &format!("{:.2}", p.x), &format!("{:.2}", p.y), None)?;
            }
            write_tag_end(&mut writer, "Array")?;
        }
        write_tag_end(&mut writer, "mxGeometry")?;
        write_tag_end(&mut writer, "mxCell")?;
    }
    if skipped > 0 {
        tracing::debug!(skipped, "left unbound edges out of draw.io export");
    }

    for tag in ["root", "mxGraphModel", "diagram", "mxfile"] {
        write_tag_end(&mut writer, tag)?;
    }

    let mut xml = String::from_utf8(writer.into_inner().into_inner())
        .context("draw.io output is not UTF-8")?;
    xml.push('\n');
    Ok(xml)
}
