//! Flowchart shapes, their sizing rules and attachment anchors.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::LayoutConfig;
use crate::geometry::{Point, Rect};

const TERMINAL_PADDING: f64 = 15.0;
const PADDING: f64 = 10.0;
const DECISION_PADDING: f64 = 20.0;
/// Inner rule distance from each side of a call shape (scaled by `h_scale`).
const CALL_INSET: f64 = 15.0;
/// Parallelogram skew as a share of the block width.
const IO_SKEW_RATIO: f64 = 1.0 / 8.0;
const DECISION_WIDTH_FACTOR: f64 = 2.2;
const LOOP_WIDTH_FACTOR: f64 = 2.1;
const LOOP_WIDEN: f64 = 1.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    #[serde(rename = "terminal-oval")]
    Terminal,
    #[serde(rename = "process-rectangle")]
    Process,
    #[serde(rename = "decision-rhombus")]
    Decision,
    #[serde(rename = "call-process")]
    Call,
    #[serde(rename = "io-parallelogram")]
    Io,
    #[serde(rename = "loop-hexagon")]
    Loop,
}

impl ShapeKind {
    /// Prefix of the shape's identity tag.
    pub fn tag_prefix(self) -> &'static str {
        match self {
            ShapeKind::Terminal => "oval",
            ShapeKind::Process => "rect",
            ShapeKind::Decision => "rhombus",
            ShapeKind::Call => "sub",
            ShapeKind::Io => "para",
            ShapeKind::Loop => "hex",
        }
    }

    /// Decision-like shapes expose side anchors as well as top and bottom.
    pub fn has_side_anchors(self) -> bool {
        matches!(self, ShapeKind::Decision | ShapeKind::Loop)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShapeId(pub u32);

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Side {
    Top,
    Left,
    Right,
    Bottom,
}

/// Fixed attachment point on a shape's boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub side: Side,
    pub at: Point,
}

/// Font metrics used to size shapes around their text.
///
/// A renderer with real fonts can supply its own implementation; the layout
/// only needs widths and a line height.
pub trait TextMeasure {
    /// Rendered width of a single line.
    fn width(&self, text: &str, font_size: f64) -> f64;

    fn line_height(&self, font_size: f64) -> f64;

    /// Greedy word wrap to `max_width`. Words wider than the limit are
    /// broken between grapheme clusters.
    fn wrap(&self, text: &str, max_width: f64, font_size: f64) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();

        for word in text.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if self.width(&candidate, font_size) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if self.width(word, font_size) <= max_width {
                current = word.to_string();
                continue;
            }
            for grapheme in word.graphemes(true) {
                let candidate = format!("{current}{grapheme}");
                if !current.is_empty() && self.width(&candidate, font_size) > max_width {
                    lines.push(std::mem::replace(&mut current, grapheme.to_string()));
                } else {
                    current = candidate;
                }
            }
        }

        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }
}

/// Fixed-advance estimate: every grapheme is 0.6 em wide.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonospaceMeasure;

impl TextMeasure for MonospaceMeasure {
    fn width(&self, text: &str, font_size: f64) -> f64 {
        text.graphemes(true).count() as f64 * font_size * 0.6
    }

    fn line_height(&self, font_size: f64) -> f64 {
        font_size * 1.25
    }
}

/// A placed flowchart shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    /// `<kind>_<n>`, unique within one layout pass
    pub tag: String,
    pub kind: ShapeKind,
    /// Outer bounds, skew and bevels included
    pub bbox: Rect,
    /// Polygon vertices; empty for the oval, which is drawn from `bbox`
    pub outline: Vec<Point>,
    /// Extra strokes inside the shape (the call shape's inner rules)
    pub decor: Vec<[Point; 2]>,
    pub text: String,
    /// `text` wrapped to the shape's interior
    pub lines: Vec<String>,
    pub font_size: f64,
    pub bold: bool,
    pub fill: String,
    pub anchors: Vec<Anchor>,
}

impl Shape {
    /// Size and place a shape whose top edge is centred on `(center_x, top)`.
    pub fn build(
        id: ShapeId,
        kind: ShapeKind,
        center_x: f64,
        top: f64,
        text: impl Into<String>,
        config: &LayoutConfig,
        measure: &dyn TextMeasure,
    ) -> Shape {
        let text = text.into();
        let sp = &config.spacing;
        let (h, v) = (config.h_scale, config.v_scale);
        let block_w = sp.block_width * h;
        let min_h = sp.block_height * v;
        let bold = kind == ShapeKind::Terminal;
        let font_size = if bold { sp.terminal_font_size } else { sp.font_size } * v;

        let fit_height = |lines: &[String], padding: f64| {
            let text_h = lines.len() as f64 * measure.line_height(font_size);
            min_h.max(text_h + padding * 2.0)
        };

        let mut outline = Vec::new();
        let mut decor = Vec::new();
        let (bbox, lines) = match kind {
            ShapeKind::Terminal => {
                let lines = measure.wrap(&text, block_w - TERMINAL_PADDING * 2.5, font_size);
                let height = fit_height(&lines, TERMINAL_PADDING);
                (Rect::hanging(center_x, top, block_w, height), lines)
            }
            ShapeKind::Process => {
                let lines = measure.wrap(&text, block_w - PADDING * 2.0, font_size);
                let height = fit_height(&lines, PADDING);
                let bbox = Rect::hanging(center_x, top, block_w, height);
                outline = corners(&bbox);
                (bbox, lines)
            }
            ShapeKind::Call => {
                let inset = CALL_INSET * h;
                let lines = measure.wrap(&text, block_w - PADDING * 2.0 - inset * 2.0, font_size);
                let height = fit_height(&lines, PADDING);
                let bbox = Rect::hanging(center_x, top, block_w, height);
                outline = corners(&bbox);
                decor = vec![
                    [Point::new(bbox.x0 + inset, bbox.y0), Point::new(bbox.x0 + inset, bbox.y1)],
                    [Point::new(bbox.x1 - inset, bbox.y0), Point::new(bbox.x1 - inset, bbox.y1)],
                ];
                (bbox, lines)
            }
            ShapeKind::Io => {
                let skew = sp.block_width * IO_SKEW_RATIO * h;
                let lines = measure.wrap(&text, block_w - PADDING * 2.0 - skew, font_size);
                let height = fit_height(&lines, PADDING);
                let half = block_w / 2.0;
                let bottom = top + height;
                outline = vec![
                    Point::new(center_x - half + skew, top),
                    Point::new(center_x + half + skew, top),
                    Point::new(center_x + half - skew, bottom),
                    Point::new(center_x - half - skew, bottom),
                ];
                let bbox = Rect::new(center_x - half - skew, top, center_x + half + skew, bottom);
                (bbox, lines)
            }
            ShapeKind::Decision => {
                let text_w = measure.width(&text, font_size);
                let width = sp
                    .block_width
                    .max((text_w + DECISION_PADDING * 1.5) * DECISION_WIDTH_FACTOR)
                    * h;
                let lines = measure.wrap(&text, width / 2.0, font_size);
                let height = fit_height(&lines, DECISION_PADDING);
                let bbox = Rect::hanging(center_x, top, width, height);
                let c = bbox.center();
                outline = vec![
                    Point::new(bbox.x0, c.y),
                    Point::new(c.x, bbox.y1),
                    Point::new(bbox.x1, c.y),
                    Point::new(c.x, bbox.y0),
                ];
                (bbox, lines)
            }
            ShapeKind::Loop => {
                let text_w = measure.width(&text, font_size);
                let natural = (text_w + PADDING * 2.0) * LOOP_WIDTH_FACTOR;
                let width = sp.block_width.max(natural) * h * LOOP_WIDEN;
                let inset = min_h.min(width / 4.0);
                let lines = measure.wrap(&text, width - inset * 2.0, font_size);
                let height = fit_height(&lines, PADDING);
                let bevel = height.min(width / 4.0);
                let bbox = Rect::hanging(center_x, top, width, height);
                let mid = bbox.center().y;
                outline = vec![
                    Point::new(bbox.x0 + bevel, bbox.y0),
                    Point::new(bbox.x1 - bevel, bbox.y0),
                    Point::new(bbox.x1, mid),
                    Point::new(bbox.x1 - bevel, bbox.y1),
                    Point::new(bbox.x0 + bevel, bbox.y1),
                    Point::new(bbox.x0, mid),
                ];
                (bbox, lines)
            }
        };

        let mut shape = Shape {
            id,
            tag: format!("{}_{}", kind.tag_prefix(), id.0),
            kind,
            bbox,
            outline,
            decor,
            text,
            lines,
            font_size,
            bold,
            fill: config.palette.fill(kind).to_string(),
            anchors: Vec::new(),
        };
        shape.anchors = shape.compute_anchors();
        shape
    }

    fn compute_anchors(&self) -> Vec<Anchor> {
        let sides: &[Side] = if self.kind.has_side_anchors() {
            &[Side::Top, Side::Left, Side::Right, Side::Bottom]
        } else {
            &[Side::Top, Side::Bottom]
        };
        sides
            .iter()
            .map(|&side| Anchor {
                side,
                at: self.side_point(side),
            })
            .collect()
    }

    /// Midpoint of one side of the bounding box.
    pub fn side_point(&self, side: Side) -> Point {
        let c = self.bbox.center();
        match side {
            Side::Top => Point::new(c.x, self.bbox.y0),
            Side::Bottom => Point::new(c.x, self.bbox.y1),
            Side::Left => Point::new(self.bbox.x0, c.y),
            Side::Right => Point::new(self.bbox.x1, c.y),
        }
    }

    pub fn anchor(&self, side: Side) -> Option<Point> {
        self.anchors.iter().find(|a| a.side == side).map(|a| a.at)
    }

    pub fn top(&self) -> Point {
        self.side_point(Side::Top)
    }

    pub fn bottom(&self) -> Point {
        self.side_point(Side::Bottom)
    }

    pub fn left(&self) -> Point {
        self.side_point(Side::Left)
    }

    pub fn right(&self) -> Point {
        self.side_point(Side::Right)
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.bbox = self.bbox.translate(dx, dy);
        for p in &mut self.outline {
            *p = p.offset(dx, dy);
        }
        for [a, b] in &mut self.decor {
            *a = a.offset(dx, dy);
            *b = b.offset(dx, dy);
        }
        for anchor in &mut self.anchors {
            anchor.at = anchor.at.offset(dx, dy);
        }
    }
}

fn corners(r: &Rect) -> Vec<Point> {
    vec![
        Point::new(r.x0, r.y0),
        Point::new(r.x1, r.y0),
        Point::new(r.x1, r.y1),
        Point::new(r.x0, r.y1),
    ]
}
