//! Recursive flowchart layout.
//!
//! A [`LayoutSession`] walks a pseudocode line sequence top to bottom,
//! placing one shape per drawable line and routing edges between them.
//! Constructs recurse into their bodies with a horizontal offset and report
//! an exit point back to the caller; the next sibling connects from there.
//! Once everything is placed, edge endpoints are snapped onto shape anchors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LayoutConfig;
use crate::geometry::{Point, Rect};
use crate::locate::{find_do_body, find_if_branches, find_loop_body};
use crate::pseudocode::{DecisionKind, Line, LineKind, LoopKind};
use crate::shape::{MonospaceMeasure, Shape, ShapeId, ShapeKind, TextMeasure};
use crate::snap::{snap_edges, Bindings};
use crate::{Diagnostic, Stage};

/// Rise above a while header used by its back edge, before scaling.
const WHILE_BACK_RISE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeLabel {
    True,
    False,
}

impl std::fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EdgeLabel::True => "True",
            EdgeLabel::False => "False",
        })
    }
}

/// A routed polyline between shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    /// At least two points; the first and last are the snappable endpoints
    pub points: Vec<Point>,
    pub arrow_head: bool,
    pub label: Option<EdgeLabel>,
    pub source: Option<ShapeId>,
    pub target: Option<ShapeId>,
}

/// Result of one layout pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    pub shapes: Vec<Shape>,
    pub edges: Vec<Edge>,
    pub bindings: Bindings,
    pub diagnostics: Vec<Diagnostic>,
}

impl Diagram {
    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    /// Region covered by every shape and edge point.
    pub fn bounds(&self) -> Option<Rect> {
        let shapes = self.shapes.iter().map(|s| s.bbox).reduce(|a, b| a.union(b));
        let edges = Rect::bounding(self.edges.iter().flat_map(|e| e.points.iter().copied()));
        match (shapes, edges) {
            (Some(a), Some(b)) => Some(a.union(b)),
            (a, b) => a.or(b),
        }
    }
}

#[derive(Debug, Error)]
enum LayoutError {
    #[error("do-while has no matching condition line")]
    MissingDoCondition,
    #[error("do-while condition without a matching begin")]
    OrphanDoCondition,
}

/// Owns the shapes, edges and id counters of one layout pass.
///
/// Every pass starts from [`LayoutSession::reset`], so repeated passes over
/// the same input produce identical diagrams.
#[derive(Debug, Default)]
pub struct LayoutSession {
    shapes: Vec<Shape>,
    edges: Vec<Edge>,
    diagnostics: Vec<Diagnostic>,
    next_shape: u32,
    next_edge: u32,
}

/// Position in the session's shape and edge lists.
#[derive(Debug, Clone, Copy)]
struct Mark {
    shapes: usize,
    edges: usize,
}

impl LayoutSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.shapes.clear();
        self.edges.clear();
        self.diagnostics.clear();
        self.next_shape = 0;
        self.next_edge = 0;
    }

    pub fn layout(
        &mut self,
        lines: &[Line],
        config: &LayoutConfig,
        measure: &dyn TextMeasure,
    ) -> Diagram {
        self.reset();
        let metrics = Metrics::new(config);
        let origin = config.origin;
        Placer {
            session: self,
            config,
            measure,
            m: metrics,
        }
        .place(lines, origin.y, origin.x, 0);

        let shapes = std::mem::take(&mut self.shapes);
        let mut edges = std::mem::take(&mut self.edges);
        // Free junction points sit a scaled gap away from anchors.
        let tolerance = config.snap_tolerance * config.h_scale.min(config.v_scale);
        let bindings = snap_edges(&shapes, &mut edges, tolerance);
        tracing::debug!(
            lines = lines.len(),
            shapes = shapes.len(),
            edges = edges.len(),
            "layout finished"
        );
        Diagram {
            shapes,
            edges,
            bindings,
            diagnostics: std::mem::take(&mut self.diagnostics),
        }
    }

    fn add_shape(&mut self, shape: Shape) -> Shape {
        self.shapes.push(shape.clone());
        shape
    }

    fn next_shape_id(&mut self) -> ShapeId {
        let id = ShapeId(self.next_shape);
        self.next_shape += 1;
        id
    }

    fn add_edge(&mut self, points: Vec<Point>, arrow_head: bool, label: Option<EdgeLabel>) {
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.edges.push(Edge {
            id,
            points,
            arrow_head,
            label,
            source: None,
            target: None,
        });
    }

    fn mark(&self) -> Mark {
        Mark {
            shapes: self.shapes.len(),
            edges: self.edges.len(),
        }
    }

    /// Bounds of everything placed after `mark`.
    fn extent_since(&self, mark: Mark) -> Option<Rect> {
        let shapes = self.shapes[mark.shapes..]
            .iter()
            .map(|s| s.bbox)
            .reduce(|a, b| a.union(b));
        let edges = Rect::bounding(
            self.edges[mark.edges..]
                .iter()
                .flat_map(|e| e.points.iter().copied()),
        );
        match (shapes, edges) {
            (Some(a), Some(b)) => Some(a.union(b)),
            (a, b) => a.or(b),
        }
    }

    fn translate_since(&mut self, mark: Mark, dx: f64, dy: f64) {
        for shape in &mut self.shapes[mark.shapes..] {
            shape.translate(dx, dy);
        }
        for edge in &mut self.edges[mark.edges..] {
            for p in &mut edge.points {
                *p = p.offset(dx, dy);
            }
        }
    }
}

/// Lay out one function with the default text metrics.
pub fn layout(lines: &[Line], config: &LayoutConfig) -> Diagram {
    layout_with(lines, config, &MonospaceMeasure)
}

pub fn layout_with(lines: &[Line], config: &LayoutConfig, measure: &dyn TextMeasure) -> Diagram {
    LayoutSession::new().layout(lines, config, measure)
}

/// Scaled spacing values.
#[derive(Debug, Clone, Copy)]
struct Metrics {
    block_width: f64,
    v_gap: f64,
    branch_gap: f64,
    base_offset: f64,
    nest_step: f64,
    clearance: f64,
    back_rise: f64,
}

impl Metrics {
    fn new(config: &LayoutConfig) -> Self {
        let sp = &config.spacing;
        let (h, v) = (config.h_scale, config.v_scale);
        Self {
            block_width: sp.block_width * h,
            v_gap: sp.v_gap * v,
            branch_gap: sp.branch_gap * v,
            base_offset: sp.base_h_offset * h,
            nest_step: sp.nest_step * h,
            clearance: sp.clearance * h,
            back_rise: WHILE_BACK_RISE * v,
        }
    }
}

/// Where the next sibling connects from.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    at: Point,
    started: bool,
}

struct Placer<'a> {
    session: &'a mut LayoutSession,
    config: &'a LayoutConfig,
    measure: &'a dyn TextMeasure,
    m: Metrics,
}

impl Placer<'_> {
    /// Place `lines` as one vertical run centred on `x`, the first shape's
    /// top at `start_y`. Returns the exit point.
    fn place(&mut self, lines: &[Line], start_y: f64, x: f64, depth: usize) -> Point {
        self.run(lines, start_y, x, depth).at
    }

    fn run(&mut self, lines: &[Line], start_y: f64, x: f64, depth: usize) -> Cursor {
        let mut cursor = Cursor {
            at: Point::new(x, start_y),
            started: false,
        };
        let mut i = 0;
        while i < lines.len() {
            match self.place_line(lines, i, x, depth, &mut cursor) {
                Ok(next) => i = next,
                Err(err) => {
                    tracing::warn!(line = i, depth, "{err}; skipping line");
                    self.session
                        .diagnostics
                        .push(Diagnostic::new(Stage::Layout, err.to_string(), Some(i)));
                    i += 1;
                }
            }
        }
        cursor
    }

    fn place_line(
        &mut self,
        lines: &[Line],
        i: usize,
        x: f64,
        depth: usize,
        cursor: &mut Cursor,
    ) -> Result<usize, LayoutError> {
        let line = &lines[i];
        let kind = match &line.kind {
            LineKind::Terminator(_) | LineKind::Else => return Ok(i + 1),
            LineKind::Initialization(_) if self.config.skip_initializations => return Ok(i + 1),
            LineKind::Decision {
                kind: DecisionKind::If | DecisionKind::ElseIf,
                ..
            } => return Ok(self.if_chain(lines, i, x, depth, cursor)),
            LineKind::Loop { kind, .. } => {
                return Ok(self.pre_tested(lines, i, *kind, x, depth, cursor))
            }
            LineKind::DoBegin => return self.do_while(lines, i, x, depth, cursor),
            LineKind::Decision {
                kind: DecisionKind::DoCondition,
                ..
            } => return Err(LayoutError::OrphanDoCondition),
            LineKind::Begin(_) | LineKind::End(_) => ShapeKind::Terminal,
            LineKind::Call { .. } => ShapeKind::Call,
            LineKind::Input(_) | LineKind::Output(_) => ShapeKind::Io,
            LineKind::Initialization(_) | LineKind::Generic(_) => ShapeKind::Process,
        };

        let top = self.next_top(cursor, x);
        let shape = self.shape(kind, x, top, line.label());
        cursor.at = shape.bottom();
        Ok(i + 1)
    }

    /// Top of the next shape in a run, drawing its connecting edge.
    fn next_top(&mut self, cursor: &mut Cursor, x: f64) -> f64 {
        if !cursor.started {
            cursor.started = true;
            return cursor.at.y;
        }
        let top = cursor.at.y + self.m.v_gap;
        self.session.add_edge(vec![cursor.at, Point::new(x, top)], true, None);
        top
    }

    fn shape(&mut self, kind: ShapeKind, x: f64, top: f64, text: String) -> Shape {
        let id = self.session.next_shape_id();
        let shape = Shape::build(id, kind, x, top, text, self.config, self.measure);
        self.session.add_shape(shape)
    }

    /// Horizontal distance from a decision to its branch columns.
    fn branch_offset(&self, depth: usize) -> f64 {
        let sp = &self.config.spacing;
        let decayed =
            self.m.base_offset * self.config.if_offset_factor * sp.branch_decay.powi(depth as i32);
        decayed.max(sp.min_branch_ratio * self.m.block_width)
    }

    /// Horizontal distance of loop back and exit edges from their header.
    fn loop_offset(&self, depth: usize) -> f64 {
        (self.m.base_offset / 3.0 + self.m.nest_step / (depth + 1) as f64)
            * self.config.loop_offset_factor
    }

    fn if_chain(
        &mut self,
        lines: &[Line],
        i: usize,
        x: f64,
        depth: usize,
        cursor: &mut Cursor,
    ) -> usize {
        let branches = find_if_branches(lines, i);
        let top = self.next_top(cursor, x);
        let decision = self.shape(ShapeKind::Decision, x, top, lines[i].label());
        let (left, right, bottom) = (decision.left(), decision.right(), decision.bottom());

        let offset = self
            .branch_offset(depth)
            .max(decision.bbox.width() / 2.0 + self.m.clearance);
        let true_x = x + offset;
        let mut false_x = x - offset;
        let branch_top = bottom.y + self.m.branch_gap;

        self.session.add_edge(
            vec![right, Point::new(true_x, right.y), Point::new(true_x, branch_top)],
            true,
            Some(EdgeLabel::True),
        );
        let mark = self.session.mark();
        let true_exit = self.place(branches.true_branch, branch_top, true_x, depth + 1);
        let true_extent = self.session.extent_since(mark);

        let join_y;
        if branches.false_branch.is_empty() {
            join_y = true_exit.y + self.m.v_gap;
            let bypass_x = true_extent.map_or(false_x, |e| false_x.min(e.x0 - self.m.clearance));
            self.join(true_exit, x, join_y);
            self.session.add_edge(
                vec![
                    left,
                    Point::new(bypass_x, left.y),
                    Point::new(bypass_x, join_y),
                    Point::new(x, join_y),
                ],
                false,
                Some(EdgeLabel::False),
            );
        } else {
            let mark = self.session.mark();
            let mut false_exit = self.place(branches.false_branch, branch_top, false_x, depth + 1);
            if let (Some(t), Some(f)) = (true_extent, self.session.extent_since(mark)) {
                let overlap = f.x1 + self.m.clearance - t.x0;
                if overlap > 0.0 {
                    tracing::trace!(depth, overlap, "shifting false branch left");
                    self.session.translate_since(mark, -overlap, 0.0);
                    false_x -= overlap;
                    false_exit.x -= overlap;
                }
            }
            self.session.add_edge(
                vec![left, Point::new(false_x, left.y), Point::new(false_x, branch_top)],
                true,
                Some(EdgeLabel::False),
            );
            join_y = true_exit.y.max(false_exit.y) + self.m.v_gap;
            self.join(true_exit, x, join_y);
            self.join(false_exit, x, join_y);
        }

        cursor.at = Point::new(x, join_y);
        branches.end + 1
    }

    /// Right-angle connector from a branch exit to the merge point.
    fn join(&mut self, exit: Point, x: f64, join_y: f64) {
        self.session.add_edge(
            vec![exit, Point::new(exit.x, join_y), Point::new(x, join_y)],
            false,
            None,
        );
    }

    fn pre_tested(
        &mut self,
        lines: &[Line],
        i: usize,
        loop_kind: LoopKind,
        x: f64,
        depth: usize,
        cursor: &mut Cursor,
    ) -> usize {
        let body = find_loop_body(lines, i);
        let sp = &self.config.spacing;
        let (shape_kind, spread, labels) = match loop_kind {
            LoopKind::For => (ShapeKind::Loop, sp.for_back_spread, None),
            LoopKind::While => (
                ShapeKind::Decision,
                sp.while_back_spread,
                Some((EdgeLabel::True, EdgeLabel::False)),
            ),
        };

        let top = self.next_top(cursor, x);
        let header = self.shape(shape_kind, x, top, lines[i].label());
        let body_top = header.bottom().y + self.m.branch_gap;
        self.session.add_edge(
            vec![header.bottom(), Point::new(x, body_top)],
            true,
            labels.map(|(t, _)| t),
        );

        let mark = self.session.mark();
        let exit = self.place(body.body, body_top, x, depth + 1);
        let extent = self.session.extent_since(mark);

        let offset = self.loop_offset(depth);
        let back_x = extent.map_or(f64::INFINITY, |e| e.x0 - self.m.clearance)
            .min(header.left().x - offset * spread);
        let exit_x = extent.map_or(f64::NEG_INFINITY, |e| e.x1 + self.m.clearance)
            .max(header.right().x + offset);
        let v = self.m.v_gap;

        let (back, join_y) = match loop_kind {
            LoopKind::For => {
                let turn = exit.y + v / 2.0;
                let back = vec![
                    exit,
                    Point::new(exit.x, turn),
                    Point::new(back_x, turn),
                    Point::new(back_x, header.left().y),
                    header.left(),
                ];
                (back, exit.y + v)
            }
            LoopKind::While => {
                let turn = exit.y + v;
                let rise = header.top().y - self.m.back_rise;
                let back = vec![
                    exit,
                    Point::new(exit.x, turn),
                    Point::new(back_x, turn),
                    Point::new(back_x, rise),
                    Point::new(x, rise),
                    header.top(),
                ];
                (back, exit.y + v / 1.5)
            }
        };
        self.session.add_edge(back, true, None);

        let final_y = join_y + v / 2.0;
        self.session.add_edge(
            vec![
                header.right(),
                Point::new(exit_x, header.right().y),
                Point::new(exit_x, final_y),
                Point::new(x, final_y),
            ],
            false,
            labels.map(|(_, f)| f),
        );

        cursor.at = Point::new(x, final_y);
        body.end + 1
    }

    fn do_while(
        &mut self,
        lines: &[Line],
        i: usize,
        x: f64,
        depth: usize,
        cursor: &mut Cursor,
    ) -> Result<usize, LayoutError> {
        let body = find_do_body(lines, i).ok_or(LayoutError::MissingDoCondition)?;
        let body_top = self.next_top(cursor, x);

        let mark = self.session.mark();
        let mut inner = self.run(body.body, body_top, x, depth + 1);
        let extent = self.session.extent_since(mark);
        let first = self.session.shapes.get(mark.shapes).map(Shape::top);

        let top = self.next_top(&mut inner, x);
        let condition = self.shape(ShapeKind::Decision, x, top, lines[body.end].label());
        let left = condition.left();
        let loop_y = body_top - self.m.v_gap / 2.0;
        let bend_x = extent
            .map_or(f64::INFINITY, |e| e.x0 - self.m.clearance)
            .min(left.x - self.loop_offset(depth) * self.config.spacing.while_back_spread);
        self.session.add_edge(
            vec![
                left,
                Point::new(bend_x, left.y),
                Point::new(bend_x, loop_y),
                Point::new(x, loop_y),
                first.unwrap_or_else(|| condition.top()),
            ],
            true,
            Some(EdgeLabel::True),
        );

        let out = condition.bottom().offset(0.0, self.m.branch_gap);
        self.session
            .add_edge(vec![condition.bottom(), out], false, Some(EdgeLabel::False));

        cursor.at = out;
        Ok(body.end + 1)
    }
}
