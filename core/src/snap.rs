//! Edge endpoint snapping and the edge/shape binding index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::layout::{Edge, EdgeId};
use crate::shape::{Shape, ShapeId};

/// Slack for floating point error on the inclusive tolerance boundary.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Source,
    Target,
}

/// Shapes an edge's endpoints are attached to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeBinding {
    pub source: Option<ShapeId>,
    pub target: Option<ShapeId>,
}

/// Edge -> endpoints, plus the reverse shape -> edges index used when a
/// shape moves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bindings {
    pub edges: BTreeMap<EdgeId, EdgeBinding>,
    pub shapes: BTreeMap<ShapeId, Vec<EdgeId>>,
}

impl Bindings {
    /// Set or clear (`None`) one endpoint binding of `edge`.
    pub fn bind(&mut self, edge: EdgeId, role: Role, shape: Option<ShapeId>) {
        let entry = self.edges.entry(edge).or_default();
        let slot = match role {
            Role::Source => &mut entry.source,
            Role::Target => &mut entry.target,
        };
        let previous = std::mem::replace(slot, shape);
        let still_bound = |id: ShapeId| entry.source == Some(id) || entry.target == Some(id);

        if let Some(old) = previous.filter(|&id| !still_bound(id)) {
            if let Some(list) = self.shapes.get_mut(&old) {
                list.retain(|&e| e != edge);
                if list.is_empty() {
                    self.shapes.remove(&old);
                }
            }
        }
        if let Some(new) = shape {
            let list = self.shapes.entry(new).or_default();
            if !list.contains(&edge) {
                list.push(edge);
            }
        }
    }

    pub fn get(&self, edge: EdgeId) -> Option<&EdgeBinding> {
        self.edges.get(&edge)
    }

    /// Edges with at least one endpoint on `shape`.
    pub fn edges_of(&self, shape: ShapeId) -> &[EdgeId] {
        self.shapes.get(&shape).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fully_bound(&self, edge: EdgeId) -> bool {
        self.get(edge)
            .is_some_and(|b| b.source.is_some() && b.target.is_some())
    }
}

/// Closest anchor within `tolerance` of `point` (inclusive). On exact ties
/// the first anchor in shape order wins.
pub fn nearest_anchor(shapes: &[Shape], point: Point, tolerance: f64) -> Option<(ShapeId, Point)> {
    let mut best: Option<(f64, ShapeId, Point)> = None;
    for shape in shapes {
        for anchor in &shape.anchors {
            let distance = anchor.at.distance(point);
            if distance > tolerance + EPSILON {
                continue;
            }
            if best.map_or(true, |(d, _, _)| distance < d) {
                best = Some((distance, shape.id, anchor.at));
            }
        }
    }
    best.map(|(_, id, at)| (id, at))
}

/// Move every edge endpoint onto its nearest anchor and record bindings.
/// Endpoints with no anchor in range stay where they are, unbound.
pub fn snap_edges(shapes: &[Shape], edges: &mut [Edge], tolerance: f64) -> Bindings {
    let mut bindings = Bindings::default();

    for edge in edges.iter_mut() {
        let Some(last) = edge.points.len().checked_sub(1) else {
            continue;
        };
        for (role, index) in [(Role::Source, 0), (Role::Target, last)] {
            let found = nearest_anchor(shapes, edge.points[index], tolerance);
            if let Some((_, at)) = found {
                edge.points[index] = at;
            }
            let shape = found.map(|(id, _)| id);
            match role {
                Role::Source => edge.source = shape,
                Role::Target => edge.target = shape,
            }
            bindings.bind(edge.id, role, shape);
        }
    }

    tracing::debug!(
        edges = edges.len(),
        bound = edges.iter().filter(|e| bindings.fully_bound(e.id)).count(),
        "snapped edge endpoints"
    );
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::shape::{MonospaceMeasure, ShapeKind};

    fn shape(id: u32, top: f64) -> Shape {
        Shape::build(
            ShapeId(id),
            ShapeKind::Process,
            0.0,
            top,
            "x",
            &LayoutConfig::default(),
            &MonospaceMeasure,
        )
    }

    fn edge(id: u32, points: Vec<Point>) -> Edge {
        Edge {
            id: EdgeId(id),
            points,
            arrow_head: true,
            label: None,
            source: None,
            target: None,
        }
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let shapes = vec![shape(0, 0.0)];
        let top = Point::new(0.0, 0.0);
        assert_eq!(nearest_anchor(&shapes, Point::new(25.0, 0.0), 25.0), Some((ShapeId(0), top)));
        assert_eq!(nearest_anchor(&shapes, Point::new(0.0, -25.0), 25.0), Some((ShapeId(0), top)));
        assert_eq!(nearest_anchor(&shapes, Point::new(26.0, 0.0), 25.0), None);
    }

    #[test]
    fn nearest_of_several_wins() {
        let shapes = vec![shape(0, 0.0), shape(1, 80.0)];
        // Bottom of shape 0 is at y=65, top of shape 1 at y=80.
        let (id, at) = nearest_anchor(&shapes, Point::new(0.0, 74.0), 25.0).unwrap();
        assert_eq!(id, ShapeId(1));
        assert_eq!(at, Point::new(0.0, 80.0));
    }

    #[test]
    fn snaps_and_binds_both_ends() {
        let shapes = vec![shape(0, 0.0), shape(1, 115.0)];
        let mut edges = vec![
            edge(0, vec![Point::new(3.0, 66.0), Point::new(-2.0, 113.0)]),
            edge(1, vec![Point::new(0.0, 180.0), Point::new(400.0, 400.0)]),
        ];
        let bindings = snap_edges(&shapes, &mut edges, 25.0);

        assert_eq!(edges[0].points, vec![Point::new(0.0, 65.0), Point::new(0.0, 115.0)]);
        assert_eq!(edges[0].source, Some(ShapeId(0)));
        assert_eq!(edges[0].target, Some(ShapeId(1)));
        assert!(bindings.fully_bound(EdgeId(0)));

        assert_eq!(edges[1].points[1], Point::new(400.0, 400.0));
        assert_eq!(edges[1].target, None);
        assert!(!bindings.fully_bound(EdgeId(1)));
        assert_eq!(bindings.edges_of(ShapeId(1)), &[EdgeId(0), EdgeId(1)]);
    }

    #[test]
    fn rebinding_updates_reverse_index() {
        let mut bindings = Bindings::default();
        bindings.bind(EdgeId(7), Role::Source, Some(ShapeId(1)));
        bindings.bind(EdgeId(7), Role::Target, Some(ShapeId(1)));
        bindings.bind(EdgeId(7), Role::Source, Some(ShapeId(2)));
        assert_eq!(bindings.edges_of(ShapeId(1)), &[EdgeId(7)]);
        assert_eq!(bindings.edges_of(ShapeId(2)), &[EdgeId(7)]);

        bindings.bind(EdgeId(7), Role::Target, None);
        assert!(bindings.edges_of(ShapeId(1)).is_empty());
        assert_eq!(bindings.get(EdgeId(7)).and_then(|b| b.target), None);
    }
}
