use std::collections::HashSet;

use blockflow_core::export::{drawio_xml, RasterFrame};
use blockflow_core::geometry::{Point, Rect};
use blockflow_core::locate::{find_do_body, find_if_branches, find_loop_body};
use blockflow_core::snap::nearest_anchor;
use blockflow_core::{
    layout, parse_program, Construct, DecisionKind, Diagram, LayoutConfig, LayoutSession, Line,
    LineKind, MonospaceMeasure, ShapeKind,
};

const DEEP: &str = r#"
int helper(int a, int b) {
    return a + b;
}

int main() {
    int n = 0;
    for (i = 0; i < 10; i++) {
        if (i < 5) {
            while (n < i) {
                do {
                    if (n == 3) {
                        printf("%d", n);
                    } else {
                        n++;
                    }
                } while (n < 2);
                n++;
            }
        } else if (i == 5) {
            scanf("%d", &n);
        } else {
            helper(n, i);
        }
    }
    return 0;
}
"#;

fn main_lines(source: &str) -> Vec<Line> {
    let program = parse_program(source);
    assert!(program.diagnostics.is_empty(), "{:#?}", program.diagnostics);
    program.function("main").expect("main").lines.clone()
}

fn count(diagram: &Diagram, kind: ShapeKind) -> usize {
    diagram.shapes.iter().filter(|s| s.kind == kind).count()
}

fn overlaps(a: &Rect, b: &Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

#[test]
fn else_if_chain_draws_one_decision_per_condition() {
    let lines = main_lines(
        "int main() { if (a) {x=1;} else if (b) {x=2;} else if (c) {x=3;} else {x=4;} }",
    );
    let terminators = lines
        .iter()
        .filter(|l| l.kind == LineKind::Terminator(Construct::If))
        .count();
    assert_eq!(terminators, 1);
    assert_eq!(find_if_branches(&lines, 1).arity(), 4);

    let diagram = layout(&lines, &LayoutConfig::default());
    assert_eq!(count(&diagram, ShapeKind::Decision), 3);
    assert_eq!(count(&diagram, ShapeKind::Process), 4);
    assert!(diagram.diagnostics.is_empty());
}

#[test]
fn deep_nesting_lays_out_without_overlap() {
    let lines = main_lines(DEEP);
    let diagram = layout(&lines, &LayoutConfig::default());

    assert!(diagram.diagnostics.is_empty(), "{:#?}", diagram.diagnostics);
    assert_eq!(count(&diagram, ShapeKind::Loop), 1);
    assert_eq!(count(&diagram, ShapeKind::Decision), 5);
    assert_eq!(count(&diagram, ShapeKind::Io), 2);
    assert_eq!(count(&diagram, ShapeKind::Call), 1);
    assert_eq!(count(&diagram, ShapeKind::Terminal), 2);

    for (i, a) in diagram.shapes.iter().enumerate() {
        for b in &diagram.shapes[i + 1..] {
            assert!(!overlaps(&a.bbox, &b.bbox), "{} overlaps {}", a.tag, b.tag);
        }
    }
    let tags: HashSet<_> = diagram.shapes.iter().map(|s| s.tag.as_str()).collect();
    assert_eq!(tags.len(), diagram.shapes.len());
    assert!(diagram.edges.iter().all(|e| e.points.len() >= 2));
}

#[test]
fn every_construct_locates_its_own_closer() {
    let lines = main_lines(DEEP);
    for (i, line) in lines.iter().enumerate() {
        match &line.kind {
            LineKind::Decision {
                kind: DecisionKind::If,
                ..
            } => {
                let end = find_if_branches(&lines, i).end;
                assert_eq!(lines[end].kind, LineKind::Terminator(Construct::If), "if at {i}");
                assert_eq!(lines[end].depth, line.depth);
            }
            LineKind::Loop { .. } => {
                let end = find_loop_body(&lines, i).end;
                assert_eq!(lines[end].kind, LineKind::Terminator(Construct::Loop), "loop at {i}");
                assert_eq!(lines[end].depth, line.depth);
            }
            LineKind::DoBegin => {
                let found = find_do_body(&lines, i).expect("do condition");
                assert!(matches!(
                    lines[found.end].kind,
                    LineKind::Decision {
                        kind: DecisionKind::DoCondition,
                        ..
                    }
                ));
                assert_eq!(lines[found.end].depth, line.depth);
            }
            _ => {}
        }
    }
}

#[test]
fn repeated_layout_is_identical() {
    let config = LayoutConfig::default();
    let mut session = LayoutSession::new();
    let first = session.layout(&main_lines(DEEP), &config, &MonospaceMeasure);
    let second = session.layout(&main_lines(DEEP), &config, &MonospaceMeasure);
    assert_eq!(first, second);
}

#[test]
fn snap_tolerance_is_inclusive_at_25() {
    let lines = main_lines("int main() { x = 1; }");
    let diagram = layout(&lines, &LayoutConfig::default());
    let top = diagram.shapes[0].top();
    let hit = nearest_anchor(&diagram.shapes, top.offset(0.0, -25.0), 25.0);
    assert_eq!(hit, Some((diagram.shapes[0].id, top)));
    assert_eq!(nearest_anchor(&diagram.shapes, top.offset(0.0, -26.0), 25.0), None);
    assert_eq!(nearest_anchor(&diagram.shapes, Point::new(top.x - 26.0, top.y), 25.0), None);
}

#[test]
fn straight_run_is_fully_bound() {
    let lines = main_lines("int main() { int x = 1; foo(x); printf(\"%d\", x); }");
    let diagram = layout(&lines, &LayoutConfig::default());
    assert_eq!(diagram.edges.len(), diagram.shapes.len() - 1);
    for edge in &diagram.edges {
        let binding = diagram.bindings.get(edge.id).expect("binding");
        assert_eq!(binding.source, edge.source);
        assert_eq!(binding.target, edge.target);
        assert!(diagram.bindings.fully_bound(edge.id));
    }
    for shape in &diagram.shapes {
        let expected = if shape.kind == ShapeKind::Terminal { 1 } else { 2 };
        assert_eq!(diagram.bindings.edges_of(shape.id).len(), expected, "{}", shape.tag);
    }
}

#[test]
fn scale_factors_stretch_the_layout() {
    let lines = main_lines("int main() { x = 1; y = 2; }");
    let base = layout(&lines, &LayoutConfig::default());
    let stretched = layout(
        &lines,
        &LayoutConfig::from_yaml_str("h_scale: 2\nv_scale: 2\n").expect("config"),
    );
    let base_bounds = base.bounds().expect("bounds");
    let stretched_bounds = stretched.bounds().expect("bounds");
    assert!((stretched_bounds.width() - base_bounds.width() * 2.0).abs() < 1e-9);
    assert!(stretched_bounds.height() > base_bounds.height() * 1.9);
}

#[test]
fn drawio_export_covers_every_shape() {
    let diagram = layout(&main_lines(DEEP), &LayoutConfig::default());
    let xml = drawio_xml(&diagram, "main").expect("draw.io xml");
    assert_eq!(xml.matches("vertex=\"1\"").count(), diagram.shapes.len());
    let bound = diagram
        .edges
        .iter()
        .filter(|e| diagram.bindings.fully_bound(e.id))
        .count();
    assert_eq!(xml.matches("edge=\"1\"").count(), bound);
    assert!(xml.contains("shape=hexagon"));

    let frame = RasterFrame::around(&diagram);
    let bounds = diagram.bounds().expect("bounds");
    assert!(frame.region.x0 < bounds.x0 && frame.region.y1 > bounds.y1);
}
