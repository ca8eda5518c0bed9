//! Standalone SVG rendering of a laid-out diagram.

use blockflow_core::export::RasterFrame;
use blockflow_core::geometry::Point;
use blockflow_core::{Diagram, Edge, Shape, ShapeKind};

const STROKE: &str = r##"stroke="#000000" stroke-width="2""##;
const LABEL_FONT_SIZE: f64 = 12.0;

/// Escape a value for a double-quoted XML attribute or text node.
fn escape_xml_attr(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(c),
        }
    }
    result
}

pub fn render(diagram: &Diagram) -> String {
    let frame = RasterFrame::around(diagram);
    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{:.0}\" height=\"{:.0}\" viewBox=\"0 0 {:.2} {:.2}\">\n",
        frame.width(),
        frame.height(),
        frame.width(),
        frame.height()
    );
    svg.push_str(
        "  <defs>\n    <marker id=\"arrowhead\" markerWidth=\"10\" markerHeight=\"7\" \
         refX=\"10\" refY=\"3.5\" orient=\"auto\">\n      \
         <polygon points=\"0 0, 10 3.5, 0 7\" fill=\"#000000\"/>\n    </marker>\n  </defs>\n",
    );
    svg.push_str(&format!(
        "  <rect x=\"0\" y=\"0\" width=\"{:.2}\" height=\"{:.2}\" fill=\"#FFFFFF\"/>\n",
        frame.width(),
        frame.height()
    ));

    for edge in &diagram.edges {
        render_edge(&mut svg, &frame, edge);
    }
    for shape in &diagram.shapes {
        render_shape(&mut svg, &frame, shape);
    }

    svg.push_str("</svg>\n");
    svg
}

fn points_attr(frame: &RasterFrame, points: &[Point]) -> String {
    points
        .iter()
        .map(|&p| {
            let p = frame.local(p);
            format!("{:.2},{:.2}", p.x, p.y)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_edge(svg: &mut String, frame: &RasterFrame, edge: &Edge) {
    let marker = if edge.arrow_head { r#" marker-end="url(#arrowhead)""# } else { "" };
    svg.push_str(&format!(
        "  <polyline points=\"{}\" fill=\"none\" {STROKE}{marker}/>\n",
        points_attr(frame, &edge.points)
    ));

    // Labels sit just past the first bend, where True/False branches split.
    if let (Some(label), Some(&at)) = (edge.label, edge.points.get(1).or(edge.points.first())) {
        let at = frame.local(at);
        svg.push_str(&format!(
            "  <text x=\"{:.2}\" y=\"{:.2}\" font-size=\"{LABEL_FONT_SIZE:.2}\" font-family=\"sans-serif\">{label}</text>\n",
            at.x + 4.0,
            at.y - 4.0
        ));
    }
}

fn render_shape(svg: &mut String, frame: &RasterFrame, shape: &Shape) {
    let fill = escape_xml_attr(&shape.fill);
    match shape.kind {
        ShapeKind::Terminal => {
            let c = frame.local(shape.bbox.center());
            svg.push_str(&format!(
                "  <ellipse cx=\"{:.2}\" cy=\"{:.2}\" rx=\"{:.2}\" ry=\"{:.2}\" fill=\"{fill}\" {STROKE}/>\n",
                c.x,
                c.y,
                shape.bbox.width() / 2.0,
                shape.bbox.height() / 2.0
            ));
        }
        _ => {
            svg.push_str(&format!(
                "  <polygon points=\"{}\" fill=\"{fill}\" {STROKE}/>\n",
                points_attr(frame, &shape.outline)
            ));
        }
    }
    for [a, b] in &shape.decor {
        let (a, b) = (frame.local(*a), frame.local(*b));
        svg.push_str(&format!(
            "  <line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" {STROKE}/>\n",
            a.x, a.y, b.x, b.y
        ));
    }

    if shape.lines.is_empty() {
        return;
    }
    let c = frame.local(shape.bbox.center());
    let line_height = shape.font_size * 1.25;
    let first_y = c.y - line_height * (shape.lines.len() as f64 - 1.0) / 2.0;
    let weight = if shape.bold { r#" font-weight="bold""# } else { "" };
    svg.push_str(&format!(
        "  <text text-anchor=\"middle\" dominant-baseline=\"middle\" font-size=\"{:.2}\" font-family=\"monospace\"{weight}>\n",
        shape.font_size
    ));
    for (i, line) in shape.lines.iter().enumerate() {
        svg.push_str(&format!(
            "    <tspan x=\"{:.2}\" y=\"{:.2}\">{}</tspan>\n",
            c.x,
            first_y + line_height * i as f64,
            escape_xml_attr(line)
        ));
    }
    svg.push_str("  </text>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockflow_core::{layout, pseudocode::parse_text, LayoutConfig};

    #[test]
    fn escapes_attribute_text() {
        assert_eq!(
            escape_xml_attr(r#"a < b && "c" > 'd'"#),
            "a &lt; b &amp;&amp; &quot;c&quot; &gt; &apos;d&apos;"
        );
    }

    #[test]
    fn renders_every_shape_and_edge() {
        let diagram = layout(
            &parse_text("Begin\nIf: a < b then\n\tCall: f(a)\nEnd if\nEnd"),
            &LayoutConfig::default(),
        );
        let svg = render(&diagram);
        assert!(svg.starts_with("<svg "));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<ellipse").count(), 2);
        // Decision and call outlines, plus the marker triangle.
        assert_eq!(svg.matches("<polygon").count(), 3);
        assert_eq!(svg.matches("<polyline").count(), diagram.edges.len());
        assert_eq!(svg.matches("<line ").count(), 2);
        assert!(svg.contains("a &lt; b"));
        assert!(svg.contains(">True</text>"));
        assert!(svg.contains(">False</text>"));
    }
}
