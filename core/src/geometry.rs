//! Plane geometry shared by shapes, edges and exports.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn offset(self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

/// Axis-aligned box, `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Box of `width` x `height` whose top edge is centred on `(cx, top)`.
    pub fn hanging(cx: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(cx - width / 2.0, top, cx + width / 2.0, top + height)
    }

    /// Smallest box holding every point; `None` for an empty iterator.
    pub fn bounding(points: impl IntoIterator<Item = Point>) -> Option<Rect> {
        points.into_iter().fold(None, |acc, p| {
            let single = Rect::new(p.x, p.y, p.x, p.y);
            Some(acc.map_or(single, |r: Rect| r.union(single)))
        })
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn center(&self) -> Point {
        Point::new((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    pub fn union(&self, other: Rect) -> Rect {
        Rect::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x0 + dx, self.y0 + dy, self.x1 + dx, self.y1 + dy)
    }

    pub fn expand(&self, margin: f64) -> Rect {
        Rect::new(self.x0 - margin, self.y0 - margin, self.x1 + margin, self.y1 + margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_of_points() {
        let r = Rect::bounding([
            Point::new(3.0, 4.0),
            Point::new(-1.0, 10.0),
            Point::new(2.0, 0.0),
        ]);
        assert_eq!(r, Some(Rect::new(-1.0, 0.0, 3.0, 10.0)));
        assert_eq!(Rect::bounding(std::iter::empty()), None);
    }

    #[test]
    fn hanging_box_centres_horizontally() {
        let r = Rect::hanging(100.0, 50.0, 200.0, 65.0);
        assert_eq!(r, Rect::new(0.0, 50.0, 200.0, 115.0));
        assert_eq!(r.center(), Point::new(100.0, 82.5));
        assert_eq!(Point::new(0.0, 0.0).distance(Point::new(3.0, 4.0)), 5.0);
    }
}
