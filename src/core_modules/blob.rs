// THEORY:
// A `Blob` is the spatial summary of one connected patch of foreground pixels
// in a single frame. It is a "dumb" container: it holds a bounding rectangle
// and has no memory of earlier frames. The only derived property is `area`,
// which the detector uses to rank candidates. Everything downstream (the
// controller, the overlay) only ever needs the box.

/// A 2D pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// Axis-aligned bounding rectangle of a detected object, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Blob {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Blob {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Builds the box enclosing two inclusive corner points.
    pub fn from_corners(top_left: Point, bottom_right: Point) -> Self {
        Self {
            x: top_left.x,
            y: top_left.y,
            width: bottom_right.x - top_left.x + 1,
            height: bottom_right.y - top_left.y + 1,
        }
    }

    /// Bounding-box area. Used for ranking only.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Center in integer pixel coordinates (halves truncate).
    pub fn center(&self) -> (i64, i64) {
        (
            self.x as i64 + self.width as i64 / 2,
            self.y as i64 + self.height as i64 / 2,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_are_inclusive() {
        let blob = Blob::from_corners(Point { x: 3, y: 4 }, Point { x: 3, y: 4 });
        assert_eq!(blob, Blob::new(3, 4, 1, 1));
        assert_eq!(blob.area(), 1);
    }

    #[test]
    fn center_truncates() {
        assert_eq!(Blob::new(200, 100, 40, 40).center(), (220, 120));
        assert_eq!(Blob::new(0, 0, 5, 3).center(), (2, 1));
    }
}
