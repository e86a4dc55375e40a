//! Square-spiral traversal of a geographic bounding box.
//!
//! Grid offsets are walked outward from the box midpoint so that the area of
//! interest near the centre is discovered first:
//!
//! ```text
//!   (-1,1) (0,1) (1,1)
//!   (-1,0) (0,0) (1,0)
//!   (-1,-1)(0,-1)(1,-1)
//!
//!   order: (0,0) (1,0) (1,1) (0,1) (-1,1) (-1,0) (-1,-1) (0,-1) (1,-1) ...
//! ```
//!
//! `x` offsets step in latitude and `y` offsets in longitude.

/// Headings queried for every grid cell, in degrees.
pub const HEADINGS: [u16; 8] = [0, 45, 90, 135, 180, 225, 270, 315];

/// Geographic bounding box with normalized corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min_lat: f64,
    min_lon: f64,
    max_lat: f64,
    max_lon: f64,
}

impl BoundingBox {
    /// Creates a box from two opposite corners in any order.
    pub fn new(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> Self {
        Self {
            min_lat: lat_a.min(lat_b),
            min_lon: lon_a.min(lon_b),
            max_lat: lat_a.max(lat_b),
            max_lon: lon_a.max(lon_b),
        }
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    /// Midpoint `(lat, lon)` the spiral starts from.
    pub fn midpoint(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// Offset of a grid cell from the box midpoint, in steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPoint {
    pub x: i64,
    pub y: i64,
}

/// One metadata query: a grid position plus a heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub lat: f64,
    pub lon: f64,
    pub heading: u16,
}

impl GridCell {
    /// `lat,lon` as used in metadata URLs and the metadata index.
    pub fn coords(&self) -> String {
        format!("{:.6},{:.6}", self.lat, self.lon)
    }
}

/// Lazy, finite spiral over the grid offsets of a bounding box.
///
/// Every in-box offset is yielded exactly once. Offsets outside the box
/// still advance the spiral but are not yielded. Iteration ends as soon as
/// the last in-box offset has been produced.
#[derive(Debug, Clone)]
pub struct SpiralGrid {
    bbox: BoundingBox,
    step_lat: f64,
    step_lon: f64,
    half_x: i64,
    half_y: i64,
    x: i64,
    y: i64,
    dx: i64,
    dy: i64,
    remaining: u64,
}

impl SpiralGrid {
    /// Creates the traversal for `bbox` with the given step sizes in degrees.
    ///
    /// The grid has `ceil(extent / step)` cells per axis; offsets range over
    /// `-count/2 ..= count/2` (integer division). An axis with no extent or
    /// a non-positive step has a count of zero; if both do, nothing is
    /// yielded.
    pub fn new(bbox: BoundingBox, step_lat: f64, step_lon: f64) -> Self {
        let count_x = cell_count(bbox.max_lat - bbox.min_lat, step_lat);
        let count_y = cell_count(bbox.max_lon - bbox.min_lon, step_lon);
        let half_x = count_x / 2;
        let half_y = count_y / 2;

        let remaining = if count_x == 0 && count_y == 0 {
            0
        } else {
            (2 * half_x as u64 + 1) * (2 * half_y as u64 + 1)
        };

        Self {
            bbox,
            step_lat,
            step_lon,
            half_x,
            half_y,
            x: 0,
            y: 0,
            dx: 0,
            dy: -1,
            remaining,
        }
    }

    /// Number of offsets not yet yielded.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Whether `point` lies within the half extents of the grid.
    pub fn contains(&self, point: GridPoint) -> bool {
        (-self.half_x..=self.half_x).contains(&point.x)
            && (-self.half_y..=self.half_y).contains(&point.y)
    }

    /// Geographic position `(lat, lon)` of a grid offset.
    pub fn position(&self, point: GridPoint) -> (f64, f64) {
        let (mid_lat, mid_lon) = self.bbox.midpoint();
        (
            mid_lat + self.step_lat * point.x as f64,
            mid_lon + self.step_lon * point.y as f64,
        )
    }

    /// Expands the traversal into one [`GridCell`] per offset and heading.
    pub fn cells(self) -> impl Iterator<Item = GridCell> {
        let grid = self.clone();
        self.flat_map(move |point| {
            let (lat, lon) = grid.position(point);
            HEADINGS
                .iter()
                .map(move |&heading| GridCell { lat, lon, heading })
        })
    }

    fn advance(&mut self) {
        let (x, y) = (self.x, self.y);
        if x == y || (x < 0 && x == -y) || (x > 0 && x == 1 - y) {
            let dx = self.dx;
            self.dx = -self.dy;
            self.dy = dx;
        }
        self.x += self.dx;
        self.y += self.dy;
    }
}

impl Iterator for SpiralGrid {
    type Item = GridPoint;

    fn next(&mut self) -> Option<GridPoint> {
        while self.remaining > 0 {
            let point = GridPoint {
                x: self.x,
                y: self.y,
            };
            self.advance();
            if self.contains(point) {
                self.remaining -= 1;
                return Some(point);
            }
        }
        None
    }
}

fn cell_count(extent: f64, step: f64) -> i64 {
    if step.is_nan() || step <= 0.0 || !extent.is_finite() || extent <= 0.0 {
        return 0;
    }
    (extent / step).ceil() as i64
}
