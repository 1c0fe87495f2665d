use std::ops::{Add, Sub};

/// A plain 2-D coordinate in board millimeters.
#[derive(Clone, Copy, Debug, Default)]
pub struct Point<T> {
    pub x: T,
    pub y: T,
}

impl<T> Point<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl Add for Point<f64> {
    type Output = Point<f64>;
    fn add(self, rhs: Point<f64>) -> Point<f64> {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point<f64> {
    type Output = Point<f64>;
    fn sub(self, rhs: Point<f64>) -> Point<f64> {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Point<f64> {
    pub fn distance(&self, other: &Point<f64>) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn manhattan(&self, other: &Point<f64>) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Equality to four decimal places, per the board-position contract:
    /// two points on the same layer agree if their millimeter coordinates
    /// round to the same 0.0001mm bucket.
    pub fn approx_eq(&self, other: &Point<f64>) -> bool {
        let round4 = |v: f64| (v * 10_000.0).round() as i64;
        round4(self.x) == round4(other.x) && round4(self.y) == round4(other.y)
    }
}

/// A position on a specific copper layer, as in the spec's `(x_mm, y_mm,
/// layer_id)` data model. Distinct from `Point` because layer identity is
/// part of equality here.
#[derive(Clone, Copy, Debug)]
pub struct LayerPoint {
    pub x: f64,
    pub y: f64,
    pub layer: u8,
}

impl LayerPoint {
    pub fn new(x: f64, y: f64, layer: u8) -> Self {
        Self { x, y, layer }
    }
}

impl PartialEq for LayerPoint {
    fn eq(&self, other: &Self) -> bool {
        if self.layer != other.layer {
            return false;
        }
        let round4 = |v: f64| (v * 10_000.0).round() as i64;
        round4(self.x) == round4(other.x) && round4(self.y) == round4(other.y)
    }
}

/// The canonical hash-domain key for a world position: `round(x/res)`,
/// ties rounding away from zero as the spec requires (not banker's
/// rounding, not floor).
pub fn grid_key(p: LayerPoint, resolution: f64) -> (i64, i64, u8) {
    (
        round_away_from_zero(p.x / resolution),
        round_away_from_zero(p.y / resolution),
        p.layer,
    )
}

pub fn round_away_from_zero(v: f64) -> i64 {
    if v >= 0.0 {
        (v + 0.5).floor() as i64
    } else {
        (v - 0.5).ceil() as i64
    }
}
