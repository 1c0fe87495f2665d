use pcb_common::geom::{Point, round_away_from_zero};
use pcb_common::geom::coord::GridCoord;

/// World (mm) <-> grid (cell) coordinate conversion at a fixed resolution.
/// Rounding ties go away from zero, per the world-to-grid contract (§4.2).
pub struct GridConverter {
    resolution: f64,
    width: u32,
    height: u32,
}

impl GridConverter {
    pub fn new(resolution: f64, width: u32, height: u32) -> Self {
        Self { resolution, width, height }
    }

    pub fn to_grid(&self, p: Point<f64>, layer: u8) -> GridCoord {
        let gx = round_away_from_zero(p.x / self.resolution).max(0) as u32;
        let gy = round_away_from_zero(p.y / self.resolution).max(0) as u32;
        GridCoord::new(gx.min(self.width.saturating_sub(1)), gy.min(self.height.saturating_sub(1)), layer)
    }

    pub fn to_world(&self, g: GridCoord) -> Point<f64> {
        Point::new(g.x as f64 * self.resolution, g.y as f64 * self.resolution)
    }

    /// Offset of a world point from its nearest grid-aligned cell center,
    /// used by the sub-grid escape router's off-grid test (§4.5).
    pub fn offset_from_grid(&self, p: Point<f64>) -> (f64, f64) {
        let snapped_x = round_away_from_zero(p.x / self.resolution) as f64 * self.resolution;
        let snapped_y = round_away_from_zero(p.y / self.resolution) as f64 * self.resolution;
        ((p.x - snapped_x).abs(), (p.y - snapped_y).abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_stable_on_grid_points() {
        let conv = GridConverter::new(0.1, 1000, 1000);
        let g = conv.to_grid(Point::new(5.0, 5.0), 0);
        let p = conv.to_world(g);
        assert!((p.x - 5.0).abs() < 1e-9);
        assert!((p.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn off_grid_point_has_nonzero_offset() {
        let conv = GridConverter::new(0.1, 1000, 1000);
        let (ox, oy) = conv.offset_from_grid(Point::new(5.03, 5.0));
        assert!(ox > 0.02);
        assert!(oy < 1e-9);
    }
}
